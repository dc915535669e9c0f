//! Page fetchers
//!
//! A [`PageFetcher`] loads one URL and returns its extracted content. Any
//! failure is scoped to that URL: the traversal records it as a failed page
//! and moves on (unless the URL is the crawl root).

use crate::config::UserAgentConfig;
use crate::crawler::parser::{parse_html, ExtractedPage};
use crate::DelveError;
use async_trait::async_trait;
use reqwest::{header, redirect::Policy, Client};
use std::time::Duration;
use url::Url;

/// Loads pages and extracts their content
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches `url`, giving up after `timeout`
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<ExtractedPage, DelveError>;
}

/// Builds the HTTP client shared by the fetcher and robots.txt lookups
///
/// The user agent is formatted as `CrawlerName/Version (+ContactURL; ContactEmail)`.
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches pages over plain HTTP and parses the returned HTML
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<ExtractedPage, DelveError> {
        let classify = |e: reqwest::Error| {
            if e.is_timeout() {
                DelveError::Timeout {
                    url: url.to_string(),
                }
            } else {
                DelveError::Http {
                    url: url.to_string(),
                    source: e,
                }
            }
        };

        let response = self
            .client
            .get(url.as_str())
            .timeout(timeout)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DelveError::Extraction {
                url: url.to_string(),
                message: format!("HTTP {}", status.as_u16()),
            });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        if !content_type.is_empty()
            && !content_type.contains("text/html")
            && !content_type.contains("application/xhtml")
        {
            return Err(DelveError::Extraction {
                url: url.to_string(),
                message: format!("unsupported content type {}", content_type),
            });
        }

        let final_url = response.url().clone();
        let body = response.text().await.map_err(classify)?;

        Ok(parse_html(&body, &final_url))
    }
}
