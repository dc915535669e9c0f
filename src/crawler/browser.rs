//! Headless Chrome page fetcher
//!
//! Renders each page in a fresh tab so client-side content is visible, then
//! reads the title, meta description, `innerText` of the body and anchor
//! hrefs from the live DOM.

use crate::config::BrowserConfig;
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::parser::{resolve_links, ExtractedPage};
use crate::DelveError;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::Deserialize;
use std::time::Duration;
use tokio::task::JoinHandle;
use url::Url;

/// Reads everything the crawler needs from the rendered document
const EXTRACT_SCRIPT: &str = r#"
(() => {
    const meta = document.querySelector('meta[name="description"], meta[property="og:description"]');
    return {
        title: document.title || null,
        description: meta ? meta.getAttribute('content') : null,
        text: document.body ? document.body.innerText : '',
        links: Array.from(document.querySelectorAll('a[href]'))
            .filter(a => !a.hasAttribute('download'))
            .map(a => a.getAttribute('href')),
    };
})()
"#;

#[derive(Debug, Deserialize)]
struct RenderedPage {
    title: Option<String>,
    description: Option<String>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    links: Vec<String>,
}

/// Fetches pages through a headless Chrome instance
pub struct ChromeFetcher {
    browser: Browser,
    handler: JoinHandle<()>,
    user_agent: String,
}

impl ChromeFetcher {
    /// Launches Chrome and starts its event loop
    pub async fn launch(config: &BrowserConfig, user_agent: String) -> Result<Self, DelveError> {
        let mut builder = ChromeConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run");
        if let Some(path) = &config.chrome_path {
            builder = builder.chrome_executable(path);
        }
        if !config.headless {
            builder = builder.with_head();
        }
        let chrome_config = builder.build().map_err(DelveError::Browser)?;

        tracing::info!("Launching Chrome (headless={})", config.headless);
        let (browser, mut handler) = Browser::launch(chrome_config)
            .await
            .map_err(|e| DelveError::Browser(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser,
            handler,
            user_agent,
        })
    }

    async fn render(&self, page: &Page, url: &Url, timeout: Duration) -> Result<ExtractedPage, DelveError> {
        let browser_error = |e: chromiumoxide::error::CdpError| DelveError::Browser(e.to_string());

        page.execute(SetUserAgentOverrideParams::new(self.user_agent.clone()))
            .await
            .map_err(browser_error)?;

        let navigate = NavigateParams::builder()
            .url(url.as_str())
            .build()
            .map_err(DelveError::Browser)?;

        let loaded = async {
            page.execute(navigate).await?;
            page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };
        tokio::time::timeout(timeout, loaded)
            .await
            .map_err(|_| DelveError::Timeout {
                url: url.to_string(),
            })?
            .map_err(browser_error)?;

        let final_url = page
            .url()
            .await
            .map_err(browser_error)?
            .and_then(|u| Url::parse(&u).ok())
            .unwrap_or_else(|| url.clone());

        let rendered: RenderedPage = page
            .evaluate(EXTRACT_SCRIPT.to_string())
            .await
            .map_err(browser_error)?
            .into_value()
            .map_err(|e| DelveError::Extraction {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let clean = |s: String| {
            let s = s.split_whitespace().collect::<Vec<_>>().join(" ");
            (!s.is_empty()).then_some(s)
        };

        Ok(ExtractedPage {
            final_url: final_url.to_string(),
            title: rendered.title.and_then(clean),
            description: rendered.description.and_then(clean),
            text: clean(rendered.text).unwrap_or_default(),
            links: resolve_links(rendered.links.iter().map(String::as_str), &final_url),
        })
    }
}

#[async_trait]
impl PageFetcher for ChromeFetcher {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<ExtractedPage, DelveError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| DelveError::Browser(e.to_string()))?;

        let result = self.render(&page, url, timeout).await;
        if let Err(e) = page.close().await {
            tracing::debug!("Failed to close tab for {}: {}", url, e);
        }
        result
    }
}

impl Drop for ChromeFetcher {
    fn drop(&mut self) {
        self.handler.abort();
    }
}
