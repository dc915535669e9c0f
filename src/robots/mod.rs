//! Robots.txt policy for a crawl job
//!
//! A job fetches `/robots.txt` of its root origin once before traversal and
//! checks every URL against it. Missing or unreadable files allow everything.

use reqwest::{Client, StatusCode};
use robotstxt::DefaultMatcher;
use std::time::Duration;
use url::Url;

/// Robots.txt rules of one origin, as seen by one user agent
#[derive(Debug, Clone)]
pub struct RobotsPolicy {
    /// Raw file content; `None` allows every URL
    content: Option<String>,
    /// Product token matched against `User-agent` lines
    agent: String,
}

impl RobotsPolicy {
    pub fn from_content(content: &str, agent: &str) -> Self {
        Self {
            content: Some(content.to_string()),
            agent: agent.to_string(),
        }
    }

    pub fn allow_all(agent: &str) -> Self {
        Self {
            content: None,
            agent: agent.to_string(),
        }
    }

    /// Fetches robots.txt for the origin of `root_url`
    ///
    /// Client errors (404, 410, ...) and network failures allow everything;
    /// 401/403 are treated as a full disallow.
    pub async fn fetch(client: &Client, root_url: &Url, agent: &str) -> Self {
        let mut robots_url = root_url.clone();
        robots_url.set_path("/robots.txt");
        robots_url.set_query(None);
        robots_url.set_fragment(None);

        let response = match client
            .get(robots_url.as_str())
            .timeout(Duration::from_secs(10))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Could not fetch {}: {}", robots_url, e);
                return Self::allow_all(agent);
            }
        };

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                tracing::info!("{} is access-restricted, disallowing all", robots_url);
                Self::from_content("User-agent: *\nDisallow: /", agent)
            }
            status if status.is_success() => match response.text().await {
                Ok(body) => {
                    tracing::debug!("Loaded {} ({} bytes)", robots_url, body.len());
                    Self::from_content(&body, agent)
                }
                Err(e) => {
                    tracing::debug!("Unreadable {}: {}", robots_url, e);
                    Self::allow_all(agent)
                }
            },
            status => {
                tracing::debug!("{} returned {}, allowing all", robots_url, status);
                Self::allow_all(agent)
            }
        }
    }

    /// Checks whether `url` may be fetched
    pub fn is_allowed(&self, url: &str) -> bool {
        match &self.content {
            Some(content) if !content.trim().is_empty() => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(content, &self.agent, url)
            }
            _ => true,
        }
    }

    /// `Crawl-delay` of the group applying to this agent, falling back to `*`
    pub fn crawl_delay(&self) -> Option<Duration> {
        let content = self.content.as_deref()?;
        let agent = self.agent.to_lowercase();

        let mut group: Vec<String> = Vec::new();
        let mut in_rules = false;
        let mut specific = None;
        let mut wildcard = None;

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim().to_lowercase().as_str() {
                "user-agent" => {
                    if in_rules {
                        group.clear();
                        in_rules = false;
                    }
                    group.push(value.to_lowercase());
                }
                "crawl-delay" => {
                    in_rules = true;
                    let Ok(secs) = value.parse::<f64>() else {
                        continue;
                    };
                    if !secs.is_finite() || secs < 0.0 {
                        continue;
                    }
                    if group.iter().any(|ua| ua != "*" && agent.contains(ua.as_str())) {
                        specific = Some(secs);
                    } else if group.iter().any(|ua| ua == "*") {
                        wildcard = Some(secs);
                    }
                }
                _ => in_rules = true,
            }
        }

        specific.or(wildcard).map(Duration::from_secs_f64)
    }
}
