//! OpenAI-compatible chat completion analyzer

use crate::analysis::{parse_analysis_response, Analysis, AnalyzerError, ContentAnalyzer};
use crate::config::AnalyzerConfig;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SYSTEM_PROMPT: &str = "You analyze web page content for a research assistant. \
Respond with a single JSON object with the keys: summary (string), keyTopics (array of strings), \
contentType (string), relevanceScore (number between 0 and 1), insights (array of strings). \
Do not add any other text.";

/// Analyzer backed by a `/chat/completions` endpoint
pub struct ChatAnalyzer {
    client: Client,
    endpoint: String,
    model: String,
}

impl ChatAnalyzer {
    /// Builds an analyzer from configuration
    ///
    /// The API key, when configured, is read from the named environment
    /// variable at construction time.
    pub fn from_config(config: &AnalyzerConfig) -> Result<Self, AnalyzerError> {
        let api_key = match &config.api_key_env {
            Some(var) => Some(std::env::var(var).map_err(|_| {
                AnalyzerError::Config(format!("environment variable {} is not set", var))
            })?),
            None => None,
        };

        Self::new(
            &config.endpoint,
            &config.model,
            api_key.as_deref(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn new(
        base_url: &str,
        model: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, AnalyzerError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key {
            let auth = format!("Bearer {}", key.trim());
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth)
                    .map_err(|_| AnalyzerError::Config("invalid API key".to_string()))?,
            );
        }

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl ContentAnalyzer for ChatAnalyzer {
    async fn analyze(&self, text: &str) -> Result<Analysis, AnalyzerError> {
        let body = ChatRequest {
            model: &self.model,
            temperature: 0.2,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
        };

        let resp = self.client.post(&self.endpoint).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(AnalyzerError::Status { status, body });
        }

        let parsed: ChatResponse = resp.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(AnalyzerError::EmptyResponse)?;

        Ok(parse_analysis_response(&content))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: String,
}
