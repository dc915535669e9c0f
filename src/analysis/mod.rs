//! Content analysis
//!
//! The content analyzer turns page text into a summary, key topics, a content
//! type and a relevance score. It is an opaque, possibly remote service:
//! callers go through [`analyze_or_fallback`], which never fails and degrades
//! to [`Analysis::fallback`] on any error, timeout or unparsable response.

mod chat;
mod heuristic;

pub use chat::ChatAnalyzer;
pub use heuristic::HeuristicAnalyzer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors raised by analyzer implementations
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("Analyzer request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Analyzer returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Analyzer response was empty")]
    EmptyResponse,

    #[error("Analyzer configuration error: {0}")]
    Config(String),
}

/// Structured result of analyzing a piece of content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    #[serde(default)]
    pub summary: String,

    #[serde(default)]
    pub key_topics: Vec<String>,

    #[serde(default = "unknown_content_type")]
    pub content_type: String,

    #[serde(default)]
    pub relevance_score: f32,

    #[serde(default)]
    pub insights: Vec<String>,
}

impl Analysis {
    /// Low-confidence result used when analysis fails
    pub fn fallback() -> Self {
        Self {
            summary: "Content analysis unavailable".to_string(),
            key_topics: Vec::new(),
            content_type: unknown_content_type(),
            relevance_score: 0.1,
            insights: Vec::new(),
        }
    }

    /// Renders the analysis as indexable text
    pub fn to_document_text(&self) -> String {
        let mut text = self.summary.clone();
        if !self.key_topics.is_empty() {
            text.push_str("\nTopics: ");
            text.push_str(&self.key_topics.join(", "));
        }
        for insight in &self.insights {
            text.push_str("\n- ");
            text.push_str(insight);
        }
        text
    }
}

fn unknown_content_type() -> String {
    "unknown".to_string()
}

/// A service that analyzes text content
#[async_trait]
pub trait ContentAnalyzer: Send + Sync {
    /// Analyzes already-truncated text
    async fn analyze(&self, text: &str) -> Result<Analysis, AnalyzerError>;
}

/// Truncates text to at most `max_chars` characters
pub fn truncate_input(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Runs the analyzer on truncated input, never failing
///
/// A call that does not finish within `timeout` is abandoned.
pub async fn analyze_or_fallback(
    analyzer: &dyn ContentAnalyzer,
    text: &str,
    max_chars: usize,
    timeout: Duration,
) -> Analysis {
    let input = truncate_input(text, max_chars);
    match tokio::time::timeout(timeout, analyzer.analyze(input)).await {
        Ok(Ok(analysis)) => analysis,
        Ok(Err(e)) => {
            tracing::warn!("Content analysis failed, using fallback: {}", e);
            Analysis::fallback()
        }
        Err(_) => {
            tracing::warn!("Content analysis timed out after {:?}, using fallback", timeout);
            Analysis::fallback()
        }
    }
}

/// Parses a model response into an analysis
///
/// Accepts bare JSON, JSON wrapped in a Markdown code fence, or JSON embedded
/// in surrounding prose. Anything that does not yield a JSON object maps to
/// [`Analysis::fallback`]. The relevance score is clamped to `[0, 1]`.
pub fn parse_analysis_response(raw: &str) -> Analysis {
    let Some(candidate) = extract_json_object(raw) else {
        tracing::debug!("No JSON object in analyzer response");
        return Analysis::fallback();
    };

    match serde_json::from_str::<Analysis>(candidate) {
        Ok(mut analysis) => {
            if !analysis.relevance_score.is_finite() {
                analysis.relevance_score = 0.0;
            }
            analysis.relevance_score = analysis.relevance_score.clamp(0.0, 1.0);
            analysis
        }
        Err(e) => {
            tracing::debug!("Unparsable analyzer response: {}", e);
            Analysis::fallback()
        }
    }
}

/// Returns the outermost `{ ... }` span of a string, if any
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}
