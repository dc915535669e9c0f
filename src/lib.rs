//! Delve: bounded site crawling and quota-aware indexing
//!
//! This crate implements the content acquisition pipeline of a research
//! assistant: a depth- and count-bounded crawler that stays inside one root
//! domain, and a chunked indexing layer that writes crawled content into a
//! vector store with hard per-document and per-field size limits.

pub mod analysis;
pub mod config;
pub mod crawler;
pub mod index;
pub mod output;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Delve operations
#[derive(Debug, Error)]
pub enum DelveError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Vector store error: {0}")]
    VectorStore(#[from] index::VectorStoreError),

    #[error("Analyzer error: {0}")]
    Analyzer(#[from] analysis::AnalyzerError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Page extraction failed for {url}: {message}")]
    Extraction { url: String, message: String },

    #[error("Root page {url} could not be fetched: {message}")]
    RootUnreachable { url: String, message: String },

    #[error("Crawl job {0} not found")]
    JobNotFound(i64),

    #[error("Crawl job {0} was cancelled")]
    Cancelled(i64),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Job task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Delve operations
pub type Result<T> = std::result::Result<T, DelveError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlService, JobHandle};
pub use index::{chunk_text, reconstruct, DedupLedger, VectorIndexer};
pub use state::{JobStatus, PageStatus};
pub use url::{extract_domain, normalize_url, registrable_domain};
