use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Delve
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub analyzer: Option<AnalyzerConfig>,
    #[serde(default)]
    pub browser: BrowserConfig,
}

impl Config {
    /// Characters of page text handed to the content analyzer
    pub fn analyzer_input_chars(&self) -> usize {
        self.analyzer
            .as_ref()
            .map_or_else(default_input_chars, |a| a.input_chars)
    }

    /// Upper bound on a single content analysis call
    pub fn analyzer_timeout(&self) -> Duration {
        let secs = self
            .analyzer
            .as_ref()
            .map_or_else(default_analyzer_timeout_secs, |a| a.timeout_secs);
        Duration::from_secs(secs)
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum depth to crawl; the root page is depth 1
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Maximum number of distinct URLs visited per job
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Maximum number of pages sent to the content analyzer per job
    #[serde(default)]
    pub max_analyzed: Option<u32>,

    /// Fixed delay inserted before every non-root visit (milliseconds)
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Timeout for a single page fetch (seconds)
    #[serde(default = "default_page_timeout_secs")]
    pub page_timeout_secs: u64,

    /// Pages whose priority is strictly greater than this are analyzed
    #[serde(default = "default_analysis_threshold")]
    pub analysis_threshold: u8,

    /// Maximum number of outbound links read from a single page
    #[serde(default = "default_max_links_per_page")]
    pub max_links_per_page: usize,

    /// Whether robots.txt of the root domain is honored
    #[serde(default = "default_true")]
    pub respect_robots: bool,
}

impl CrawlerConfig {
    /// Analyzed-page bound, falling back to the page bound
    pub fn analyzed_limit(&self) -> u32 {
        self.max_analyzed.unwrap_or(self.max_pages)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_pages: default_max_pages(),
            max_analyzed: None,
            request_delay_ms: default_request_delay_ms(),
            page_timeout_secs: default_page_timeout_secs(),
            analysis_threshold: default_analysis_threshold(),
            max_links_per_page: default_max_links_per_page(),
            respect_robots: true,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the user agent as `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Size limits of the vector store and the derived chunk budget
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IndexConfig {
    /// Hard per-document byte limit of the store
    #[serde(default = "default_document_limit")]
    pub document_limit_bytes: usize,

    /// Bytes kept free under the document limit for metadata
    #[serde(default = "default_headroom")]
    pub headroom_bytes: usize,

    /// Hard per-metadata-value byte limit
    #[serde(default = "default_metadata_value_limit")]
    pub metadata_value_limit_bytes: usize,

    /// Hard byte limit for a record's whole metadata object
    #[serde(default = "default_metadata_total_limit")]
    pub metadata_total_limit_bytes: usize,

    /// Maximum records returned by one listing call
    #[serde(default = "default_listing_cap")]
    pub listing_cap: usize,
}

impl IndexConfig {
    /// Byte budget handed to the chunker
    pub fn chunk_budget(&self) -> usize {
        self.document_limit_bytes.saturating_sub(self.headroom_bytes)
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            document_limit_bytes: default_document_limit(),
            headroom_bytes: default_headroom(),
            metadata_value_limit_bytes: default_metadata_value_limit(),
            metadata_total_limit_bytes: default_metadata_total_limit(),
            listing_cap: default_listing_cap(),
        }
    }
}

/// OpenAI-compatible analysis endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AnalyzerConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`
    pub endpoint: String,

    /// Model name sent with each request
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Characters of page text sent to the analyzer
    #[serde(default = "default_input_chars")]
    pub input_chars: usize,

    /// Request timeout (seconds)
    #[serde(default = "default_analyzer_timeout_secs")]
    pub timeout_secs: u64,
}

/// Page fetch engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserEngine {
    /// Plain HTTP GET and static HTML parsing
    #[default]
    Http,
    /// Headless Chrome (requires the `browser` feature)
    Chrome,
}

/// Headless browser configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BrowserConfig {
    #[serde(default)]
    pub engine: BrowserEngine,

    /// Explicit Chrome/Chromium executable
    #[serde(default)]
    pub chrome_path: Option<String>,

    #[serde(default = "default_true")]
    pub headless: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            engine: BrowserEngine::Http,
            chrome_path: None,
            headless: true,
        }
    }
}

fn default_max_depth() -> u32 {
    3
}

fn default_max_pages() -> u32 {
    50
}

fn default_request_delay_ms() -> u64 {
    1000
}

fn default_page_timeout_secs() -> u64 {
    30
}

fn default_analysis_threshold() -> u8 {
    6
}

fn default_max_links_per_page() -> usize {
    100
}

fn default_true() -> bool {
    true
}

fn default_document_limit() -> usize {
    40 * 1024
}

fn default_headroom() -> usize {
    500
}

fn default_metadata_value_limit() -> usize {
    2048
}

fn default_metadata_total_limit() -> usize {
    8192
}

fn default_listing_cap() -> usize {
    1000
}

fn default_input_chars() -> usize {
    4000
}

fn default_analyzer_timeout_secs() -> u64 {
    60
}
