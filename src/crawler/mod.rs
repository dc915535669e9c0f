//! Crawler module for bounded single-site crawls
//!
//! This module contains the crawling pipeline, including:
//! - Page fetching over HTTP or a headless browser
//! - HTML extraction and same-site link scoping
//! - Priority scoring that gates content analysis
//! - Depth-first traversal with page, depth and analysis bounds
//! - The job lifecycle exposed through [`CrawlService`]

#[cfg(feature = "browser")]
mod browser;
mod fetcher;
mod parser;
mod scorer;
mod service;
mod traversal;

#[cfg(feature = "browser")]
pub use browser::ChromeFetcher;
pub use fetcher::{build_http_client, HttpFetcher, PageFetcher};
pub use parser::{parse_html, resolve_links, scope_links, ExtractedPage};
pub use scorer::{score, MAX_PRIORITY, MIN_PRIORITY};
pub use service::{CrawlService, JobHandle};
pub use traversal::{
    CrawlContext, Traversal, TraversalSettings, REDIRECTED_OFF_SITE, REDIRECTED_TO_VISITED,
    ROBOTS_DISALLOWED,
};
