//! URL handling module for Delve
//!
//! This module provides URL normalization, domain extraction and the
//! registrable-domain scoping that keeps a crawl inside its root site.

mod domain;
mod normalize;

pub use domain::{extract_domain, registrable_domain, same_site};
pub use normalize::normalize_url;
