//! Output module for job reports
//!
//! This module handles:
//! - Gathering per-job statistics from storage
//! - Rendering job summaries, job lists, page tables and search results as
//!   plain text for the command line

pub mod stats;
mod text;

pub use stats::{load_job_summary, JobSummary};
pub use text::{format_job_list, format_job_summary, format_page_table, format_search_results};
