//! Storage traits and error types
//!
//! This module defines the trait interface for the relational store that
//! persists crawl jobs and crawled pages.

use crate::analysis::Analysis;
use crate::state::{JobStatus, PageStatus};
use crate::storage::{CrawlJob, CrawledPage, JobCounters, NewPage, OwnerIds};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Crawl job not found: {0}")]
    JobNotFound(i64),

    #[error("Page not found: {0}")]
    PageNotFound(i64),

    #[error("Invalid job transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: i64,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for relational storage backends
///
/// Jobs and pages are only mutated by the job that owns them, so
/// implementations need no cross-job coordination beyond their own
/// connection handling.
pub trait Storage {
    // ===== Job Management =====

    /// Creates a job in the `pending` state and returns its id
    fn create_job(&mut self, root_url: &str, owner: &OwnerIds, max_pages: u32)
        -> StorageResult<i64>;

    /// Gets a job by ID
    fn get_job(&self, job_id: i64) -> StorageResult<CrawlJob>;

    /// Lists all jobs of a user, newest first
    fn list_jobs_by_owner(&self, user_id: &str) -> StorageResult<Vec<CrawlJob>>;

    /// Moves a job to a new status
    ///
    /// Rejects transitions not allowed by [`JobStatus::can_transition_to`].
    /// Entering `processing` records the start time; entering a terminal
    /// status records the completion time and the optional error message.
    fn transition_job(
        &mut self,
        job_id: i64,
        to: JobStatus,
        error_message: Option<&str>,
    ) -> StorageResult<()>;

    /// Stores running counters; stored values never decrease
    fn update_job_counters(&mut self, job_id: i64, counters: &JobCounters) -> StorageResult<()>;

    // ===== Page Management =====

    /// Records a visited URL; each URL is recorded at most once per job
    fn insert_page(&mut self, page: &NewPage) -> StorageResult<i64>;

    /// Gets a page by ID
    fn get_page(&self, page_id: i64) -> StorageResult<CrawledPage>;

    /// Attaches an analysis result and marks the page analyzed
    fn update_page_analysis(&mut self, page_id: i64, analysis: &Analysis) -> StorageResult<()>;

    /// Stamps the processed time of a page
    fn mark_page_processed(&mut self, page_id: i64) -> StorageResult<()>;

    /// Marks a page failed, keeping the error message in place
    fn mark_page_failed(&mut self, page_id: i64, error_message: &str) -> StorageResult<()>;

    /// Lists a job's pages in visit order
    fn list_pages_by_job(&self, job_id: i64) -> StorageResult<Vec<CrawledPage>>;

    /// Lists all pages crawled for a user across jobs
    fn list_pages_by_owner(&self, user_id: &str) -> StorageResult<Vec<CrawledPage>>;

    // ===== Statistics =====

    /// Counts a job's pages with the given status
    fn count_pages_by_status(&self, job_id: i64, status: PageStatus) -> StorageResult<u64>;
}
