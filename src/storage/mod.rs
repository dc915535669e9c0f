//! Storage module for persisting crawl data
//!
//! This module handles all relational persistence, including:
//! - SQLite database initialization and schema management
//! - Crawl job lifecycle and running counters
//! - Crawled page records and their analysis results
//! - Sharing one connection between concurrently running jobs

mod schema;
mod sqlite;
mod traits;

pub use schema::initialize_schema;
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::analysis::Analysis;
use crate::state::{JobStatus, PageStatus};
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage handle shared between the service and running jobs
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

/// Wraps a storage backend for sharing across tasks
pub fn shared(storage: SqliteStorage) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}

/// Locks shared storage, mapping poisoning to a storage error
pub fn lock(storage: &SharedStorage) -> StorageResult<MutexGuard<'_, SqliteStorage>> {
    storage.lock().map_err(|_| StorageError::LockPoisoned)
}

/// Identifies who a job and its pages belong to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnerIds {
    pub user_id: String,
    pub profile_id: String,
}

impl OwnerIds {
    pub fn new(user_id: impl Into<String>, profile_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            profile_id: profile_id.into(),
        }
    }
}

/// Running counters of a crawl job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounters {
    pub discovered: u32,
    pub processed: u32,
    pub analyzed: u32,
}

/// Represents a crawl job in the database
#[derive(Debug, Clone)]
pub struct CrawlJob {
    pub id: i64,
    pub owner: OwnerIds,
    pub root_url: String,
    pub status: JobStatus,
    pub max_pages: u32,
    pub counters: JobCounters,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub error_message: Option<String>,
}

/// Represents a visited URL in the database
#[derive(Debug, Clone)]
pub struct CrawledPage {
    pub id: i64,
    pub job_id: i64,
    pub owner: OwnerIds,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub analysis: Option<Analysis>,
    pub status: PageStatus,
    pub priority: u8,
    pub depth: u32,
    pub discovered_at: String,
    pub processed_at: Option<String>,
    pub error_message: Option<String>,
}

/// Fields recorded when a URL is first visited
#[derive(Debug, Clone)]
pub struct NewPage {
    pub job_id: i64,
    pub owner: OwnerIds,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub status: PageStatus,
    pub priority: u8,
    pub depth: u32,
    pub error_message: Option<String>,
}
