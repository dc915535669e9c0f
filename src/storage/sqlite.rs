//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::analysis::Analysis;
use crate::state::{JobStatus, PageStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{CrawlJob, CrawledPage, JobCounters, NewPage, OwnerIds};
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;

const JOB_COLUMNS: &str = "id, user_id, profile_id, root_url, status, max_pages,
     pages_discovered, pages_processed, pages_analyzed, created_at, started_at,
     completed_at, error_message";

const PAGE_COLUMNS: &str = "id, job_id, user_id, profile_id, url, title, description,
     content, analysis, status, priority, depth, discovered_at, processed_at, error_message";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (or creates) a database file and initializes the schema
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn job_status(&self, job_id: i64) -> StorageResult<JobStatus> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM crawl_jobs WHERE id = ?1",
                params![job_id],
                |row| row.get(0),
            )
            .optional()?;

        let raw = raw.ok_or(StorageError::JobNotFound(job_id))?;
        Ok(JobStatus::from_db_string(&raw).unwrap_or(JobStatus::Failed))
    }
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<CrawlJob> {
    Ok(CrawlJob {
        id: row.get(0)?,
        owner: OwnerIds {
            user_id: row.get(1)?,
            profile_id: row.get(2)?,
        },
        root_url: row.get(3)?,
        status: JobStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or(JobStatus::Failed),
        max_pages: row.get(5)?,
        counters: JobCounters {
            discovered: row.get(6)?,
            processed: row.get(7)?,
            analyzed: row.get(8)?,
        },
        created_at: row.get(9)?,
        started_at: row.get(10)?,
        completed_at: row.get(11)?,
        error_message: row.get(12)?,
    })
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<CrawledPage> {
    // A stored analysis that no longer parses reads back as absent.
    let analysis: Option<Analysis> = row
        .get::<_, Option<String>>(8)?
        .and_then(|raw| serde_json::from_str(&raw).ok());

    Ok(CrawledPage {
        id: row.get(0)?,
        job_id: row.get(1)?,
        owner: OwnerIds {
            user_id: row.get(2)?,
            profile_id: row.get(3)?,
        },
        url: row.get(4)?,
        title: row.get(5)?,
        description: row.get(6)?,
        content: row.get(7)?,
        analysis,
        status: PageStatus::from_db_string(&row.get::<_, String>(9)?)
            .unwrap_or(PageStatus::Failed),
        priority: row.get(10)?,
        depth: row.get(11)?,
        discovered_at: row.get(12)?,
        processed_at: row.get(13)?,
        error_message: row.get(14)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Job Management =====

    fn create_job(
        &mut self,
        root_url: &str,
        owner: &OwnerIds,
        max_pages: u32,
    ) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO crawl_jobs (user_id, profile_id, root_url, status, max_pages, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                owner.user_id,
                owner.profile_id,
                root_url,
                JobStatus::Pending.to_db_string(),
                max_pages,
                now
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_job(&self, job_id: i64) -> StorageResult<CrawlJob> {
        let sql = format!("SELECT {} FROM crawl_jobs WHERE id = ?1", JOB_COLUMNS);
        self.conn
            .query_row(&sql, params![job_id], job_from_row)
            .optional()?
            .ok_or(StorageError::JobNotFound(job_id))
    }

    fn list_jobs_by_owner(&self, user_id: &str) -> StorageResult<Vec<CrawlJob>> {
        let sql = format!(
            "SELECT {} FROM crawl_jobs WHERE user_id = ?1 ORDER BY id DESC",
            JOB_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let jobs = stmt
            .query_map(params![user_id], job_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(jobs)
    }

    fn transition_job(
        &mut self,
        job_id: i64,
        to: JobStatus,
        error_message: Option<&str>,
    ) -> StorageResult<()> {
        let from = self.job_status(job_id)?;
        if !from.can_transition_to(to) {
            return Err(StorageError::InvalidTransition { job_id, from, to });
        }

        let now = Utc::now().to_rfc3339();
        if to == JobStatus::Processing {
            self.conn.execute(
                "UPDATE crawl_jobs SET status = ?1, started_at = ?2 WHERE id = ?3",
                params![to.to_db_string(), now, job_id],
            )?;
        } else if to.is_terminal() {
            self.conn.execute(
                "UPDATE crawl_jobs SET status = ?1, completed_at = ?2, error_message = ?3
                 WHERE id = ?4",
                params![to.to_db_string(), now, error_message, job_id],
            )?;
        } else {
            self.conn.execute(
                "UPDATE crawl_jobs SET status = ?1 WHERE id = ?2",
                params![to.to_db_string(), job_id],
            )?;
        }

        Ok(())
    }

    fn update_job_counters(&mut self, job_id: i64, counters: &JobCounters) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE crawl_jobs SET
                pages_discovered = MAX(pages_discovered, ?1),
                pages_processed = MAX(pages_processed, ?2),
                pages_analyzed = MAX(pages_analyzed, ?3)
             WHERE id = ?4",
            params![
                counters.discovered,
                counters.processed,
                counters.analyzed,
                job_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::JobNotFound(job_id));
        }
        Ok(())
    }

    // ===== Page Management =====

    fn insert_page(&mut self, page: &NewPage) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        let result = self.conn.execute(
            "INSERT INTO crawled_pages (job_id, user_id, profile_id, url, title, description,
             content, status, priority, depth, discovered_at, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                page.job_id,
                page.owner.user_id,
                page.owner.profile_id,
                page.url,
                page.title,
                page.description,
                page.content,
                page.status.to_db_string(),
                page.priority,
                page.depth,
                now,
                page.error_message,
            ],
        );

        match result {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(StorageError::ConstraintViolation(format!(
                    "page {} already recorded for job {}",
                    page.url, page.job_id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get_page(&self, page_id: i64) -> StorageResult<CrawledPage> {
        let sql = format!("SELECT {} FROM crawled_pages WHERE id = ?1", PAGE_COLUMNS);
        self.conn
            .query_row(&sql, params![page_id], page_from_row)
            .optional()?
            .ok_or(StorageError::PageNotFound(page_id))
    }

    fn update_page_analysis(&mut self, page_id: i64, analysis: &Analysis) -> StorageResult<()> {
        let json = serde_json::to_string(analysis)?;
        let updated = self.conn.execute(
            "UPDATE crawled_pages SET analysis = ?1, status = ?2 WHERE id = ?3",
            params![json, PageStatus::Analyzed.to_db_string(), page_id],
        )?;

        if updated == 0 {
            return Err(StorageError::PageNotFound(page_id));
        }
        Ok(())
    }

    fn mark_page_processed(&mut self, page_id: i64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE crawled_pages SET processed_at = ?1 WHERE id = ?2",
            params![now, page_id],
        )?;

        if updated == 0 {
            return Err(StorageError::PageNotFound(page_id));
        }
        Ok(())
    }

    fn mark_page_failed(&mut self, page_id: i64, error_message: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE crawled_pages SET status = ?1, error_message = ?2, processed_at = ?3
             WHERE id = ?4",
            params![PageStatus::Failed.to_db_string(), error_message, now, page_id],
        )?;

        if updated == 0 {
            return Err(StorageError::PageNotFound(page_id));
        }
        Ok(())
    }

    fn list_pages_by_job(&self, job_id: i64) -> StorageResult<Vec<CrawledPage>> {
        let sql = format!(
            "SELECT {} FROM crawled_pages WHERE job_id = ?1 ORDER BY id ASC",
            PAGE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let pages = stmt
            .query_map(params![job_id], page_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pages)
    }

    fn list_pages_by_owner(&self, user_id: &str) -> StorageResult<Vec<CrawledPage>> {
        let sql = format!(
            "SELECT {} FROM crawled_pages WHERE user_id = ?1 ORDER BY id ASC",
            PAGE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let pages = stmt
            .query_map(params![user_id], page_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pages)
    }

    // ===== Statistics =====

    fn count_pages_by_status(&self, job_id: i64, status: PageStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM crawled_pages WHERE job_id = ?1 AND status = ?2",
            params![job_id, status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
