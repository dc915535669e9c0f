//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Delve database.

/// SQL schema for crawl jobs and crawled pages
pub const SCHEMA_SQL: &str = r#"
-- One row per crawl run of a root URL
CREATE TABLE IF NOT EXISTS crawl_jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    profile_id TEXT NOT NULL,
    root_url TEXT NOT NULL,
    status TEXT NOT NULL,
    max_pages INTEGER NOT NULL,
    pages_discovered INTEGER NOT NULL DEFAULT 0,
    pages_processed INTEGER NOT NULL DEFAULT 0,
    pages_analyzed INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT,
    error_message TEXT
);

CREATE INDEX IF NOT EXISTS idx_crawl_jobs_user ON crawl_jobs(user_id);

-- One row per unique URL visited within a job
CREATE TABLE IF NOT EXISTS crawled_pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id INTEGER NOT NULL REFERENCES crawl_jobs(id),
    user_id TEXT NOT NULL,
    profile_id TEXT NOT NULL,
    url TEXT NOT NULL,
    title TEXT,
    description TEXT,
    content TEXT,
    analysis TEXT,
    status TEXT NOT NULL,
    priority INTEGER NOT NULL,
    depth INTEGER NOT NULL,
    discovered_at TEXT NOT NULL,
    processed_at TEXT,
    error_message TEXT,
    UNIQUE(job_id, url)
);

CREATE INDEX IF NOT EXISTS idx_crawled_pages_job ON crawled_pages(job_id);
CREATE INDEX IF NOT EXISTS idx_crawled_pages_user ON crawled_pages(user_id);
CREATE INDEX IF NOT EXISTS idx_crawled_pages_status ON crawled_pages(job_id, status);

-- Local stand-in for the external vector store
CREATE TABLE IF NOT EXISTS vector_documents (
    id TEXT PRIMARY KEY,
    category TEXT,
    content TEXT NOT NULL,
    metadata TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_vector_documents_category ON vector_documents(category);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
