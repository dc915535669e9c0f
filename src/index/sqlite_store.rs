//! SQLite-backed vector store
//!
//! Stands in for the external similarity-search service when running
//! locally. It enforces the same hard limits and listing cap, and ranks
//! query results by term overlap instead of embeddings.

use crate::index::store::{
    check_limits, Filter, Metadata, QueryMatch, StoreLimits, VectorRecord, VectorStore,
    VectorStoreError,
};
use crate::storage::initialize_schema;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
    limits: StoreLimits,
}

impl SqliteVectorStore {
    /// Opens (or creates) the store in a database file
    pub fn new(path: &Path, limits: StoreLimits) -> Result<Self, VectorStoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            limits,
        })
    }

    /// Creates an in-memory store
    pub fn open_in_memory(limits: StoreLimits) -> Result<Self, VectorStoreError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            limits,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, VectorStoreError> {
        self.conn.lock().map_err(|_| VectorStoreError::LockPoisoned)
    }

    /// Loads every record matching the filter, narrowed by category in SQL
    fn load_matching(&self, filter: &Filter) -> Result<Vec<VectorRecord>, VectorStoreError> {
        let conn = self.conn()?;
        let category = filter.value_of("category").and_then(|v| v.as_str());

        let mut stmt = conn.prepare(
            "SELECT id, content, metadata FROM vector_documents
             WHERE (?1 IS NULL OR category = ?1)
             ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map(params![category], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, text, raw_metadata) = row?;
            let metadata: Metadata = serde_json::from_str(&raw_metadata)?;
            if filter.matches(&metadata) {
                records.push(VectorRecord { id, text, metadata });
            }
        }
        Ok(records)
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
        .map(str::to_lowercase)
        .collect()
}

/// Fraction of query terms present in the record text
fn overlap_score(query: &HashSet<String>, text: &str) -> f32 {
    if query.is_empty() {
        return 0.0;
    }
    let doc = terms(text);
    let hits = query.iter().filter(|t| doc.contains(*t)).count();
    hits as f32 / query.len() as f32
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(
        &self,
        id: &str,
        text: &str,
        metadata: &Metadata,
    ) -> Result<(), VectorStoreError> {
        check_limits(&self.limits, id, text, metadata)?;

        let category = metadata.get("category").and_then(|v| v.as_str());
        let raw_metadata = serde_json::to_string(metadata)?;

        self.conn()?.execute(
            "INSERT OR REPLACE INTO vector_documents (id, category, content, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, category, text, raw_metadata, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    async fn query(
        &self,
        query_text: &str,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<QueryMatch>, VectorStoreError> {
        let query_terms = terms(query_text);
        let mut matches: Vec<QueryMatch> = self
            .load_matching(filter)?
            .into_iter()
            .map(|record| {
                let score = overlap_score(&query_terms, &record.text);
                QueryMatch { record, score }
            })
            .filter(|m| m.score > 0.0)
            .collect();

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(limit);
        Ok(matches)
    }

    async fn list(
        &self,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<VectorRecord>, VectorStoreError> {
        let mut records = self.load_matching(filter)?;
        records.truncate(limit.min(self.limits.listing_cap));
        Ok(records)
    }

    fn limits(&self) -> StoreLimits {
        self.limits
    }
}
