//! Vector store interface
//!
//! The vector store is an external similarity-search service. Delve only
//! relies on three calls (`upsert`, `query`, `list`) and on the store's hard
//! limits, which shape the chunker budget and the dedup ledger.

use crate::config::IndexConfig;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Metadata attached to a stored record
pub type Metadata = serde_json::Map<String, Value>;

/// Errors returned by vector store implementations
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("Document {id} is {size} bytes, limit is {limit}")]
    DocumentTooLarge { id: String, size: usize, limit: usize },

    #[error("Metadata field '{key}' is {size} bytes, limit is {limit}")]
    MetadataValueTooLarge {
        key: String,
        size: usize,
        limit: usize,
    },

    #[error("Metadata is {size} bytes, limit is {limit}")]
    MetadataTooLarge { size: usize, limit: usize },

    #[error("Vector store backend error: {0}")]
    Backend(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Vector store lock poisoned")]
    LockPoisoned,
}

/// Hard limits of a vector store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    pub document_bytes: usize,
    pub metadata_value_bytes: usize,
    pub metadata_total_bytes: usize,
    pub listing_cap: usize,
}

impl From<&IndexConfig> for StoreLimits {
    fn from(config: &IndexConfig) -> Self {
        Self {
            document_bytes: config.document_limit_bytes,
            metadata_value_bytes: config.metadata_value_limit_bytes,
            metadata_total_bytes: config.metadata_total_limit_bytes,
            listing_cap: config.listing_cap,
        }
    }
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self::from(&IndexConfig::default())
    }
}

/// Equality filter over metadata fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    equals: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `key == value` condition
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.push((key.into(), value.into()));
        self
    }

    /// Value required for `key`, if the filter constrains it
    pub fn value_of(&self, key: &str) -> Option<&Value> {
        self.equals.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Checks whether a metadata object satisfies every condition
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.equals
            .iter()
            .all(|(key, value)| metadata.get(key) == Some(value))
    }
}

/// A stored record
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
}

/// A ranked query result
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMatch {
    pub record: VectorRecord,
    pub score: f32,
}

/// A similarity-search store with hard size limits
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Inserts or replaces a record
    async fn upsert(&self, id: &str, text: &str, metadata: &Metadata)
        -> Result<(), VectorStoreError>;

    /// Returns up to `limit` records ranked by similarity to `query_text`
    async fn query(
        &self,
        query_text: &str,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<QueryMatch>, VectorStoreError>;

    /// Returns matching records; never more than the store's listing cap
    async fn list(&self, filter: &Filter, limit: usize)
        -> Result<Vec<VectorRecord>, VectorStoreError>;

    /// The store's hard limits
    fn limits(&self) -> StoreLimits;
}

/// Byte size of a metadata value as the store measures it
pub fn value_size(value: &Value) -> usize {
    match value {
        Value::String(s) => s.len(),
        other => other.to_string().len(),
    }
}

/// Byte size of a whole metadata object as the store measures it
pub fn metadata_size(metadata: &Metadata) -> usize {
    metadata
        .iter()
        .map(|(key, value)| key.len() + value_size(value))
        .sum()
}

/// Checks a record against the store limits, as the external store would
pub fn check_limits(
    limits: &StoreLimits,
    id: &str,
    text: &str,
    metadata: &Metadata,
) -> Result<(), VectorStoreError> {
    if text.len() > limits.document_bytes {
        return Err(VectorStoreError::DocumentTooLarge {
            id: id.to_string(),
            size: text.len(),
            limit: limits.document_bytes,
        });
    }

    for (key, value) in metadata {
        let size = value_size(value);
        if size > limits.metadata_value_bytes {
            return Err(VectorStoreError::MetadataValueTooLarge {
                key: key.clone(),
                size,
                limit: limits.metadata_value_bytes,
            });
        }
    }

    let total = metadata_size(metadata);
    if total > limits.metadata_total_bytes {
        return Err(VectorStoreError::MetadataTooLarge {
            size: total,
            limit: limits.metadata_total_bytes,
        });
    }

    Ok(())
}
