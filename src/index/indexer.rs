//! Chunked, deduplicated writes of logical documents

use crate::index::chunker::{chunk_text, reconstruct};
use crate::index::ledger::DedupLedger;
use crate::index::metadata::sanitize_metadata;
use crate::index::store::{Filter, Metadata, VectorRecord, VectorStore, VectorStoreError};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Result of writing one part of a logical document
#[derive(Debug, Clone, PartialEq)]
pub struct PartResult {
    pub part_id: String,
    pub part_index: usize,
    pub error: Option<String>,
}

impl PartResult {
    pub fn is_written(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of indexing one logical document
#[derive(Debug, Clone, PartialEq)]
pub struct IndexOutcome {
    pub logical_key: String,
    /// The ledger already held the key; nothing was written
    pub skipped: bool,
    pub parts: Vec<PartResult>,
}

impl IndexOutcome {
    /// Number of parts written
    pub fn written(&self) -> usize {
        self.parts.iter().filter(|p| p.is_written()).count()
    }

    pub fn failed(&self) -> usize {
        self.parts.len() - self.written()
    }

    /// True when every part was written (or the document was skipped)
    pub fn is_complete(&self) -> bool {
        self.failed() == 0
    }
}

/// Splits documents into store-sized parts and writes them
pub struct VectorIndexer {
    store: Arc<dyn VectorStore>,
    ledger: Arc<DedupLedger>,
    chunk_budget: usize,
}

impl VectorIndexer {
    pub fn new(store: Arc<dyn VectorStore>, ledger: Arc<DedupLedger>, chunk_budget: usize) -> Self {
        Self {
            store,
            ledger,
            chunk_budget,
        }
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn ledger(&self) -> &Arc<DedupLedger> {
        &self.ledger
    }

    /// Indexes a logical document unless the ledger already holds its key
    ///
    /// Every part is attempted even if earlier ones fail. The key is marked
    /// in the ledger once at least one part was written; a document with no
    /// successful writes stays eligible for a later retry.
    pub async fn index(&self, logical_key: &str, text: &str, metadata: &Metadata) -> IndexOutcome {
        if self.ledger.contains(logical_key) {
            tracing::debug!("Skipping already indexed document {}", logical_key);
            return IndexOutcome {
                logical_key: logical_key.to_string(),
                skipped: true,
                parts: Vec::new(),
            };
        }

        let chunks = chunk_text(text, self.chunk_budget);
        let total_parts = chunks.len();
        let limits = self.store.limits();
        let mut parts = Vec::with_capacity(total_parts);

        for (part_index, chunk) in chunks.iter().enumerate() {
            let part_id = Uuid::new_v4().to_string();

            let mut part_metadata = metadata.clone();
            part_metadata.insert("logical_key".into(), Value::from(logical_key));
            part_metadata.insert("part_index".into(), Value::from(part_index));
            part_metadata.insert("total_parts".into(), Value::from(total_parts));
            part_metadata.insert("is_multi_part".into(), Value::from(total_parts > 1));

            let written = match sanitize_metadata(&mut part_metadata, &limits) {
                Ok(()) => self.store.upsert(&part_id, chunk, &part_metadata).await,
                Err(e) => Err(e),
            };

            let error = match written {
                Ok(()) => None,
                Err(e) => {
                    tracing::warn!(
                        "Failed to write part {}/{} of {}: {}",
                        part_index + 1,
                        total_parts,
                        logical_key,
                        e
                    );
                    Some(e.to_string())
                }
            };

            parts.push(PartResult {
                part_id,
                part_index,
                error,
            });
        }

        let outcome = IndexOutcome {
            logical_key: logical_key.to_string(),
            skipped: false,
            parts,
        };

        if outcome.written() > 0 {
            self.ledger.mark(logical_key);
        }

        tracing::debug!(
            "Indexed {}: {}/{} parts written",
            logical_key,
            outcome.written(),
            total_parts
        );

        outcome
    }

    /// Reads back a logical document's text by joining its parts in order
    pub async fn fetch_document(&self, logical_key: &str) -> Result<Option<String>, VectorStoreError> {
        let filter = Filter::new().field("logical_key", logical_key);
        let records = self.store.list(&filter, usize::MAX).await?;
        Ok(reassemble(records))
    }
}

/// Orders parts by `part_index` and joins them
pub fn reassemble(mut records: Vec<VectorRecord>) -> Option<String> {
    if records.is_empty() {
        return None;
    }
    records.sort_by_key(|r| {
        r.metadata
            .get("part_index")
            .and_then(Value::as_u64)
            .unwrap_or(0)
    });
    let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
    Some(reconstruct(&texts))
}
