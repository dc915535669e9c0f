//! In-memory record of logical documents already written

use crate::index::metadata::DocumentCategory;
use crate::index::store::{Filter, VectorRecord, VectorStore, VectorStoreError};
use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Set of logical keys already present in the vector store
///
/// Populated at startup from the store's listing, which is capped: on a
/// store holding more records than the cap, some already-indexed documents
/// go unseen and may be written again.
#[derive(Debug, Default)]
pub struct DedupLedger {
    keys: RwLock<HashSet<String>>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashSet<String>> {
        self.keys.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashSet<String>> {
        self.keys.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Loads keys of existing records for each category, returning how many
    /// distinct keys were added
    pub async fn load(
        &self,
        store: &dyn VectorStore,
        categories: &[DocumentCategory],
    ) -> Result<usize, VectorStoreError> {
        let cap = store.limits().listing_cap;
        let mut added = 0;

        for category in categories {
            let filter = Filter::new().field("category", category.as_str());
            let records = store.list(&filter, cap).await?;
            if records.len() >= cap {
                tracing::warn!(
                    "Listing for category '{}' hit the cap of {}; some documents may be re-indexed",
                    category,
                    cap
                );
            }

            let mut keys = self.write();
            for record in &records {
                if let Some(key) = record_key(record, *category) {
                    if keys.insert(key) {
                        added += 1;
                    }
                }
            }
        }

        tracing::debug!("Dedup ledger loaded {} keys", added);
        Ok(added)
    }

    pub fn contains(&self, logical_key: &str) -> bool {
        self.read().contains(logical_key)
    }

    /// Records a key, returning false if it was already present
    pub fn mark(&self, logical_key: &str) -> bool {
        self.write().insert(logical_key.to_string())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

/// Derives a record's logical key from its metadata
fn record_key(record: &VectorRecord, category: DocumentCategory) -> Option<String> {
    if let Some(key) = record.metadata.get("logical_key").and_then(|v| v.as_str()) {
        return Some(key.to_string());
    }
    let source_id = record.metadata.get("source_id")?;
    let source_id = match source_id.as_str() {
        Some(s) => s.to_string(),
        None => source_id.to_string(),
    };
    Some(category.logical_key(source_id))
}
