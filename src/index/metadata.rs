//! Metadata construction and size sanitation

use crate::index::store::{metadata_size, value_size, Metadata, StoreLimits, VectorStoreError};
use crate::storage::OwnerIds;
use serde_json::Value;
use std::fmt;

/// Appended to every value shortened to fit the store limits
pub const TRUNCATION_MARKER: &str = "…[truncated]";

/// Kind of logical document written to the vector store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentCategory {
    PageContent,
    Analysis,
    ChatMessage,
    Ontology,
}

impl DocumentCategory {
    pub const ALL: [DocumentCategory; 4] = [
        Self::PageContent,
        Self::Analysis,
        Self::ChatMessage,
        Self::Ontology,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PageContent => "page_content",
            Self::Analysis => "analysis",
            Self::ChatMessage => "chat_message",
            Self::Ontology => "ontology",
        }
    }

    /// Stable logical key of a document derived from its source record id
    pub fn logical_key(&self, source_id: impl fmt::Display) -> String {
        format!("{}:{}", self.as_str(), source_id)
    }
}

impl fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata shared by every part of a logical document
pub fn document_metadata(
    category: DocumentCategory,
    source_id: impl fmt::Display,
    owner: &OwnerIds,
    source_timestamp: &str,
) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("category".into(), Value::from(category.as_str()));
    metadata.insert("source_id".into(), Value::from(source_id.to_string()));
    metadata.insert("user_id".into(), Value::from(owner.user_id.as_str()));
    metadata.insert("profile_id".into(), Value::from(owner.profile_id.as_str()));
    metadata.insert("source_timestamp".into(), Value::from(source_timestamp));
    metadata
}

/// Cuts a string to at most `max_bytes` on a char boundary
fn truncate_bytes(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Shortens a string to `target` bytes including the truncation marker
fn truncate_with_marker(s: &str, target: usize) -> String {
    let keep = target.saturating_sub(TRUNCATION_MARKER.len());
    format!("{}{}", truncate_bytes(s, keep), TRUNCATION_MARKER)
}

/// Flattens a value into the string form used when it must be shortened
fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

/// Makes metadata fit the store limits instead of letting the write fail
///
/// Values over the per-field limit are cut to about 90% of the limit, marker
/// included. If the object is still over the total limit, the longest string
/// values are halved repeatedly. Fails only when nothing is left to shorten.
pub fn sanitize_metadata(
    metadata: &mut Metadata,
    limits: &StoreLimits,
) -> Result<(), VectorStoreError> {
    let field_target = limits.metadata_value_bytes * 9 / 10;

    for (key, value) in metadata.iter_mut() {
        if value_size(value) > limits.metadata_value_bytes {
            tracing::debug!("Truncating metadata field '{}'", key);
            *value = Value::String(truncate_with_marker(&as_text(value), field_target));
        }
    }

    let min_shrinkable = TRUNCATION_MARKER.len() * 2;
    while metadata_size(metadata) > limits.metadata_total_bytes {
        let longest = metadata
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.len())))
            .filter(|(_, len)| *len > min_shrinkable)
            .max_by_key(|(_, len)| *len);

        let Some((key, len)) = longest else {
            return Err(VectorStoreError::MetadataTooLarge {
                size: metadata_size(metadata),
                limit: limits.metadata_total_bytes,
            });
        };

        if let Some(value) = metadata.get_mut(&key) {
            let shortened = truncate_with_marker(&as_text(value), len / 2);
            *value = Value::String(shortened);
        }
    }

    Ok(())
}
