//! Chunked indexing against the SQLite vector store

use delve::index::{
    chunk_text, document_metadata, value_size, DedupLedger, DocumentCategory, Filter,
    SqliteVectorStore, StoreLimits, VectorIndexer, VectorStore, TRUNCATION_MARKER,
};
use delve::storage::OwnerIds;
use std::path::Path;
use std::sync::Arc;

const BUDGET: usize = 150;

fn limits() -> StoreLimits {
    StoreLimits {
        document_bytes: 200,
        metadata_value_bytes: 64,
        metadata_total_bytes: 1024,
        listing_cap: 100,
    }
}

fn indexer_over(store: Arc<SqliteVectorStore>, ledger: Arc<DedupLedger>) -> VectorIndexer {
    VectorIndexer::new(store, ledger, BUDGET)
}

fn owner() -> OwnerIds {
    OwnerIds::new("user-7", "profile-7")
}

fn long_document() -> String {
    (0..80)
        .map(|i| format!("wörd{} naïve", i))
        .collect::<Vec<_>>()
        .join(" ")
}

#[tokio::test]
async fn test_long_document_round_trips_through_parts() {
    let store = Arc::new(SqliteVectorStore::open_in_memory(limits()).unwrap());
    let indexer = indexer_over(store.clone(), Arc::new(DedupLedger::new()));
    let text = long_document();
    let key = DocumentCategory::ChatMessage.logical_key(42);
    let metadata = document_metadata(DocumentCategory::ChatMessage, 42, &owner(), "2024-01-01T00:00:00Z");

    let outcome = indexer.index(&key, &text, &metadata).await;

    let expected_parts = chunk_text(&text, BUDGET).len();
    assert!(expected_parts > 1);
    assert_eq!(outcome.parts.len(), expected_parts);
    assert!(outcome.is_complete());
    assert!(!outcome.skipped);

    let records = store
        .list(&Filter::new().field("logical_key", key.as_str()), 100)
        .await
        .unwrap();
    assert_eq!(records.len(), expected_parts);
    for record in &records {
        assert!(record.text.len() <= BUDGET);
        assert_eq!(record.metadata["total_parts"], expected_parts);
        assert_eq!(record.metadata["is_multi_part"], true);
        assert_eq!(record.metadata["category"], "chat_message");
        assert_eq!(record.metadata["source_id"], "42");
    }

    let restored = indexer.fetch_document(&key).await.unwrap().unwrap();
    assert_eq!(restored, text);
}

#[tokio::test]
async fn test_second_index_is_skipped() {
    let store = Arc::new(SqliteVectorStore::open_in_memory(limits()).unwrap());
    let indexer = indexer_over(store.clone(), Arc::new(DedupLedger::new()));
    let key = DocumentCategory::Ontology.logical_key("topics");
    let metadata = document_metadata(DocumentCategory::Ontology, "topics", &owner(), "now");

    let first = indexer.index(&key, "rust, crawling, indexing", &metadata).await;
    let second = indexer.index(&key, "rust, crawling, indexing", &metadata).await;

    assert_eq!(first.written(), 1);
    assert!(second.skipped);
    assert!(second.parts.is_empty());

    let all = store.list(&Filter::new(), 100).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].metadata["is_multi_part"], false);
}

#[tokio::test]
async fn test_empty_document_writes_nothing() {
    let store = Arc::new(SqliteVectorStore::open_in_memory(limits()).unwrap());
    let indexer = indexer_over(store.clone(), Arc::new(DedupLedger::new()));
    let key = DocumentCategory::PageContent.logical_key(1);
    let metadata = document_metadata(DocumentCategory::PageContent, 1, &owner(), "now");

    let outcome = indexer.index(&key, "", &metadata).await;

    assert!(outcome.parts.is_empty());
    assert!(!indexer.ledger().contains(&key));
    assert!(store.list(&Filter::new(), 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_oversized_metadata_is_truncated() {
    let store = Arc::new(SqliteVectorStore::open_in_memory(limits()).unwrap());
    let indexer = indexer_over(store.clone(), Arc::new(DedupLedger::new()));
    let key = DocumentCategory::PageContent.logical_key(9);
    let mut metadata = document_metadata(DocumentCategory::PageContent, 9, &owner(), "now");
    metadata.insert("title".into(), "a very long title ".repeat(20).into());

    let outcome = indexer.index(&key, "page body", &metadata).await;
    assert!(outcome.is_complete());

    let records = store.list(&Filter::new(), 10).await.unwrap();
    let title = &records[0].metadata["title"];
    assert!(title.as_str().unwrap().ends_with(TRUNCATION_MARKER));
    assert!(value_size(title) <= limits().metadata_value_bytes);
}

async fn index_into(path: &Path, key: &str) -> usize {
    let store = Arc::new(SqliteVectorStore::new(path, limits()).unwrap());
    let ledger = Arc::new(DedupLedger::new());
    ledger.load(store.as_ref(), &DocumentCategory::ALL).await.unwrap();

    let indexer = indexer_over(store.clone(), ledger);
    let metadata = document_metadata(DocumentCategory::Analysis, 5, &owner(), "now");
    indexer.index(key, &long_document(), &metadata).await;

    store.list(&Filter::new(), 100).await.unwrap().len()
}

#[tokio::test]
async fn test_ledger_reload_prevents_reindexing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vectors.db");
    let key = DocumentCategory::Analysis.logical_key(5);

    let after_first = index_into(&path, &key).await;
    let after_second = index_into(&path, &key).await;

    assert!(after_first > 1);
    assert_eq!(after_first, after_second);
}

#[tokio::test]
async fn test_query_finds_matching_part() {
    let store = Arc::new(SqliteVectorStore::open_in_memory(limits()).unwrap());
    let indexer = indexer_over(store.clone(), Arc::new(DedupLedger::new()));
    let mut text = long_document();
    text.push_str(" lighthouse keepers log");
    let key = DocumentCategory::PageContent.logical_key(3);
    let metadata = document_metadata(DocumentCategory::PageContent, 3, &owner(), "now");
    indexer.index(&key, &text, &metadata).await;

    let hits = store
        .query("lighthouse keepers", &Filter::new().field("user_id", "user-7"), 3)
        .await
        .unwrap();

    assert!(!hits.is_empty());
    assert!(hits.iter().all(|h| h.score > 0.0));
    assert!(hits[0].record.text.contains("lighthouse") || hits[0].record.text.contains("keepers"));
    assert_eq!(hits[0].record.metadata["logical_key"], key.as_str());
}
