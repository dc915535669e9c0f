//! Indexing of crawled content into a size-limited vector store
//!
//! A logical document (a page's text, an analysis, a chat message) is split
//! by [`chunk_text`] into parts that fit the store's per-document limit, each
//! part gets shared metadata plus its position, and [`VectorIndexer`] writes
//! them one by one. [`DedupLedger`] keeps re-ingestion from writing the same
//! logical document twice within a session.

mod chunker;
mod indexer;
mod ledger;
mod metadata;
mod sqlite_store;
mod store;

pub use chunker::{chunk_text, reconstruct};
pub use indexer::{reassemble, IndexOutcome, PartResult, VectorIndexer};
pub use ledger::DedupLedger;
pub use metadata::{document_metadata, sanitize_metadata, DocumentCategory, TRUNCATION_MARKER};
pub use sqlite_store::SqliteVectorStore;
pub use store::{
    check_limits, metadata_size, value_size, Filter, Metadata, QueryMatch, StoreLimits,
    VectorRecord, VectorStore, VectorStoreError,
};
