//! Legal knowledge collections and the question-answering pipeline.
//!
//! Statutes, case law and regulations are kept as separate collections in a
//! local SQLite store with embeddings. The [`rag`] module routes questions
//! to those collections and composes cited answers.

pub mod embeddings;
pub mod ingest;
pub mod memory;
pub mod rag;
pub mod source;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use embeddings::{create_provider, EmbeddingProvider};
pub use ingest::{learn, LearnOptions};
pub use memory::MemoryStore;
pub use rag::{Pipeline, PipelinePrompts, PipelineState};
pub use source::KnowledgeSource;
pub use store::SqliteStore;
pub use types::{
    Category, Chunk, CollectionStats, LearnStats, QueryStatus, RetrievalResult, StoreStats,
};

use juris_core::AppResult;
use std::path::Path;

/// Drop one collection, or the whole store when `category` is `None`.
///
/// A store that was never built is left alone.
pub fn reset(store_path: &Path, category: Option<Category>) -> AppResult<()> {
    match category {
        Some(category) => tracing::info!("Resetting collection {}", category.collection_name()),
        None => tracing::info!("Resetting knowledge store at {:?}", store_path),
    }

    if !store_path.exists() {
        tracing::debug!("No store at {:?}, nothing to reset", store_path);
        return Ok(());
    }

    let conn = store::init_store(store_path)?;
    store::reset_store(&conn, category)
}

/// Get statistics for the knowledge store.
pub fn stats(store_path: &Path) -> AppResult<StoreStats> {
    tracing::info!("Getting stats for knowledge store {:?}", store_path);
    store::store_stats(store_path)
}
