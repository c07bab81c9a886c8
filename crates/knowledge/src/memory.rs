//! In-process knowledge source with keyword scoring.
//!
//! Useful for tests and demos: collections are loaded directly, individual
//! categories can be left unbuilt, and every query is recorded.

use crate::source::KnowledgeSource;
use crate::types::{Category, Chunk};
use juris_core::{AppError, AppResult};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// A recorded call against the memory store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRecord {
    pub category: Category,
    pub query: String,
    pub k: usize,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: HashMap<Category, Vec<Chunk>>,
    queries: Mutex<Vec<QueryRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build (or extend) the collection for a category.
    pub fn with_collection(mut self, category: Category, chunks: Vec<Chunk>) -> Self {
        self.collections.entry(category).or_default().extend(
            chunks.into_iter().map(|mut c| {
                c.category = category;
                c
            }),
        );
        self
    }

    /// Queries received so far, oldest first.
    pub fn queries(&self) -> Vec<QueryRecord> {
        self.queries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[async_trait::async_trait]
impl KnowledgeSource for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn query(&self, category: Category, query: &str, k: usize) -> AppResult<Vec<Chunk>> {
        self.queries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(QueryRecord {
                category,
                query: query.to_string(),
                k,
            });

        if k == 0 {
            return Err(AppError::Knowledge("k must be at least 1".to_string()));
        }

        let collection = self.collections.get(&category).ok_or_else(|| {
            AppError::SourceUnavailable(category.collection_name().to_string())
        })?;

        let wanted = terms(query);
        let mut scored: Vec<(usize, usize)> = collection
            .iter()
            .enumerate()
            .map(|(i, chunk)| (i, terms(&chunk.text).intersection(&wanted).count()))
            .filter(|(_, score)| *score > 0)
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.1.cmp(&a.1));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(i, _)| collection[i].clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        MemoryStore::new().with_collection(
            Category::Statute,
            vec![
                Chunk::new(Category::Statute, "IPC.pdf", Some(0), "Section 299 culpable homicide"),
                Chunk::new(Category::Statute, "IPC.pdf", Some(1), "Section 302 punishment for murder"),
                Chunk::new(Category::Statute, "IPC.pdf", Some(2), "Section 378 theft"),
            ],
        )
    }

    #[tokio::test]
    async fn test_ranks_by_term_overlap() {
        let store = store();
        let chunks = store
            .query(Category::Statute, "punishment for murder section 302", 5)
            .await
            .unwrap();

        assert_eq!(chunks[0].page, Some(1));
        assert!(chunks.iter().all(|c| c.category == Category::Statute));
    }

    #[tokio::test]
    async fn test_respects_k() {
        let store = store();
        let chunks = store.query(Category::Statute, "section", 2).await.unwrap();
        assert_eq!(chunks.len(), 2);
    }

    #[tokio::test]
    async fn test_unbuilt_category_is_unavailable() {
        let store = store();
        let err = store.query(Category::Case, "murder", 5).await.unwrap_err();
        assert!(matches!(err, AppError::SourceUnavailable(ref c) if c == "cases_collection"));
        assert_eq!(store.query_count(), 1);
    }

    #[tokio::test]
    async fn test_zero_k_rejected() {
        let store = store();
        let err = store.query(Category::Statute, "murder", 0).await.unwrap_err();
        assert!(matches!(err, AppError::Knowledge(_)));
    }
}
