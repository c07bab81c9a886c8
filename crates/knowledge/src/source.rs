//! Query interface over the categorized legal collections.

use crate::types::{Category, Chunk};
use juris_core::AppResult;

/// Read-only access to ranked chunks per category.
///
/// Implementations fail with `AppError::SourceUnavailable` when the
/// collection backing `category` has not been built, and must be safe to
/// query concurrently.
#[async_trait::async_trait]
pub trait KnowledgeSource: Send + Sync {
    /// Short name for logs (e.g. "sqlite", "memory").
    fn name(&self) -> &str;

    /// Return up to `k` chunks for `query`, best match first.
    async fn query(&self, category: Category, query: &str, k: usize) -> AppResult<Vec<Chunk>>;
}
