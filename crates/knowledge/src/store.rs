//! SQLite-backed knowledge store.
//!
//! One database file holds every category. The `collections` table records
//! which categories have been built and with which embedding provider; a
//! category without a row there is unavailable.

use crate::embeddings::{cosine_similarity, EmbeddingProvider};
use crate::source::KnowledgeSource;
use crate::types::{Category, Chunk, CollectionStats, StoreStats};
use chrono::{DateTime, Utc};
use juris_core::{AppError, AppResult};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A chunk as written to the store.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub id: String,
    pub category: Category,
    pub source_name: String,
    pub page: Option<u32>,
    pub position: u32,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Open (creating if needed) the store for writing.
pub fn init_store(db_path: &Path) -> AppResult<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| AppError::Knowledge(format!("Failed to create store directory: {}", e)))?;
    }

    let conn = Connection::open(db_path)
        .map_err(|e| AppError::Knowledge(format!("Failed to open SQLite store: {}", e)))?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS collections (
            category TEXT PRIMARY KEY,
            embedding_provider TEXT NOT NULL,
            dims INTEGER NOT NULL,
            chunk_count INTEGER NOT NULL DEFAULT 0,
            built_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            category TEXT NOT NULL,
            source_name TEXT NOT NULL,
            page INTEGER,
            position INTEGER NOT NULL,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chunks_category ON chunks(category);
        "#,
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to create tables: {}", e)))?;

    tracing::debug!("Initialized SQLite store at {:?}", db_path);
    Ok(conn)
}

fn open_read_only(db_path: &Path) -> AppResult<Connection> {
    Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to open SQLite store: {}", e)))
}

fn has_table(conn: &Connection, table: &str) -> AppResult<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )
        .map_err(|e| AppError::Knowledge(format!("Failed to inspect store: {}", e)))?;
    Ok(count > 0)
}

/// Embedding provider and dimension a collection was built with.
fn collection_info(conn: &Connection, category: Category) -> AppResult<Option<(String, usize)>> {
    if !has_table(conn, "collections")? {
        return Ok(None);
    }

    conn.query_row(
        "SELECT embedding_provider, dims FROM collections WHERE category = ?1",
        params![category.as_str()],
        |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize)),
    )
    .optional()
    .map_err(|e| AppError::Knowledge(format!("Failed to read collection: {}", e)))
}

/// Mark a category as built. Fails if it was built with another provider.
pub fn register_collection(
    conn: &Connection,
    category: Category,
    provider: &str,
    dims: usize,
) -> AppResult<()> {
    if let Some((existing, existing_dims)) = collection_info(conn, category)? {
        if existing != provider || existing_dims != dims {
            return Err(AppError::Knowledge(format!(
                "Collection '{}' was built with {} ({} dims); reset it before learning with {} ({} dims)",
                category.collection_name(),
                existing,
                existing_dims,
                provider,
                dims
            )));
        }
    }

    conn.execute(
        "INSERT INTO collections (category, embedding_provider, dims, chunk_count, built_at)
         VALUES (?1, ?2, ?3, 0, ?4)
         ON CONFLICT(category) DO UPDATE SET built_at = excluded.built_at",
        params![category.as_str(), provider, dims as i64, Utc::now().to_rfc3339()],
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to register collection: {}", e)))?;

    Ok(())
}

/// Insert a chunk, replacing any chunk with the same id.
pub fn insert_chunk(conn: &Connection, chunk: &StoredChunk) -> AppResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO chunks (id, category, source_name, page, position, text, embedding)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            chunk.id,
            chunk.category.as_str(),
            chunk.source_name,
            chunk.page.map(i64::from),
            i64::from(chunk.position),
            chunk.text,
            embedding_to_bytes(&chunk.embedding),
        ],
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to insert chunk: {}", e)))?;

    Ok(())
}

/// Delete every chunk previously learned from `source_name` in a collection.
pub fn delete_source(
    conn: &Connection,
    category: Category,
    source_name: &str,
) -> AppResult<usize> {
    conn.execute(
        "DELETE FROM chunks WHERE category = ?1 AND source_name = ?2",
        params![category.as_str(), source_name],
    )
    .map_err(|e| {
        AppError::Knowledge(format!("Failed to delete chunks of {}: {}", source_name, e))
    })
}

/// Recompute the cached chunk count for a collection.
pub fn refresh_counts(conn: &Connection, category: Category) -> AppResult<u32> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM chunks WHERE category = ?1",
            params![category.as_str()],
            |row| row.get(0),
        )
        .map_err(|e| AppError::Knowledge(format!("Failed to count chunks: {}", e)))?;

    conn.execute(
        "UPDATE collections SET chunk_count = ?1 WHERE category = ?2",
        params![count, category.as_str()],
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to update collection: {}", e)))?;

    Ok(count as u32)
}

/// Drop one collection, or every collection when `category` is `None`.
pub fn reset_store(conn: &Connection, category: Option<Category>) -> AppResult<()> {
    match category {
        Some(category) => {
            conn.execute(
                "DELETE FROM chunks WHERE category = ?1",
                params![category.as_str()],
            )
            .map_err(|e| AppError::Knowledge(format!("Failed to delete chunks: {}", e)))?;
            conn.execute(
                "DELETE FROM collections WHERE category = ?1",
                params![category.as_str()],
            )
            .map_err(|e| AppError::Knowledge(format!("Failed to delete collection: {}", e)))?;
            tracing::info!("Reset collection {}", category.collection_name());
        }
        None => {
            conn.execute_batch("DELETE FROM chunks; DELETE FROM collections;")
                .map_err(|e| AppError::Knowledge(format!("Failed to reset store: {}", e)))?;
            tracing::info!("Reset knowledge store");
        }
    }
    Ok(())
}

/// Statistics for every built collection.
pub fn store_stats(db_path: &Path) -> AppResult<StoreStats> {
    if !db_path.exists() {
        return Ok(StoreStats {
            collections: Vec::new(),
            db_size_bytes: 0,
        });
    }

    let conn = open_read_only(db_path)?;
    let mut collections = Vec::new();

    if has_table(&conn, "collections")? {
        let mut stmt = conn
            .prepare(
                "SELECT c.category, c.embedding_provider, c.chunk_count, c.built_at,
                        (SELECT COUNT(DISTINCT source_name) FROM chunks WHERE category = c.category)
                 FROM collections c ORDER BY c.category",
            )
            .map_err(|e| AppError::Knowledge(format!("Failed to prepare stats query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })
            .map_err(|e| AppError::Knowledge(format!("Failed to read stats: {}", e)))?;

        for row in rows {
            let (category, provider, chunks, built_at, sources) =
                row.map_err(|e| AppError::Knowledge(format!("Failed to read stats: {}", e)))?;

            let category: Category = category.parse().map_err(AppError::Knowledge)?;
            let built_at = DateTime::parse_from_rfc3339(&built_at)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| AppError::Knowledge(format!("Invalid built_at timestamp: {}", e)))?;

            collections.push(CollectionStats {
                category,
                collection: category.collection_name().to_string(),
                chunks_count: chunks as u32,
                sources_count: sources as u32,
                embedding_provider: provider,
                built_at,
            });
        }
    }

    collections.sort_by_key(|c| c.category);
    let db_size_bytes = std::fs::metadata(db_path).map(|m| m.len()).unwrap_or(0);

    Ok(StoreStats {
        collections,
        db_size_bytes,
    })
}

/// Rank one collection against a query embedding.
pub(crate) fn query_collection(
    conn: &Connection,
    category: Category,
    query_embedding: &[f32],
    top_k: usize,
) -> AppResult<Vec<(Chunk, f32)>> {
    let mut stmt = conn
        .prepare(
            "SELECT source_name, page, text, embedding FROM chunks
             WHERE category = ?1 ORDER BY rowid",
        )
        .map_err(|e| AppError::Knowledge(format!("Failed to prepare query: {}", e)))?;

    let rows = stmt
        .query_map(params![category.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<i64>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Vec<u8>>(3)?,
            ))
        })
        .map_err(|e| AppError::Knowledge(format!("Failed to query chunks: {}", e)))?;

    let mut results = Vec::new();
    for row in rows {
        let (source_name, page, text, blob) =
            row.map_err(|e| AppError::Knowledge(format!("Failed to read chunk: {}", e)))?;
        let embedding = bytes_to_embedding(&blob)?;
        let score = cosine_similarity(query_embedding, &embedding);

        // Chunks sharing nothing with the query are not matches
        if score <= 0.0 {
            continue;
        }

        let chunk = Chunk::new(category, source_name, page.map(|p| p as u32), text);
        results.push((chunk, score));
    }

    results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(top_k);

    tracing::debug!(
        "Retrieved {} chunks from {} (requested top-{})",
        results.len(),
        category.collection_name(),
        top_k
    );

    Ok(results)
}

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Knowledge(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Knowledge source reading the SQLite store.
///
/// Each query opens its own read-only connection on the blocking pool, so
/// one store can serve concurrent category queries.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SqliteStore {
    pub fn new(path: impl Into<PathBuf>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            path: path.into(),
            embedder,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn blocking<T, F>(&self, f: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> AppResult<T> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = open_read_only(&path)?;
            f(&conn)
        })
        .await
        .map_err(|e| AppError::Knowledge(format!("Store task failed: {}", e)))?
    }
}

#[async_trait::async_trait]
impl KnowledgeSource for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn query(&self, category: Category, query: &str, k: usize) -> AppResult<Vec<Chunk>> {
        if k == 0 {
            return Err(AppError::Knowledge("k must be at least 1".to_string()));
        }

        if !self.path.exists() {
            return Err(AppError::SourceUnavailable(
                category.collection_name().to_string(),
            ));
        }

        let info = self.blocking(move |conn| collection_info(conn, category)).await?;
        let (provider, dims) = info.ok_or_else(|| {
            AppError::SourceUnavailable(category.collection_name().to_string())
        })?;

        if provider != self.embedder.provider_name() || dims != self.embedder.dimensions() {
            return Err(AppError::Knowledge(format!(
                "Collection '{}' was built with {} ({} dims) but {} ({} dims) is configured",
                category.collection_name(),
                provider,
                dims,
                self.embedder.provider_name(),
                self.embedder.dimensions()
            )));
        }

        let embedding = self.embedder.embed(query).await?;
        let results = self
            .blocking(move |conn| query_collection(conn, category, &embedding, k))
            .await?;

        Ok(results.into_iter().map(|(chunk, _)| chunk).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::TrigramProvider;
    use tempfile::TempDir;

    fn stored(category: Category, id: &str, page: Option<u32>, embedding: Vec<f32>) -> StoredChunk {
        StoredChunk {
            id: id.to_string(),
            category,
            source_name: "IPC.pdf".to_string(),
            page,
            position: 0,
            text: format!("text {}", id),
            embedding,
        }
    }

    #[test]
    fn test_init_store_creates_tables() {
        let temp = TempDir::new().unwrap();
        let conn = init_store(&temp.path().join("k/index.sqlite")).unwrap();
        assert!(has_table(&conn, "collections").unwrap());
        assert!(has_table(&conn, "chunks").unwrap());
    }

    #[test]
    fn test_query_collection_ranks_and_filters_category() {
        let temp = TempDir::new().unwrap();
        let conn = init_store(&temp.path().join("index.sqlite")).unwrap();

        insert_chunk(&conn, &stored(Category::Statute, "a", Some(0), vec![1.0, 0.0, 0.0])).unwrap();
        insert_chunk(&conn, &stored(Category::Statute, "b", None, vec![0.7, 0.7, 0.0])).unwrap();
        insert_chunk(&conn, &stored(Category::Statute, "c", Some(2), vec![0.0, 0.0, 1.0])).unwrap();
        insert_chunk(&conn, &stored(Category::Case, "d", Some(0), vec![1.0, 0.0, 0.0])).unwrap();

        let results = query_collection(&conn, Category::Statute, &[1.0, 0.0, 0.0], 5).unwrap();

        // Orthogonal chunk "c" and the case chunk are excluded
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0.text, "text a");
        assert_eq!(results[1].0.page, None);
        assert!(results[0].1 > results[1].1);
    }

    #[test]
    fn test_register_collection_rejects_other_provider() {
        let temp = TempDir::new().unwrap();
        let conn = init_store(&temp.path().join("index.sqlite")).unwrap();

        register_collection(&conn, Category::Statute, "trigram", 384).unwrap();
        register_collection(&conn, Category::Statute, "trigram", 384).unwrap();
        assert!(register_collection(&conn, Category::Statute, "ollama", 768).is_err());
    }

    #[test]
    fn test_reset_single_collection() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.sqlite");
        let conn = init_store(&path).unwrap();

        register_collection(&conn, Category::Statute, "trigram", 3).unwrap();
        register_collection(&conn, Category::Case, "trigram", 3).unwrap();
        insert_chunk(&conn, &stored(Category::Statute, "a", Some(0), vec![1.0, 0.0, 0.0])).unwrap();
        insert_chunk(&conn, &stored(Category::Case, "b", Some(0), vec![1.0, 0.0, 0.0])).unwrap();
        refresh_counts(&conn, Category::Statute).unwrap();
        refresh_counts(&conn, Category::Case).unwrap();

        reset_store(&conn, Some(Category::Statute)).unwrap();
        drop(conn);

        let stats = store_stats(&path).unwrap();
        assert_eq!(stats.collections.len(), 1);
        assert_eq!(stats.collections[0].category, Category::Case);
        assert_eq!(stats.collections[0].chunks_count, 1);
        assert_eq!(stats.collections[0].sources_count, 1);
    }

    #[test]
    fn test_delete_source_keeps_other_sources_and_collections() {
        let temp = TempDir::new().unwrap();
        let conn = init_store(&temp.path().join("index.sqlite")).unwrap();

        let mut crpc = stored(Category::Statute, "b", Some(0), vec![0.0, 1.0, 0.0]);
        crpc.source_name = "CrPC.pdf".to_string();
        insert_chunk(&conn, &stored(Category::Statute, "a", Some(0), vec![1.0, 0.0, 0.0])).unwrap();
        insert_chunk(&conn, &crpc).unwrap();
        insert_chunk(&conn, &stored(Category::Case, "c", Some(0), vec![1.0, 0.0, 0.0])).unwrap();

        assert_eq!(delete_source(&conn, Category::Statute, "IPC.pdf").unwrap(), 1);
        assert_eq!(delete_source(&conn, Category::Statute, "IPC.pdf").unwrap(), 0);

        let statutes = query_collection(&conn, Category::Statute, &[1.0, 1.0, 0.0], 5).unwrap();
        assert_eq!(statutes.len(), 1);
        assert_eq!(statutes[0].0.source_name, "CrPC.pdf");
        assert_eq!(query_collection(&conn, Category::Case, &[1.0, 0.0, 0.0], 5).unwrap().len(), 1);
    }

    #[test]
    fn test_stats_for_missing_store() {
        let temp = TempDir::new().unwrap();
        let stats = store_stats(&temp.path().join("absent.sqlite")).unwrap();
        assert!(stats.collections.is_empty());
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(
            temp.path().join("absent.sqlite"),
            Arc::new(TrigramProvider::new(8)),
        );

        let err = store.query(Category::Statute, "murder", 5).await.unwrap_err();
        assert!(matches!(err, AppError::SourceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_unbuilt_collection_is_unavailable() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.sqlite");
        let conn = init_store(&path).unwrap();
        register_collection(&conn, Category::Statute, "trigram", 8).unwrap();
        drop(conn);

        let store = SqliteStore::new(path, Arc::new(TrigramProvider::new(8)));
        let err = store.query(Category::Regulation, "arrest", 5).await.unwrap_err();
        assert!(matches!(err, AppError::SourceUnavailable(ref c) if c == "regulations_collection"));

        let chunks = store.query(Category::Statute, "arrest", 5).await.unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn test_provider_mismatch_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.sqlite");
        let conn = init_store(&path).unwrap();
        register_collection(&conn, Category::Statute, "ollama", 768).unwrap();
        drop(conn);

        let store = SqliteStore::new(path, Arc::new(TrigramProvider::new(384)));
        let err = store.query(Category::Statute, "murder", 5).await.unwrap_err();
        assert!(matches!(err, AppError::Knowledge(_)));
    }
}
