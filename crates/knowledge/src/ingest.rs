//! Ingestion of plain-text legal documents into the SQLite store.
//!
//! Files are read as UTF-8; a form feed (`\x0C`) starts a new page. Pages
//! are split with `text-splitter` using the category's chunk window.

use crate::embeddings::EmbeddingProvider;
use crate::store::{self, StoredChunk};
use crate::types::{Category, LearnStats};
use juris_core::{AppError, AppResult, ChunkingConfig, KnowledgeSettings};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Instant;
use text_splitter::{ChunkConfig, TextSplitter};
use walkdir::WalkDir;

/// Extensions picked up when walking a directory.
const TEXT_EXTENSIONS: &[&str] = &["txt", "text", "md"];

const FORM_FEED: char = '\x0C';

/// Options for the learn operation.
#[derive(Debug, Clone)]
pub struct LearnOptions {
    /// Collection to populate
    pub category: Category,

    /// Files or directories to ingest
    pub paths: Vec<PathBuf>,

    /// Drop the collection before learning
    pub reset: bool,
}

/// A chunk before embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkCandidate {
    pub source_name: String,
    pub page: Option<u32>,
    pub position: u32,
    pub text: String,
}

/// Chunk window configured for a category.
pub fn chunking_for(settings: &KnowledgeSettings, category: Category) -> ChunkingConfig {
    match category {
        Category::Statute => settings.statutes,
        Category::Case => settings.cases,
        Category::Regulation => settings.regulations,
    }
}

/// Split a document into chunk candidates.
///
/// Documents without a form feed have no page numbers.
pub fn chunk_document(
    source_name: &str,
    text: &str,
    chunking: ChunkingConfig,
) -> AppResult<Vec<ChunkCandidate>> {
    let config = ChunkConfig::new(chunking.chunk_size)
        .with_overlap(chunking.chunk_overlap)
        .map_err(|e| AppError::Config(format!("Invalid chunk window: {}", e)))?;
    let splitter = TextSplitter::new(config);

    let paged = text.contains(FORM_FEED);
    let mut candidates = Vec::new();
    let mut position = 0u32;

    for (page_index, page_text) in text.split(FORM_FEED).enumerate() {
        let page = paged.then_some(page_index as u32);

        for piece in splitter.chunks(page_text) {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }

            candidates.push(ChunkCandidate {
                source_name: source_name.to_string(),
                page,
                position,
                text: piece.to_string(),
            });
            position += 1;
        }
    }

    tracing::debug!(
        "Chunked {} into {} chunks (size: {}, overlap: {})",
        source_name,
        candidates.len(),
        chunking.chunk_size,
        chunking.chunk_overlap
    );

    Ok(candidates)
}

/// Stable id for a chunk within its collection.
fn chunk_id(category: Category, candidate: &ChunkCandidate) -> String {
    let mut hasher = Sha256::new();
    hasher.update(category.as_str().as_bytes());
    hasher.update(candidate.source_name.as_bytes());
    hasher.update(candidate.page.map(i64::from).unwrap_or(-1).to_le_bytes());
    hasher.update(candidate.position.to_le_bytes());
    hasher.update(candidate.text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Expand the given paths into the files to ingest.
fn collect_files(paths: &[PathBuf]) -> AppResult<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let entry_path = entry.path();
                let is_text = entry_path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| TEXT_EXTENSIONS.contains(&e.to_lowercase().as_str()))
                    .unwrap_or(false);
                if entry_path.is_file() && is_text {
                    files.push(entry_path.to_path_buf());
                }
            }
        } else {
            return Err(AppError::Knowledge(format!("Path not found: {:?}", path)));
        }
    }

    Ok(files)
}

/// Learn documents into one category of the store.
pub async fn learn(
    store_path: &Path,
    settings: &KnowledgeSettings,
    embedder: &dyn EmbeddingProvider,
    options: &LearnOptions,
) -> AppResult<LearnStats> {
    let start = Instant::now();
    let category = options.category;
    let chunking = chunking_for(settings, category);

    tracing::info!(
        "Learning into {} from {} path(s)",
        category.collection_name(),
        options.paths.len()
    );

    let files = collect_files(&options.paths)?;

    let mut sources_count = 0u32;
    let mut bytes_processed = 0u64;
    let mut pending: Vec<StoredChunk> = Vec::new();
    let mut learned_sources: Vec<String> = Vec::new();

    for file in &files {
        let text = match std::fs::read_to_string(file) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Skipping {:?}: {}", file, e);
                continue;
            }
        };

        let source_name = file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        let candidates = chunk_document(&source_name, &text, chunking)?;
        let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
        let embeddings = embedder.embed_batch(&texts).await?;

        for (candidate, embedding) in candidates.into_iter().zip(embeddings) {
            pending.push(StoredChunk {
                id: chunk_id(category, &candidate),
                category,
                source_name: candidate.source_name,
                page: candidate.page,
                position: candidate.position,
                text: candidate.text,
                embedding,
            });
        }

        learned_sources.push(source_name);
        sources_count += 1;
        bytes_processed += text.len() as u64;
    }

    let store_path = store_path.to_path_buf();
    let provider = embedder.provider_name().to_string();
    let dims = embedder.dimensions();
    let reset = options.reset;

    let chunks_count = tokio::task::spawn_blocking(move || -> AppResult<u32> {
        let mut conn = store::init_store(&store_path)?;
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Knowledge(format!("Failed to begin transaction: {}", e)))?;

        if reset {
            store::reset_store(&tx, Some(category))?;
        }
        store::register_collection(&tx, category, &provider, dims)?;
        // A re-learned source replaces its previous chunks wholesale
        for source_name in &learned_sources {
            let removed = store::delete_source(&tx, category, source_name)?;
            if removed > 0 {
                tracing::debug!("Replacing {} stale chunks of {}", removed, source_name);
            }
        }
        for chunk in &pending {
            store::insert_chunk(&tx, chunk)?;
        }
        let total = store::refresh_counts(&tx, category)?;

        tx.commit()
            .map_err(|e| AppError::Knowledge(format!("Failed to commit: {}", e)))?;
        tracing::debug!("Collection {} now holds {} chunks", category, total);
        Ok(pending.len() as u32)
    })
    .await
    .map_err(|e| AppError::Knowledge(format!("Learn task failed: {}", e)))??;

    let duration = start.elapsed();

    tracing::info!(
        "Learn completed: {} sources, {} chunks, {} bytes in {:.2}s",
        sources_count,
        chunks_count,
        bytes_processed,
        duration.as_secs_f64()
    );

    Ok(LearnStats {
        category,
        sources_count,
        chunks_count,
        bytes_processed,
        duration_secs: duration.as_secs_f64(),
    })
}
