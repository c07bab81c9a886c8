//! Knowledge command handler.
//!
//! Builds and inspects the statute, case law and regulation collections.

use clap::{Args, Subcommand};
use juris_core::{config::AppConfig, AppResult};
use juris_knowledge::{create_provider, Category, LearnOptions};
use std::path::PathBuf;

/// Manage the statute, case law and regulation collections
#[derive(Args, Debug)]
pub struct KnowledgeCommand {
    #[command(subcommand)]
    pub action: KnowledgeAction,
}

#[derive(Subcommand, Debug)]
pub enum KnowledgeAction {
    /// Ingest text files into a collection
    Learn(KnowledgeLearnCommand),
    /// Show collection statistics
    Stats(KnowledgeStatsCommand),
    /// Drop one collection or the whole store
    Reset(KnowledgeResetCommand),
}

/// Ingest text files into a collection
#[derive(Args, Debug)]
pub struct KnowledgeLearnCommand {
    /// Collection to populate (statute, case, regulation)
    #[arg(long)]
    pub category: Category,

    /// Files or directories to learn from
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Drop the collection before learning
    #[arg(long)]
    pub reset: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeLearnCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!(
            "Executing knowledge learn command for {}",
            self.category.collection_name()
        );

        let endpoint = config.resolve_endpoint("ollama");
        let embedder = create_provider(&config.knowledge, endpoint.as_deref())?;

        let options = LearnOptions {
            category: self.category,
            paths: self.paths.clone(),
            reset: self.reset,
        };

        let stats = juris_knowledge::learn(
            &config.store_path(),
            &config.knowledge,
            embedder.as_ref(),
            &options,
        )
        .await?;

        if self.json {
            let output = serde_json::json!({
                "collection": stats.category.collection_name(),
                "sourcesCount": stats.sources_count,
                "chunksCount": stats.chunks_count,
                "bytesProcessed": stats.bytes_processed,
                "durationSecs": stats.duration_secs,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!(
                "Learned {} sources into {} ({} chunks, {} bytes) in {:.2}s",
                stats.sources_count,
                stats.category.collection_name(),
                stats.chunks_count,
                stats.bytes_processed,
                stats.duration_secs
            );
        }

        Ok(())
    }
}

/// Show collection statistics
#[derive(Args, Debug)]
pub struct KnowledgeStatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeStatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing knowledge stats command");

        let stats = juris_knowledge::stats(&config.store_path())?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
            return Ok(());
        }

        println!("Knowledge store: {}", config.store_path().display());
        println!("  DB size: {} bytes", stats.db_size_bytes);

        for category in Category::ALL {
            match stats.collections.iter().find(|c| c.category == category) {
                Some(c) => println!(
                    "  {}: {} sources, {} chunks ({}, built {})",
                    c.collection, c.sources_count, c.chunks_count, c.embedding_provider, c.built_at
                ),
                None => println!("  {}: not built", category.collection_name()),
            }
        }

        Ok(())
    }
}

/// Drop one collection or the whole store
#[derive(Args, Debug)]
pub struct KnowledgeResetCommand {
    /// Collection to drop; every collection when omitted
    #[arg(long)]
    pub category: Option<Category>,
}

impl KnowledgeResetCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing knowledge reset command");

        juris_knowledge::reset(&config.store_path(), self.category)?;

        match self.category {
            Some(category) => println!("Collection {} reset", category.collection_name()),
            None => println!("Knowledge store reset"),
        }

        Ok(())
    }
}

impl KnowledgeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            KnowledgeAction::Learn(cmd) => cmd.execute(config).await,
            KnowledgeAction::Stats(cmd) => cmd.execute(config).await,
            KnowledgeAction::Reset(cmd) => cmd.execute(config).await,
        }
    }
}
