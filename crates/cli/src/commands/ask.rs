//! Ask command handler.
//!
//! Runs one question through the pipeline against the local store.

use clap::Args;
use juris_core::{config::AppConfig, AppError, AppResult};
use juris_knowledge::{create_provider, Pipeline, PipelinePrompts, PipelineState, SqliteStore};
use juris_llm::create_client;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Ask a criminal law question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: Option<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "question")]
    pub file: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");

        let question = self.get_question()?;
        config.validate()?;

        let pipeline = build_pipeline(config)?;

        let state = match config.pipeline.question_timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), pipeline.run(&question))
                .await
                .map_err(|_| AppError::Timeout(secs))??,
            None => pipeline.run(&question).await?,
        };

        self.print(config, &state)
    }

    fn get_question(&self) -> AppResult<String> {
        if let Some(ref question) = self.question {
            return Ok(question.clone());
        }

        match self.file {
            Some(ref path) => Ok(std::fs::read_to_string(path)?),
            None => Err(AppError::Config("No question provided".to_string())),
        }
    }

    fn print(&self, config: &AppConfig, state: &PipelineState) -> AppResult<()> {
        let answer = state
            .final_answer
            .as_deref()
            .ok_or_else(|| AppError::Other("Pipeline finished without an answer".to_string()))?;

        if self.json {
            let output = serde_json::json!({
                "answer": answer,
                "route": state.route(),
                "provider": config.provider,
                "model": config.model,
                "stages": state.stages,
                "invocations": state.invocations,
                "citations": state.citations,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", answer);
        }

        Ok(())
    }
}

/// Wire the configured model, embedder and store into a pipeline.
fn build_pipeline(config: &AppConfig) -> AppResult<Pipeline> {
    let endpoint = config.resolve_endpoint(&config.provider);
    let api_key = config.resolve_api_key(&config.provider);

    let llm = create_client(&config.provider, endpoint.as_deref(), api_key.as_deref())
        .map_err(AppError::Config)?;

    // Ollama embeddings use the configured Ollama endpoint regardless of chat provider
    let embed_endpoint = config.resolve_endpoint("ollama");
    let embedder = create_provider(&config.knowledge, embed_endpoint.as_deref())?;
    let store = Arc::new(SqliteStore::new(config.store_path(), embedder));

    let prompts = PipelinePrompts::load(&config.workspace)?;

    Ok(Pipeline::new(
        llm,
        store,
        prompts,
        &config.model,
        &config.pipeline,
    ))
}
