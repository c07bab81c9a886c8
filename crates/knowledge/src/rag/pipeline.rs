//! Pipeline controller.
//!
//! `ROUTING -> DIRECT_END` when nothing was retrieved, otherwise
//! `ROUTING -> CITATION -> COMPOSE -> END`. Each question gets fresh state;
//! nothing is carried between questions.

use crate::rag::types::{ModelParams, PipelineState, Stage};
use crate::rag::{citation, compose, router};
use crate::source::KnowledgeSource;
use crate::types::RetrievalResult;
use juris_core::{AppError, AppResult, PipelineConfig};
use juris_llm::LlmClient;
use juris_prompt::{builtin_prompt, load_prompt, PromptDefinition};
use std::path::Path;
use std::sync::Arc;
use tracing::Instrument;

/// Prompt ids used by the pipeline stages.
pub const ROUTER_PROMPT: &str = "router.default";
pub const CITATIONS_PROMPT: &str = "citations.default";
pub const COMPOSE_PROMPT: &str = "compose.default";

/// Prompt definitions for the three model calls.
#[derive(Debug, Clone)]
pub struct PipelinePrompts {
    pub router: PromptDefinition,
    pub citations: PromptDefinition,
    pub compose: PromptDefinition,
}

impl PipelinePrompts {
    /// The compiled-in prompts.
    pub fn builtin() -> AppResult<Self> {
        Ok(Self {
            router: builtin_prompt(ROUTER_PROMPT)?,
            citations: builtin_prompt(CITATIONS_PROMPT)?,
            compose: builtin_prompt(COMPOSE_PROMPT)?,
        })
    }

    /// Prompts with `.juris/prompts/` overrides from the workspace applied.
    pub fn load(workspace: &Path) -> AppResult<Self> {
        Ok(Self {
            router: load_prompt(workspace, ROUTER_PROMPT)?,
            citations: load_prompt(workspace, CITATIONS_PROMPT)?,
            compose: load_prompt(workspace, COMPOSE_PROMPT)?,
        })
    }
}

/// Branch taken after routing.
pub fn next_stage(retrieval: &RetrievalResult) -> Stage {
    if retrieval.has_any() {
        Stage::Citation
    } else {
        Stage::DirectEnd
    }
}

/// The question-answering pipeline.
///
/// Collaborators are shared handles, so one pipeline can serve concurrent
/// questions.
pub struct Pipeline {
    llm: Arc<dyn LlmClient>,
    source: Arc<dyn KnowledgeSource>,
    prompts: PipelinePrompts,
    params: ModelParams,
    top_k: usize,
    preview_chars: usize,
}

impl Pipeline {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        source: Arc<dyn KnowledgeSource>,
        prompts: PipelinePrompts,
        model: impl Into<String>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            llm,
            source,
            prompts,
            params: ModelParams {
                model: model.into(),
                temperature: config.temperature,
            },
            top_k: config.top_k.max(1),
            preview_chars: config.preview_chars.max(1),
        }
    }

    /// Run a question through the pipeline and return the full state.
    pub async fn run(&self, question: &str) -> AppResult<PipelineState> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::Config("Question cannot be empty".to_string()));
        }

        let span = tracing::info_span!(
            "question",
            provider = self.llm.provider_name(),
            source = self.source.name(),
            chars = question.chars().count()
        );

        self.run_stages(question).instrument(span).await
    }

    async fn run_stages(&self, question: &str) -> AppResult<PipelineState> {
        let mut state = PipelineState::new(question);

        state.enter(Stage::Routing);
        let outcome = router::route(
            self.llm.as_ref(),
            self.source.as_ref(),
            &self.prompts.router,
            &self.params,
            question,
            self.top_k,
        )
        .await?;

        state.invocations = outcome.invocations.clone();
        state.retrieval = outcome.retrieval.clone();

        match next_stage(&state.retrieval) {
            Stage::Citation => {
                state.enter(Stage::Citation);
                let citations = citation::extract_citations(
                    self.llm.as_ref(),
                    &self.prompts.citations,
                    &self.params,
                    question,
                    &state.retrieval,
                    self.preview_chars,
                )
                .await?;

                state.enter(Stage::Compose);
                let answer = compose::compose_answer(
                    self.llm.as_ref(),
                    &self.prompts.compose,
                    &self.params,
                    question,
                    &state.retrieval,
                    &citations,
                )
                .await?;

                state.citations = Some(citations);
                state.final_answer = Some(answer);
                state.enter(Stage::End);
            }
            _ => {
                state.enter(Stage::DirectEnd);
                state.final_answer = Some(outcome.direct_answer());
            }
        }

        tracing::info!(
            route = ?state.route(),
            stage = ?state.current_stage(),
            invocations = state.invocations.len(),
            chunks = state.retrieval.total_chunks(),
            "Question answered"
        );

        Ok(state)
    }

    /// Answer a question. Always a non-empty string or an error.
    pub async fn answer_question(&self, question: &str) -> AppResult<String> {
        let state = self.run(question).await?;
        if !state.is_finished() {
            return Err(AppError::Other(format!(
                "Pipeline stopped at {:?} before a terminal stage",
                state.current_stage()
            )));
        }

        state
            .final_answer
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| AppError::Other("Pipeline finished without an answer".to_string()))
    }
}
