//! Answer composition from retrieved excerpts and extracted citations.

use crate::rag::types::{CitationSet, ModelParams};
use crate::types::{Category, QueryStatus, RetrievalResult};
use juris_core::AppResult;
use juris_llm::{LlmClient, LlmRequest};
use juris_prompt::{build_prompt, PromptDefinition};
use std::collections::HashMap;

const DIVIDER_WIDTH: usize = 80;

/// Prose used when the model returns nothing.
const EMPTY_ANSWER_NOTE: &str =
    "No answer text could be generated from the retrieved documents. The supporting sources are listed below.";

fn gap_note(status: QueryStatus) -> &'static str {
    match status {
        QueryStatus::Searched => "no excerpts available: no matching passages were found",
        QueryStatus::Unavailable => "no excerpts available: this collection is currently unavailable",
        QueryStatus::Malformed => "no excerpts available: the search request was malformed",
    }
}

/// Full-text context for the composer, grouped by category in rank order.
///
/// Categories that were queried without results are listed with a note;
/// categories that were not queried are omitted.
pub fn build_context(retrieval: &RetrievalResult) -> String {
    let divider = "-".repeat(DIVIDER_WIDTH);
    let mut context = String::new();

    for category in Category::ALL {
        let chunks = retrieval.chunks(category);

        if chunks.is_empty() {
            if let Some(status) = retrieval.status(category) {
                context.push_str(&format!(
                    "\n=== {} EXCERPTS ===\n({})\n",
                    category.heading(),
                    gap_note(status)
                ));
            }
            continue;
        }

        context.push_str(&format!("\n=== {} EXCERPTS ===\n", category.heading()));
        for chunk in chunks {
            context.push_str(&format!(
                "\n[{}, Page {}]\n{}\n{}\n",
                chunk.label(),
                chunk.display_page(),
                chunk.text,
                divider
            ));
        }
    }

    context
}

/// Join the model's prose with the rendered citation block.
pub fn finish_answer(prose: &str, citations: &str) -> String {
    let prose = prose.trim();
    let prose = if prose.is_empty() {
        tracing::warn!("Composer returned no text");
        EMPTY_ANSWER_NOTE
    } else {
        prose
    };

    if citations.trim().is_empty() {
        prose.to_string()
    } else {
        format!("{}\n\n{}", prose, citations)
    }
}

/// Compose the final answer.
pub async fn compose_answer(
    llm: &dyn LlmClient,
    prompt: &PromptDefinition,
    params: &ModelParams,
    question: &str,
    retrieval: &RetrievalResult,
    citations: &CitationSet,
) -> AppResult<String> {
    let rendered = citations.render();

    let mut vars = HashMap::new();
    vars.insert("question".to_string(), question.to_string());
    vars.insert("context".to_string(), build_context(retrieval));
    vars.insert("citations".to_string(), rendered.clone());
    let built = build_prompt(prompt, &vars)?;

    tracing::debug!(prompt_chars = built.user.len(), "Composing answer");

    let mut request =
        LlmRequest::new(built.user, &params.model).with_temperature(params.temperature);
    if let Some(system) = built.system {
        request = request.with_system(system);
    }

    let response = llm.complete(&request).await?;

    Ok(finish_answer(&response.content, &rendered))
}
