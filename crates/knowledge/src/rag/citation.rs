//! Citation extraction.
//!
//! Retrieved chunks are numbered per category and shown to the model as
//! previews; the model answers with JSON naming the numbers it cites. Labels
//! and pages are always copied from the referenced chunk, so a citation can
//! only point at something that was retrieved.

use crate::rag::types::{CitationEntry, CitationSet, ModelParams};
use crate::types::{Category, RetrievalResult};
use juris_core::{AppError, AppResult};
use juris_llm::{LlmClient, LlmRequest};
use juris_prompt::{build_prompt, PromptDefinition};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use unicode_segmentation::UnicodeSegmentation;

/// Truncate to `max_chars` characters, appending "..." when cut.
///
/// Cuts on grapheme boundaries so combining marks stay attached.
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let mut out = String::new();
    let mut used = 0;
    for grapheme in text.graphemes(true) {
        let width = grapheme.chars().count();
        if used + width > max_chars {
            break;
        }
        out.push_str(grapheme);
        used += width;
    }
    out.push_str("...");
    out
}

fn section_title(category: Category) -> &'static str {
    match category {
        Category::Statute => "STATUTES",
        Category::Case => "CASE LAW",
        Category::Regulation => "REGULATIONS",
    }
}

/// Serialize retrieved chunks for the citation prompt.
pub fn format_documents(retrieval: &RetrievalResult, preview_chars: usize) -> String {
    let mut out = String::new();

    for category in Category::ALL {
        let chunks = retrieval.chunks(category);
        if chunks.is_empty() {
            continue;
        }

        out.push_str(&format!("\n=== {} ===\n", section_title(category)));
        for (i, chunk) in chunks.iter().enumerate() {
            out.push_str(&format!(
                "\n[{} {}] {}, Page {}\n{}\n",
                category.document_label(),
                i + 1,
                chunk.label(),
                chunk.display_page(),
                preview(&chunk.text, preview_chars)
            ));
        }
    }

    out
}

/// Read a document number as the model wrote it: `1`, `1.0`, `"1"` or
/// `"Case 1"`.
fn ref_index(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => match n.as_u64() {
            Some(n) => usize::try_from(n).ok(),
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                .map(|f| f as usize),
        },
        Value::String(s) => s
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .split_whitespace()
            .last()
            .and_then(|n| n.parse().ok()),
        _ => None,
    }
}

/// Entries listed under a category's key. A missing or null key lists none.
fn category_entries(reply: &Map<String, Value>, category: Category) -> &[Value] {
    match reply.get(category.plural_key()) {
        Some(Value::Array(entries)) => entries.as_slice(),
        Some(Value::Null) | None => &[],
        Some(other) => {
            tracing::warn!(%category, value = %other, "Ignoring citation list that is not an array");
            &[]
        }
    }
}

/// Locate the JSON object in a reply, tolerating code fences and prose.
fn json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

/// Parse the model's reply into citations over `retrieval`.
///
/// Unreadable, out-of-range and repeated references are dropped one at a
/// time; only a reply with no JSON object at all fails.
pub fn parse_citations(content: &str, retrieval: &RetrievalResult) -> AppResult<CitationSet> {
    let raw = json_object(content).ok_or_else(|| {
        AppError::Llm("Citation response did not contain a JSON object".to_string())
    })?;

    let reply: Map<String, Value> = serde_json::from_str(raw)
        .map_err(|e| AppError::Llm(format!("Citation response was not valid JSON: {}", e)))?;

    let mut set = CitationSet::new();

    for category in Category::ALL {
        let chunks = retrieval.chunks(category);
        let mut seen = HashSet::new();

        for entry in category_entries(&reply, category) {
            let Some(index) = entry.get("ref").and_then(ref_index) else {
                tracing::warn!(%category, %entry, "Dropping unreadable citation reference");
                continue;
            };

            let Some(chunk) = index.checked_sub(1).and_then(|i| chunks.get(i)) else {
                tracing::warn!(%category, index, available = chunks.len(), "Dropping out-of-range citation");
                continue;
            };

            if !seen.insert(index) {
                tracing::warn!(%category, index, "Dropping duplicate citation");
                continue;
            }

            let reason = entry
                .get("reason")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .unwrap_or("Relevant to the question");
            set.push(
                category,
                CitationEntry {
                    label: chunk.label().to_string(),
                    source_name: chunk.source_name.clone(),
                    page: chunk.page,
                    reason: reason.to_string(),
                },
            );
        }
    }

    Ok(set)
}

/// Ask the model which retrieved chunks support an answer.
pub async fn extract_citations(
    llm: &dyn LlmClient,
    prompt: &PromptDefinition,
    params: &ModelParams,
    question: &str,
    retrieval: &RetrievalResult,
    preview_chars: usize,
) -> AppResult<CitationSet> {
    let mut vars = HashMap::new();
    vars.insert("question".to_string(), question.to_string());
    vars.insert(
        "documents".to_string(),
        format_documents(retrieval, preview_chars),
    );
    let built = build_prompt(prompt, &vars)?;

    let mut request =
        LlmRequest::new(built.user, &params.model).with_temperature(params.temperature);
    if let Some(system) = built.system {
        request = request.with_system(system);
    }

    let response = llm.complete(&request).await?;
    let set = parse_citations(&response.content, retrieval)?;

    tracing::info!(
        citations = set.len(),
        retrieved = retrieval.total_chunks(),
        "Citations extracted"
    );

    Ok(set)
}
