//! Pipeline state and citation types.

use crate::rag::tools::SearchTool;
use crate::types::{display_page, Category, QueryStatus, RetrievalResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Model selection shared by every pipeline call.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParams {
    pub model: String,
    pub temperature: f32,
}

/// Pipeline stages. `DirectEnd` and `End` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Routing,
    DirectEnd,
    Citation,
    Compose,
    End,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::DirectEnd | Stage::End)
    }
}

/// Which branch a run took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// The router answered without retrieval
    Direct,

    /// Citations were extracted and an answer composed
    Retrieval,
}

/// One executed knowledge-source invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub tool: SearchTool,
    pub category: Category,

    /// Query text chosen by the model; `None` when it was missing or blank
    pub query: Option<String>,

    pub status: QueryStatus,

    /// Chunks returned before de-duplication
    pub returned: usize,
}

/// A cited passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationEntry {
    /// Display label (source name without `.pdf`)
    pub label: String,

    /// Source name as stored, for provenance checks
    pub source_name: String,

    /// Zero-based page, as stored
    pub page: Option<u32>,

    pub reason: String,
}

/// Citations grouped by category; a category with no entries renders "None".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitationSet {
    entries: BTreeMap<Category, Vec<CitationEntry>>,
}

impl CitationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, category: Category, entry: CitationEntry) {
        self.entries.entry(category).or_default().push(entry);
    }

    pub fn entries(&self, category: Category) -> &[CitationEntry] {
        self.entries
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Render the citation block appended to composed answers.
    pub fn render(&self) -> String {
        Category::ALL
            .iter()
            .map(|category| {
                let mut section = format!("**{} CITATIONS:**\n", category.heading());
                let entries = self.entries(*category);
                if entries.is_empty() {
                    section.push_str("None");
                } else {
                    let lines: Vec<String> = entries
                        .iter()
                        .enumerate()
                        .map(|(i, e)| {
                            format!(
                                "{}. {}, Page {} - {}",
                                i + 1,
                                e.label,
                                display_page(e.page),
                                e.reason
                            )
                        })
                        .collect();
                    section.push_str(&lines.join("\n"));
                }
                section
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Everything one question run produced.
///
/// Created per question and discarded after the answer is returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    pub question: String,
    pub retrieval: RetrievalResult,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub citations: Option<CitationSet>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,

    /// Invocations executed by the router, in the model's order
    pub invocations: Vec<Invocation>,

    /// Stages visited, in order
    pub stages: Vec<Stage>,
}

impl PipelineState {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            retrieval: RetrievalResult::new(),
            citations: None,
            final_answer: None,
            invocations: Vec::new(),
            stages: Vec::new(),
        }
    }

    pub fn enter(&mut self, stage: Stage) {
        tracing::debug!(?stage, "Entering stage");
        self.stages.push(stage);
    }

    pub fn current_stage(&self) -> Option<Stage> {
        self.stages.last().copied()
    }

    pub fn is_finished(&self) -> bool {
        self.current_stage().is_some_and(|s| s.is_terminal())
    }

    pub fn route(&self) -> Route {
        if self.stages.contains(&Stage::DirectEnd) {
            Route::Direct
        } else {
            Route::Retrieval
        }
    }
}
