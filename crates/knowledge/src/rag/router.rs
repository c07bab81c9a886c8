//! Relevance routing: one tool-enabled model call decides whether and where
//! to retrieve, then the selected category queries run concurrently.

use crate::rag::tools::{self, SearchTool, QUERY_ARG};
use crate::rag::types::{Invocation, ModelParams};
use crate::source::KnowledgeSource;
use crate::types::{Chunk, QueryStatus, RetrievalResult};
use futures::future::join_all;
use juris_core::{AppError, AppResult};
use juris_llm::{LlmClient, LlmRequest, ToolCall};
use juris_prompt::{build_prompt, PromptDefinition};
use std::collections::HashMap;

/// Direct reply used when the model declined retrieval but said nothing.
pub const SCOPE_MESSAGE: &str = "Hello! I am a legal research assistant specializing exclusively \
in Indian Criminal Law, covering the Indian Penal Code, the Code of Criminal Procedure, the Indian \
Evidence Act, criminal case law and related regulations. I can only help with questions in that \
area.";

/// Direct reply used when every selected category came back empty.
pub const NO_MATCHES_MESSAGE: &str = "I could not find any relevant statutes, case law or \
regulations for this question in the available documents.";

/// A retrieval the model asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedQuery {
    pub tool: SearchTool,

    /// The query text, or why the call's arguments were unusable
    pub query: Result<String, String>,
}

/// What the routing stage produced.
#[derive(Debug, Clone)]
pub struct RouterOutcome {
    /// Model text returned alongside (or instead of) tool calls
    pub reply: String,
    pub retrieval: RetrievalResult,
    pub invocations: Vec<Invocation>,
}

impl RouterOutcome {
    /// The terminal answer for the direct path. Never empty.
    pub fn direct_answer(&self) -> String {
        let reply = self.reply.trim();
        if !reply.is_empty() {
            reply.to_string()
        } else if self.invocations.is_empty() {
            SCOPE_MESSAGE.to_string()
        } else {
            NO_MATCHES_MESSAGE.to_string()
        }
    }
}

/// Extract the query argument of a call.
fn invocation_query(call: &ToolCall) -> Result<String, String> {
    match call.str_arg(QUERY_ARG).map(str::trim) {
        Some(query) if !query.is_empty() => Ok(query.to_string()),
        Some(_) => Err(format!("{}: empty '{}' argument", call.name, QUERY_ARG)),
        None => Err(format!(
            "{}: missing string '{}' argument in {}",
            call.name, QUERY_ARG, call.arguments
        )),
    }
}

/// Map the model's tool calls onto the closed tool set, in call order.
/// Unknown tool names are ignored.
pub fn plan_queries(calls: &[ToolCall]) -> Vec<PlannedQuery> {
    calls
        .iter()
        .filter_map(|call| match SearchTool::from_name(&call.name) {
            Some(tool) => Some(PlannedQuery {
                tool,
                query: invocation_query(call),
            }),
            None => {
                tracing::warn!(tool = %call.name, "Ignoring call to unknown tool");
                None
            }
        })
        .collect()
}

/// Run one planned query, degrading recoverable failures to zero results.
async fn execute(
    source: &dyn KnowledgeSource,
    planned: &PlannedQuery,
    k: usize,
) -> AppResult<(Invocation, Vec<Chunk>)> {
    let category = planned.tool.category();

    let result = match &planned.query {
        Ok(query) => source.query(category, query, k).await,
        Err(reason) => Err(AppError::MalformedToolSelection(reason.clone())),
    };

    let (status, chunks) = match result {
        Ok(chunks) => (QueryStatus::Searched, chunks),
        Err(e) if e.is_degradable() => {
            tracing::warn!(%category, error = %e, "Degrading invocation to zero results");
            let status = match e {
                AppError::SourceUnavailable(_) => QueryStatus::Unavailable,
                _ => QueryStatus::Malformed,
            };
            (status, Vec::new())
        }
        Err(e) => return Err(e),
    };

    let invocation = Invocation {
        tool: planned.tool,
        category,
        query: planned.query.as_ref().ok().cloned(),
        status,
        returned: chunks.len(),
    };

    Ok((invocation, chunks))
}

/// Execute planned queries concurrently and merge them in call order.
pub async fn retrieve(
    source: &dyn KnowledgeSource,
    planned: &[PlannedQuery],
    k: usize,
) -> AppResult<(RetrievalResult, Vec<Invocation>)> {
    let results = join_all(planned.iter().map(|p| execute(source, p, k))).await;

    let mut retrieval = RetrievalResult::new();
    let mut invocations = Vec::with_capacity(results.len());

    for result in results {
        let (invocation, chunks) = result?;
        retrieval.extend(invocation.category, chunks);
        retrieval.record_status(invocation.category, invocation.status);
        invocations.push(invocation);
    }

    Ok((retrieval, invocations))
}

/// Route a question: ask the model, then run whatever it selected.
pub async fn route(
    llm: &dyn LlmClient,
    source: &dyn KnowledgeSource,
    prompt: &PromptDefinition,
    params: &ModelParams,
    question: &str,
    k: usize,
) -> AppResult<RouterOutcome> {
    let mut vars = HashMap::new();
    vars.insert("question".to_string(), question.to_string());
    vars.insert("tool_manifest".to_string(), tools::manifest_text());
    let built = build_prompt(prompt, &vars)?;

    let mut request = LlmRequest::new(built.user, &params.model)
        .with_temperature(params.temperature)
        .with_tools(tools::tool_specs());
    if let Some(system) = built.system {
        request = request.with_system(system);
    }

    let response = llm.complete(&request).await?;

    let planned = plan_queries(&response.tool_calls);
    tracing::info!(
        tool_calls = response.tool_calls.len(),
        planned = planned.len(),
        "Routing decision received"
    );

    let (retrieval, invocations) = retrieve(source, &planned, k).await?;

    for category in crate::types::Category::ALL {
        if let Some(status) = retrieval.status(category) {
            tracing::debug!(
                %category,
                status = status.as_str(),
                chunks = retrieval.chunks(category).len(),
                "Category retrieval"
            );
        }
    }

    Ok(RouterOutcome {
        reply: response.content,
        retrieval,
        invocations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::types::Category;
    use serde_json::json;

    fn store() -> MemoryStore {
        MemoryStore::new().with_collection(
            Category::Statute,
            vec![
                Chunk::new(Category::Statute, "IPC.pdf", Some(301), "Section 302 punishment for murder"),
                Chunk::new(Category::Statute, "IPC.pdf", Some(298), "Section 299 culpable homicide"),
            ],
        )
    }

    #[test]
    fn test_plan_ignores_unknown_tools() {
        let calls = vec![
            ToolCall::new("search_web", json!({"query": "murder"})),
            ToolCall::new("search_statutes", json!({"query": " section 302 "})),
        ];

        let planned = plan_queries(&calls);
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].tool, SearchTool::Statutes);
        assert_eq!(planned[0].query.as_deref().ok(), Some("section 302"));
    }

    #[test]
    fn test_plan_marks_bad_arguments_malformed() {
        let calls = vec![
            ToolCall::new("search_cases", json!({})),
            ToolCall::new("search_cases", json!({"query": "   "})),
            ToolCall::new("search_cases", json!({"query": 302})),
            ToolCall::new("search_cases", json!("not an object")),
        ];

        let planned = plan_queries(&calls);
        assert_eq!(planned.len(), 4);
        assert!(planned.iter().all(|p| p.query.is_err()));
    }

    #[tokio::test]
    async fn test_unavailable_and_malformed_degrade() {
        let store = store();
        let planned = vec![
            PlannedQuery {
                tool: SearchTool::Statutes,
                query: Ok("section 302 murder".to_string()),
            },
            PlannedQuery {
                tool: SearchTool::Cases,
                query: Ok("murder".to_string()),
            },
            PlannedQuery {
                tool: SearchTool::Regulations,
                query: Err("missing query".to_string()),
            },
        ];

        let (retrieval, invocations) = retrieve(&store, &planned, 5).await.unwrap();

        assert_eq!(retrieval.chunks(Category::Statute).len(), 2);
        assert!(retrieval.chunks(Category::Case).is_empty());
        assert_eq!(retrieval.status(Category::Case), Some(QueryStatus::Unavailable));
        assert_eq!(retrieval.status(Category::Regulation), Some(QueryStatus::Malformed));
        assert_eq!(invocations.len(), 3);
        assert_eq!(invocations[2].query, None);

        // The malformed invocation never reached the store
        assert_eq!(store.query_count(), 2);
    }

    #[tokio::test]
    async fn test_repeated_category_concatenates_without_duplicates() {
        let store = store();
        let planned = vec![
            PlannedQuery {
                tool: SearchTool::Statutes,
                query: Ok("murder".to_string()),
            },
            PlannedQuery {
                tool: SearchTool::Statutes,
                query: Ok("murder culpable homicide".to_string()),
            },
        ];

        let (retrieval, invocations) = retrieve(&store, &planned, 5).await.unwrap();

        let chunks = retrieval.chunks(Category::Statute);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.contains("302"));
        assert_eq!(invocations[1].returned, 2);
    }

    #[tokio::test]
    async fn test_non_degradable_error_propagates() {
        let store = store();
        let planned = vec![PlannedQuery {
            tool: SearchTool::Statutes,
            query: Ok("murder".to_string()),
        }];

        let result = retrieve(&store, &planned, 0).await;
        assert!(matches!(result, Err(AppError::Knowledge(_))));
    }

    #[test]
    fn test_direct_answer_fallbacks() {
        let mut outcome = RouterOutcome {
            reply: "  ".to_string(),
            retrieval: RetrievalResult::new(),
            invocations: Vec::new(),
        };
        assert_eq!(outcome.direct_answer(), SCOPE_MESSAGE);

        outcome.invocations.push(Invocation {
            tool: SearchTool::Cases,
            category: Category::Case,
            query: Some("x".to_string()),
            status: QueryStatus::Searched,
            returned: 0,
        });
        assert_eq!(outcome.direct_answer(), NO_MATCHES_MESSAGE);

        outcome.reply = "Let me look that up.".to_string();
        assert_eq!(outcome.direct_answer(), "Let me look that up.");
    }
}
