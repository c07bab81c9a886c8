//! Scripted LLM client for tests and offline runs.
//!
//! Responses are served in the order they were queued; every request is
//! recorded so callers can assert on prompts and offered tools.

use crate::client::{LlmClient, LlmRequest, LlmResponse};
use crate::tools::ToolCall;
use juris_core::{AppError, AppResult};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Mock LLM client returning queued responses.
#[derive(Debug, Default)]
pub struct MockClient {
    responses: Mutex<VecDeque<Result<LlmResponse, String>>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plain text reply.
    pub fn with_reply(self, content: impl Into<String>) -> Self {
        self.push(Ok(LlmResponse::text(content, "mock")))
    }

    /// Queue a reply that invokes tools.
    pub fn with_tool_calls(self, content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        let mut response = LlmResponse::text(content, "mock");
        response.tool_calls = calls;
        self.push(Ok(response))
    }

    /// Queue a failed call.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()))
    }

    fn push(self, entry: Result<LlmResponse, String>) -> Self {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(entry);
        self
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait::async_trait]
impl LlmClient for MockClient {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        let next = self
            .responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(AppError::Llm(message)),
            None => Err(AppError::Llm("mock client has no scripted response".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_serves_in_order_and_records() {
        let client = MockClient::new()
            .with_tool_calls("", vec![ToolCall::new("search_statutes", json!({"query": "302"}))])
            .with_reply("second");

        let first = client.complete(&LlmRequest::new("a", "m")).await.unwrap();
        assert!(first.has_tool_calls());

        let second = client.complete(&LlmRequest::new("b", "m")).await.unwrap();
        assert_eq!(second.content, "second");

        assert_eq!(client.call_count(), 2);
        assert_eq!(client.requests()[1].prompt, "b");
    }

    #[tokio::test]
    async fn test_failure_and_exhaustion_are_llm_errors() {
        let client = MockClient::new().with_failure("upstream 503");

        let err = client.complete(&LlmRequest::new("a", "m")).await.unwrap_err();
        assert!(err.to_string().contains("upstream 503"));

        let err = client.complete(&LlmRequest::new("b", "m")).await.unwrap_err();
        assert!(matches!(err, AppError::Llm(_)));
    }
}
