//! Ollama LLM provider implementation.
//!
//! Uses the chat endpoint, which accepts a tool manifest and reports tool
//! calls on the assistant message.
//! Ollama API: https://github.com/ollama/ollama/blob/main/docs/api.md

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use crate::tools::ToolCall;
use juris_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ollama chat request format.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OllamaToolCall>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaToolCall {
    function: OllamaFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaFunctionCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Ollama chat response format.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    model: String,
    message: OllamaMessage,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

/// Ollama LLM client.
pub struct OllamaClient {
    /// Base URL for Ollama API
    base_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new Ollama client with default settings.
    ///
    /// Default URL: http://localhost:11434
    pub fn new() -> Self {
        Self::with_base_url("http://localhost:11434")
    }

    /// Create a new Ollama client with a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Convert LlmRequest to Ollama chat format.
    fn to_ollama_request(&self, request: &LlmRequest) -> OllamaChatRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(ref system) = request.system {
            messages.push(OllamaMessage {
                role: "system".to_string(),
                content: system.clone(),
                tool_calls: Vec::new(),
            });
        }
        messages.push(OllamaMessage {
            role: "user".to_string(),
            content: request.prompt.clone(),
            tool_calls: Vec::new(),
        });

        let options = if request.temperature.is_some() || request.max_tokens.is_some() {
            Some(OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            })
        } else {
            None
        };

        OllamaChatRequest {
            model: request.model.clone(),
            messages,
            tools: request.tools.iter().map(|t| t.to_function_json()).collect(),
            options,
            stream: false,
        }
    }

    /// Convert Ollama response to LlmResponse.
    fn convert_response(&self, response: OllamaChatResponse) -> LlmResponse {
        let usage = LlmUsage::new(
            response.prompt_eval_count.unwrap_or(0),
            response.eval_count.unwrap_or(0),
        );

        let tool_calls = response
            .message
            .tool_calls
            .into_iter()
            .map(|tc| match tc.function.arguments {
                // Some models encode arguments as a JSON string
                Value::String(raw) => ToolCall::from_encoded(None, tc.function.name, &raw),
                arguments => ToolCall::new(tc.function.name, arguments),
            })
            .collect();

        LlmResponse {
            content: response.message.content,
            model: response.model,
            usage,
            tool_calls,
        }
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::info!(model = %request.model, tools = request.tools.len(), "Sending chat request to Ollama");
        tracing::debug!("Request: {:?}", request);

        let ollama_request = self.to_ollama_request(request);
        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send request to Ollama: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Llm(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        let ollama_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse Ollama response: {}", e)))?;

        tracing::debug!("Response: {:?}", ollama_response);
        let converted = self.convert_response(ollama_response);
        tracing::info!(
            tool_calls = converted.tool_calls.len(),
            "Received completion from Ollama"
        );

        Ok(converted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolSpec;
    use serde_json::json;

    #[test]
    fn test_ollama_client_creation() {
        let client = OllamaClient::with_base_url("http://localhost:11434/");
        assert_eq!(client.provider_name(), "ollama");
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_ollama_request_conversion() {
        let client = OllamaClient::new();
        let request = LlmRequest::new("What is Section 302 IPC?", "llama3.2")
            .with_system("You are a legal assistant")
            .with_temperature(0.0)
            .with_max_tokens(100)
            .with_tools(vec![ToolSpec::with_string_arg(
                "search_statutes",
                "Search statutes",
                "query",
                "Search text",
            )]);

        let ollama_req = client.to_ollama_request(&request);
        assert_eq!(ollama_req.model, "llama3.2");
        assert_eq!(ollama_req.messages.len(), 2);
        assert_eq!(ollama_req.messages[0].role, "system");
        assert_eq!(ollama_req.messages[1].content, "What is Section 302 IPC?");
        assert_eq!(ollama_req.tools[0]["function"]["name"], "search_statutes");
        assert!(!ollama_req.stream);

        let options = ollama_req.options.unwrap();
        assert_eq!(options.temperature, Some(0.0));
        assert_eq!(options.num_predict, Some(100));
    }

    #[test]
    fn test_ollama_response_with_tool_calls() {
        let client = OllamaClient::new();
        let raw = json!({
            "model": "llama3.2",
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    {"function": {"name": "search_statutes", "arguments": {"query": "Section 302 IPC"}}},
                    {"function": {"name": "search_cases", "arguments": "{\"query\": \"murder punishment\"}"}}
                ]
            },
            "done": true,
            "prompt_eval_count": 210,
            "eval_count": 18
        });

        let parsed: OllamaChatResponse = serde_json::from_value(raw).unwrap();
        let response = client.convert_response(parsed);

        assert_eq!(response.tool_calls.len(), 2);
        assert_eq!(response.tool_calls[0].str_arg("query"), Some("Section 302 IPC"));
        assert_eq!(response.tool_calls[1].str_arg("query"), Some("murder punishment"));
        assert_eq!(response.usage.total_tokens, 228);
    }

    #[test]
    fn test_ollama_response_text_only() {
        let client = OllamaClient::new();
        let raw = json!({
            "model": "llama3.2",
            "message": {"role": "assistant", "content": "Hello! I specialize in Indian criminal law."},
            "done": true
        });

        let parsed: OllamaChatResponse = serde_json::from_value(raw).unwrap();
        let response = client.convert_response(parsed);
        assert!(!response.has_tool_calls());
        assert!(response.content.starts_with("Hello!"));
    }
}
