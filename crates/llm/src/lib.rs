//! LLM integration crate for Juris.
//!
//! This crate provides a provider-agnostic abstraction for calling Large
//! Language Models, including tool calling: a request may carry a manifest of
//! callable tools and the response reports which ones the model invoked.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **OpenAI-compatible**: OpenAI and Groq chat completions
//! - **Mock**: Scripted responses for tests
//!
//! # Example
//! ```no_run
//! use juris_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("What does Section 302 IPC cover?", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod tools;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::{MockClient, OllamaClient, OpenAiCompatClient};
pub use tools::{ToolCall, ToolSpec};
pub use types::ProviderType;
