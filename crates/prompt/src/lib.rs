//! Prompt system for Juris.
//!
//! This crate provides structured prompt management with:
//! - YAML-based prompt definitions, built in and overridable per workspace
//! - Handlebars template rendering for both system and user messages

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use loader::{builtin_prompt, list_prompts, load_prompt, BUILTIN_PROMPT_IDS};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition, PromptOutputSpec};
