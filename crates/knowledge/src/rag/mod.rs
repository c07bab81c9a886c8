//! Retrieval-augmented answering pipeline.
//!
//! Routing picks knowledge sources through model tool calls, citation
//! extraction selects supporting passages, and composition writes the answer.

pub mod citation;
pub mod compose;
pub mod pipeline;
pub mod router;
pub mod tools;
pub mod types;

pub use pipeline::{next_stage, Pipeline, PipelinePrompts};
pub use tools::SearchTool;
pub use types::{CitationEntry, CitationSet, Invocation, ModelParams, PipelineState, Route, Stage};
