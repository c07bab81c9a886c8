//! Command handlers for the Juris CLI.

pub mod ask;
pub mod knowledge;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use knowledge::KnowledgeCommand;
