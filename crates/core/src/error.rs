//! Error types for Juris.
//!
//! This module defines a unified error enum covering configuration, I/O,
//! model invocation, knowledge-source and prompt failures.

use thiserror::Error;

/// Unified error type for Juris.
///
/// All fallible functions return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A language-model call failed (transport, upstream status, or an
    /// unusable response). Fatal to the current question.
    #[error("LLM error: {0}")]
    Llm(String),

    /// The backing collection for a knowledge category is not initialized.
    #[error("Knowledge source unavailable: {0}")]
    SourceUnavailable(String),

    /// The model requested a retrieval capability without a usable argument.
    #[error("Malformed tool selection: {0}")]
    MalformedToolSelection(String),

    /// Knowledge store errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A question exceeded the configured time budget
    #[error("Timed out after {0}s")]
    Timeout(u64),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether the pipeline may continue the turn after this error.
    ///
    /// Only per-source failures degrade gracefully; everything else ends the turn.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            AppError::SourceUnavailable(_) | AppError::MalformedToolSelection(_)
        )
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degradable_kinds() {
        assert!(AppError::SourceUnavailable("case".to_string()).is_degradable());
        assert!(AppError::MalformedToolSelection("missing query".to_string()).is_degradable());
        assert!(!AppError::Llm("upstream 500".to_string()).is_degradable());
        assert!(!AppError::Timeout(30).is_degradable());
    }

    #[test]
    fn test_display_messages() {
        let err = AppError::SourceUnavailable("regulation".to_string());
        assert_eq!(err.to_string(), "Knowledge source unavailable: regulation");

        let err = AppError::Timeout(45);
        assert_eq!(err.to_string(), "Timed out after 45s");
    }

    #[test]
    fn test_from_serde_json() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: AppError = parse_err.into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
