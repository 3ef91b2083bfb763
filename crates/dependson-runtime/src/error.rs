//! Runtime errors.

use dependson_core::dom::ElementId;
use dependson_core::error::SelectorError;
use thiserror::Error;

use crate::query::EvaluationError;

/// Crate-level result alias.
pub type Result<T, E = DependsOnError> = std::result::Result<T, E>;

/// Configuration and evaluation failures.
///
/// Everything here is an authoring or integration mistake. The coordinator
/// logs and collects these errors and skips only the offending observer.
#[derive(Debug, Error)]
pub enum DependsOnError {
    #[error("action {name:?} is not registered; known actions: {}", .known.join(", "))]
    UnknownAction { name: String, known: Vec<String> },

    #[error("action name {raw:?} has no characters left after sanitizing")]
    InvalidActionName { raw: String },

    #[error("invalid selector in {context}: {source}")]
    InvalidSelector {
        context: String,
        #[source]
        source: SelectorError,
    },

    #[error("malformed query {query:?} at offset {offset}: {reason}")]
    MalformedQuery {
        query: String,
        offset: usize,
        reason: &'static str,
    },

    #[error("failed to evaluate {query:?} for {element}: {source}")]
    Evaluation {
        query: String,
        element: ElementId,
        #[source]
        source: EvaluationError,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl DependsOnError {
    /// Short machine-readable kind, used as a structured log field.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnknownAction { .. } => "unknown_action",
            Self::InvalidActionName { .. } => "invalid_action_name",
            Self::InvalidSelector { .. } => "invalid_selector",
            Self::MalformedQuery { .. } => "malformed_query",
            Self::Evaluation { .. } => "evaluation",
            Self::Config(_) => "config",
        }
    }
}
