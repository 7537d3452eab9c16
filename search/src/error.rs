//! Error taxonomy for the retrieval engine
//!
//! A closed set of kinds. Transport errors are retryable; everything else
//! either recovers locally (validation, not-found) or terminates the
//! operation (schema conflict, cancellation).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    /// Network failure, timeout, or backend 5xx. Retried with backoff.
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed document, filter, or query. Never fatal to a batch.
    #[error("validation error: {0}")]
    Validation(String),

    /// Index exists with an incompatible mapping and recreation was not
    /// requested. Fatal to the operation.
    #[error("mapping conflict on index '{index}': {detail}")]
    SchemaConflict { index: String, detail: String },

    #[error("not found: {0}")]
    NotFound(String),

    /// Embedding provider failure after retry exhaustion.
    #[error("embedding provider error: {0}")]
    Provider(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl SearchError {
    /// Short kind tag used in result headers and statistics.
    pub fn kind(&self) -> &'static str {
        match self {
            SearchError::Transport(_) => "transport",
            SearchError::Validation(_) => "validation",
            SearchError::SchemaConflict { .. } => "schema_conflict",
            SearchError::NotFound(_) => "not_found",
            SearchError::Provider(_) => "provider",
            SearchError::Cancelled => "cancelled",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, SearchError::Transport(_))
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(error: reqwest::Error) -> Self {
        SearchError::Transport(error.to_string())
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(error: serde_json::Error) -> Self {
        SearchError::Validation(error.to_string())
    }
}
