//! Error types for the query crate.

use thiserror::Error;

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors surfaced by query dispatch and result iteration.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Declarative query requested against a bucket that has no
    /// declarative query engine.
    #[error("unsupported backend: {message}")]
    UnsupportedBackend {
        /// Description of the missing capability.
        message: String,
    },

    /// Failure reported by a backend engine, passed through unmodified.
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Row bytes could not be deserialized into the requested type.
    #[error("row decode error: {0}")]
    RowDecode(#[from] serde_json::Error),
}

impl QueryError {
    /// Creates an unsupported backend error.
    pub fn unsupported_backend(message: impl Into<String>) -> Self {
        Self::UnsupportedBackend {
            message: message.into(),
        }
    }

    /// Wraps a backend engine failure.
    pub fn backend(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Backend(err.into())
    }
}
