//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while decoding metadata micro-formats.
///
/// Both variants are local-input validation failures. They are surfaced
/// to the caller immediately and never retried or suppressed here; the
/// recovery strategy (skip the record, abort ingestion, log and move on)
/// belongs to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Mutation payload violates the length-prefixed xattr format.
    #[error("malformed mutation payload: {message}")]
    MalformedPayload {
        /// Description of the format violation.
        message: String,
    },

    /// CAS text is not `0x` followed by exactly 16 hex digits.
    #[error("invalid CAS format: {message}")]
    InvalidCasFormat {
        /// Description of the format violation.
        message: String,
    },
}

impl CodecError {
    /// Creates a malformed payload error.
    pub fn malformed_payload(message: impl Into<String>) -> Self {
        Self::MalformedPayload {
            message: message.into(),
        }
    }

    /// Creates an invalid CAS format error.
    pub fn invalid_cas_format(message: impl Into<String>) -> Self {
        Self::InvalidCasFormat {
            message: message.into(),
        }
    }
}
