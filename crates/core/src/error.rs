//! Core error types.

use thiserror::Error;

/// Errors raised by the core data model.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A payload could not be interpreted.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The span-fetch response carried no spans entry.
    #[error("event payload has no spans entry")]
    MissingSpansEntry,

    /// A node path segment did not match the segment grammar.
    #[error("invalid path segment: {0}")]
    InvalidPathSegment(String),

    /// Invariant violation inside the model itself.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
