//! Fetch-layer errors.

use thiserror::Error;
use tracelens_core::CoreError;

/// Errors surfaced by the fetch layer.
///
/// Cloneable so a deduplicated in-flight request can hand the same failure
/// to every awaiting caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The API collaborator failed (network, HTTP status, deserialization).
    #[error("trace api request failed: {0}")]
    Api(String),

    /// The fetched payload could not be merged into the tree.
    #[error("bad span payload: {0}")]
    Payload(String),

    /// The node carries no project/event identity to fetch with.
    #[error("node has no fetchable event")]
    NotFetchable,
}

impl From<CoreError> for FetchError {
    fn from(err: CoreError) -> Self {
        FetchError::Payload(err.to_string())
    }
}

/// Result type for fetch operations.
pub type Result<T> = std::result::Result<T, FetchError>;
