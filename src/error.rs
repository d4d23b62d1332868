//! Unified error type for the facade.
//!
//! The member crates each carry their own error enum; this module folds
//! them into one stable type so callers only match on a single surface.

use thiserror::Error;

/// All tracelens errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A payload could not be interpreted, or an internal invariant broke.
    #[error(transparent)]
    Model(#[from] tracelens_core::CoreError),

    /// A fetch failed or could not be attempted.
    #[error(transparent)]
    Fetch(#[from] tracelens_fetch::FetchError),
}

/// Result type alias for tracelens operations.
pub type Result<T> = std::result::Result<T, Error>;
