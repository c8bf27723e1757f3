//! Error types for the event store layer.
//!
//! All store operations report failures through [`StoreError`]. Idempotent
//! duplicates are deliberately NOT errors: re-appending identical content is
//! absorbed silently by every backend.

/// Errors that can occur in an event store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A payload or clock could not be encoded or decoded.
    ///
    /// Fatal for the single record involved; never corrupts other records.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing store is unreachable or rejected the operation.
    ///
    /// An append that surfaces this error has NOT been durably recorded.
    #[error("backend error: {0}")]
    Backend(String),

    /// The caller supplied input the store cannot act on.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl StoreError {
    /// Wrap an arbitrary backend failure.
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}
