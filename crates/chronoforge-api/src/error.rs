//! Error types for the API layer.
//!
//! [`ApiError`] unifies all failure modes into a single enum that can be
//! converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.
//! Malformed caller input maps to 400, backend unavailability to 503, and
//! record-level serialization failures to 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chronoforge_core::DeterminismError;
use chronoforge_store::StoreError;

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// An entity identifier could not be parsed from the request path.
    #[error("invalid entity id: {0}")]
    InvalidEntityId(String),

    /// A query or header parameter was malformed.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A deterministic seed was malformed or unrepresentable.
    #[error("invalid seed: {0}")]
    InvalidSeed(String),

    /// The event store reported a failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<DeterminismError> for ApiError {
    fn from(err: DeterminismError) -> Self {
        Self::InvalidSeed(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::InvalidEntityId(msg) | Self::InvalidQuery(msg) | Self::InvalidSeed(msg) => {
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            Self::Store(store) => match store {
                StoreError::Backend(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
                StoreError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                StoreError::Serialization(e) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, format!("JSON error: {e}"))
                }
            },
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
