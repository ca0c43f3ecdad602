//! Manager error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use couch_store::CouchError;
use mapping::MappingError;
use thiserror::Error;

/// Errors raised while synchronizing, binding connections or paginating.
///
/// Database client errors pass through unchanged; nothing here retries.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// An error from the database client.
    #[error(transparent)]
    Couch(#[from] CouchError),

    /// An error mapping documents onto models.
    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// A pagination cursor could not be decoded.
    #[error("Invalid pagination cursor: {0}")]
    InvalidCursor(String),

    /// A page must hold at least one item.
    #[error("Page size must be at least 1")]
    InvalidPageSize,

    /// No database handle is bound to the current request.
    #[error("No CouchDB connection is bound to this request")]
    NotBound,
}

/// Result type for manager operations.
pub type Result<T> = std::result::Result<T, ManagerError>;

impl IntoResponse for ManagerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ManagerError::InvalidCursor(_) | ManagerError::InvalidPageSize => {
                StatusCode::BAD_REQUEST
            }
            _ => {
                tracing::error!(error = %self, "couchdb request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
