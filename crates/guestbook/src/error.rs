//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use couch_store::CouchError;
use manager::ManagerError;
use mapping::MappingError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Session, sync or pagination failure.
    Manager(ManagerError),
    /// A stored document did not fit its model.
    Mapping(MappingError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Manager(err) => return err.into_response(),
            ApiError::Mapping(err) => mapping_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn mapping_error_to_response(err: MappingError) -> (StatusCode, String) {
    match &err {
        MappingError::Couch(CouchError::Conflict { .. }) => (StatusCode::CONFLICT, err.to_string()),
        _ => {
            tracing::error!(error = %err, "internal server error");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<ManagerError> for ApiError {
    fn from(err: ManagerError) -> Self {
        ApiError::Manager(err)
    }
}

impl From<MappingError> for ApiError {
    fn from(err: MappingError) -> Self {
        ApiError::Mapping(err)
    }
}

impl From<CouchError> for ApiError {
    fn from(err: CouchError) -> Self {
        ApiError::Manager(ManagerError::Couch(err))
    }
}
