//! Mapping error types.

use couch_store::CouchError;
use thiserror::Error;

/// Errors that can occur while mapping documents to models.
#[derive(Debug, Error)]
pub enum MappingError {
    /// An error from the database client, passed through unchanged.
    #[error(transparent)]
    Couch(#[from] CouchError),

    /// A document field does not satisfy the model's declared type.
    #[error("Malformed field value for {model}: {source}")]
    MalformedField {
        model: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The model or row does not map to a JSON object.
    #[error("{model} does not map to a JSON object")]
    NotAnObject { model: &'static str },
}

/// Result type for mapping operations.
pub type Result<T> = std::result::Result<T, MappingError>;
