use thiserror::Error;

/// Errors that can occur when talking to a CouchDB server.
#[derive(Debug, Error)]
pub enum CouchError {
    /// The server could not be reached (connection refused, DNS, timeout).
    #[error("CouchDB server unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    /// The server answered with a body that could not be decoded.
    #[error("Malformed response from CouchDB: {0}")]
    InvalidResponse(#[source] reqwest::Error),

    /// The named database does not exist on the server.
    #[error("Database not found: {0}")]
    DatabaseNotFound(String),

    /// A database with this name already exists.
    #[error("Database already exists: {0}")]
    DatabaseExists(String),

    /// The database name violates CouchDB naming rules.
    #[error("Invalid database name: {0}")]
    InvalidDatabaseName(String),

    /// The server refused the operation for lack of credentials or permissions.
    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    /// A document write lost a race against a concurrent update.
    #[error("Document update conflict for {id}")]
    Conflict { id: String },

    /// The design document or the view inside it does not exist.
    #[error("View not found: {design}/{view}")]
    ViewNotFound { design: String, view: String },

    /// Any other resource the server reported as missing.
    #[error("Not found: {reason}")]
    NotFound { reason: String },

    /// The server rejected the request as malformed.
    #[error("Bad request: {reason}")]
    BadRequest { reason: String },

    /// Any other non-success response.
    #[error("CouchDB error {status} ({error}): {reason}")]
    Server {
        status: u16,
        error: String,
        reason: String,
    },

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The server URL could not be parsed or extended.
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// A document was rejected before it reached the server.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// The backend cannot perform the requested operation.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl From<reqwest::Error> for CouchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CouchError::InvalidResponse(err)
        } else {
            CouchError::Unreachable(err)
        }
    }
}

/// Result type for CouchDB operations.
pub type Result<T> = std::result::Result<T, CouchError>;
