use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{DocId, Document, Result, Rev, ViewQuery, ViewResults};

/// Outcome of writing one document in a bulk update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateResult {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl UpdateResult {
    /// Returns true if the document was written.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Handle to a CouchDB server.
///
/// Handles are cheap to clone and safe to share between tasks.
#[async_trait]
pub trait CouchServer: Clone + Send + Sync + 'static {
    /// The database handle type produced by this server.
    type Database: CouchDatabase;

    /// Returns true if a database with this name exists.
    async fn contains(&self, name: &str) -> Result<bool>;

    /// Creates a database and returns a handle to it.
    ///
    /// Fails with `DatabaseExists` if it already exists and with
    /// `InvalidDatabaseName`/`Unauthorized` if the server refuses it.
    async fn create(&self, name: &str) -> Result<Self::Database>;

    /// Returns a handle to an existing database.
    ///
    /// Fails with `DatabaseNotFound` if the database does not exist.
    async fn database(&self, name: &str) -> Result<Self::Database>;

    /// Deletes a database.
    async fn delete(&self, name: &str) -> Result<()>;
}

/// Handle to a single CouchDB database.
///
/// Handles are cheap to clone and safe to share between tasks.
#[async_trait]
pub trait CouchDatabase: Clone + Send + Sync + 'static {
    /// Returns the database name.
    fn name(&self) -> &str;

    /// Loads a document by id.
    ///
    /// A missing document is reported as `Ok(None)`, not as an error.
    async fn get(&self, id: &str) -> Result<Option<Document>>;

    /// Stores a document.
    ///
    /// A document without `_id` receives a generated one. On success the
    /// new `_id` and `_rev` are written back into `doc`. A stale or missing
    /// `_rev` for an existing document fails with `Conflict`.
    async fn save(&self, doc: &mut Document) -> Result<(DocId, Rev)>;

    /// Stores several documents in one request.
    ///
    /// Failures are reported per document in the returned results.
    async fn update(&self, docs: Vec<Document>) -> Result<Vec<UpdateResult>>;

    /// Deletes a document at its current revision.
    async fn delete(&self, doc: &Document) -> Result<()>;

    /// Runs the view `design/view` with the given query.
    async fn query(&self, design: &str, view: &str, query: &ViewQuery) -> Result<ViewResults>;
}

/// Extension trait providing convenience methods for databases.
#[async_trait]
pub trait CouchDatabaseExt: CouchDatabase {
    /// Checks if a document exists.
    async fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.get(id).await?.is_some())
    }

    /// Loads a design document by its short name.
    async fn design_document(&self, design: &str) -> Result<Option<Document>> {
        self.get(DocId::design(design).as_str()).await
    }
}

// Blanket implementation for all CouchDatabase implementations
impl<T: CouchDatabase + ?Sized> CouchDatabaseExt for T {}
