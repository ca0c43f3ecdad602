//! CouchDB client boundary.
//!
//! This crate provides everything the integration layer consumes from a
//! document database:
//! - [`CouchServer`] / [`CouchDatabase`] traits for server and database handles
//! - [`Document`], [`ViewDefinition`], [`ViewQuery`] and view rows
//! - [`sync_design_documents`] for pushing view definitions into design documents
//! - An in-memory backend for tests and an HTTP backend for a real CouchDB server

pub mod collation;
pub mod design;
pub mod document;
pub mod error;
pub mod http;
pub mod memory;
pub mod query;
pub mod store;
pub mod view;

pub use common::{DocId, Rev};
pub use design::{DesignDocHook, SyncOptions, SyncReport, sync_design_documents};
pub use document::Document;
pub use error::{CouchError, Result};
pub use http::{HttpDatabase, HttpServer};
pub use memory::{InMemoryDatabase, InMemoryServer, MapFn};
pub use query::ViewQuery;
pub use store::{CouchDatabase, CouchDatabaseExt, CouchServer, UpdateResult};
pub use view::{BoundView, Row, ViewDefinition, ViewResults};
