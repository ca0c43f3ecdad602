//! Object-document mapping for CouchDB.
//!
//! This crate maps plain serde types onto CouchDB documents:
//! - [`DocumentModel`] declares a model's document type and its views
//! - [`Record`] pairs a model value with its document id and revision and
//!   loads/stores it through any [`couch_store::CouchDatabase`]

pub mod error;
pub mod model;
pub mod record;

pub use error::{MappingError, Result};
pub use model::DocumentModel;
pub use record::Record;
