//! Request-scoped CouchDB connections and view synchronization.
//!
//! This crate binds the CouchDB client to an axum application:
//! - [`ViewRegistry`] collects view definitions from models and standalone sources
//! - [`CouchDbManager`] synchronizes them into design documents and runs sync callbacks
//! - [`RequestContext`] and the [`Couch`] extractor hand each request its own
//!   database handle, bound by the [`couch_session`] middleware
//! - [`paginate`] slices view results into pages with opaque cursor tokens

pub mod config;
pub mod context;
pub mod error;
pub mod manager;
pub mod pagination;
pub mod registry;

pub use config::CouchConfig;
pub use context::{Couch, RequestContext, couch_session};
pub use error::{ManagerError, Result};
pub use manager::{CouchDbManager, SyncCallback};
pub use pagination::{Page, paginate, paginate_with};
pub use registry::ViewRegistry;
