//! Identifier types shared by the CouchDB integration crates.

pub mod types;

pub use types::{DocId, Rev};
