//! The document model trait.

use couch_store::ViewDefinition;
use serde::{Serialize, de::DeserializeOwned};

/// Trait for types stored as CouchDB documents.
///
/// A model is a plain serde type; its fields are the document's fields and
/// their Rust types are the field constraints. `_id`, `_rev` and `doc_type`
/// are managed by [`crate::Record`] and must not be declared on the model.
///
/// Views belonging to a model are listed explicitly by
/// [`DocumentModel::view_definitions`], so registering the model registers
/// them too.
pub trait DocumentModel: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Returns the value written to the document's `doc_type` member.
    ///
    /// Map functions use it to pick out documents of this kind. `None`
    /// leaves the member unset.
    fn doc_type() -> Option<&'static str> {
        None
    }

    /// Returns every view defined for this model, in declaration order.
    fn view_definitions() -> Vec<ViewDefinition> {
        Vec::new()
    }

    /// Returns the view with the given name.
    fn view(name: &str) -> Option<ViewDefinition> {
        Self::view_definitions()
            .into_iter()
            .find(|view| view.name() == name)
    }
}
