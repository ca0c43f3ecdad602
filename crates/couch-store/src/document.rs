use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{CouchError, DocId, Result, Rev};

/// A JSON document as stored in CouchDB.
///
/// The `_id` and `_rev` members are kept inside the object, exactly as the
/// server sends and expects them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    /// Creates an empty document without an id.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty document with the given id.
    pub fn with_id(id: impl Into<DocId>) -> Self {
        let mut doc = Self::new();
        doc.set_id(id.into());
        doc
    }

    /// Converts an arbitrary JSON value into a document.
    ///
    /// Fails unless the value is a JSON object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(CouchError::InvalidDocument(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }

    /// Returns the document id, if set.
    pub fn id(&self) -> Option<DocId> {
        self.0.get("_id").and_then(Value::as_str).map(DocId::from)
    }

    /// Sets the document id.
    pub fn set_id(&mut self, id: DocId) {
        self.0.insert("_id".to_string(), Value::String(id.to_string()));
    }

    /// Returns the current revision, if the document has been stored.
    pub fn rev(&self) -> Option<Rev> {
        self.0.get("_rev").and_then(Value::as_str).map(Rev::from)
    }

    /// Sets the revision.
    pub fn set_rev(&mut self, rev: Rev) {
        self.0.insert("_rev".to_string(), Value::String(rev.to_string()));
    }

    /// Returns the `doc_type` member used to tell mapped document kinds apart.
    pub fn doc_type(&self) -> Option<&str> {
        self.0.get("doc_type").and_then(Value::as_str)
    }

    /// Returns true if this is a design document.
    pub fn is_design(&self) -> bool {
        self.id().is_some_and(|id| id.is_design())
    }

    /// Returns a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Returns a mutable reference to a field value.
    pub fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.0.get_mut(field)
    }

    /// Sets a field, returning the previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    /// Removes a field, returning its value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    /// Returns the underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the document, returning the JSON object.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Consumes the document, returning it as a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn id_and_rev_live_in_the_object() {
        let mut doc = Document::with_id("hello");
        doc.set_rev(Rev::new("1-abc"));
        assert_eq!(doc.id(), Some(DocId::new("hello")));
        assert_eq!(doc.rev(), Some(Rev::new("1-abc")));
        assert_eq!(doc.into_value(), json!({"_id": "hello", "_rev": "1-abc"}));
    }

    #[test]
    fn from_value_rejects_non_objects() {
        assert!(Document::from_value(json!([1, 2])).is_err());
        assert!(Document::from_value(json!({"a": 1})).is_ok());
    }

    #[test]
    fn design_detection() {
        assert!(Document::with_id(DocId::design("blog")).is_design());
        assert!(!Document::with_id("post").is_design());
        assert!(!Document::new().is_design());
    }
}
