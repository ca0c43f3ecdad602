use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a document stored in a CouchDB database.
///
/// Wraps the raw `_id` string so document identifiers are not mixed up
/// with revisions or database names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(String);

impl DocId {
    /// Prefix shared by every design document identifier.
    pub const DESIGN_PREFIX: &'static str = "_design/";

    /// Creates a new random document ID (32 lowercase hex characters).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Creates a document ID from an existing string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier of the design document with the given name.
    pub fn design(name: &str) -> Self {
        Self(format!("{}{}", Self::DESIGN_PREFIX, name))
    }

    /// Returns true if this identifies a design document.
    pub fn is_design(&self) -> bool {
        self.0.starts_with(Self::DESIGN_PREFIX)
    }

    /// Returns the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DocId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for DocId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Revision token of a stored document (`N-<hash>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rev(String);

impl Rev {
    /// Creates a revision from its string form.
    pub fn new(rev: impl Into<String>) -> Self {
        Self(rev.into())
    }

    /// Returns the revision that follows `previous` (or the first revision).
    pub fn next(previous: Option<&Rev>) -> Self {
        let generation = previous.and_then(Rev::generation).unwrap_or(0) + 1;
        Self(format!("{generation}-{}", Uuid::new_v4().simple()))
    }

    /// Returns the numeric generation prefix, if the revision is well formed.
    pub fn generation(&self) -> Option<u64> {
        self.0.split_once('-').and_then(|(n, _)| n.parse().ok())
    }

    /// Returns the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Rev {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Rev {
    fn from(rev: &str) -> Self {
        Self(rev.to_string())
    }
}

impl From<String> for Rev {
    fn from(rev: String) -> Self {
        Self(rev)
    }
}
