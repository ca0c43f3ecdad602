//! Guestbook document models.

use chrono::{DateTime, Utc};
use couch_store::{ViewDefinition, ViewQuery};
use mapping::DocumentModel;
use serde::{Deserialize, Serialize};

/// A signature left in the guestbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub message: String,
    pub author: String,
    #[serde(default = "Utc::now", with = "timestamp")]
    pub time: DateTime<Utc>,
}

/// Stores times with a fixed number of fractional digits so that the
/// string keys emitted by views sort chronologically.
mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

    pub fn serialize<S: Serializer>(
        time: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&time.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|time| time.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

impl Signature {
    /// Creates a signature stamped with the current time.
    pub fn new(message: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            author: author.into(),
            time: Utc::now(),
        }
    }

    /// `guestbook/all`: every signature keyed by time, newest first.
    pub fn all() -> ViewDefinition {
        ViewDefinition::new(
            "guestbook",
            "all",
            "
            function (doc) {
                if (doc.doc_type == 'signature') {
                    emit(doc.time, doc);
                };
            }",
        )
        .with_defaults(ViewQuery::new().descending(true))
    }
}

impl DocumentModel for Signature {
    fn doc_type() -> Option<&'static str> {
        Some("signature")
    }

    fn view_definitions() -> Vec<ViewDefinition> {
        vec![Self::all()]
    }
}
