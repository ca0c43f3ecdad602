//! Model values paired with their document identity.

use std::ops::{Deref, DerefMut};

use common::{DocId, Rev};
use couch_store::{BoundView, CouchDatabase, Document, Row, ViewQuery};
use serde_json::Value;

use crate::{DocumentModel, MappingError, Result};

/// A model value together with the id and revision of its document.
///
/// Dereferences to the model, so fields read as `record.title`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<M> {
    id: Option<DocId>,
    rev: Option<Rev>,
    data: M,
}

impl<M> Deref for Record<M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.data
    }
}

impl<M> DerefMut for Record<M> {
    fn deref_mut(&mut self) -> &mut M {
        &mut self.data
    }
}

impl<M: DocumentModel> Record<M> {
    /// Wraps a new, never stored model value. An id is assigned on store.
    pub fn new(data: M) -> Self {
        Self {
            id: None,
            rev: None,
            data,
        }
    }

    /// Wraps a new model value that will be stored under `id`.
    pub fn with_id(id: impl Into<DocId>, data: M) -> Self {
        Self {
            id: Some(id.into()),
            rev: None,
            data,
        }
    }

    pub fn id(&self) -> Option<&DocId> {
        self.id.as_ref()
    }

    /// Sets the id a not-yet-stored record will be saved under.
    pub fn set_id(&mut self, id: impl Into<DocId>) {
        self.id = Some(id.into());
    }

    pub fn rev(&self) -> Option<&Rev> {
        self.rev.as_ref()
    }

    pub fn data(&self) -> &M {
        &self.data
    }

    pub fn into_inner(self) -> M {
        self.data
    }

    /// Builds the document for this record, including `doc_type`.
    pub fn to_document(&self) -> Result<Document> {
        let model = std::any::type_name::<M>();
        let value = serde_json::to_value(&self.data)
            .map_err(|source| MappingError::MalformedField { model, source })?;
        let mut doc = Document::from_value(value).map_err(|_| MappingError::NotAnObject { model })?;

        if let Some(id) = &self.id {
            doc.set_id(id.clone());
        }
        if let Some(rev) = &self.rev {
            doc.set_rev(rev.clone());
        }
        if let Some(doc_type) = M::doc_type() {
            doc.insert("doc_type", doc_type);
        }
        Ok(doc)
    }

    /// Maps a stored document onto the model.
    ///
    /// Fails with `MalformedField` if a field does not fit the model's type.
    pub fn from_document(doc: Document) -> Result<Self> {
        let id = doc.id();
        let rev = doc.rev();
        let mut fields = doc.into_map();
        fields.remove("_id");
        fields.remove("_rev");
        if M::doc_type().is_some() {
            fields.remove("doc_type");
        }

        let data = serde_json::from_value(Value::Object(fields)).map_err(|source| {
            MappingError::MalformedField {
                model: std::any::type_name::<M>(),
                source,
            }
        })?;
        Ok(Self { id, rev, data })
    }

    /// Maps a view row onto the model.
    ///
    /// Uses the row's attached document when present, otherwise its value
    /// (views that `emit(key, doc)`). The row id fills in a missing `_id`.
    pub fn from_row(row: Row) -> Result<Self> {
        let mut doc = match row.doc {
            Some(doc) => doc,
            None => Document::from_value(row.value).map_err(|_| MappingError::NotAnObject {
                model: std::any::type_name::<M>(),
            })?,
        };
        if doc.id().is_none()
            && let Some(id) = row.id
        {
            doc.set_id(DocId::from(id));
        }
        Self::from_document(doc)
    }

    /// Maps every row of a view result onto the model.
    pub fn from_rows(rows: impl IntoIterator<Item = Row>) -> Result<Vec<Self>> {
        rows.into_iter().map(Self::from_row).collect()
    }

    /// Loads the document with `id`.
    ///
    /// A document that does not exist is `Ok(None)`, not an error.
    #[tracing::instrument(skip(db), fields(database = %db.name(), model = std::any::type_name::<M>()))]
    pub async fn load<D: CouchDatabase>(db: &D, id: &str) -> Result<Option<Self>> {
        match db.get(id).await? {
            Some(doc) => Self::from_document(doc).map(Some),
            None => Ok(None),
        }
    }

    /// Stores the record, creating or updating its document.
    ///
    /// On success the record carries the document's id and new revision.
    #[tracing::instrument(skip(self, db), fields(database = %db.name(), model = std::any::type_name::<M>()))]
    pub async fn store<D: CouchDatabase>(&mut self, db: &D) -> Result<DocId> {
        let mut doc = self.to_document()?;
        let (id, rev) = db.save(&mut doc).await?;
        self.id = Some(id.clone());
        self.rev = Some(rev);
        Ok(id)
    }

    /// Runs a view and maps its rows onto the model.
    pub async fn query<D: CouchDatabase>(
        view: &BoundView<'_, D>,
        query: ViewQuery,
    ) -> Result<Vec<Self>> {
        let results = view.query(query).await?;
        Self::from_rows(results)
    }
}
