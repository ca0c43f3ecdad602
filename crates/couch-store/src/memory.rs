use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock as SyncRwLock;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::collation::{collate, collate_row};
use crate::{
    CouchDatabase, CouchError, CouchServer, DocId, Document, Result, Rev, Row, UpdateResult,
    ViewQuery, ViewResults,
};

/// Rust stand-in for a JavaScript map function: returns the `(key, value)`
/// pairs the map function would emit for a document.
pub type MapFn = Arc<dyn Fn(&Document) -> Vec<(Value, Value)> + Send + Sync>;

type Emulations = Arc<SyncRwLock<HashMap<(String, String), MapFn>>>;

/// Underscore-prefixed members CouchDB accepts in a document body.
const RESERVED_MEMBERS: &[&str] = &["_id", "_rev", "_deleted", "_attachments"];

#[derive(Default)]
struct DatabaseState {
    docs: BTreeMap<String, Document>,
}

/// In-memory CouchDB server for testing.
///
/// Stores databases and documents in memory and follows the server's
/// semantics for naming, revisions and conflicts. View map functions are
/// opaque server-side source, so views are evaluated with Rust emulations
/// registered through [`InMemoryServer::emulate_view`]; the design document
/// must still be synchronized before a view can be queried.
#[derive(Clone, Default)]
pub struct InMemoryServer {
    databases: Arc<RwLock<HashMap<String, Arc<RwLock<DatabaseState>>>>>,
    emulations: Emulations,
}

impl InMemoryServer {
    /// Creates a new empty in-memory server.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the Rust emulation of the map function of `design/view`.
    pub fn emulate_view<F>(&self, design: &str, view: &str, map: F)
    where
        F: Fn(&Document) -> Vec<(Value, Value)> + Send + Sync + 'static,
    {
        self.emulations
            .write()
            .insert((design.to_string(), view.to_string()), Arc::new(map));
    }

    /// Returns the number of databases on the server.
    pub async fn database_count(&self) -> usize {
        self.databases.read().await.len()
    }

    fn handle(&self, name: &str, state: Arc<RwLock<DatabaseState>>) -> InMemoryDatabase {
        InMemoryDatabase {
            name: name.to_string(),
            state,
            emulations: self.emulations.clone(),
        }
    }
}

/// Checks a database name against CouchDB's rule
/// `^[a-z][a-z0-9_$()+/-]*$`.
pub fn validate_database_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_first = chars.next().is_some_and(|c| c.is_ascii_lowercase());
    let valid_rest = chars.all(|c| {
        c.is_ascii_lowercase() || c.is_ascii_digit() || "_$()+/-".contains(c)
    });
    if valid_first && valid_rest {
        Ok(())
    } else {
        Err(CouchError::InvalidDatabaseName(name.to_string()))
    }
}

#[async_trait]
impl CouchServer for InMemoryServer {
    type Database = InMemoryDatabase;

    async fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.databases.read().await.contains_key(name))
    }

    async fn create(&self, name: &str) -> Result<InMemoryDatabase> {
        validate_database_name(name)?;
        let mut databases = self.databases.write().await;
        if databases.contains_key(name) {
            return Err(CouchError::DatabaseExists(name.to_string()));
        }
        let state = Arc::new(RwLock::new(DatabaseState::default()));
        databases.insert(name.to_string(), state.clone());
        Ok(self.handle(name, state))
    }

    async fn database(&self, name: &str) -> Result<InMemoryDatabase> {
        let databases = self.databases.read().await;
        let state = databases
            .get(name)
            .cloned()
            .ok_or_else(|| CouchError::DatabaseNotFound(name.to_string()))?;
        Ok(self.handle(name, state))
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.databases
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| CouchError::DatabaseNotFound(name.to_string()))
    }
}

/// Handle to a database of an [`InMemoryServer`].
#[derive(Clone)]
pub struct InMemoryDatabase {
    name: String,
    state: Arc<RwLock<DatabaseState>>,
    emulations: Emulations,
}

impl InMemoryDatabase {
    /// Returns the number of documents stored, design documents included.
    pub async fn document_count(&self) -> usize {
        self.state.read().await.docs.len()
    }

    fn save_locked(state: &mut DatabaseState, doc: &mut Document) -> Result<(DocId, Rev)> {
        if let Some(member) = doc
            .as_map()
            .keys()
            .find(|k| k.starts_with('_') && !RESERVED_MEMBERS.contains(&k.as_str()))
        {
            return Err(CouchError::BadRequest {
                reason: format!("Bad special document member: {member}"),
            });
        }

        let id = doc.id().unwrap_or_else(DocId::generate);
        let current = state.docs.get(id.as_str()).and_then(Document::rev);
        if current != doc.rev() {
            return Err(CouchError::Conflict { id: id.to_string() });
        }

        let rev = Rev::next(current.as_ref());
        doc.set_id(id.clone());
        doc.set_rev(rev.clone());
        state.docs.insert(id.to_string(), doc.clone());
        Ok((id, rev))
    }

    fn emulation(&self, design: &str, view: &str) -> Option<MapFn> {
        self.emulations
            .read()
            .get(&(design.to_string(), view.to_string()))
            .cloned()
    }
}

#[async_trait]
impl CouchDatabase for InMemoryDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.state.read().await.docs.get(id).cloned())
    }

    async fn save(&self, doc: &mut Document) -> Result<(DocId, Rev)> {
        let mut state = self.state.write().await;
        Self::save_locked(&mut state, doc)
    }

    async fn update(&self, docs: Vec<Document>) -> Result<Vec<UpdateResult>> {
        let mut state = self.state.write().await;
        let results = docs
            .into_iter()
            .map(|mut doc| match Self::save_locked(&mut state, &mut doc) {
                Ok((id, rev)) => UpdateResult {
                    id: id.to_string(),
                    rev: Some(rev.to_string()),
                    error: None,
                    reason: None,
                },
                Err(err) => UpdateResult {
                    id: doc.id().map(|id| id.to_string()).unwrap_or_default(),
                    rev: None,
                    error: Some(
                        match err {
                            CouchError::Conflict { .. } => "conflict",
                            _ => "doc_validation",
                        }
                        .to_string(),
                    ),
                    reason: Some(err.to_string()),
                },
            })
            .collect();
        Ok(results)
    }

    async fn delete(&self, doc: &Document) -> Result<()> {
        let id = doc
            .id()
            .ok_or_else(|| CouchError::InvalidDocument("document has no _id".to_string()))?;
        let mut state = self.state.write().await;
        let current = state
            .docs
            .get(id.as_str())
            .ok_or_else(|| CouchError::NotFound {
                reason: format!("missing document {id}"),
            })?;
        if current.rev() != doc.rev() {
            return Err(CouchError::Conflict { id: id.to_string() });
        }
        state.docs.remove(id.as_str());
        Ok(())
    }

    async fn query(&self, design: &str, view: &str, query: &ViewQuery) -> Result<ViewResults> {
        let not_found = || CouchError::ViewNotFound {
            design: design.to_string(),
            view: view.to_string(),
        };

        let state = self.state.read().await;
        let definition = state
            .docs
            .get(DocId::design(design).as_str())
            .and_then(|d| d.get("views"))
            .and_then(|views| views.get(view))
            .ok_or_else(not_found)?;
        if definition.get("reduce").is_some() && query.reduce != Some(false) {
            return Err(CouchError::Unsupported(format!(
                "reduce is not emulated for {design}/{view}; query with reduce=false"
            )));
        }
        let map = self.emulation(design, view).ok_or_else(|| {
            CouchError::Unsupported(format!("no map emulation registered for {design}/{view}"))
        })?;

        let mut rows: Vec<Row> = state
            .docs
            .iter()
            .filter(|(_, doc)| !doc.is_design())
            .flat_map(|(id, doc)| {
                map(doc).into_iter().map(move |(key, value)| Row {
                    id: Some(id.clone()),
                    key,
                    value,
                    doc: None,
                })
            })
            .collect();
        rows.sort_by(|a, b| collate_row((&a.key, a.id.as_deref()), (&b.key, b.id.as_deref())));
        if query.is_descending() {
            rows.reverse();
        }
        let total_rows = rows.len();

        let (first_index, selected) = select_rows(rows, query);
        let skip = query.skip.unwrap_or(0);
        let offset = first_index.map_or(total_rows, |i| (i + skip).min(total_rows));
        let include_docs = query.include_docs.unwrap_or(false);

        let rows = selected
            .into_iter()
            .skip(skip)
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|mut row| {
                if include_docs {
                    row.doc = row.id.as_deref().and_then(|id| state.docs.get(id)).cloned();
                }
                row
            })
            .collect();

        Ok(ViewResults {
            total_rows,
            offset,
            rows,
        })
    }
}

/// Applies key, `keys` and start/end bounds to rows already in traversal
/// order. Returns the index of the first selected row and the selection.
fn select_rows(rows: Vec<Row>, query: &ViewQuery) -> (Option<usize>, Vec<Row>) {
    if let Some(keys) = &query.keys {
        let selected = keys
            .iter()
            .flat_map(|key| {
                rows.iter()
                    .filter(move |row| collate(&row.key, key) == Ordering::Equal)
                    .cloned()
            })
            .collect();
        return (Some(0), selected);
    }

    let descending = query.is_descending();
    let inclusive_end = query.inclusive_end.unwrap_or(true);
    let bound = |row: &Row, key: &Value, doc_id: &Option<String>| {
        let ord = collate(&row.key, key);
        match doc_id {
            Some(doc_id) if ord == Ordering::Equal => row.id.as_deref().cmp(&Some(doc_id.as_str())),
            _ => ord,
        }
    };

    let mut first_index = None;
    let mut selected = Vec::new();
    for (index, row) in rows.into_iter().enumerate() {
        if let Some(start) = &query.start_key {
            let ord = bound(&row, start, &query.start_key_doc_id);
            let before_start = if descending {
                ord == Ordering::Greater
            } else {
                ord == Ordering::Less
            };
            if before_start {
                continue;
            }
        }
        if let Some(end) = &query.end_key {
            let ord = bound(&row, end, &query.end_key_doc_id);
            let past_end = match (descending, ord) {
                (_, Ordering::Equal) => !inclusive_end,
                (false, ord) => ord == Ordering::Greater,
                (true, ord) => ord == Ordering::Less,
            };
            if past_end {
                break;
            }
        }
        if let Some(key) = &query.key
            && collate(&row.key, key) != Ordering::Equal
        {
            continue;
        }
        first_index.get_or_insert(index);
        selected.push(row);
    }
    (first_index, selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CouchDatabaseExt, SyncOptions, ViewDefinition, sync_design_documents};
    use serde_json::json;

    async fn database() -> InMemoryDatabase {
        InMemoryServer::new().create("memory-tests").await.unwrap()
    }

    fn post(id: &str, author: &str) -> Document {
        let mut doc = Document::with_id(id);
        doc.insert("doc_type", "blogpost");
        doc.insert("author", author);
        doc
    }

    /// A database with a synced `blog/by_author` view and its emulation.
    async fn blog_database(posts: &[(&str, &str)]) -> InMemoryDatabase {
        let server = InMemoryServer::new();
        server.emulate_view("blog", "by_author", |doc| {
            vec![(doc.get("author").cloned().unwrap_or(Value::Null), Value::Null)]
        });
        let db = server.create("blog-tests").await.unwrap();
        let views = [ViewDefinition::new(
            "blog",
            "by_author",
            "function (doc) { emit(doc.author, null); }",
        )];
        sync_design_documents(&db, &views, SyncOptions::exact(), None)
            .await
            .unwrap();
        for (id, author) in posts {
            db.save(&mut post(id, author)).await.unwrap();
        }
        db
    }

    #[tokio::test]
    async fn create_and_lookup_databases() {
        let server = InMemoryServer::new();
        assert!(!server.contains("things").await.unwrap());

        server.create("things").await.unwrap();

        assert!(server.contains("things").await.unwrap());
        assert_eq!(server.database("things").await.unwrap().name(), "things");
        assert!(matches!(
            server.create("things").await,
            Err(CouchError::DatabaseExists(_))
        ));
    }

    #[tokio::test]
    async fn missing_database_is_an_error() {
        let server = InMemoryServer::new();
        assert!(matches!(
            server.database("nope").await,
            Err(CouchError::DatabaseNotFound(_))
        ));
    }

    #[tokio::test]
    async fn invalid_database_names_are_rejected() {
        let server = InMemoryServer::new();
        for name in ["", "Upper", "1abc", "has space"] {
            assert!(
                matches!(
                    server.create(name).await,
                    Err(CouchError::InvalidDatabaseName(_))
                ),
                "{name}"
            );
        }
        assert!(server.create("a-valid_name$(1)+/x").await.is_ok());
        assert_eq!(server.database_count().await, 1);
    }

    #[tokio::test]
    async fn save_assigns_id_and_rev() {
        let db = database().await;
        let mut doc = Document::new();
        doc.insert("title", "Hello");

        let (id, rev) = db.save(&mut doc).await.unwrap();

        assert_eq!(doc.id(), Some(id.clone()));
        assert_eq!(doc.rev(), Some(rev.clone()));
        assert_eq!(rev.generation(), Some(1));
        assert_eq!(db.get(id.as_str()).await.unwrap(), Some(doc));
    }

    #[tokio::test]
    async fn stale_revision_conflicts() {
        let db = database().await;
        let mut doc = Document::with_id("hello");
        db.save(&mut doc).await.unwrap();
        let mut stale = doc.clone();

        db.save(&mut doc).await.unwrap();
        let result = db.save(&mut stale).await;

        assert!(matches!(result, Err(CouchError::Conflict { .. })));
        assert_eq!(doc.rev().unwrap().generation(), Some(2));
    }

    #[tokio::test]
    async fn unknown_special_members_are_rejected() {
        let db = database().await;
        let mut doc = Document::with_id("x");
        doc.insert("_secret", 1);
        assert!(matches!(
            db.save(&mut doc).await,
            Err(CouchError::BadRequest { .. })
        ));
    }

    #[tokio::test]
    async fn missing_document_loads_as_none() {
        let db = database().await;
        assert!(db.get("goodbye").await.unwrap().is_none());
        assert!(!db.contains("goodbye").await.unwrap());
    }

    #[tokio::test]
    async fn bulk_update_reports_per_document() {
        let db = database().await;
        db.save(&mut Document::with_id("taken")).await.unwrap();

        let results = db
            .update(vec![Document::with_id("fresh"), Document::with_id("taken")])
            .await
            .unwrap();

        assert!(results[0].is_ok());
        assert_eq!(results[1].error.as_deref(), Some("conflict"));
        assert_eq!(db.document_count().await, 2);
    }

    #[tokio::test]
    async fn delete_requires_current_revision() {
        let db = database().await;
        let mut doc = Document::with_id("gone");
        db.save(&mut doc).await.unwrap();

        assert!(db.delete(&Document::with_id("gone")).await.is_err());
        db.delete(&doc).await.unwrap();
        assert!(db.get("gone").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn query_by_key() {
        let db = blog_database(&[("1", "A"), ("2", "A"), ("3", "B")]).await;

        let results = db
            .query("blog", "by_author", &ViewQuery::for_key("A"))
            .await
            .unwrap();

        assert_eq!(results.total_rows, 3);
        assert_eq!(results.len(), 2);
        assert!(results.rows.iter().all(|r| r.key == json!("A")));
    }

    #[tokio::test]
    async fn query_orders_by_key_then_id() {
        let db = blog_database(&[("3", "A"), ("1", "B"), ("2", "A")]).await;

        let results = db
            .query("blog", "by_author", &ViewQuery::new())
            .await
            .unwrap();
        let ids: Vec<_> = results.rows.iter().map(|r| r.id.clone().unwrap()).collect();
        assert_eq!(ids, ["2", "3", "1"]);

        let results = db
            .query("blog", "by_author", &ViewQuery::new().descending(true))
            .await
            .unwrap();
        let ids: Vec<_> = results.rows.iter().map(|r| r.id.clone().unwrap()).collect();
        assert_eq!(ids, ["1", "3", "2"]);
    }

    #[tokio::test]
    async fn start_key_doc_id_resumes_inside_a_key() {
        let db = blog_database(&[("1", "A"), ("2", "A"), ("3", "A"), ("4", "B")]).await;

        let query = ViewQuery::new()
            .start_key("A")
            .start_key_doc_id("2")
            .limit(2);
        let results = db.query("blog", "by_author", &query).await.unwrap();

        let ids: Vec<_> = results.rows.iter().map(|r| r.id.clone().unwrap()).collect();
        assert_eq!(ids, ["2", "3"]);
        assert_eq!(results.offset, 1);
    }

    #[tokio::test]
    async fn end_key_respects_inclusive_end() {
        let db = blog_database(&[("1", "A"), ("2", "B"), ("3", "C")]).await;

        let inclusive = db
            .query("blog", "by_author", &ViewQuery::for_range("A", "B"))
            .await
            .unwrap();
        assert_eq!(inclusive.len(), 2);

        let exclusive = db
            .query(
                "blog",
                "by_author",
                &ViewQuery::for_range("A", "B").inclusive_end(false),
            )
            .await
            .unwrap();
        assert_eq!(exclusive.len(), 1);
    }

    #[tokio::test]
    async fn keys_query_returns_rows_per_key_in_order() {
        let db = blog_database(&[("1", "A"), ("2", "B"), ("3", "C")]).await;

        let results = db
            .query(
                "blog",
                "by_author",
                &ViewQuery::new().keys(vec![json!("C"), json!("A")]),
            )
            .await
            .unwrap();

        let keys: Vec<_> = results.rows.iter().map(|r| r.key.clone()).collect();
        assert_eq!(keys, [json!("C"), json!("A")]);
    }

    #[tokio::test]
    async fn include_docs_attaches_documents() {
        let db = blog_database(&[("1", "A")]).await;

        let results = db
            .query("blog", "by_author", &ViewQuery::new().include_docs(true))
            .await
            .unwrap();

        let doc = results.rows[0].doc.as_ref().unwrap();
        assert_eq!(doc.get("author"), Some(&json!("A")));
    }

    #[tokio::test]
    async fn unsynced_view_is_not_found() {
        let db = database().await;
        let result = db.query("blog", "by_author", &ViewQuery::new()).await;
        assert!(matches!(result, Err(CouchError::ViewNotFound { .. })));
    }

    #[tokio::test]
    async fn view_without_emulation_is_unsupported() {
        let db = database().await;
        let views = [ViewDefinition::new("tests", "all", "function (doc) {}")];
        sync_design_documents(&db, &views, SyncOptions::exact(), None)
            .await
            .unwrap();

        let result = db.query("tests", "all", &ViewQuery::new()).await;
        assert!(matches!(result, Err(CouchError::Unsupported(_))));
    }
}
