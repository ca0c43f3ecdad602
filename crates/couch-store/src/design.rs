//! Pushing view definitions into design documents.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::{CouchDatabase, DocId, Document, Result, ViewDefinition};

/// Hook invoked with each pending design document right before it is written.
///
/// The hook may mutate the document, e.g. to add validation functions or
/// other non-view members.
pub type DesignDocHook = Arc<dyn Fn(&mut Document) + Send + Sync>;

/// Options controlling a design-document synchronization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Drop views that exist on the server but are no longer defined.
    pub remove_missing: bool,
}

impl SyncOptions {
    /// Options that leave unknown server-side views alone.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options that make each design document hold exactly the given views.
    pub fn exact() -> Self {
        Self {
            remove_missing: true,
        }
    }
}

/// What a synchronization pass did to each design document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Design documents that were created or updated.
    pub written: Vec<DocId>,
    /// Design documents that already matched and were left alone.
    pub unchanged: Vec<DocId>,
}

/// Synchronizes view definitions into their design documents.
///
/// Definitions are grouped by design name in order of first appearance.
/// Each design document is loaded (or started fresh), its views replaced by
/// the registered ones, passed through `hook`, and saved only if it differs
/// from what the server already holds. The first failing write aborts the
/// pass; earlier writes are not rolled back.
#[tracing::instrument(skip_all, fields(database = %db.name(), views = views.len()))]
pub async fn sync_design_documents<D: CouchDatabase>(
    db: &D,
    views: &[ViewDefinition],
    options: SyncOptions,
    hook: Option<&DesignDocHook>,
) -> Result<SyncReport> {
    let mut by_design: IndexMap<&str, Vec<&ViewDefinition>> = IndexMap::new();
    for view in views {
        by_design.entry(view.design()).or_default().push(view);
    }

    let mut report = SyncReport::default();
    for (design, views) in by_design {
        let doc_id = DocId::design(design);
        let existing = db.get(doc_id.as_str()).await?;
        let mut doc = existing
            .clone()
            .unwrap_or_else(|| Document::with_id(doc_id.clone()));

        apply_views(&mut doc, &views, options);
        if let Some(hook) = hook {
            hook(&mut doc);
        }

        if existing.as_ref() == Some(&doc) {
            tracing::debug!(design_doc = %doc_id, "design document unchanged");
            report.unchanged.push(doc_id);
            continue;
        }

        db.save(&mut doc).await?;
        tracing::info!(design_doc = %doc_id, "design document written");
        metrics::counter!("couchdb_design_docs_written").increment(1);
        report.written.push(doc_id);
    }

    Ok(report)
}

fn apply_views(doc: &mut Document, views: &[&ViewDefinition], options: SyncOptions) {
    let mut entries = match doc.remove("views") {
        Some(Value::Object(map)) if !options.remove_missing => map,
        _ => Map::new(),
    };
    for view in views {
        entries.insert(view.name().to_string(), view.to_view_json());
        // A design document has a single language; the last view wins.
        doc.insert("language", view.language());
    }
    doc.insert("views", Value::Object(entries));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CouchDatabaseExt, CouchServer, InMemoryServer};
    use serde_json::json;

    fn blog_views() -> Vec<ViewDefinition> {
        vec![
            ViewDefinition::new("blog", "all_posts", "function (doc) { emit(doc._id, doc); }"),
            ViewDefinition::new("blog", "by_author", "function (doc) { emit(doc.author, doc); }"),
            ViewDefinition::new("tests", "active", "function (doc) { emit(doc.username, null); }"),
        ]
    }

    async fn database() -> crate::InMemoryDatabase {
        InMemoryServer::new().create("design-tests").await.unwrap()
    }

    #[tokio::test]
    async fn creates_one_design_document_per_design_name() {
        let db = database().await;

        let report = sync_design_documents(&db, &blog_views(), SyncOptions::exact(), None)
            .await
            .unwrap();

        assert_eq!(
            report.written,
            vec![DocId::design("blog"), DocId::design("tests")]
        );
        let blog = db.design_document("blog").await.unwrap().unwrap();
        assert_eq!(blog.get("language"), Some(&json!("javascript")));
        let views = blog.get("views").unwrap().as_object().unwrap();
        assert!(views.contains_key("all_posts"));
        assert!(views.contains_key("by_author"));
    }

    #[tokio::test]
    async fn second_pass_is_a_no_op() {
        let db = database().await;
        sync_design_documents(&db, &blog_views(), SyncOptions::exact(), None)
            .await
            .unwrap();
        let rev = db.design_document("blog").await.unwrap().unwrap().rev();

        let report = sync_design_documents(&db, &blog_views(), SyncOptions::exact(), None)
            .await
            .unwrap();

        assert!(report.written.is_empty());
        assert_eq!(report.unchanged.len(), 2);
        assert_eq!(db.design_document("blog").await.unwrap().unwrap().rev(), rev);
    }

    #[tokio::test]
    async fn changed_map_function_is_rewritten() {
        let db = database().await;
        sync_design_documents(&db, &blog_views(), SyncOptions::exact(), None)
            .await
            .unwrap();

        let changed = vec![ViewDefinition::new(
            "blog",
            "by_author",
            "function (doc) { emit(doc.author, null); }",
        )];
        let report = sync_design_documents(&db, &changed, SyncOptions::new(), None)
            .await
            .unwrap();

        assert_eq!(report.written, vec![DocId::design("blog")]);
        let blog = db.design_document("blog").await.unwrap().unwrap();
        assert_eq!(
            blog.get("views").unwrap()["by_author"]["map"],
            json!("function (doc) { emit(doc.author, null); }")
        );
        // Without remove_missing the other view survives.
        assert!(blog.get("views").unwrap().get("all_posts").is_some());
    }

    #[tokio::test]
    async fn exact_sync_drops_stale_views() {
        let db = database().await;
        sync_design_documents(&db, &blog_views(), SyncOptions::exact(), None)
            .await
            .unwrap();

        let only_all = vec![blog_views().remove(0)];
        sync_design_documents(&db, &only_all, SyncOptions::exact(), None)
            .await
            .unwrap();

        let blog = db.design_document("blog").await.unwrap().unwrap();
        let views = blog.get("views").unwrap().as_object().unwrap();
        assert_eq!(views.len(), 1);
        assert!(views.contains_key("all_posts"));
    }

    #[tokio::test]
    async fn hook_mutations_are_persisted() {
        let db = database().await;
        let hook: DesignDocHook = Arc::new(|doc: &mut Document| {
            doc.insert("validate_doc_update", "function (newDoc) {}");
        });

        sync_design_documents(&db, &blog_views(), SyncOptions::exact(), Some(&hook))
            .await
            .unwrap();

        let tests = db.design_document("tests").await.unwrap().unwrap();
        assert_eq!(
            tests.get("validate_doc_update"),
            Some(&json!("function (newDoc) {}"))
        );
    }
}
