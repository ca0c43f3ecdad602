//! The CouchDB manager: view synchronization and per-request connections.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use couch_store::{
    CouchError, CouchServer, DesignDocHook, Document, SyncOptions, ViewDefinition,
    sync_design_documents,
};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use mapping::DocumentModel;

use crate::context::{RequestContext, couch_session};
use crate::{CouchConfig, Result, ViewRegistry};

/// Work run against the live database after every successful sync.
pub type SyncCallback<D> = Box<dyn Fn(D) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Binds a CouchDB server to an axum application.
///
/// The manager is built once at startup: register document models and
/// standalone views, add sync callbacks, then share it behind an [`Arc`] and
/// call [`CouchDbManager::setup`] on the router. Every request then gets its
/// own database handle, and with auto-sync on, a sync pass before it.
///
/// Auto-sync is on by default, so each request pays a round-trip per design
/// document. Deployments that sync out of band should turn it off here or
/// through `COUCHDB_DISABLE_AUTO_SYNC`.
pub struct CouchDbManager<S: CouchServer> {
    server: S,
    config: CouchConfig,
    auto_sync: bool,
    registry: ViewRegistry,
    callbacks: Vec<SyncCallback<S::Database>>,
    design_doc_hook: Option<DesignDocHook>,
}

impl<S: CouchServer> CouchDbManager<S> {
    /// Creates a manager for `config.database` on `server`, with auto-sync on.
    pub fn new(server: S, config: CouchConfig) -> Self {
        Self {
            server,
            config,
            auto_sync: true,
            registry: ViewRegistry::new(),
            callbacks: Vec::new(),
            design_doc_hook: None,
        }
    }

    /// Sets whether every request runs a sync pass before binding its handle.
    pub fn with_auto_sync(mut self, auto_sync: bool) -> Self {
        self.auto_sync = auto_sync;
        self
    }

    /// Registers the views of a document model.
    pub fn add_document<M: DocumentModel>(mut self) -> Self {
        self.registry.add_document::<M>();
        self
    }

    /// Registers a standalone view definition.
    pub fn add_view_definition(mut self, view: ViewDefinition) -> Self {
        self.registry.add_view_definition(view);
        self
    }

    /// Registers several standalone view definitions.
    pub fn add_view_definitions(mut self, views: impl IntoIterator<Item = ViewDefinition>) -> Self {
        self.registry.add_view_definitions(views);
        self
    }

    /// Adds a callback run with the database after every sync.
    ///
    /// Callbacks should not depend on running in any particular order
    /// relative to each other. A failing callback fails the sync.
    pub fn on_sync<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(S::Database) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.callbacks.push(Box::new(move |db| callback(db).boxed()));
        self
    }

    /// Sets a hook that may modify each design document before it is written.
    pub fn on_design_doc_update<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Document) + Send + Sync + 'static,
    {
        self.design_doc_hook = Some(Arc::new(hook));
        self
    }

    pub fn registry(&self) -> &ViewRegistry {
        &self.registry
    }

    pub fn config(&self) -> &CouchConfig {
        &self.config
    }

    pub fn server(&self) -> &S {
        &self.server
    }

    /// Returns true if requests trigger a sync pass.
    pub fn auto_sync_enabled(&self) -> bool {
        self.auto_sync && !self.config.disable_auto_sync
    }

    /// Creates the database if needed, writes every registered view into its
    /// design document and runs the sync callbacks in registration order.
    ///
    /// Any error stops the pass where it happened: a database that cannot be
    /// created runs no view sync, and a failed design document write skips
    /// the remaining writes and every callback. Nothing is rolled back.
    #[tracing::instrument(skip(self), fields(database = %self.config.database))]
    pub async fn sync(&self) -> Result<S::Database> {
        let db = self.ensure_database().await?;

        let views: Vec<ViewDefinition> = self.registry.all_view_definitions().cloned().collect();
        let report = sync_design_documents(
            &db,
            &views,
            SyncOptions::exact(),
            self.design_doc_hook.as_ref(),
        )
        .await?;

        for callback in &self.callbacks {
            callback(db.clone()).await?;
            metrics::counter!("couchdb_sync_callbacks_run").increment(1);
        }

        metrics::counter!("couchdb_syncs_total").increment(1);
        tracing::info!(
            written = report.written.len(),
            unchanged = report.unchanged.len(),
            callbacks = self.callbacks.len(),
            "sync complete"
        );
        Ok(db)
    }

    async fn ensure_database(&self) -> Result<S::Database> {
        let name = self.config.database.as_str();
        if self.server.contains(name).await? {
            return Ok(self.server.database(name).await?);
        }

        match self.server.create(name).await {
            Ok(db) => {
                tracing::info!(database = name, "database created");
                Ok(db)
            }
            // Another request created it first.
            Err(CouchError::DatabaseExists(_)) => Ok(self.server.database(name).await?),
            Err(e) => Err(e.into()),
        }
    }

    /// Opens a handle to the configured database.
    ///
    /// Fails with `DatabaseNotFound` if the database has never been synced.
    pub async fn connect(&self) -> Result<S::Database> {
        Ok(self.server.database(&self.config.database).await?)
    }

    /// Runs at the start of each request: syncs when auto-sync is enabled,
    /// then binds a fresh handle into `context`.
    #[tracing::instrument(skip_all, fields(database = %self.config.database))]
    pub async fn request_start(&self, context: &RequestContext<S::Database>) -> Result<()> {
        if self.auto_sync_enabled() {
            self.sync().await?;
        }
        context.bind(self.connect().await?);
        metrics::counter!("couchdb_request_sessions").increment(1);
        Ok(())
    }

    /// Runs at the end of each request, whatever its outcome: drops the handle.
    pub fn request_end(&self, context: &RequestContext<S::Database>) {
        context.release();
    }

    /// Layers the per-request session onto `router`.
    ///
    /// Handlers reach the bound handle through the [`crate::Couch`] extractor.
    pub fn setup<St>(self: &Arc<Self>, router: Router<St>) -> Router<St>
    where
        St: Clone + Send + Sync + 'static,
    {
        router.layer(axum::middleware::from_fn_with_state(
            Arc::clone(self),
            couch_session::<S>,
        ))
    }
}
