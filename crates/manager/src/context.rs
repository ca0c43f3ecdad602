//! Per-request database handles for axum handlers.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use couch_store::{CouchDatabase, CouchServer};
use parking_lot::Mutex;

use crate::{CouchDbManager, ManagerError, Result};

/// Slot holding the database handle of one request.
///
/// The session middleware creates a fresh context for every request and
/// places it in the request extensions. Clones share the same slot.
pub struct RequestContext<D> {
    slot: Arc<Mutex<Option<D>>>,
}

impl<D> Clone for RequestContext<D> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<D> Default for RequestContext<D> {
    fn default() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }
}

impl<D: CouchDatabase> RequestContext<D> {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `db` as this request's handle, replacing any previous one.
    pub fn bind(&self, db: D) {
        tracing::debug!(database = db.name(), "bound request connection");
        *self.slot.lock() = Some(db);
    }

    /// Returns the bound handle, if any.
    pub fn database(&self) -> Option<D> {
        self.slot.lock().clone()
    }

    /// Drops the bound handle. Releasing an empty context does nothing.
    pub fn release(&self) {
        if let Some(db) = self.slot.lock().take() {
            tracing::debug!(database = db.name(), "released request connection");
        }
    }

    pub fn is_bound(&self) -> bool {
        self.slot.lock().is_some()
    }
}

/// Ends the session when dropped, so the handle is released even if the
/// handler panics or the request future is cancelled.
struct SessionGuard<S: CouchServer> {
    manager: Arc<CouchDbManager<S>>,
    context: RequestContext<S::Database>,
}

impl<S: CouchServer> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        self.manager.request_end(&self.context);
    }
}

/// Middleware binding a database handle around each request.
///
/// Installed by [`CouchDbManager::setup`]. A failed sync or connect aborts
/// the request with the manager's error response; the handler never runs.
pub async fn couch_session<S: CouchServer>(
    State(manager): State<Arc<CouchDbManager<S>>>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let context = RequestContext::new();
    let _guard = SessionGuard {
        manager: Arc::clone(&manager),
        context: context.clone(),
    };

    manager.request_start(&context).await?;
    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

/// Extractor for the database handle bound to the current request.
///
/// Rejects with [`ManagerError::NotBound`] when the route is not behind the
/// session middleware.
///
/// ```ignore
/// async fn recent(Couch(db): Couch<HttpDatabase>) -> Result<Json<Vec<Row>>, ManagerError> {
///     let view = ViewDefinition::new("posts", "recent", "function (doc) { emit(doc.time, null); }");
///     Ok(Json(view.bind(&db).all().await?.rows))
/// }
/// ```
pub struct Couch<D>(pub D);

impl<D, St> FromRequestParts<St> for Couch<D>
where
    D: CouchDatabase,
    St: Send + Sync,
{
    type Rejection = ManagerError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &St,
    ) -> std::result::Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext<D>>()
            .and_then(RequestContext::database)
            .map(Couch)
            .ok_or(ManagerError::NotBound)
    }
}
