//! Example guestbook server built on the CouchDB integration.
//!
//! Visitors sign the guestbook with a message and their name; signatures are
//! listed newest first, five per page, with cursor links to move between
//! pages. Shows the full stack end to end: a [`DocumentModel`] with a view,
//! the [`CouchDbManager`] session around the routes, and [`manager::paginate`].
//!
//! [`DocumentModel`]: mapping::DocumentModel

pub mod config;
pub mod error;
pub mod models;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use couch_store::CouchServer;
use manager::{CouchConfig, CouchDbManager};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use models::Signature;

/// Creates the manager with every guestbook model registered.
pub fn create_manager<S: CouchServer>(server: S, config: CouchConfig) -> CouchDbManager<S> {
    CouchDbManager::new(server, config).add_document::<Signature>()
}

/// Creates the Axum application router with all routes.
///
/// Only the guestbook routes run inside a CouchDB session; health and
/// metrics never touch the database.
pub fn create_app<S: CouchServer>(
    manager: Arc<CouchDbManager<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    let guestbook = manager.setup(Router::new().route(
        "/",
        get(routes::signatures::display::<S::Database>)
            .post(routes::signatures::sign::<S::Database>),
    ));

    Router::new()
        .route("/health", get(routes::health::check))
        .merge(guestbook)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
