//! Integration tests for the per-request session.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::body::Body;
use axum::extract::Extension;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::{Router, middleware};
use couch_store::{CouchDatabase, CouchDatabaseExt, CouchServer, InMemoryDatabase, InMemoryServer, ViewDefinition};
use manager::{Couch, CouchConfig, CouchDbManager, ManagerError, RequestContext};
use parking_lot::Mutex;
use tower::ServiceExt;

type Manager = CouchDbManager<InMemoryServer>;

fn counting_manager(database: &str) -> (Manager, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let manager = CouchDbManager::new(
        InMemoryServer::new(),
        CouchConfig::default().with_database(database),
    )
    .add_view_definition(ViewDefinition::new(
        "tests",
        "all",
        "function (doc) { emit(doc._id, null); }",
    ))
    .on_sync(move |_db| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Ok(()) }
    });
    (manager, calls)
}

async fn database_name(Couch(db): Couch<InMemoryDatabase>) -> String {
    db.name().to_string()
}

fn app(manager: &Arc<Manager>) -> Router {
    manager.setup(Router::new().route("/", get(database_name)))
}

async fn get_root(app: Router) -> (StatusCode, String) {
    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn auto_sync_runs_callbacks_on_every_request() {
    let (manager, calls) = counting_manager("lifecycle-auto");
    let manager = Arc::new(manager);

    for _ in 0..3 {
        let (status, body) = get_root(app(&manager)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "lifecycle-auto");
    }

    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn manual_sync_only_when_auto_sync_is_off() {
    let (manager, calls) = counting_manager("lifecycle-manual");
    let manager = Arc::new(manager.with_auto_sync(false));

    manager.sync().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    for _ in 0..3 {
        let (status, _) = get_root(app(&manager)).await;
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn global_override_beats_instance_setting() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let server = InMemoryServer::new();
    server.create("lifecycle-override").await.unwrap();
    let manager = Arc::new(
        CouchDbManager::new(
            server,
            CouchConfig::default()
                .with_database("lifecycle-override")
                .with_disable_auto_sync(true),
        )
        .with_auto_sync(true)
        .on_sync(move |_db| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        }),
    );

    let (status, _) = get_root(app(&manager)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn views_are_synced_before_the_handler_runs() {
    let (manager, _) = counting_manager("lifecycle-views");
    let manager = Arc::new(manager);
    let router = manager.setup(Router::new().route(
        "/",
        get(|Couch(db): Couch<InMemoryDatabase>| async move {
            db.design_document("tests")
                .await
                .map(|doc| doc.is_some().to_string())
                .map_err(ManagerError::from)
        }),
    ));

    let (status, body) = get_root(router).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "true");
}

#[tokio::test]
async fn handle_is_released_after_the_response() {
    let (manager, _) = counting_manager("lifecycle-release");
    let manager = Arc::new(manager);
    let captured: Arc<Mutex<Option<RequestContext<InMemoryDatabase>>>> =
        Arc::new(Mutex::new(None));

    let slot = captured.clone();
    let ok = get(
        move |Extension(context): Extension<RequestContext<InMemoryDatabase>>| async move {
            assert!(context.is_bound());
            *slot.lock() = Some(context);
            StatusCode::OK
        },
    );
    let (status, _) = get_root(manager.setup(Router::new().route("/", ok))).await;

    assert_eq!(status, StatusCode::OK);
    let context = captured.lock().take().unwrap();
    assert!(!context.is_bound());
}

#[tokio::test]
async fn handle_is_released_when_the_handler_fails() {
    let (manager, _) = counting_manager("lifecycle-failure");
    let manager = Arc::new(manager);
    let captured: Arc<Mutex<Option<RequestContext<InMemoryDatabase>>>> =
        Arc::new(Mutex::new(None));

    let slot = captured.clone();
    let failing = get(
        move |Extension(context): Extension<RequestContext<InMemoryDatabase>>| async move {
            *slot.lock() = Some(context);
            Err::<String, _>(ManagerError::NotBound)
        },
    );
    let (status, body) = get_root(manager.setup(Router::new().route("/", failing))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("No CouchDB connection"));
    let context = captured.lock().take().unwrap();
    assert!(!context.is_bound());
}

#[tokio::test]
async fn failed_sync_aborts_the_request() {
    let (manager, _) = counting_manager("Invalid Database");
    let manager = Arc::new(manager);

    let (status, body) = get_root(app(&manager)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("error"));
}

#[tokio::test]
async fn missing_database_without_sync_aborts_the_request() {
    let (manager, calls) = counting_manager("lifecycle-never-synced");
    let manager = Arc::new(manager.with_auto_sync(false));

    let (status, _) = get_root(app(&manager)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn extractor_rejects_outside_a_session() {
    let router = Router::new().route("/", get(database_name));

    let (status, body) = get_root(router).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("No CouchDB connection"));
}

#[tokio::test]
async fn session_works_with_routes_layered_by_hand() {
    let (manager, calls) = counting_manager("lifecycle-layer");
    let manager = Arc::new(manager);
    let router = Router::new()
        .route("/", get(database_name))
        .layer(middleware::from_fn_with_state(
            manager.clone(),
            manager::couch_session::<InMemoryServer>,
        ));

    let (status, body) = get_root(router).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "lifecycle-layer");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
