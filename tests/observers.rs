use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use gantry::prelude::*;

struct Recording {
    started: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<(String, String)>>>,
}

impl RouteObserver for Recording {
    fn context_started(&self, ctx: &RouteContext) -> Result<(), ObserverError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push((
            ctx.controller_name().to_string(),
            ctx.handler_name().to_string(),
        ));
        Ok(())
    }

    fn context_finished(&self) -> Result<(), ObserverError> {
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Counters {
    started: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<(String, String)>>>,
}

fn recording() -> (Recording, Counters) {
    let started = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));
    (
        Recording {
            started: started.clone(),
            finished: finished.clone(),
            seen: seen.clone(),
        },
        Counters {
            started,
            finished,
            seen,
        },
    )
}

async fn get(router: axum::Router, path: &str) -> StatusCode {
    let req = Request::builder().uri(path).body(Body::empty()).unwrap();
    router.oneshot(req).await.unwrap().status()
}

// ── Lifecycle on the success path ────────────────────────────────────────

#[derive(Default)]
struct PingController;
impl ControllerBase for PingController {}

#[tokio::test]
async fn started_and_finished_fire_once_with_context_names() {
    ControllerRegistrar::<PingController>::new()
        .route(Route::get("/ping"), "ping", |_c, _ctx| async move {
            Ok(json!({ "pong": true }))
        })
        .register()
        .unwrap();
    let (observer, counters) = recording();
    let router = Api::new()
        .observer(observer)
        .register::<PingController>()
        .unwrap()
        .router()
        .unwrap();

    assert_eq!(get(router, "/ping").await, StatusCode::OK);
    assert_eq!(counters.started.load(Ordering::SeqCst), 1);
    assert_eq!(counters.finished.load(Ordering::SeqCst), 1);
    assert_eq!(
        counters.seen.lock().unwrap().as_slice(),
        &[("PingController".to_string(), "ping".to_string())]
    );
}

// ── Lifecycle on the failure path ────────────────────────────────────────

#[derive(Default)]
struct FlakyController;
impl ControllerBase for FlakyController {}

#[tokio::test]
async fn finished_fires_exactly_once_when_the_handler_errors() {
    ControllerRegistrar::<FlakyController>::new()
        .route(Route::get("/flaky"), "flaky", |_c, _ctx| async move {
            Err::<serde_json::Value, _>(ApiError::not_found(None))
        })
        .register()
        .unwrap();
    let (observer, counters) = recording();
    let router = Api::new()
        .observer(observer)
        .register::<FlakyController>()
        .unwrap()
        .router()
        .unwrap();

    assert_eq!(get(router, "/flaky").await, StatusCode::NOT_FOUND);
    assert_eq!(counters.started.load(Ordering::SeqCst), 1);
    assert_eq!(counters.finished.load(Ordering::SeqCst), 1);
}

// ── No lifecycle for check-rejected requests ─────────────────────────────

#[derive(Default)]
struct GatedController;
impl ControllerBase for GatedController {}

#[tokio::test]
async fn rejected_checks_emit_no_lifecycle_events() {
    ControllerRegistrar::<GatedController>::new()
        .auth(AuthPolicy::single(AuthCallback::sync(|_| Ok(None))))
        .route(Route::get("/gated"), "gated", |_c, _ctx| async move {
            Ok(json!({ "reached": true }))
        })
        .register()
        .unwrap();
    let (observer, counters) = recording();
    let router = Api::new()
        .observer(observer)
        .register::<GatedController>()
        .unwrap()
        .router()
        .unwrap();

    assert_eq!(get(router, "/gated").await, StatusCode::UNAUTHORIZED);
    assert_eq!(counters.started.load(Ordering::SeqCst), 0);
    assert_eq!(counters.finished.load(Ordering::SeqCst), 0);
}

// ── Fault isolation ──────────────────────────────────────────────────────

struct Faulty;

impl RouteObserver for Faulty {
    fn context_started(&self, _ctx: &RouteContext) -> Result<(), ObserverError> {
        Err("started hook broke".into())
    }

    fn context_finished(&self) -> Result<(), ObserverError> {
        Err("finished hook broke".into())
    }
}

#[derive(Default)]
struct SteadyController;
impl ControllerBase for SteadyController {}

#[tokio::test]
async fn observer_failures_never_reach_the_request() {
    ControllerRegistrar::<SteadyController>::new()
        .route(Route::get("/steady"), "steady", |_c, _ctx| async move {
            Ok(json!({ "steady": true }))
        })
        .register()
        .unwrap();
    let (observer, counters) = recording();
    let router = Api::new()
        .observer(Faulty)
        .observer(observer)
        .register::<SteadyController>()
        .unwrap()
        .router()
        .unwrap();

    // The faulty observer errors on both hooks; the request succeeds and the
    // next observer still gets both events.
    assert_eq!(get(router, "/steady").await, StatusCode::OK);
    assert_eq!(counters.started.load(Ordering::SeqCst), 1);
    assert_eq!(counters.finished.load(Ordering::SeqCst), 1);
}
