use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use gantry::prelude::*;

async fn send(
    router: axum::Router,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let resp = router
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn whoami_route() -> Route {
    Route::get("/whoami")
}

// ── Callback chain ───────────────────────────────────────────────────────

#[derive(Default)]
struct ChainController;
impl ControllerBase for ChainController {}

static FIRST_CALLS: AtomicUsize = AtomicUsize::new(0);

#[tokio::test]
async fn first_accepting_callback_wins_and_sets_identity() {
    let declining = AuthCallback::sync(|_request| {
        FIRST_CALLS.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    });
    let accepting = AuthCallback::asynchronous(|_request| async move {
        Ok(Some(json!({ "user": "ada" })))
    });
    let unreached = AuthCallback::sync(|_request| {
        panic!("chain must stop at the first accepting callback")
    });

    ControllerRegistrar::<ChainController>::new()
        .auth(AuthPolicy::callbacks([declining, accepting, unreached]))
        .route(whoami_route(), "whoami", |_c, ctx| async move {
            Ok(ctx.request().auth().cloned().unwrap_or(Value::Null))
        })
        .register()
        .unwrap();
    let router = Api::new()
        .register::<ChainController>()
        .unwrap()
        .router()
        .unwrap();

    let (status, body) = send(router, "GET", "/whoami", &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "user": "ada" }));
    assert_eq!(FIRST_CALLS.load(Ordering::SeqCst), 1);
}

#[derive(Default)]
struct RejectingController;
impl ControllerBase for RejectingController {}

#[tokio::test]
async fn all_declining_callbacks_yield_401() {
    ControllerRegistrar::<RejectingController>::new()
        .auth(AuthPolicy::single(AuthCallback::sync(|_| Ok(None))))
        .route(whoami_route(), "whoami", |_c, _ctx| async move {
            Ok(json!({ "reached": true }))
        })
        .register()
        .unwrap();
    let router = Api::new()
        .register::<RejectingController>()
        .unwrap()
        .router()
        .unwrap();

    let (status, body) = send(router, "GET", "/whoami", &[]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "detail": "Unauthorized" }));
}

#[derive(Default)]
struct FailingAuthController;
impl ControllerBase for FailingAuthController {}

#[tokio::test]
async fn callback_error_is_translated_not_swallowed() {
    ControllerRegistrar::<FailingAuthController>::new()
        .auth(AuthPolicy::single(AuthCallback::sync(|_| {
            Err(ApiError::custom(
                StatusCode::SERVICE_UNAVAILABLE,
                "token service down",
            ))
        })))
        .route(whoami_route(), "whoami", |_c, _ctx| async move {
            Ok(json!({ "reached": true }))
        })
        .register()
        .unwrap();
    let router = Api::new()
        .register::<FailingAuthController>()
        .unwrap()
        .router()
        .unwrap();

    let (status, body) = send(router, "GET", "/whoami", &[]).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!({ "detail": "token service down" }));
}

// ── Bearer helper ────────────────────────────────────────────────────────

#[derive(Default)]
struct BearerController;
impl ControllerBase for BearerController {}

// A controller registers once and mounts on one API; tests share the router.
fn bearer_router() -> axum::Router {
    static ROUTER: std::sync::OnceLock<axum::Router> = std::sync::OnceLock::new();
    ROUTER
        .get_or_init(|| {
            ControllerRegistrar::<BearerController>::new()
                .auth(AuthPolicy::single(bearer(|token| {
                    (token == "sesame").then(|| json!({ "sub": "cave" }))
                })))
                .route(Route::get("/bearer"), "whoami", |_c, ctx| async move {
                    Ok(ctx.request().auth().cloned().unwrap_or(Value::Null))
                })
                .register()
                .unwrap();
            Api::new()
                .register::<BearerController>()
                .unwrap()
                .router()
                .unwrap()
        })
        .clone()
}

#[tokio::test]
async fn bearer_token_resolves_identity() {
    let (status, body) = send(
        bearer_router(),
        "GET",
        "/bearer",
        &[("authorization", "Bearer sesame")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "sub": "cave" }));
}

#[tokio::test]
async fn wrong_scheme_or_token_declines_to_401() {
    let router = bearer_router();
    let (status, _) = send(
        router.clone(),
        "GET",
        "/bearer",
        &[("authorization", "Basic sesame")],
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        router,
        "GET",
        "/bearer",
        &[("authorization", "Bearer wrong")],
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ── Route-level overrides ────────────────────────────────────────────────

#[derive(Default)]
struct MixedController;
impl ControllerBase for MixedController {}

#[tokio::test]
async fn route_can_opt_out_of_controller_auth() {
    ControllerRegistrar::<MixedController>::new()
        .auth(AuthPolicy::single(AuthCallback::sync(|_| Ok(None))))
        .route(Route::get("/private"), "private", |_c, _ctx| async move {
            Ok(json!({ "private": true }))
        })
        .route(
            Route::get("/public").auth(AuthPolicy::None),
            "public",
            |_c, _ctx| async move { Ok(json!({ "public": true })) },
        )
        .register()
        .unwrap();
    let router = Api::new()
        .register::<MixedController>()
        .unwrap()
        .router()
        .unwrap();

    let (status, _) = send(router.clone(), "GET", "/private", &[]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(router, "GET", "/public", &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "public": true }));
}

// ── Auth feeding permissions ─────────────────────────────────────────────

#[derive(Default)]
struct MemberController;
impl ControllerBase for MemberController {}

#[tokio::test]
async fn is_authenticated_sees_the_resolved_identity() {
    ControllerRegistrar::<MemberController>::new()
        .auth(AuthPolicy::single(bearer(|token| {
            (token == "ok").then(|| json!("member"))
        })))
        .permissions(vec![Arc::new(IsAuthenticated)])
        .route(Route::get("/members"), "list", |_c, _ctx| async move {
            Ok(json!({ "members": [] }))
        })
        .register()
        .unwrap();
    let router = Api::new()
        .register::<MemberController>()
        .unwrap()
        .router()
        .unwrap();

    let (status, _) = send(router, "GET", "/members", &[("authorization", "Bearer ok")]).await;
    assert_eq!(status, StatusCode::OK);
}

// ── CSRF ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct FormController;
impl ControllerBase for FormController {}

fn csrf_router() -> axum::Router {
    static ROUTER: std::sync::OnceLock<axum::Router> = std::sync::OnceLock::new();
    ROUTER
        .get_or_init(|| {
            ControllerRegistrar::<FormController>::new()
                .route(Route::get("/form"), "read", |_c, _ctx| async move {
                    Ok(json!({ "form": true }))
                })
                .route(Route::post("/form"), "submit", |_c, _ctx| async move {
                    Ok(json!({ "submitted": true }))
                })
                .register()
                .unwrap();
            Api::new()
                .enable_csrf()
                .register::<FormController>()
                .unwrap()
                .router()
                .unwrap()
        })
        .clone()
}

#[tokio::test]
async fn safe_methods_skip_the_csrf_check() {
    let (status, _) = send(csrf_router(), "GET", "/form", &[]).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unsafe_method_without_token_is_403() {
    let (status, body) = send(csrf_router(), "POST", "/form", &[]).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({ "detail": "CSRF check failed" }));
}

#[tokio::test]
async fn matching_double_submit_tokens_pass() {
    let (status, body) = send(
        csrf_router(),
        "POST",
        "/form",
        &[("cookie", "csrftoken=tok123"), ("x-csrftoken", "tok123")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "submitted": true }));
}
