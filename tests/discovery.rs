//! Auto-discovery sweeps the whole process registry, so it lives alone in
//! this test binary.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use gantry::prelude::*;

async fn get_status(router: axum::Router, path: &str) -> StatusCode {
    let req = Request::builder().uri(path).body(Body::empty()).unwrap();
    router.oneshot(req).await.unwrap().status()
}

#[derive(Default)]
struct PublicController;
impl ControllerBase for PublicController {}

#[derive(Default)]
struct HiddenController;
impl ControllerBase for HiddenController {}

#[tokio::test]
async fn auto_discover_mounts_only_importable_controllers() {
    ControllerRegistrar::<PublicController>::new()
        .route(Route::get("/public"), "public", |_c, _ctx| async move {
            Ok(json!({ "public": true }))
        })
        .register()
        .unwrap();
    ControllerRegistrar::<HiddenController>::new()
        .auto_import(false)
        .route(Route::get("/hidden"), "hidden", |_c, _ctx| async move {
            Ok(json!({ "hidden": true }))
        })
        .register()
        .unwrap();

    let router = Api::new().auto_discover().unwrap().router().unwrap();

    assert_eq!(get_status(router.clone(), "/public").await, StatusCode::OK);
    assert_eq!(get_status(router, "/hidden").await, StatusCode::NOT_FOUND);

    // The opted-out controller is still mountable explicitly.
    let router = Api::new()
        .register::<HiddenController>()
        .unwrap()
        .router()
        .unwrap();
    assert_eq!(get_status(router, "/hidden").await, StatusCode::OK);
}
