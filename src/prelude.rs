//! Gantry prelude — import everything you need with a single `use`.
//!
//! ```ignore
//! use gantry::prelude::*;
//!
//! #[derive(Default)]
//! struct EventController;
//! impl ControllerBase for EventController {}
//!
//! ControllerRegistrar::<EventController>::new()
//!     .prefix("/events")
//!     .route(Route::get("/{int:id}"), "get_event", |c, ctx| async move {
//!         let id: i64 = ctx.param("id")?;
//!         c.create_response(&ctx, &Id::new(id), StatusCode::OK)
//!     })
//!     .register()?;
//!
//! let router = Api::new().prefix("/api").register::<EventController>()?.router()?;
//! ```

pub use crate::api::{Api, JsonRenderer, Renderer};
pub use crate::auth::{bearer, AuthCallback, AuthPolicy};
pub use crate::context::{RequestData, RouteContext, TemporalResponse};
pub use crate::controller::ControllerBase;
pub use crate::error::ApiError;
pub use crate::layers::{default_trace, init_tracing};
pub use crate::operation::{Handler, Operation, OperationMeta, PathView};
pub use crate::permissions::{
    AllowAny, DenyAll, IsAuthenticated, IsAuthenticatedOrReadOnly, Permission,
};
pub use crate::registrar::{ControllerDescriptor, ControllerRegistrar, Route, RouteParameters};
pub use crate::schema::{Detail, Id, Ok as OkSchema};
pub use crate::signals::{ObserverError, RouteObserver};
pub use crate::signature::{ParamKind, ParamSource, ParamSpec, ViewSignature};
pub use crate::types::{IntoReply, Kwargs, Reply};

// ── HTTP re-exports ────────────────────────────────────────────────────────

pub use crate::http::{
    Body, Bytes, HeaderMap, HeaderName, HeaderValue, IntoResponse, Json, Method, Response, Router,
    StatusCode, Uri,
};
