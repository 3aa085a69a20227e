//! Gantry — a controller-binding layer over axum.
//!
//! Controllers are plain types whose handlers are bound to routes through an
//! explicit registrar. Every request runs one pipeline: auth and CSRF checks,
//! context construction with lifecycle notifications, declarative argument
//! extraction, handler invocation (async in place, blocking offloaded), and
//! renderer-backed response conversion with uniform `{"detail": ...}` error
//! bodies.

pub mod api;
pub mod auth;
pub mod context;
pub mod controller;
mod csrf;
pub mod error;
pub mod http;
pub mod layers;
pub mod operation;
pub mod permissions;
pub mod prelude;
pub mod registrar;
mod registry;
pub mod schema;
pub mod signals;
pub mod signature;
pub mod types;

pub use api::{Api, JsonRenderer, Renderer};
pub use auth::{bearer, AuthCallback, AuthPolicy};
pub use context::{RequestData, RouteContext, TemporalResponse};
pub use controller::ControllerBase;
pub use error::ApiError;
pub use layers::{default_trace, init_tracing};
pub use operation::{Handler, Operation, OperationMeta, PathView};
pub use permissions::{AllowAny, DenyAll, IsAuthenticated, IsAuthenticatedOrReadOnly, Permission};
pub use registrar::{ControllerDescriptor, ControllerRegistrar, Route, RouteParameters};
pub use signals::{ObserverError, RouteObserver};
pub use signature::{ParamKind, ParamSource, ParamSpec, ViewSignature};
pub use types::{IntoReply, Kwargs, Reply};
