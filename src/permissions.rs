//! Permission rules evaluated against the request execution context.

use std::any::Any;

use crate::context::RouteContext;
use crate::http::Method;

/// A policy object with a request-level and an object-level check.
///
/// Rules are evaluated in declaration order and short-circuit on the first
/// denial. The object-level check defaults to allow so that rules caring only
/// about the request don't block object lookups.
pub trait Permission: Send + Sync {
    fn has_permission(&self, ctx: &RouteContext) -> bool;

    fn has_object_permission(&self, _ctx: &RouteContext, _obj: &dyn Any) -> bool {
        true
    }

    /// Message carried by the 403 raised when this rule denies.
    fn message(&self) -> Option<String> {
        None
    }
}

/// Allows any request. The default rule of a controller with no explicit
/// permission configuration.
pub struct AllowAny;

impl Permission for AllowAny {
    fn has_permission(&self, _ctx: &RouteContext) -> bool {
        true
    }
}

/// Denies every request.
pub struct DenyAll;

impl Permission for DenyAll {
    fn has_permission(&self, _ctx: &RouteContext) -> bool {
        false
    }

    fn has_object_permission(&self, _ctx: &RouteContext, _obj: &dyn Any) -> bool {
        false
    }
}

/// Allows only requests that carry a resolved auth identity.
pub struct IsAuthenticated;

impl Permission for IsAuthenticated {
    fn has_permission(&self, ctx: &RouteContext) -> bool {
        ctx.request().auth().is_some()
    }

    fn message(&self) -> Option<String> {
        Some("Authentication required".to_string())
    }
}

const SAFE_METHODS: [Method; 4] = [Method::GET, Method::HEAD, Method::OPTIONS, Method::TRACE];

/// Allows safe (read-only) methods unconditionally, everything else only for
/// authenticated requests.
pub struct IsAuthenticatedOrReadOnly;

impl Permission for IsAuthenticatedOrReadOnly {
    fn has_permission(&self, ctx: &RouteContext) -> bool {
        SAFE_METHODS.contains(ctx.request().method()) || ctx.request().auth().is_some()
    }

    fn message(&self) -> Option<String> {
        Some("Authentication required".to_string())
    }
}

pub(crate) fn is_safe_method(method: &Method) -> bool {
    SAFE_METHODS.contains(method)
}

/// Evaluate the context's rules in order, failing on the first denial.
pub(crate) fn check_rules(ctx: &RouteContext) -> Result<(), crate::error::ApiError> {
    for rule in ctx.permissions() {
        if !rule.has_permission(ctx) {
            return Err(crate::error::ApiError::permission_denied(rule.message()));
        }
    }
    Ok(())
}
