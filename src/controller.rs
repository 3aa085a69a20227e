//! The controller capability surface.
//!
//! Controllers are plain types implementing [`ControllerBase`]. The trait
//! carries no required methods; what it provides is the standard capability
//! set every controller handler can reach: permission enforcement, guarded
//! object lookup, and renderer-backed response construction. Route binding
//! happens separately through the registrar, and construction happens through
//! the factory given at registration, so a controller type stays an ordinary
//! struct holding its own dependencies.

use std::any::Any;
use std::sync::Arc;

use serde::Serialize;

use crate::context::RouteContext;
use crate::error::ApiError;
use crate::http::{HeaderMap, StatusCode};
use crate::operation::render_json;
use crate::registrar::ControllerDescriptor;
use crate::registry;
use crate::types::Reply;

pub trait ControllerBase: Send + Sync + 'static {
    /// The type's short name, used for registry diagnostics and default tags.
    fn controller_name() -> &'static str
    where
        Self: Sized,
    {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// The descriptor this controller registered under.
    ///
    /// Fails with a configuration error when the controller type was never
    /// run through a registrar; the failure surfaces at access time, not at
    /// startup.
    fn api_controller() -> Result<Arc<ControllerDescriptor>, ApiError>
    where
        Self: Sized,
    {
        registry::lookup::<Self>().ok_or_else(|| {
            ApiError::configuration(format!(
                "controller `{}` has no registration; build it with a ControllerRegistrar first",
                Self::controller_name()
            ))
        })
    }

    /// Enforce the context's permission rules, in order, stopping at the
    /// first denial.
    fn check_permissions(&self, ctx: &RouteContext) -> Result<(), ApiError> {
        for rule in ctx.permissions() {
            if !rule.has_permission(ctx) {
                return Err(self.permission_denied(rule.message()));
            }
        }
        Ok(())
    }

    /// Enforce the object-level side of the context's permission rules.
    fn check_object_permissions(&self, ctx: &RouteContext, obj: &dyn Any) -> Result<(), ApiError> {
        for rule in ctx.permissions() {
            if !rule.has_object_permission(ctx, obj) {
                return Err(self.permission_denied(rule.message()));
            }
        }
        Ok(())
    }

    fn permission_denied(&self, message: Option<String>) -> ApiError {
        ApiError::permission_denied(message)
    }

    /// Run `lookup` and guard the result: a missing object is 404, a found
    /// object always passes through the object-level permission checks and
    /// is never returned when they deny.
    fn get_object_or_exception<T, F>(&self, ctx: &RouteContext, lookup: F) -> Result<T, ApiError>
    where
        T: Any,
        F: FnOnce() -> Option<T>,
    {
        self.get_object_or(ctx, lookup, ApiError::not_found(None))
    }

    /// Like [`get_object_or_exception`](Self::get_object_or_exception) with a
    /// caller-chosen error for the missing case.
    fn get_object_or<T, F>(
        &self,
        ctx: &RouteContext,
        lookup: F,
        missing: ApiError,
    ) -> Result<T, ApiError>
    where
        T: Any,
        F: FnOnce() -> Option<T>,
    {
        match lookup() {
            Some(obj) => {
                self.check_object_permissions(ctx, &obj)?;
                Ok(obj)
            }
            None => Err(missing),
        }
    }

    /// Guarded lookup that maps the missing case to `None`. A found object
    /// still runs the object-level checks and a denial is still an error.
    fn get_object_or_none<T, F>(&self, ctx: &RouteContext, lookup: F) -> Result<Option<T>, ApiError>
    where
        T: Any,
        F: FnOnce() -> Option<T>,
    {
        match lookup() {
            Some(obj) => {
                self.check_object_permissions(ctx, &obj)?;
                Ok(Some(obj))
            }
            None => Ok(None),
        }
    }

    /// Render a payload through the API's configured renderer with an
    /// explicit status, keeping any headers already set on the context.
    fn create_response<T: Serialize>(
        &self,
        ctx: &RouteContext,
        payload: &T,
        status: StatusCode,
    ) -> Result<Reply, ApiError> {
        self.create_response_with_headers(ctx, payload, status, HeaderMap::new())
    }

    /// [`create_response`](Self::create_response) with extra headers merged
    /// over the context's.
    fn create_response_with_headers<T: Serialize>(
        &self,
        ctx: &RouteContext,
        payload: &T,
        status: StatusCode,
        extra_headers: HeaderMap,
    ) -> Result<Reply, ApiError> {
        let value = serde_json::to_value(payload)
            .map_err(|e| ApiError::internal(format!("response serialization failed: {e}")))?;
        let mut temporal = ctx.temporal();
        temporal.status = status;
        for (name, value) in extra_headers.iter() {
            temporal.headers.insert(name.clone(), value.clone());
        }
        render_json(ctx.api(), &temporal, &value).map(Reply::Response)
    }
}
