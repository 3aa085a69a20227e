//! Authentication callbacks and the per-route auth policy.
//!
//! Callbacks run in declaration order. The first one returning an identity
//! value stops the chain and attaches the identity to the request; if all of
//! them decline, the operation answers 401 as normal control flow. A callback
//! error is translated by the API's exception handler instead.

use std::sync::Arc;

use serde_json::Value;

use crate::context::RequestData;
use crate::error::ApiError;
use crate::http::AUTHORIZATION;
use crate::types::BoxFuture;

type SyncAuthFn = dyn Fn(&RequestData) -> Result<Option<Value>, ApiError> + Send + Sync;
type AsyncAuthFn =
    dyn Fn(Arc<RequestData>) -> BoxFuture<'static, Result<Option<Value>, ApiError>> + Send + Sync;

/// One authentication callback.
///
/// Synchronous callbacks are offloaded to a blocking worker so the event
/// loop never stalls on them; asynchronous callbacks are awaited in place.
#[derive(Clone)]
pub enum AuthCallback {
    Sync(Arc<SyncAuthFn>),
    Async(Arc<AsyncAuthFn>),
}

impl AuthCallback {
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&RequestData) -> Result<Option<Value>, ApiError> + Send + Sync + 'static,
    {
        AuthCallback::Sync(Arc::new(f))
    }

    pub fn asynchronous<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<RequestData>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Option<Value>, ApiError>> + Send + 'static,
    {
        AuthCallback::Async(Arc::new(move |request| Box::pin(f(request))))
    }

    pub(crate) async fn call(
        &self,
        request: &Arc<RequestData>,
    ) -> Result<Option<Value>, ApiError> {
        match self {
            AuthCallback::Sync(f) => {
                let f = f.clone();
                let request = request.clone();
                tokio::task::spawn_blocking(move || f(&request))
                    .await
                    .map_err(|e| ApiError::internal(format!("auth worker failed: {e}")))?
            }
            AuthCallback::Async(f) => f(request.clone()).await,
        }
    }
}

/// Auth configuration for a controller or a single route.
///
/// A route-level `Inherit` falls back to the controller default; `None`
/// disables authentication even when the controller declares callbacks.
#[derive(Clone, Default)]
pub enum AuthPolicy {
    #[default]
    Inherit,
    None,
    Callbacks(Vec<AuthCallback>),
}

impl AuthPolicy {
    pub fn callbacks(callbacks: impl IntoIterator<Item = AuthCallback>) -> Self {
        AuthPolicy::Callbacks(callbacks.into_iter().collect())
    }

    pub fn single(callback: AuthCallback) -> Self {
        AuthPolicy::Callbacks(vec![callback])
    }

    /// Route policy resolved against the controller default.
    pub(crate) fn resolve(self, controller_default: &AuthPolicy) -> Vec<AuthCallback> {
        match self {
            AuthPolicy::Inherit => match controller_default {
                AuthPolicy::Callbacks(callbacks) => callbacks.clone(),
                AuthPolicy::Inherit | AuthPolicy::None => Vec::new(),
            },
            AuthPolicy::None => Vec::new(),
            AuthPolicy::Callbacks(callbacks) => callbacks,
        }
    }
}

/// Callback validating an `Authorization: Bearer <token>` header.
///
/// `validate` receives the raw token and returns the identity value it
/// resolves to, or `None` to let the rest of the chain try. A missing or
/// malformed header also declines rather than erroring, so bearer auth can
/// be combined with other schemes.
pub fn bearer<F>(validate: F) -> AuthCallback
where
    F: Fn(&str) -> Option<Value> + Send + Sync + 'static,
{
    AuthCallback::sync(move |request| {
        let header = match request.header(AUTHORIZATION.as_str()) {
            Some(value) => value,
            None => return Ok(None),
        };
        let token = match header.split_once(' ') {
            Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => token.trim(),
            _ => return Ok(None),
        };
        Ok(validate(token))
    })
}
