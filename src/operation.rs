//! Operations and path views: the per-route execution pipeline.
//!
//! An [`Operation`] binds one handler to a path and a set of methods,
//! together with everything resolved at registration time (auth callbacks,
//! permission rules, signature, metadata). `Operation::run` is the single
//! pipeline every request goes through; synchronous handlers are offloaded
//! to a blocking worker instead of getting a pipeline of their own.
//!
//! A [`PathView`] groups the operations that share one exact path and
//! dispatches on the request method.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};

use crate::api::ApiConfig;
use crate::auth::AuthCallback;
use crate::context::{RequestData, RouteContext, TemporalResponse};
use crate::csrf::check_csrf;
use crate::error::ApiError;
use crate::http::{IntoResponse, Json, Method, Response, StatusCode};
use crate::permissions::Permission;
use crate::signals::FinishedGuard;
use crate::signature::ViewSignature;
use crate::types::{BoxFuture, IntoReply, Kwargs, Reply};

type ContextualFn =
    dyn Fn(Arc<RouteContext>) -> BoxFuture<'static, Result<Reply, ApiError>> + Send + Sync;
type BlockingFn = dyn Fn(Arc<RouteContext>) -> Result<Reply, ApiError> + Send + Sync;

enum HandlerInner {
    Async(Arc<ContextualFn>),
    Blocking(Arc<BlockingFn>),
}

/// A route handler, normalized at registration into a context-taking closure.
///
/// Two invocation shapes exist: `contextual` handlers receive the
/// [`RouteContext`]; `plain` handlers receive the request and the extracted
/// kwargs only. Each shape comes in an async and a blocking flavor; blocking
/// handlers run under `spawn_blocking` so they never stall the event loop.
pub struct Handler {
    inner: HandlerInner,
}

impl Handler {
    pub fn contextual<F, Fut, R>(f: F) -> Self
    where
        F: Fn(Arc<RouteContext>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<R, ApiError>> + Send + 'static,
        R: IntoReply,
    {
        let f = Arc::new(f);
        Handler {
            inner: HandlerInner::Async(Arc::new(move |ctx| {
                let f = f.clone();
                Box::pin(async move { f(ctx).await?.into_reply() })
            })),
        }
    }

    pub fn plain<F, Fut, R>(f: F) -> Self
    where
        F: Fn(Arc<RequestData>, Kwargs) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<R, ApiError>> + Send + 'static,
        R: IntoReply,
    {
        let f = Arc::new(f);
        Handler {
            inner: HandlerInner::Async(Arc::new(move |ctx| {
                let f = f.clone();
                let request = ctx.request_handle();
                let kwargs = ctx.kwargs();
                Box::pin(async move { f(request, kwargs).await?.into_reply() })
            })),
        }
    }

    pub fn contextual_blocking<F, R>(f: F) -> Self
    where
        F: Fn(&RouteContext) -> Result<R, ApiError> + Send + Sync + 'static,
        R: IntoReply,
    {
        Handler {
            inner: HandlerInner::Blocking(Arc::new(move |ctx| f(&ctx)?.into_reply())),
        }
    }

    pub fn plain_blocking<F, R>(f: F) -> Self
    where
        F: Fn(&RequestData, Kwargs) -> Result<R, ApiError> + Send + Sync + 'static,
        R: IntoReply,
    {
        Handler {
            inner: HandlerInner::Blocking(Arc::new(move |ctx| {
                f(ctx.request(), ctx.kwargs())?.into_reply()
            })),
        }
    }

    pub(crate) fn is_async(&self) -> bool {
        matches!(self.inner, HandlerInner::Async(_))
    }

    async fn invoke(&self, ctx: Arc<RouteContext>) -> Result<Reply, ApiError> {
        match &self.inner {
            HandlerInner::Async(f) => f(ctx).await,
            HandlerInner::Blocking(f) => {
                let f = f.clone();
                tokio::task::spawn_blocking(move || f(ctx))
                    .await
                    .map_err(|e| ApiError::internal(format!("handler worker failed: {e}")))?
            }
        }
    }
}

/// Documentation and serialization metadata attached to an operation.
#[derive(Clone, Debug)]
pub struct OperationMeta {
    pub operation_id: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub deprecated: bool,
    pub url_name: String,
    pub include_in_schema: bool,
    pub by_alias: bool,
    pub exclude_unset: bool,
    pub exclude_defaults: bool,
    pub exclude_none: bool,
}

pub struct Operation {
    path: String,
    methods: Vec<Method>,
    handler: Handler,
    auth: Vec<AuthCallback>,
    permissions: Arc<Vec<Arc<dyn Permission>>>,
    signature: ViewSignature,
    meta: OperationMeta,
    controller_name: &'static str,
    handler_name: &'static str,
}

impl Operation {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        path: String,
        methods: Vec<Method>,
        handler: Handler,
        auth: Vec<AuthCallback>,
        permissions: Arc<Vec<Arc<dyn Permission>>>,
        signature: ViewSignature,
        meta: OperationMeta,
        controller_name: &'static str,
        handler_name: &'static str,
    ) -> Self {
        Self {
            path,
            methods,
            handler,
            auth,
            permissions,
            signature,
            meta,
            controller_name,
            handler_name,
        }
    }

    /// Route path as declared, converter hints included.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn meta(&self) -> &OperationMeta {
        &self.meta
    }

    pub fn controller_name(&self) -> &'static str {
        self.controller_name
    }

    pub fn handler_name(&self) -> &'static str {
        self.handler_name
    }

    pub(crate) fn is_async(&self) -> bool {
        self.handler.is_async()
    }

    /// Execute the full pipeline for one request.
    ///
    /// Checks run first and short-circuit with their own response: no
    /// context is built and no success log is written for a rejected
    /// request. Once the context exists, the finished notification fires on
    /// every exit path.
    pub(crate) async fn run(&self, api: &Arc<ApiConfig>, request: RequestData) -> Response {
        let request = Arc::new(request);
        if let Err(e) = self.run_checks(api, &request).await {
            tracing::debug!(
                controller = self.controller_name,
                handler = self.handler_name,
                status = e.status_code().as_u16(),
                "request rejected by checks"
            );
            return api.on_exception(e);
        }

        let started = Instant::now();
        let _finished = FinishedGuard::new(api.signals().clone());
        let ctx = Arc::new(RouteContext::new(
            api.clone(),
            request,
            self.permissions.clone(),
            self.controller_name,
            self.handler_name,
        ));
        api.signals().emit_started(&ctx);

        match self.execute(&ctx).await {
            Ok(response) => {
                tracing::info!(
                    controller = self.controller_name,
                    handler = self.handler_name,
                    method = %ctx.request().method(),
                    path = ctx.request().path(),
                    status = response.status().as_u16(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "request completed"
                );
                response
            }
            Err(e) => {
                tracing::error!(
                    controller = self.controller_name,
                    handler = self.handler_name,
                    method = %ctx.request().method(),
                    path = ctx.request().path(),
                    status = e.status_code().as_u16(),
                    error = %e,
                    "request failed"
                );
                api.on_exception(e)
            }
        }
    }

    /// Auth chain, then CSRF.
    async fn run_checks(
        &self,
        api: &Arc<ApiConfig>,
        request: &Arc<RequestData>,
    ) -> Result<(), ApiError> {
        if !self.auth.is_empty() {
            let mut authenticated = false;
            for callback in &self.auth {
                if let Some(identity) = callback.call(request).await? {
                    request.set_auth(identity);
                    authenticated = true;
                    break;
                }
            }
            if !authenticated {
                return Err(ApiError::authentication_failed());
            }
        }
        if api.csrf_enabled() {
            check_csrf(request)?;
        }
        Ok(())
    }

    async fn execute(&self, ctx: &Arc<RouteContext>) -> Result<Response, ApiError> {
        crate::permissions::check_rules(ctx)?;
        let kwargs = self.signature.extract(ctx.request())?;
        ctx.merge_kwargs(kwargs);
        let reply = self.handler.invoke(ctx.clone()).await?;
        self.reply_to_response(ctx, reply)
    }

    /// Convert a handler reply, preserving the temporal response's status
    /// and headers. An already-built `Response` passes through untouched.
    fn reply_to_response(
        &self,
        ctx: &RouteContext,
        reply: Reply,
    ) -> Result<Response, ApiError> {
        match reply {
            Reply::Response(response) => Ok(response),
            Reply::Json(value) => {
                let value = if self.meta.exclude_none {
                    strip_nulls(value)
                } else {
                    value
                };
                let temporal = ctx.temporal();
                render_json(ctx.api(), &temporal, &value)
            }
        }
    }
}

pub(crate) fn render_json(
    api: &Arc<ApiConfig>,
    temporal: &TemporalResponse,
    value: &Value,
) -> Result<Response, ApiError> {
    let body = api.renderer().render(value)?;
    let mut response = Response::new(body.into());
    *response.status_mut() = temporal.status;
    let headers = response.headers_mut();
    for (name, value) in temporal.headers.iter() {
        headers.append(name.clone(), value.clone());
    }
    headers.insert(
        crate::http::CONTENT_TYPE,
        api.renderer()
            .content_type()
            .parse()
            .map_err(|_| ApiError::configuration("renderer produced an invalid content type"))?,
    );
    Ok(response)
}

/// Drop object-entry nulls recursively, the `exclude_none` serialization flag.
fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_nulls).collect()),
        other => other,
    }
}

/// All operations registered under one exact path.
///
/// `is_async` is a sticky union: once any async operation joins the view it
/// stays async, which keeps the dispatch classification stable as routes are
/// added.
pub struct PathView {
    path: String,
    operations: Vec<Arc<Operation>>,
    is_async: bool,
}

impl PathView {
    pub(crate) fn new(path: String) -> Self {
        Self {
            path,
            operations: Vec::new(),
            is_async: false,
        }
    }

    /// Path in router syntax, converter hints stripped.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn operations(&self) -> &[Arc<Operation>] {
        &self.operations
    }

    pub fn is_async(&self) -> bool {
        self.is_async
    }

    pub(crate) fn push(&mut self, operation: Arc<Operation>) {
        self.is_async = self.is_async || operation.is_async();
        self.operations.push(operation);
    }

    pub(crate) async fn dispatch(&self, api: &Arc<ApiConfig>, request: RequestData) -> Response {
        let method = request.method().clone();
        match self
            .operations
            .iter()
            .find(|op| op.methods().contains(&method))
        {
            Some(operation) => operation.run(api, request).await,
            None => (
                StatusCode::METHOD_NOT_ALLOWED,
                Json(json!({"detail": "Method not allowed"})),
            )
                .into_response(),
        }
    }
}
