//! Per-request execution state: the inbound request, the temporal response,
//! and the route context threaded through checks and handler invocation.

use std::sync::{Arc, Mutex, OnceLock};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::api::ApiConfig;
use crate::error::ApiError;
use crate::http::{
    to_bytes, Bytes, HeaderMap, HeaderName, HeaderValue, Method, RawPathParams, Request,
    StatusCode, Uri, COOKIE,
};
use crate::permissions::Permission;
use crate::types::Kwargs;

/// Request bodies above this size are rejected before extraction.
const BODY_LIMIT: usize = 2 * 1024 * 1024;

/// The inbound request as seen by the pipeline: head, matched path
/// parameters, buffered body, and the auth identity once a callback
/// resolves one.
pub struct RequestData {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    path_params: Vec<(String, String)>,
    body: Bytes,
    auth: OnceLock<Value>,
}

impl RequestData {
    pub fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        path_params: Vec<(String, String)>,
        body: Bytes,
    ) -> Self {
        Self {
            method,
            uri,
            headers,
            path_params,
            body,
            auth: OnceLock::new(),
        }
    }

    pub(crate) async fn from_axum(
        params: &RawPathParams,
        request: Request,
    ) -> Result<Self, ApiError> {
        let path_params = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let (parts, body) = request.into_parts();
        let body = to_bytes(body, BODY_LIMIT)
            .await
            .map_err(|e| ApiError::bad_request(format!("could not read request body: {e}")))?;
        Ok(Self::new(
            parts.method,
            parts.uri,
            parts.headers,
            path_params,
            body,
        ))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query_string(&self) -> Option<&str> {
        self.uri.query()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Cookie value parsed from the `Cookie` header.
    pub fn cookie(&self, name: &str) -> Option<String> {
        let header = self.header(COOKIE.as_str())?;
        header.split(';').find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
    }

    pub fn path_params(&self) -> &[(String, String)] {
        &self.path_params
    }

    /// Matched path parameter by name. Linear scan, typical count is 1-3.
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The body parsed as JSON; `None` when the body is empty.
    pub fn json_body(&self) -> Result<Option<Value>, ApiError> {
        if self.body.is_empty() {
            return Ok(None);
        }
        serde_json::from_slice(&self.body)
            .map(Some)
            .map_err(|e| ApiError::validation(format!("invalid JSON body: {e}")))
    }

    /// The identity attached by the first accepting auth callback.
    pub fn auth(&self) -> Option<&Value> {
        self.auth.get()
    }

    pub(crate) fn set_auth(&self, identity: Value) {
        let _ = self.auth.set(identity);
    }
}

/// Mutable response state built before handler invocation. Handlers may
/// adjust the status and headers through the context; the final response
/// preserves both.
#[derive(Clone)]
pub struct TemporalResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl Default for TemporalResponse {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
        }
    }
}

/// Execution context of one request through one operation.
///
/// Created at the start of a run, passed by reference through checks and
/// handler invocation, discarded at the end. Never shared across requests.
pub struct RouteContext {
    api: Arc<ApiConfig>,
    request: Arc<RequestData>,
    response: Mutex<TemporalResponse>,
    permissions: Arc<Vec<Arc<dyn Permission>>>,
    kwargs: Mutex<Kwargs>,
    controller_name: &'static str,
    handler_name: &'static str,
}

impl RouteContext {
    pub(crate) fn new(
        api: Arc<ApiConfig>,
        request: Arc<RequestData>,
        permissions: Arc<Vec<Arc<dyn Permission>>>,
        controller_name: &'static str,
        handler_name: &'static str,
    ) -> Self {
        Self {
            api,
            request,
            response: Mutex::new(TemporalResponse::default()),
            permissions,
            kwargs: Mutex::new(Kwargs::new()),
            controller_name,
            handler_name,
        }
    }

    /// A context outside the request pipeline, for evaluating permission
    /// rules or capability helpers directly (primarily in tests).
    pub fn detached(
        request: RequestData,
        permissions: Vec<Arc<dyn Permission>>,
    ) -> Arc<RouteContext> {
        Arc::new(Self::new(
            Arc::new(ApiConfig::default()),
            Arc::new(request),
            Arc::new(permissions),
            "detached",
            "detached",
        ))
    }

    pub fn request(&self) -> &RequestData {
        &self.request
    }

    pub(crate) fn request_handle(&self) -> Arc<RequestData> {
        self.request.clone()
    }

    /// The permission rules resolved for this route (route override, else
    /// the controller defaults).
    pub fn permissions(&self) -> &[Arc<dyn Permission>] {
        &self.permissions
    }

    /// Snapshot of the accumulated kwargs.
    pub fn kwargs(&self) -> Kwargs {
        self.kwargs.lock().expect("kwargs lock poisoned").clone()
    }

    /// A single kwarg deserialized into a concrete type.
    pub fn param<T: DeserializeOwned>(&self, name: &str) -> Result<T, ApiError> {
        let value = self
            .kwargs
            .lock()
            .expect("kwargs lock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| ApiError::validation(format!("missing parameter `{name}`")))?;
        serde_json::from_value(value)
            .map_err(|e| ApiError::validation(format!("invalid parameter `{name}`: {e}")))
    }

    pub(crate) fn merge_kwargs(&self, kwargs: Kwargs) {
        self.kwargs
            .lock()
            .expect("kwargs lock poisoned")
            .extend(kwargs);
    }

    /// Override the status of the final response.
    pub fn set_status(&self, status: StatusCode) {
        self.response.lock().expect("response lock poisoned").status = status;
    }

    /// Add a header to the final response.
    pub fn insert_header(&self, name: HeaderName, value: HeaderValue) {
        self.response
            .lock()
            .expect("response lock poisoned")
            .headers
            .insert(name, value);
    }

    pub(crate) fn temporal(&self) -> TemporalResponse {
        self.response.lock().expect("response lock poisoned").clone()
    }

    pub fn controller_name(&self) -> &'static str {
        self.controller_name
    }

    pub fn handler_name(&self) -> &'static str {
        self.handler_name
    }

    pub(crate) fn api(&self) -> &Arc<ApiConfig> {
        &self.api
    }
}
