//! The API instance: rendering, exception translation, controller mounting,
//! and router assembly.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::controller::ControllerBase;
use crate::error::ApiError;
use crate::http::{routing, Bytes, IntoResponse, RawPathParams, Request, Response, Router};
use crate::registrar::{join_paths, ControllerDescriptor};
use crate::registry;
use crate::signals::{RouteObserver, Signals};
use crate::context::RequestData;

/// Serializes response payloads into bytes.
pub trait Renderer: Send + Sync {
    fn render(&self, payload: &Value) -> Result<Bytes, ApiError>;

    fn content_type(&self) -> &'static str;
}

/// The default renderer: compact JSON.
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render(&self, payload: &Value) -> Result<Bytes, ApiError> {
        serde_json::to_vec(payload)
            .map(Bytes::from)
            .map_err(|e| ApiError::internal(format!("response rendering failed: {e}")))
    }

    fn content_type(&self) -> &'static str {
        "application/json; charset=utf-8"
    }
}

type ExceptionHandler = dyn Fn(&ApiError) -> Response + Send + Sync;

/// Shared per-API configuration handed to every operation run.
pub struct ApiConfig {
    renderer: Arc<dyn Renderer>,
    signals: Signals,
    csrf: bool,
    exception_handler: Option<Arc<ExceptionHandler>>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            renderer: Arc::new(JsonRenderer),
            signals: Signals::empty(),
            csrf: false,
            exception_handler: None,
        }
    }
}

impl ApiConfig {
    pub(crate) fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.renderer
    }

    pub(crate) fn signals(&self) -> &Signals {
        &self.signals
    }

    pub(crate) fn csrf_enabled(&self) -> bool {
        self.csrf
    }

    /// Translate an error into its response, through the custom handler when
    /// one is installed.
    pub(crate) fn on_exception(&self, error: ApiError) -> Response {
        match &self.exception_handler {
            Some(handler) => handler(&error),
            None => error.into_response(),
        }
    }
}

/// API builder: collects mounted controllers and produces the router.
pub struct Api {
    prefix: String,
    csrf: bool,
    renderer: Arc<dyn Renderer>,
    observers: Vec<Arc<dyn RouteObserver>>,
    exception_handler: Option<Arc<ExceptionHandler>>,
    descriptors: Vec<Arc<ControllerDescriptor>>,
    url_names: BTreeSet<String>,
}

impl fmt::Debug for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Api")
            .field("prefix", &self.prefix)
            .field("csrf", &self.csrf)
            .field("descriptors", &self.descriptors)
            .field("url_names", &self.url_names)
            .finish_non_exhaustive()
    }
}

impl Default for Api {
    fn default() -> Self {
        Self::new()
    }
}

impl Api {
    pub fn new() -> Self {
        Self {
            prefix: String::new(),
            csrf: false,
            renderer: Arc::new(JsonRenderer),
            observers: Vec::new(),
            exception_handler: None,
            descriptors: Vec::new(),
            url_names: BTreeSet::new(),
        }
    }

    /// Mount prefix prepended to every controller path.
    pub fn prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    /// Enforce the double-submit CSRF check on unsafe methods.
    pub fn enable_csrf(mut self) -> Self {
        self.csrf = true;
        self
    }

    pub fn renderer(mut self, renderer: impl Renderer + 'static) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    /// Add a lifecycle observer. Observer failures are logged and never
    /// affect request handling.
    pub fn observer(mut self, observer: impl RouteObserver + 'static) -> Self {
        self.observers.push(Arc::new(observer));
        self
    }

    /// Replace the default error-to-response translation.
    pub fn exception_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ApiError) -> Response + Send + Sync + 'static,
    {
        self.exception_handler = Some(Arc::new(handler));
        self
    }

    /// Mount a registered controller by type.
    pub fn register<C: ControllerBase>(self) -> Result<Self, ApiError> {
        self.register_controller(C::api_controller()?)
    }

    /// Mount a controller descriptor. Flips its registered flag; mounting
    /// the same controller on a second API is rejected.
    pub fn register_controller(
        mut self,
        descriptor: Arc<ControllerDescriptor>,
    ) -> Result<Self, ApiError> {
        for url_name in descriptor.url_paths().keys() {
            if self.url_names.contains(url_name) {
                return Err(ApiError::configuration(format!(
                    "url name `{url_name}` is declared by more than one mounted controller"
                )));
            }
        }
        descriptor.mark_registered()?;
        self.url_names
            .extend(descriptor.url_paths().keys().cloned());
        self.descriptors.push(descriptor);
        Ok(self)
    }

    /// Mount every registered controller flagged for auto-import that is not
    /// already mounted.
    pub fn auto_discover(mut self) -> Result<Self, ApiError> {
        for descriptor in registry::auto_import_descriptors() {
            if descriptor.registered() {
                continue;
            }
            self = self.register_controller(descriptor)?;
        }
        Ok(self)
    }

    /// Reverse lookup: the mounted path of a named route.
    pub fn url_for(&self, url_name: &str) -> Option<String> {
        self.descriptors.iter().find_map(|descriptor| {
            descriptor
                .url_path(url_name)
                .map(|path| join_paths(&self.prefix, path))
        })
    }

    /// Assemble the router: one route per grouped path, dispatching into its
    /// path view.
    pub fn router(self) -> Result<Router, ApiError> {
        let config = Arc::new(ApiConfig {
            renderer: self.renderer,
            signals: Signals::new(self.observers),
            csrf: self.csrf,
            exception_handler: self.exception_handler,
        });

        let mut mounted = BTreeSet::new();
        let mut router = Router::new();
        for descriptor in &self.descriptors {
            for (path, view) in descriptor.path_views() {
                let full_path = join_paths(&self.prefix, path);
                if !mounted.insert(full_path.clone()) {
                    return Err(ApiError::configuration(format!(
                        "path `{full_path}` is mounted by more than one controller"
                    )));
                }
                let view = view.clone();
                let config = config.clone();
                let handler = move |params: RawPathParams, request: Request| {
                    let view = view.clone();
                    let config = config.clone();
                    async move {
                        match RequestData::from_axum(&params, request).await {
                            Ok(data) => view.dispatch(&config, data).await,
                            Err(e) => config.on_exception(e),
                        }
                    }
                };
                router = router.route(&full_path, routing::any(handler));
            }
        }
        Ok(router)
    }
}
