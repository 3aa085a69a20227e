//! Controller registration: routes, route metadata, and the registrar that
//! turns a controller type plus its route functions into a descriptor of
//! grouped, ready-to-mount operations.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use crate::auth::AuthPolicy;
use crate::context::{RequestData, RouteContext};
use crate::controller::ControllerBase;
use crate::error::ApiError;
use crate::http::Method;
use crate::operation::{Handler, Operation, OperationMeta, PathView};
use crate::permissions::{AllowAny, Permission};
use crate::registry;
use crate::signature::{strip_converters, ParamKind, ViewSignature};
use crate::types::{IntoReply, Kwargs};

/// Metadata record of one route declaration.
#[derive(Clone, Debug)]
pub struct RouteParameters {
    pub path: String,
    pub methods: Vec<Method>,
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub deprecated: bool,
    pub by_alias: bool,
    pub exclude_unset: bool,
    pub exclude_defaults: bool,
    pub exclude_none: bool,
    pub url_name: Option<String>,
    pub include_in_schema: bool,
}

impl RouteParameters {
    fn new(methods: Vec<Method>, path: &str) -> Self {
        Self {
            path: path.to_string(),
            methods,
            operation_id: None,
            summary: None,
            description: None,
            tags: None,
            deprecated: false,
            by_alias: false,
            exclude_unset: false,
            exclude_defaults: false,
            exclude_none: false,
            url_name: None,
            include_in_schema: true,
        }
    }
}

/// Fluent route declaration.
///
/// The path may carry converter hints (`/{int:id}`), which both derive the
/// path part of the signature and are stripped to plain `{id}` segments when
/// the route is mounted.
pub struct Route {
    params: RouteParameters,
    auth: AuthPolicy,
    permissions: Option<Vec<Arc<dyn Permission>>>,
    signature: ViewSignature,
}

impl Route {
    pub fn new(methods: Vec<Method>, path: &str) -> Self {
        Self {
            params: RouteParameters::new(methods, path),
            auth: AuthPolicy::Inherit,
            permissions: None,
            signature: ViewSignature::from_path(path),
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(vec![Method::GET], path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(vec![Method::POST], path)
    }

    pub fn put(path: &str) -> Self {
        Self::new(vec![Method::PUT], path)
    }

    pub fn patch(path: &str) -> Self {
        Self::new(vec![Method::PATCH], path)
    }

    pub fn delete(path: &str) -> Self {
        Self::new(vec![Method::DELETE], path)
    }

    /// Route-level auth override; `AuthPolicy::None` disables the controller
    /// default for this route only.
    pub fn auth(mut self, policy: AuthPolicy) -> Self {
        self.auth = policy;
        self
    }

    /// Route-level permission override replacing the controller defaults.
    pub fn permissions(mut self, rules: Vec<Arc<dyn Permission>>) -> Self {
        self.permissions = Some(rules);
        self
    }

    /// Declare a required query parameter.
    pub fn query(mut self, name: &str, kind: ParamKind) -> Self {
        self.signature = self.signature.query(name, kind);
        self
    }

    /// Declare an optional query parameter with an optional default.
    pub fn query_optional(
        mut self,
        name: &str,
        kind: ParamKind,
        default: Option<serde_json::Value>,
    ) -> Self {
        self.signature = self.signature.query_optional(name, kind, default);
        self
    }

    /// Declare the JSON body as a required kwarg.
    pub fn body(mut self, name: &str) -> Self {
        self.signature = self.signature.body(name);
        self
    }

    pub fn body_optional(mut self, name: &str) -> Self {
        self.signature = self.signature.body_optional(name);
        self
    }

    pub fn operation_id(mut self, id: impl Into<String>) -> Self {
        self.params.operation_id = Some(id.into());
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.params.summary = Some(summary.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.params.description = Some(description.into());
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.params.tags = Some(tags);
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.params.deprecated = true;
        self
    }

    pub fn url_name(mut self, name: impl Into<String>) -> Self {
        self.params.url_name = Some(name.into());
        self
    }

    pub fn exclude_from_schema(mut self) -> Self {
        self.params.include_in_schema = false;
        self
    }

    pub fn by_alias(mut self) -> Self {
        self.params.by_alias = true;
        self
    }

    pub fn exclude_unset(mut self) -> Self {
        self.params.exclude_unset = true;
        self
    }

    pub fn exclude_defaults(mut self) -> Self {
        self.params.exclude_defaults = true;
        self
    }

    /// Drop `null` object entries from JSON replies of this route.
    pub fn exclude_none(mut self) -> Self {
        self.params.exclude_none = true;
        self
    }

    pub fn params(&self) -> &RouteParameters {
        &self.params
    }
}

struct RouteFunction<C> {
    route: Route,
    name: &'static str,
    bind: Box<dyn FnOnce(Arc<C>) -> Handler + Send>,
}

type Factory<C> = Box<dyn FnOnce() -> C + Send>;

/// Builder binding a controller type, its construction, its defaults, and
/// its route functions, finishing with an insertion into the process-wide
/// registry.
pub struct ControllerRegistrar<C: ControllerBase> {
    factory: Factory<C>,
    prefix: String,
    auth: AuthPolicy,
    tags: Vec<String>,
    permissions: Vec<Arc<dyn Permission>>,
    auto_import: bool,
    routes: Vec<RouteFunction<C>>,
}

impl<C: ControllerBase + Default> ControllerRegistrar<C> {
    pub fn new() -> Self {
        Self::with_factory(C::default)
    }
}

impl<C: ControllerBase + Default> Default for ControllerRegistrar<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ControllerBase> ControllerRegistrar<C> {
    /// Registrar whose controller instance is built by `factory`, the place
    /// to hand the controller its dependencies.
    pub fn with_factory<F>(factory: F) -> Self
    where
        F: FnOnce() -> C + Send + 'static,
    {
        Self {
            factory: Box::new(factory),
            prefix: String::new(),
            auth: AuthPolicy::Inherit,
            tags: Vec::new(),
            permissions: vec![Arc::new(AllowAny)],
            auto_import: true,
            routes: Vec::new(),
        }
    }

    /// Path prefix applied to every route. May itself carry parameter
    /// segments; those become path kwargs of each operation under it.
    pub fn prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    /// Default auth callbacks for routes that don't override.
    pub fn auth(mut self, policy: AuthPolicy) -> Self {
        self.auth = policy;
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Default permission rules for routes that don't override.
    pub fn permissions(mut self, rules: Vec<Arc<dyn Permission>>) -> Self {
        self.permissions = rules;
        self
    }

    /// Whether [`Api::auto_discover`](crate::api::Api::auto_discover) picks
    /// this controller up. On by default.
    pub fn auto_import(mut self, auto_import: bool) -> Self {
        self.auto_import = auto_import;
        self
    }

    /// Bind an async handler receiving the controller and the route context.
    pub fn route<F, Fut, R>(mut self, route: Route, name: &'static str, handler: F) -> Self
    where
        F: Fn(Arc<C>, Arc<RouteContext>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<R, ApiError>> + Send + 'static,
        R: IntoReply,
    {
        self.routes.push(RouteFunction {
            route,
            name,
            bind: Box::new(move |controller| {
                Handler::contextual(move |ctx| handler(controller.clone(), ctx))
            }),
        });
        self
    }

    /// Bind a synchronous handler; it runs on the blocking worker pool.
    pub fn blocking_route<F, R>(mut self, route: Route, name: &'static str, handler: F) -> Self
    where
        F: Fn(Arc<C>, &RouteContext) -> Result<R, ApiError> + Send + Sync + 'static,
        R: IntoReply,
    {
        self.routes.push(RouteFunction {
            route,
            name,
            bind: Box::new(move |controller| {
                Handler::contextual_blocking(move |ctx| handler(controller.clone(), ctx))
            }),
        });
        self
    }

    /// Bind a handler that takes only the request and the extracted kwargs,
    /// without the context or the controller instance.
    pub fn plain_route<F, Fut, R>(mut self, route: Route, name: &'static str, handler: F) -> Self
    where
        F: Fn(Arc<RequestData>, Kwargs) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<R, ApiError>> + Send + 'static,
        R: IntoReply,
    {
        self.routes.push(RouteFunction {
            route,
            name,
            bind: Box::new(move |_| Handler::plain(handler)),
        });
        self
    }

    pub fn plain_blocking_route<F, R>(mut self, route: Route, name: &'static str, handler: F) -> Self
    where
        F: Fn(&RequestData, Kwargs) -> Result<R, ApiError> + Send + Sync + 'static,
        R: IntoReply,
    {
        self.routes.push(RouteFunction {
            route,
            name,
            bind: Box::new(move |_| Handler::plain_blocking(handler)),
        });
        self
    }

    /// Build the descriptor and insert it into the process-wide registry.
    ///
    /// Registering the same controller type twice is rejected.
    pub fn register(self) -> Result<Arc<ControllerDescriptor>, ApiError> {
        let name = C::controller_name();
        let tags = if self.tags.is_empty() {
            vec![default_tag(name)]
        } else {
            self.tags
        };
        let default_permissions = Arc::new(self.permissions);
        let controller = Arc::new((self.factory)());

        let mut path_views: BTreeMap<String, PathView> = BTreeMap::new();
        let mut url_paths: BTreeMap<String, String> = BTreeMap::new();

        for route_function in self.routes {
            let RouteFunction { route, name: handler_name, bind } = route_function;
            let Route {
                params,
                auth,
                permissions,
                signature,
            } = route;

            // A parameterized prefix contributes path kwargs too.
            let signature = merge_prefix_signature(&self.prefix, signature);

            let full_path = join_paths(&self.prefix, &params.path);
            let mounted_path = strip_converters(&full_path);
            let operation_id = params
                .operation_id
                .clone()
                .unwrap_or_else(|| auto_operation_id(handler_name));
            let url_name = params
                .url_name
                .clone()
                .unwrap_or_else(|| handler_name.to_string());
            let meta = OperationMeta {
                operation_id,
                summary: params.summary.clone(),
                description: params.description.clone(),
                tags: params.tags.clone().unwrap_or_else(|| tags.clone()),
                deprecated: params.deprecated,
                url_name: url_name.clone(),
                include_in_schema: params.include_in_schema,
                by_alias: params.by_alias,
                exclude_unset: params.exclude_unset,
                exclude_defaults: params.exclude_defaults,
                exclude_none: params.exclude_none,
            };
            let operation = Arc::new(Operation::new(
                full_path,
                params.methods,
                bind(controller.clone()),
                auth.resolve(&self.auth),
                permissions
                    .map(Arc::new)
                    .unwrap_or_else(|| default_permissions.clone()),
                signature,
                meta,
                name,
                handler_name,
            ));

            if url_paths.insert(url_name.clone(), mounted_path.clone()).is_some() {
                return Err(ApiError::configuration(format!(
                    "controller `{name}` declares url name `{url_name}` twice"
                )));
            }
            path_views
                .entry(mounted_path.clone())
                .or_insert_with(|| PathView::new(mounted_path))
                .push(operation);
        }

        let descriptor = Arc::new(ControllerDescriptor {
            name,
            prefix: self.prefix,
            tags,
            auto_import: self.auto_import,
            registered: AtomicBool::new(false),
            path_views: path_views
                .into_iter()
                .map(|(path, view)| (path, Arc::new(view)))
                .collect(),
            url_paths,
        });
        registry::insert::<C>(descriptor.clone())?;
        Ok(descriptor)
    }
}

/// Everything the API needs to mount a registered controller.
pub struct ControllerDescriptor {
    name: &'static str,
    prefix: String,
    tags: Vec<String>,
    auto_import: bool,
    registered: AtomicBool,
    path_views: BTreeMap<String, Arc<PathView>>,
    url_paths: BTreeMap<String, String>,
}

impl fmt::Debug for ControllerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerDescriptor")
            .field("name", &self.name)
            .field("prefix", &self.prefix)
            .field("tags", &self.tags)
            .field("auto_import", &self.auto_import)
            .finish_non_exhaustive()
    }
}

impl ControllerDescriptor {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn auto_import(&self) -> bool {
        self.auto_import
    }

    pub fn registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    /// Path views keyed by mounted path (router syntax, prefix applied).
    pub fn path_views(&self) -> &BTreeMap<String, Arc<PathView>> {
        &self.path_views
    }

    /// Mounted path of a named route.
    pub fn url_path(&self, url_name: &str) -> Option<&str> {
        self.url_paths.get(url_name).map(String::as_str)
    }

    pub(crate) fn url_paths(&self) -> &BTreeMap<String, String> {
        &self.url_paths
    }

    /// Flip the registered flag. A controller mounts on exactly one API.
    pub(crate) fn mark_registered(&self) -> Result<(), ApiError> {
        if self.registered.swap(true, Ordering::AcqRel) {
            return Err(ApiError::configuration(format!(
                "controller `{}` is already mounted on an API",
                self.name
            )));
        }
        Ok(())
    }
}

/// Default tag: type name lower-cased with a trailing `controller` stripped.
fn default_tag(controller_name: &str) -> String {
    let lower = controller_name.to_lowercase();
    lower
        .strip_suffix("controller")
        .filter(|s| !s.is_empty())
        .unwrap_or(&lower)
        .to_string()
}

fn auto_operation_id(handler_name: &str) -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("{}_controller_{handler_name}", &uuid[..8])
}

/// Prepend the prefix's path parameters to a route signature.
fn merge_prefix_signature(prefix: &str, route_signature: ViewSignature) -> ViewSignature {
    if !prefix.contains('{') {
        return route_signature;
    }
    let mut merged = ViewSignature::from_path(prefix);
    for spec in route_signature.params() {
        merged = merged.push_spec(spec.clone());
    }
    merged
}

/// Join two path fragments with single-slash normalization: exactly one
/// leading slash, no duplicate or trailing separators.
pub(crate) fn join_paths(prefix: &str, path: &str) -> String {
    let mut out = String::from("/");
    for segment in prefix
        .split('/')
        .chain(path.split('/'))
        .filter(|s| !s.is_empty())
    {
        if out.len() > 1 {
            out.push('/');
        }
        out.push_str(segment);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_with_single_slashes() {
        assert_eq!(join_paths("/items/", "/{int:id}"), "/items/{int:id}");
        assert_eq!(join_paths("items", "list"), "/items/list");
        assert_eq!(join_paths("", ""), "/");
        assert_eq!(join_paths("/", "/"), "/");
        assert_eq!(join_paths("//a//", "//b"), "/a/b");
    }

    #[test]
    fn default_tag_strips_controller_suffix() {
        assert_eq!(default_tag("EventController"), "event");
        assert_eq!(default_tag("Users"), "users");
        assert_eq!(default_tag("Controller"), "controller");
    }

    #[test]
    fn auto_operation_ids_are_unique_and_shaped() {
        let a = auto_operation_id("list");
        let b = auto_operation_id("list");
        assert_ne!(a, b);
        assert!(a.ends_with("_controller_list"));
        assert_eq!(a.len(), "12345678_controller_list".len());
    }
}
