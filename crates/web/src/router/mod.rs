//! The routing table.
//!
//! A [`Router`] maps a path pattern to the [`RouterItem`]s registered for it. Each item
//! holds the methods it answers, its handler and whether it streams the request body.
//! Routes, method views, composition views and blueprints all end up as plain items:
//!
//! ```
//! use sluice_web::router::{Router, get, post};
//! use sluice_web::{Request, WebError, handler_fn};
//!
//! async fn index(_req: Request) -> &'static str {
//!     "OK"
//! }
//!
//! async fn upload(mut req: Request) -> Result<String, WebError> {
//!     let mut size = 0;
//!     if let Some(stream) = req.stream_mut() {
//!         while let Some(chunk) = stream.read().await? {
//!             size += chunk.len();
//!         }
//!     }
//!     Ok(size.to_string())
//! }
//!
//! let router = Router::builder()
//!     .route("/", get(handler_fn(index)))
//!     .route("/upload/<name>", post(handler_fn(upload)).stream())
//!     .build()
//!     .unwrap();
//!
//! assert!(router.is_request_stream());
//! ```

mod pattern;

use crate::blueprint::Blueprint;
use crate::error::{RouteError, WebError};
use crate::handler::RequestHandler;
use crate::request::PathParams;
use crate::view::{CompositionView, MethodView, view_items};
use http::Method;
use pattern::RoutePattern;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace};

type InnerRouter<T> = matchit::Router<T>;

/// Immutable routing table, built once by [`RouterBuilder::build`].
pub struct Router {
    inner_router: InnerRouter<Vec<RouterItem>>,
    is_request_stream: bool,
}

/// One registration: methods, handler and stream flag for a path pattern.
pub struct RouterItem {
    methods: Vec<Method>,
    stream: bool,
    pattern: RoutePattern,
    handler: Arc<dyn RequestHandler>,
}

/// Every item registered for the path a request matched, and the captured parameters.
pub struct RouteResult<'router> {
    router_items: &'router [RouterItem],
    params: PathParams,
}

/// The item a request is dispatched to.
pub struct Route<'router> {
    item: &'router RouterItem,
    params: PathParams,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Matches a path against the registered patterns.
    ///
    /// A path nothing matches gives an empty result.
    pub fn at(&self, path: &str) -> RouteResult<'_> {
        match self.inner_router.at(path) {
            Ok(matched) => RouteResult { router_items: matched.value.as_slice(), params: matched.params.into() },
            Err(e) => {
                trace!(path, cause = %e, "no route matched");
                RouteResult { router_items: &[], params: PathParams::new() }
            }
        }
    }

    /// Picks the item that handles `method` on `path`.
    ///
    /// `HEAD` falls back to a `GET` item when no item answers `HEAD` itself.
    ///
    /// # Errors
    /// [`WebError::NotFound`] when no pattern matches the path, or none whose typed
    /// parameters accept it; [`WebError::MethodNotAllowed`] when the path matches but
    /// no item answers the method.
    pub fn dispatch(&self, method: &Method, path: &str) -> Result<Route<'_>, WebError> {
        let RouteResult { router_items, params } = self.at(path);
        let candidates = router_items.iter().filter(|item| item.pattern.accepts(&params)).collect::<Vec<_>>();
        if candidates.is_empty() {
            return Err(WebError::not_found(path));
        }

        let find = |method: &Method| candidates.iter().copied().find(|item| item.methods.contains(method));
        let item = find(method).or_else(|| if *method == Method::HEAD { find(&Method::GET) } else { None });

        match item {
            Some(item) => Ok(Route { item, params }),
            None => {
                let mut allowed: Vec<Method> = vec![];
                for method in candidates.iter().flat_map(|item| item.methods.iter()) {
                    if !allowed.contains(method) {
                        allowed.push(method.clone());
                    }
                }
                Err(WebError::MethodNotAllowed { method: method.clone(), path: path.to_string(), allowed })
            }
        }
    }

    /// Whether any registered route streams its request body.
    pub fn is_request_stream(&self) -> bool {
        self.is_request_stream
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router").field("is_request_stream", &self.is_request_stream).finish_non_exhaustive()
    }
}

impl std::fmt::Debug for RouterItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterItem")
            .field("methods", &self.methods)
            .field("stream", &self.stream)
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for RouteResult<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteResult").field("router_items", &self.router_items).field("params", &self.params).finish()
    }
}

impl std::fmt::Debug for Route<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route").field("item", &self.item).field("params", &self.params).finish()
    }
}

impl RouterItem {
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn is_stream(&self) -> bool {
        self.stream
    }

    pub fn handler(&self) -> &dyn RequestHandler {
        self.handler.as_ref()
    }
}

impl<'router> RouteResult<'router> {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.router_items.is_empty()
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn router_items(&self) -> &'router [RouterItem] {
        self.router_items
    }
}

impl<'router> Route<'router> {
    pub fn item(&self) -> &'router RouterItem {
        self.item
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn into_params(self) -> PathParams {
        self.params
    }
}

/// Registrations collected before they are checked, shared by [`RouterBuilder`] and
/// [`Blueprint`]. The first error wins and is reported at build time.
#[derive(Default)]
pub(crate) struct RouteSet {
    routes: Vec<(String, RouterItemBuilder)>,
    error: Option<RouteError>,
}

impl RouteSet {
    pub(crate) fn route(&mut self, path: String, item_builder: RouterItemBuilder) {
        self.routes.push((path, item_builder));
    }

    pub(crate) fn view<V: MethodView>(&mut self, path: &str, view: V) {
        for item_builder in view_items(view) {
            self.route(path.to_string(), item_builder);
        }
    }

    pub(crate) fn composition(&mut self, path: &str, view: CompositionView) {
        match view.into_items() {
            Ok(items) => items.into_iter().for_each(|item_builder| self.route(path.to_string(), item_builder)),
            Err(e) => self.fail(e),
        }
    }

    pub(crate) fn fail(&mut self, error: RouteError) {
        self.error.get_or_insert(error);
    }

    pub(crate) fn into_routes(self) -> Result<Vec<(String, RouterItemBuilder)>, RouteError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.routes),
        }
    }
}

pub struct RouterBuilder {
    routes: RouteSet,
    blueprints: HashSet<String>,
}

impl RouterBuilder {
    fn new() -> Self {
        Self { routes: RouteSet::default(), blueprints: HashSet::new() }
    }

    pub fn route(mut self, path: impl Into<String>, item_builder: RouterItemBuilder) -> Self {
        self.routes.route(path.into(), item_builder);
        self
    }

    /// Registers every method the view implements on `path`.
    pub fn view<V: MethodView>(mut self, path: impl AsRef<str>, view: V) -> Self {
        self.routes.view(path.as_ref(), view);
        self
    }

    pub fn composition(mut self, path: impl AsRef<str>, view: CompositionView) -> Self {
        self.routes.composition(path.as_ref(), view);
        self
    }

    /// Merges the routes of a blueprint, prefixed with its `url_prefix`.
    pub fn blueprint(mut self, blueprint: Blueprint) -> Self {
        if !self.blueprints.insert(blueprint.name().to_string()) {
            self.routes.fail(RouteError::DuplicateBlueprint { name: blueprint.name().to_string() });
            return self;
        }

        match blueprint.into_routes() {
            Ok(routes) => routes.into_iter().for_each(|(path, item_builder)| self.routes.route(path, item_builder)),
            Err(e) => self.routes.fail(e),
        }
        self
    }

    /// Checks every registration and builds the table.
    ///
    /// # Errors
    /// The first [`RouteError`] met while registering or inserting routes.
    pub fn build(self) -> Result<Router, RouteError> {
        let mut paths: Vec<String> = vec![];
        let mut grouped: HashMap<String, Vec<RouterItem>> = HashMap::new();

        for (path, item_builder) in self.routes.into_routes()? {
            if item_builder.methods.is_empty() {
                return Err(RouteError::NoMethods { path });
            }

            let pattern = RoutePattern::parse(&path)?;
            let items = grouped.entry(pattern.path().to_string()).or_insert_with(|| {
                paths.push(pattern.path().to_string());
                vec![]
            });

            for method in &item_builder.methods {
                let registered = items.iter().any(|item| item.pattern == pattern && item.methods.contains(method));
                if registered {
                    return Err(RouteError::Duplicate { path, method: method.clone() });
                }
            }

            debug!(path = %path, methods = ?item_builder.methods, stream = item_builder.stream, "register route");
            items.push(item_builder.build(pattern));
        }

        let mut inner_router = InnerRouter::new();
        let mut is_request_stream = false;
        for path in paths {
            let Some(items) = grouped.remove(&path) else { continue };
            is_request_stream |= items.iter().any(RouterItem::is_stream);
            inner_router.insert(path.clone(), items).map_err(|source| RouteError::Conflict { path, source })?;
        }

        Ok(Router { inner_router, is_request_stream })
    }
}

impl std::fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterBuilder").field("routes", &self.routes.routes.len()).finish_non_exhaustive()
    }
}

macro_rules! method_router {
    ($method:ident, $method_const:ident) => {
        pub fn $method<H: RequestHandler + 'static>(handler: H) -> RouterItemBuilder {
            RouterItemBuilder::new(vec![Method::$method_const], Arc::new(handler))
        }
    };
}

method_router!(get, GET);
method_router!(post, POST);
method_router!(put, PUT);
method_router!(patch, PATCH);
method_router!(delete, DELETE);
method_router!(head, HEAD);
method_router!(options, OPTIONS);

/// One handler answering several methods.
pub fn methods<H: RequestHandler + 'static>(methods: impl IntoIterator<Item = Method>, handler: H) -> RouterItemBuilder {
    RouterItemBuilder::new(methods.into_iter().collect(), Arc::new(handler))
}

/// A registration that is not attached to a path yet.
pub struct RouterItemBuilder {
    methods: Vec<Method>,
    stream: bool,
    handler: Arc<dyn RequestHandler>,
}

impl std::fmt::Debug for RouterItemBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterItemBuilder").field("methods", &self.methods).field("stream", &self.stream).finish_non_exhaustive()
    }
}

impl RouterItemBuilder {
    pub(crate) fn new(methods: Vec<Method>, handler: Arc<dyn RequestHandler>) -> Self {
        Self { methods, stream: false, handler }
    }

    /// Hands the request body to the handler as a [`StreamBuffer`](crate::StreamBuffer)
    /// instead of buffering it.
    #[must_use]
    pub fn stream(self) -> Self {
        self.with_stream(true)
    }

    #[must_use]
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn is_stream(&self) -> bool {
        self.stream
    }

    fn build(self, pattern: RoutePattern) -> RouterItem {
        RouterItem { methods: self.methods, stream: self.stream, pattern, handler: self.handler }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Request, handler_fn};

    async fn ok(_req: Request) -> &'static str {
        "OK"
    }

    fn router() -> Router {
        Router::builder()
            .route("/", get(handler_fn(ok)))
            .route("/post/<id>", post(handler_fn(ok)).stream())
            .route("/post/<id>", put(handler_fn(ok)))
            .route("/post/add_route", methods([Method::POST, Method::PATCH], handler_fn(ok)))
            .route("/item/<id:int>", get(handler_fn(ok)))
            .build()
            .unwrap()
    }

    #[test]
    fn dispatch_by_path_and_method() {
        let router = router();

        let route = router.dispatch(&Method::POST, "/post/abc").unwrap();
        assert!(route.item().is_stream());
        assert_eq!(route.params().get("id"), Some("abc"));

        let route = router.dispatch(&Method::PUT, "/post/abc").unwrap();
        assert!(!route.item().is_stream());

        let route = router.dispatch(&Method::PATCH, "/post/add_route").unwrap();
        assert!(route.params().is_empty());

        assert!(router.is_request_stream());
    }

    #[test]
    fn head_falls_back_to_get() {
        let router = router();
        let route = router.dispatch(&Method::HEAD, "/").unwrap();
        assert_eq!(route.item().methods(), &[Method::GET]);
    }

    #[test]
    fn not_found_and_not_allowed() {
        let router = router();

        assert!(matches!(router.dispatch(&Method::GET, "/in_valid_post"), Err(WebError::NotFound { path }) if path == "/in_valid_post"));
        assert!(matches!(router.dispatch(&Method::GET, "/item/abc"), Err(WebError::NotFound { .. })));
        assert!(router.dispatch(&Method::GET, "/item/12").is_ok());

        match router.dispatch(&Method::GET, "/post/random_id") {
            Err(WebError::MethodNotAllowed { method, path, allowed }) => {
                assert_eq!(method, Method::GET);
                assert_eq!(path, "/post/random_id");
                assert_eq!(allowed, vec![Method::POST, Method::PUT]);
            }
            other => panic!("unexpected dispatch result: {:?}", other.map(|route| route.item().methods().to_vec())),
        }
    }

    #[test]
    fn registration_errors() {
        let duplicate = Router::builder().route("/a/<id>", get(handler_fn(ok))).route("/a/<id>", get(handler_fn(ok))).build();
        assert!(matches!(duplicate, Err(RouteError::Duplicate { .. })));

        let invalid = Router::builder().route("/a/<id", get(handler_fn(ok))).build();
        assert!(matches!(invalid, Err(RouteError::InvalidPattern { .. })));

        let conflict = Router::builder().route("/a/<id>", get(handler_fn(ok))).route("/a/<name>", post(handler_fn(ok))).build();
        assert!(matches!(conflict, Err(RouteError::Conflict { .. })));

        let empty = Router::builder().route("/a", methods([], handler_fn(ok))).build();
        assert!(matches!(empty, Err(RouteError::NoMethods { .. })));
    }

    #[test]
    fn debug_output() {
        let router = router();
        let route = router.dispatch(&Method::POST, "/post/abc").unwrap();
        let debug = format!("{route:?}");

        assert!(debug.contains("RouterItem"), "{debug}");
        assert!(debug.contains("stream: true"), "{debug}");
        assert!(debug.contains("abc"), "{debug}");
        assert!(format!("{:?}", post(handler_fn(ok)).stream()).contains("stream: true"));
    }

    #[test]
    fn no_stream_routes() {
        let router = Router::builder().route("/", get(handler_fn(ok))).build().unwrap();
        assert!(!router.is_request_stream());
    }
}
