use crate::error::RouteError;
use crate::router::{RouteSet, RouterItemBuilder};
use crate::view::{CompositionView, MethodView};

/// A named group of routes, mounted under an optional URL prefix.
///
/// Blueprints take the same registrations as the router and are merged into it by
/// [`RouterBuilder::blueprint`](crate::router::RouterBuilder::blueprint). Names must be
/// unique within a router.
pub struct Blueprint {
    name: String,
    url_prefix: Option<String>,
    routes: RouteSet,
}

impl Blueprint {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), url_prefix: None, routes: RouteSet::default() }
    }

    #[must_use]
    pub fn url_prefix(mut self, url_prefix: impl Into<String>) -> Self {
        self.url_prefix = Some(url_prefix.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn route(mut self, path: impl Into<String>, item_builder: RouterItemBuilder) -> Self {
        self.routes.route(path.into(), item_builder);
        self
    }

    #[must_use]
    pub fn view<V: MethodView>(mut self, path: impl AsRef<str>, view: V) -> Self {
        self.routes.view(path.as_ref(), view);
        self
    }

    #[must_use]
    pub fn composition(mut self, path: impl AsRef<str>, view: CompositionView) -> Self {
        self.routes.composition(path.as_ref(), view);
        self
    }

    pub(crate) fn into_routes(self) -> Result<Vec<(String, RouterItemBuilder)>, RouteError> {
        let routes = self.routes.into_routes()?;
        Ok(match &self.url_prefix {
            Some(prefix) => routes.into_iter().map(|(path, item_builder)| (join_prefix(prefix, &path), item_builder)).collect(),
            None => routes,
        })
    }
}

impl std::fmt::Debug for Blueprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blueprint").field("name", &self.name).field("url_prefix", &self.url_prefix).finish_non_exhaustive()
    }
}

/// `/api` + `/users` is `/api/users`; the prefix alone stands for `/`.
fn join_prefix(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_matches('/');
    match (prefix, path) {
        ("", path) => path.to_string(),
        (prefix, "/" | "") => format!("/{prefix}"),
        (prefix, path) if path.starts_with('/') => format!("/{prefix}{path}"),
        (prefix, path) => format!("/{prefix}/{path}"),
    }
}
