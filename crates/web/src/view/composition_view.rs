use crate::error::RouteError;
use crate::handler::RequestHandler;
use crate::router::RouterItemBuilder;
use http::Method;
use std::sync::Arc;

/// Handlers assembled per method for one path.
///
/// Unlike a [`MethodView`](super::MethodView), every handler is an independent
/// [`RequestHandler`] and each one chooses its own stream flag. A method may be added
/// only once; a second addition fails the router build.
#[derive(Default)]
pub struct CompositionView {
    items: Vec<RouterItemBuilder>,
    error: Option<RouteError>,
}

impl CompositionView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handler whose request body is buffered.
    #[must_use]
    pub fn add<H: RequestHandler + 'static>(self, methods: impl IntoIterator<Item = Method>, handler: H) -> Self {
        self.insert(methods.into_iter().collect(), Arc::new(handler), false)
    }

    /// Adds a handler whose request body is streamed.
    #[must_use]
    pub fn add_stream<H: RequestHandler + 'static>(self, methods: impl IntoIterator<Item = Method>, handler: H) -> Self {
        self.insert(methods.into_iter().collect(), Arc::new(handler), true)
    }

    fn insert(mut self, methods: Vec<Method>, handler: Arc<dyn RequestHandler>, stream: bool) -> Self {
        let taken = methods.iter().enumerate().find(|(index, method)| {
            methods[..*index].contains(method) || self.items.iter().any(|item| item.methods().contains(method))
        });

        match taken {
            Some((_, method)) => {
                let method = method.clone();
                self.error.get_or_insert(RouteError::DuplicateCompositionMethod { method });
            }
            None => self.items.push(RouterItemBuilder::new(methods, handler).with_stream(stream)),
        }
        self
    }

    pub(crate) fn into_items(self) -> Result<Vec<RouterItemBuilder>, RouteError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.items),
        }
    }
}

impl std::fmt::Debug for CompositionView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let methods = self.items.iter().flat_map(|item| item.methods()).collect::<Vec<_>>();
        f.debug_struct("CompositionView").field("methods", &methods).field("error", &self.error).finish()
    }
}
