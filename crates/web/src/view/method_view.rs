use crate::body::ResponseBody;
use crate::error::WebError;
use crate::handler::RequestHandler;
use crate::request::Request;
use crate::responder::Responder;
use crate::router::RouterItemBuilder;
use async_trait::async_trait;
use http::{Method, Response};
use std::error::Error;
use std::sync::Arc;

/// A view answering several methods of one path.
///
/// Implement the handlers the view supports and list them in
/// [`methods`](MethodView::methods); only those are registered. Methods returned by
/// [`stream_methods`](MethodView::stream_methods) receive a streaming body.
///
/// ```
/// use async_trait::async_trait;
/// use http::{Method, Response};
/// use sluice_web::router::Router;
/// use sluice_web::view::MethodView;
/// use sluice_web::{Request, Responder, ResponseBody, WebError};
///
/// struct Upload;
///
/// #[async_trait]
/// impl MethodView for Upload {
///     async fn get(&self, _req: Request) -> Result<Response<ResponseBody>, WebError> {
///         Ok("ready".into_response())
///     }
///
///     async fn post(&self, mut req: Request) -> Result<Response<ResponseBody>, WebError> {
///         let body = match req.stream_mut() {
///             Some(stream) => stream.read_to_end().await?,
///             None => req.body().clone(),
///         };
///         Ok(body.into_response())
///     }
///
///     fn methods(&self) -> Vec<Method> {
///         vec![Method::GET, Method::POST]
///     }
///
///     fn stream_methods(&self) -> Vec<Method> {
///         vec![Method::POST]
///     }
/// }
///
/// let router = Router::builder().view("/upload", Upload).build().unwrap();
/// assert!(router.is_request_stream());
/// ```
#[async_trait]
pub trait MethodView: Send + Sync + 'static {
    async fn get(&self, req: Request) -> Result<Response<ResponseBody>, WebError> {
        Err(not_allowed(&req, self.methods()))
    }

    async fn post(&self, req: Request) -> Result<Response<ResponseBody>, WebError> {
        Err(not_allowed(&req, self.methods()))
    }

    async fn put(&self, req: Request) -> Result<Response<ResponseBody>, WebError> {
        Err(not_allowed(&req, self.methods()))
    }

    async fn patch(&self, req: Request) -> Result<Response<ResponseBody>, WebError> {
        Err(not_allowed(&req, self.methods()))
    }

    async fn delete(&self, req: Request) -> Result<Response<ResponseBody>, WebError> {
        Err(not_allowed(&req, self.methods()))
    }

    async fn head(&self, req: Request) -> Result<Response<ResponseBody>, WebError> {
        Err(not_allowed(&req, self.methods()))
    }

    async fn options(&self, req: Request) -> Result<Response<ResponseBody>, WebError> {
        Err(not_allowed(&req, self.methods()))
    }

    /// The methods this view implements.
    fn methods(&self) -> Vec<Method>;

    /// The subset of [`methods`](MethodView::methods) whose body is streamed.
    fn stream_methods(&self) -> Vec<Method> {
        vec![]
    }
}

fn not_allowed(req: &Request, allowed: Vec<Method>) -> WebError {
    WebError::MethodNotAllowed { method: req.method().clone(), path: req.path().to_string(), allowed }
}

/// Dispatches one method of a shared view.
struct ViewHandler<V> {
    view: Arc<V>,
    method: Method,
}

#[async_trait]
impl<V: MethodView> RequestHandler for ViewHandler<V> {
    async fn invoke(&self, req: Request) -> Result<Response<ResponseBody>, Box<dyn Error + Send + Sync>> {
        let view = self.view.as_ref();
        let result = match self.method.as_str() {
            "GET" => view.get(req).await,
            "POST" => view.post(req).await,
            "PUT" => view.put(req).await,
            "PATCH" => view.patch(req).await,
            "DELETE" => view.delete(req).await,
            "HEAD" => view.head(req).await,
            "OPTIONS" => view.options(req).await,
            _ => Err(not_allowed(&req, view.methods())),
        };
        Ok(result.into_response())
    }
}

/// One router item per implemented method, all sharing the view.
pub(crate) fn view_items<V: MethodView>(view: V) -> Vec<RouterItemBuilder> {
    let view = Arc::new(view);
    let stream_methods = view.stream_methods();

    view.methods()
        .into_iter()
        .map(|method| {
            let stream = stream_methods.contains(&method);
            let handler = ViewHandler { view: Arc::clone(&view), method: method.clone() };
            RouterItemBuilder::new(vec![method], Arc::new(handler)).with_stream(stream)
        })
        .collect()
}
