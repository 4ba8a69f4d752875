use crate::body::ResponseBody;
use crate::request::Request;
use crate::responder::Responder;
use async_trait::async_trait;
use http::Response;
use std::error::Error;

/// Anything the router can dispatch a request to.
///
/// An `Err` ends up as a 500 response; failures a client should see differently are
/// better returned as a [`Responder`] such as [`WebError`](crate::WebError).
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn invoke(&self, req: Request) -> Result<Response<ResponseBody>, Box<dyn Error + Send + Sync>>;
}

/// An async fn taking the [`Request`] and returning a [`Responder`].
#[derive(Debug, Clone)]
pub struct FnHandler<F> {
    f: F,
}

pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future + Send,
    Fut::Output: Responder,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> RequestHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future + Send,
    Fut::Output: Responder,
{
    async fn invoke(&self, req: Request) -> Result<Response<ResponseBody>, Box<dyn Error + Send + Sync>> {
        Ok((self.f)(req).await.into_response())
    }
}
