//! The server: dispatches decoded requests through the [`Router`] and serves them
//! over TCP.
//!
//! A streaming route receives the body untouched as a [`StreamBuffer`]. For any other
//! route the body is read completely first, bounded by
//! [`ServerConfig::request_max_size`].

use crate::body::ResponseBody;
use crate::config::ServerConfig;
use crate::error::{ServerBuildError, WebError};
use crate::handler::RequestHandler;
use crate::request::{PathParams, Request};
use crate::responder::Responder;
use crate::router::Router;
use crate::stream::StreamBuffer;
use crate::test_client::TestClient;
use async_trait::async_trait;
use bytes::Bytes;
use http::Response;
use http_body::Body as HttpBody;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use sluice_http::connection::HttpConnection;
use sluice_http::handler::Handler;
use sluice_http::protocol::body::ReqBody;
use sluice_http::protocol::{ParseError, RequestHeader};
use std::error::Error;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

pub struct ServerBuilder {
    router: Option<Router>,
    default_handler: Option<Box<dyn RequestHandler>>,
    address: Option<io::Result<Vec<SocketAddr>>>,
    config: ServerConfig,
}

impl ServerBuilder {
    fn new() -> Self {
        Self { router: None, default_handler: None, address: None, config: ServerConfig::default() }
    }

    /// Resolved right away; a failure is reported by [`build`](ServerBuilder::build).
    #[must_use]
    pub fn address<A: ToSocketAddrs>(mut self, address: A) -> Self {
        self.address = Some(address.to_socket_addrs().map(Iterator::collect));
        self
    }

    #[must_use]
    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    /// Answers requests whose path matches no route, instead of a 404.
    #[must_use]
    pub fn default_handler(mut self, request_handler: impl RequestHandler + 'static) -> Self {
        self.default_handler = Some(Box::new(request_handler));
        self
    }

    #[must_use]
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let router = self.router.ok_or(ServerBuildError::MissingRouter)?;
        let address = self.address.ok_or(ServerBuildError::MissingAddress)??;
        if address.is_empty() {
            return Err(ServerBuildError::MissingAddress);
        }
        Ok(Server { router, default_handler: self.default_handler, address, config: self.config })
    }
}

impl std::fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder").field("router", &self.router).field("config", &self.config).finish_non_exhaustive()
    }
}

pub struct Server {
    router: Router,
    default_handler: Option<Box<dyn RequestHandler>>,
    address: Vec<SocketAddr>,
    config: ServerConfig,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Whether any route streams its request body.
    pub fn is_request_stream(&self) -> bool {
        self.router.is_request_stream()
    }

    /// Serves connections until the process ends.
    ///
    /// # Errors
    /// Binding the listener failed.
    pub async fn start(self) -> io::Result<()> {
        info!(address = ?self.address, request_stream = self.is_request_stream(), "start listening");
        let tcp_listener = TcpListener::bind(self.address.as_slice()).await.inspect_err(|e| error!(cause = %e, "bind server error"))?;

        let connection_config = self.config.connection_config();
        let server = Arc::new(self);
        loop {
            let (tcp_stream, remote_addr) = match tcp_listener.accept().await {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            let handler = Arc::clone(&server);
            tokio::spawn(async move {
                let (reader, writer) = tcp_stream.into_split();
                let connection = HttpConnection::with_config(reader, writer, connection_config);
                match connection.process(handler).await {
                    Ok(()) => debug!(%remote_addr, "connection shutdown"),
                    Err(e) if e.is_disconnect() => debug!(%remote_addr, cause = %e, "peer went away"),
                    Err(e) => error!(%remote_addr, cause = %e, "connection shutdown with error"),
                }
            });
        }
    }

    /// An in-memory client for this server; nothing is bound.
    pub fn test_client(self) -> TestClient {
        TestClient::new(Arc::new(self))
    }

    /// Reads a whole body for a non-streaming route.
    async fn read_body(&self, body: ReqBody) -> Result<Bytes, WebError> {
        let limit = self.config.request_max_size;
        if body.size_hint().lower() > u64::try_from(limit).unwrap_or(u64::MAX) {
            return Err(WebError::PayloadTooLarge { limit });
        }

        match Limited::new(body, limit).collect().await {
            Ok(collected) => Ok(collected.to_bytes()),
            Err(e) => Err(match e.downcast::<ParseError>() {
                Ok(e) => WebError::from(*e),
                Err(e) if e.is::<LengthLimitError>() => WebError::PayloadTooLarge { limit },
                Err(e) => WebError::bad_request(e),
            }),
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server").field("router", &self.router).field("address", &self.address).field("config", &self.config).finish_non_exhaustive()
    }
}

#[async_trait]
impl Handler for Server {
    type RespBody = ResponseBody;
    type Error = Box<dyn Error + Send + Sync>;

    async fn call(&self, req: http::Request<ReqBody>) -> Result<Response<Self::RespBody>, Self::Error> {
        let (parts, body) = req.into_parts();
        let header = RequestHeader::from(parts);

        let (handler, stream, params) = match self.router.dispatch(header.method(), header.uri().path()) {
            Ok(route) => (route.item().handler(), route.item().is_stream(), route.into_params()),
            Err(e @ WebError::NotFound { .. }) => match &self.default_handler {
                Some(default_handler) => (default_handler.as_ref(), false, PathParams::new()),
                None => {
                    debug!(method = %header.method(), uri = %header.uri(), "no route matched");
                    return Ok(e.into_response());
                }
            },
            Err(e) => {
                debug!(method = %header.method(), uri = %header.uri(), cause = %e, "route rejected the method");
                return Ok(e.into_response());
            }
        };
        debug!(method = %header.method(), uri = %header.uri(), stream, "dispatch request");

        let request = if stream {
            Request::streaming(header, params, StreamBuffer::new(body))
        } else {
            match self.read_body(body).await {
                Ok(bytes) => Request::buffered(header, params, bytes),
                Err(e) => {
                    warn!(cause = %e, "failed to read request body");
                    return Ok(e.into_response());
                }
            }
        };

        handler.invoke(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler_fn;
    use crate::router::{get, post};
    use http::{Method, StatusCode};

    async fn echo(req: Request) -> Bytes {
        req.body().clone()
    }

    async fn fallback(req: Request) -> String {
        format!("fallback {}", req.path())
    }

    fn server(config: ServerConfig) -> Server {
        let router = Router::builder().route("/echo", post(handler_fn(echo))).route("/", get(handler_fn(echo))).build().unwrap();
        Server::builder().router(router).address("127.0.0.1:0").config(config).build().unwrap()
    }

    fn request(method: Method, uri: &str, body: &'static str) -> http::Request<ReqBody> {
        http::Request::builder().method(method).uri(uri).body(ReqBody::full(body)).unwrap()
    }

    #[test]
    fn build_errors() {
        assert!(matches!(Server::builder().address("127.0.0.1:0").build(), Err(ServerBuildError::MissingRouter)));

        let router = Router::builder().build().unwrap();
        assert!(matches!(Server::builder().router(router).build(), Err(ServerBuildError::MissingAddress)));

        let router = Router::builder().build().unwrap();
        assert!(matches!(Server::builder().router(router).address("not an address").build(), Err(ServerBuildError::InvalidAddress { .. })));
    }

    #[tokio::test]
    async fn buffers_body_for_plain_routes() {
        let server = server(ServerConfig::default());
        let response = server.call(request(Method::POST, "/echo", "hello")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.into_body().collect().await.unwrap().to_bytes(), Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn rejects_large_body() {
        let server = server(ServerConfig { request_max_size: 4, ..ServerConfig::default() });
        let response = server.call(request(Method::POST, "/echo", "hello")).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn not_found_and_default_handler() {
        let response = server(ServerConfig::default()).call(request(Method::GET, "/missing", "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let router = Router::builder().build().unwrap();
        let server = Server::builder().router(router).address("127.0.0.1:0").default_handler(handler_fn(fallback)).build().unwrap();
        let response = server.call(request(Method::GET, "/missing", "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.into_body().collect().await.unwrap().to_bytes(), Bytes::from_static(b"fallback /missing"));
    }
}
