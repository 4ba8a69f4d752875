//! The transport half of sluice: an asynchronous HTTP/1.1 connection loop
//! that hands request bodies to handlers as they arrive.
//!
//! A request is decoded in two phases. The header is parsed first and handed to
//! the [`handler::Handler`] together with a [`protocol::body::ReqBody`]; the payload
//! is then pulled from the socket chunk by chunk, only when the handler asks for the
//! next one. A handler can therefore echo a body of tens of megabytes without the
//! connection ever buffering it.
//!
//! # Example
//!
//! ```no_run
//! use http::{Request, Response, StatusCode};
//! use http_body_util::BodyExt;
//! use std::error::Error;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use tracing::{error, info, warn};
//! use sluice_http::connection::HttpConnection;
//! use sluice_http::handler::make_handler;
//! use sluice_http::protocol::body::ReqBody;
//!
//! #[tokio::main]
//! async fn main() {
//!     let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
//!         Ok(tcp_listener) => tcp_listener,
//!         Err(e) => {
//!             error!(cause = %e, "bind server error");
//!             return;
//!         }
//!     };
//!
//!     let handler = Arc::new(make_handler(echo));
//!
//!     loop {
//!         let (tcp_stream, _remote_addr) = match tcp_listener.accept().await {
//!             Ok(stream_and_addr) => stream_and_addr,
//!             Err(e) => {
//!                 warn!(cause = %e, "failed to accept");
//!                 continue;
//!             }
//!         };
//!
//!         let handler = handler.clone();
//!         tokio::spawn(async move {
//!             let (reader, writer) = tcp_stream.into_split();
//!             if let Err(e) = HttpConnection::new(reader, writer).process(handler).await {
//!                 error!("connection shutdown with error: {}", e);
//!             }
//!         });
//!     }
//! }
//!
//! async fn echo(request: Request<ReqBody>) -> Result<Response<String>, Box<dyn Error + Send + Sync>> {
//!     let body = request.into_body().collect().await?.to_bytes();
//!     info!(size = body.len(), "received request body");
//!     Ok(Response::builder().status(StatusCode::OK).body(String::from_utf8(body.to_vec())?)?)
//! }
//! ```
//!
//! # Architecture
//!
//! - [`connection`]: the per-connection request loop, `Expect` handling and keep-alive
//! - [`protocol`]: message types, errors and the request body channel
//! - [`codec`]: `tokio_util` decoders and encoders for the wire format
//! - [`handler`]: the handler trait the connection dispatches to
//!
//! # Limitations
//!
//! - HTTP/1.0 and HTTP/1.1 only
//! - No TLS
//! - Maximum header size: 8KB
//! - Maximum number of headers: 64

pub mod codec;
pub mod connection;
pub mod handler;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
