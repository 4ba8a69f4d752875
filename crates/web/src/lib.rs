//! A routing framework whose handlers can stream their request bodies.
//!
//! Routes are registered in an explicit table. Every registration carries a stream
//! flag: a plain route gets its body fully buffered before the handler runs, while a
//! streaming route receives a [`StreamBuffer`] and reads the body chunk by chunk as
//! it arrives. Uploads of any size can thus be processed without holding them in
//! memory.
//!
//! # Example
//!
//! ```no_run
//! use sluice_web::router::{Router, get, post};
//! use sluice_web::{Request, Server, WebError, handler_fn};
//!
//! async fn hello(_req: Request) -> &'static str {
//!     "hello world"
//! }
//!
//! async fn upload(mut req: Request) -> Result<String, WebError> {
//!     let mut size = 0;
//!     if let Some(stream) = req.stream_mut() {
//!         while let Some(chunk) = stream.read().await? {
//!             size += chunk.len();
//!         }
//!     }
//!     Ok(format!("received {size} bytes"))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let router = Router::builder()
//!         .route("/", get(handler_fn(hello)))
//!         .route("/upload", post(handler_fn(upload)).stream())
//!         .build()?;
//!
//!     Server::builder().router(router).address("127.0.0.1:8080").build()?.start().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`router`]: the routing table and registration functions
//! - [`view`]: method views and composition views
//! - [`Blueprint`]: named route groups under a URL prefix
//! - [`Server`] and [`TestClient`]: serving over TCP or in memory

mod blueprint;
mod body;
mod config;
mod error;
mod handler;
mod request;
mod responder;
mod server;
mod stream;
mod test_client;

pub mod router;
pub mod view;

pub use blueprint::Blueprint;
pub use body::ResponseBody;
pub use config::ServerConfig;
pub use error::ClientError;
pub use error::RouteError;
pub use error::ServerBuildError;
pub use error::WebError;
pub use handler::FnHandler;
pub use handler::RequestHandler;
pub use handler::handler_fn;
pub use request::PathParams;
pub use request::Request;
pub use responder::Responder;
pub use server::Server;
pub use server::ServerBuilder;
pub use stream::StreamBuffer;
pub use test_client::TestClient;
pub use test_client::TestRequestBuilder;
pub use test_client::TestResponse;
