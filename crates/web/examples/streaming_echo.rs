//! Try it with:
//!
//! ```text
//! curl -v -H 'Expect: 100-continue' --data-binary @large.file http://127.0.0.1:3000/upload/large.file
//! curl -v -X PUT --data 'name=sluice' http://127.0.0.1:3000/echo
//! ```

use async_trait::async_trait;
use http::{Method, Response, StatusCode};
use sluice_web::router::{Router, get, post};
use sluice_web::view::{CompositionView, MethodView};
use sluice_web::{Blueprint, Request, Responder, ResponseBody, Server, ServerConfig, WebError, handler_fn};
use std::time::Instant;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

async fn hello_world(_req: Request) -> &'static str {
    "hello world"
}

async fn default_handler(req: Request) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("nothing at {}", req.path()))
}

/// Counts the uploaded bytes without keeping them.
async fn upload(mut req: Request) -> Result<String, WebError> {
    let name = req.param("name").unwrap_or("unnamed").to_string();
    let Some(stream) = req.stream_mut() else {
        return Err(WebError::bad_request("upload must be streamed"));
    };

    let start = Instant::now();
    let (mut chunks, mut size) = (0usize, 0usize);
    while let Some(chunk) = stream.read().await? {
        chunks += 1;
        size += chunk.len();
    }

    info!(name = %name, chunks, size, elapsed = ?start.elapsed(), "upload finished");
    Ok(format!("{name}: received {size} bytes in {chunks} chunks\n"))
}

struct Echo;

#[async_trait]
impl MethodView for Echo {
    async fn get(&self, _req: Request) -> Result<Response<ResponseBody>, WebError> {
        Ok("send me something\n".into_response())
    }

    async fn put(&self, req: Request) -> Result<Response<ResponseBody>, WebError> {
        Ok(req.body().clone().into_response())
    }

    async fn post(&self, mut req: Request) -> Result<Response<ResponseBody>, WebError> {
        match req.stream_mut() {
            Some(stream) => Ok(stream.read_to_end().await?.into_response()),
            None => Ok(req.body().clone().into_response()),
        }
    }

    fn methods(&self) -> Vec<Method> {
        vec![Method::GET, Method::PUT, Method::POST]
    }

    fn stream_methods(&self) -> Vec<Method> {
        vec![Method::POST]
    }
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let status = CompositionView::new()
        .add([Method::GET, Method::HEAD], handler_fn(|_req: Request| async { "up" }))
        .add_stream([Method::POST], handler_fn(upload));

    let api = Blueprint::new("api").url_prefix("/api").route("/hello", get(handler_fn(hello_world))).composition("/status", status);

    let router = Router::builder()
        .route("/", get(handler_fn(hello_world)))
        .route("/upload/<name>", post(handler_fn(upload)).stream())
        .view("/echo", Echo)
        .blueprint(api)
        .build();
    let router = match router {
        Ok(router) => router,
        Err(e) => {
            error!(cause = %e, "invalid routes");
            return;
        }
    };

    let config = ServerConfig { request_max_size: 16 * 1024 * 1024, ..ServerConfig::default() };
    let server = Server::builder().router(router).address("127.0.0.1:3000").config(config).default_handler(handler_fn(default_handler)).build();

    match server {
        Ok(server) => {
            if let Err(e) = server.start().await {
                error!(cause = %e, "server stopped");
            }
        }
        Err(e) => error!(cause = %e, "failed to build server"),
    }
}
