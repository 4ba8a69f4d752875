use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, Response, StatusCode};
use sluice_web::router::{Router, delete, get, head, methods, options, patch, post, put};
use sluice_web::view::{CompositionView, MethodView};
use sluice_web::{
    Blueprint, ClientError, RequestHandler, Request, Responder, ResponseBody, Server, ServerConfig, TestClient, TestResponse, WebError,
    handler_fn,
};
use std::sync::LazyLock;

static DATA: LazyLock<Bytes> = LazyLock::new(|| Bytes::from("abc".repeat(10_000_000)));

fn client(router: Router) -> TestClient {
    client_with_config(router, ServerConfig::default())
}

fn client_with_config(router: Router, config: ServerConfig) -> TestClient {
    Server::builder().router(router).address("127.0.0.1:0").config(config).build().unwrap().test_client()
}

/// Reads the whole streamed body back into the response.
async fn stream_echo(mut req: Request) -> Result<String, WebError> {
    let stream = req.stream_mut().expect("a streaming route must receive a StreamBuffer");
    let mut result = Vec::new();
    while let Some(body) = stream.read().await? {
        result.extend_from_slice(&body);
    }
    String::from_utf8(result).map_err(WebError::bad_request)
}

fn echo() -> impl RequestHandler + 'static {
    handler_fn(stream_echo)
}

fn reply(text: &'static str) -> impl RequestHandler + 'static {
    handler_fn(move |req: Request| async move {
        assert!(req.stream().is_none(), "{} must not stream", req.path());
        text
    })
}

fn assert_text(response: &TestResponse, text: &str) {
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text(), text);
}

fn assert_echo(response: &TestResponse) {
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.body().len(), DATA.len());
    assert!(*response.body() == *DATA, "echoed body differs from the request body");
}

struct SimpleView;

#[async_trait]
impl MethodView for SimpleView {
    async fn get(&self, req: Request) -> Result<Response<ResponseBody>, WebError> {
        assert!(req.stream().is_none());
        Ok("OK".into_response())
    }

    async fn post(&self, req: Request) -> Result<Response<ResponseBody>, WebError> {
        Ok(stream_echo(req).await?.into_response())
    }

    fn methods(&self) -> Vec<Method> {
        vec![Method::GET, Method::POST]
    }

    fn stream_methods(&self) -> Vec<Method> {
        vec![Method::POST]
    }
}

fn composition_view() -> CompositionView {
    CompositionView::new().add([Method::GET], reply("OK")).add_stream([Method::POST], echo())
}

#[tokio::test]
async fn request_stream_method_view() {
    let router = Router::builder().view("/method_view", SimpleView).build().unwrap();
    assert!(router.is_request_stream());
    let client = client(router);

    let response = client.get("/method_view").send().await.unwrap();
    assert_text(&response, "OK");

    let response = client.post("/method_view").body(DATA.clone()).send().await.unwrap();
    assert_echo(&response);
}

#[tokio::test]
async fn request_stream_100_continue() {
    for (expect, rejected) in [("100-continue", false), ("100-continue-extra", true)] {
        let router = Router::builder().view("/method_view", SimpleView).build().unwrap();
        assert!(router.is_request_stream());
        let client = client(router);

        let result = client.post("/method_view").header("EXPECT", expect).body(DATA.clone()).send().await;
        if rejected {
            match result {
                Err(ClientError::ExpectationFailed { status, message }) => {
                    assert_eq!(status, StatusCode::EXPECTATION_FAILED);
                    assert!(message.contains("Unknown Expect: 100-continue-extra"), "{message}");
                }
                other => panic!("expected a failed expectation, got {:?}", other.map(|response| response.status())),
            }
        } else {
            assert_echo(&result.unwrap());
        }
    }
}

#[tokio::test]
async fn request_stream_app() {
    let router = Router::builder()
        .route("/get", get(reply("GET")))
        .route("/head", head(reply("HEAD")))
        .route("/delete", delete(reply("DELETE")))
        .route("/options", options(reply("OPTIONS")))
        .route("/_post/<id>", post(reply("_POST")))
        .route("/post/<id>", post(echo()).stream())
        .route("/_put", put(reply("_PUT")))
        .route("/put", put(echo()).stream())
        .route("/_patch", patch(reply("_PATCH")))
        .route("/patch", patch(echo()).stream())
        .build()
        .unwrap();
    assert!(router.is_request_stream());
    let client = client(router);

    assert_text(&client.get("/get").send().await.unwrap(), "GET");
    assert_text(&client.head("/head").send().await.unwrap(), "");
    assert_text(&client.delete("/delete").send().await.unwrap(), "DELETE");
    assert_text(&client.options("/options").send().await.unwrap(), "OPTIONS");

    assert_text(&client.post("/_post/1").body(DATA.clone()).send().await.unwrap(), "_POST");
    assert_echo(&client.post("/post/1").body(DATA.clone()).send().await.unwrap());

    assert_text(&client.put("/_put").body(DATA.clone()).send().await.unwrap(), "_PUT");
    assert_echo(&client.put("/put").body(DATA.clone()).send().await.unwrap());

    assert_text(&client.patch("/_patch").body(DATA.clone()).send().await.unwrap(), "_PATCH");
    assert_echo(&client.patch("/patch").body(DATA.clone()).send().await.unwrap());
}

#[tokio::test]
async fn request_stream_handle_exception() {
    let router = Router::builder().route("/post/<id>", post(echo()).stream()).build().unwrap();
    let client = client(router);

    let response = client.post("/in_valid_post").body(DATA.clone()).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.text(), "Error: Requested URL /in_valid_post not found");

    let response = client.get("/post/random_id").body(DATA.clone()).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.text(), "Error: Method GET not allowed for URL /post/random_id");
    assert_eq!(response.headers().get(http::header::ALLOW).unwrap(), "POST");
}

#[tokio::test]
async fn request_stream_blueprint() {
    let blueprint = Blueprint::new("test_blueprint_request_stream_blueprint")
        .route("/head", head(reply("HEAD")))
        .route("/delete", delete(reply("DELETE")))
        .route("/options", options(reply("OPTIONS")))
        .route("/_post/<id>", post(reply("_POST")))
        .route("/post/<id>", post(echo()).stream())
        .route("/_put", put(reply("_PUT")))
        .route("/put", put(echo()).stream())
        .route("/_patch", patch(reply("_PATCH")))
        .route("/patch", patch(echo()).stream())
        .route("/post/add_route", methods([Method::POST], echo()).stream());

    let router = Router::builder().route("/get", get(reply("GET"))).blueprint(blueprint).build().unwrap();
    assert!(router.is_request_stream());
    let client = client(router);

    assert_text(&client.get("/get").send().await.unwrap(), "GET");
    assert_text(&client.head("/head").send().await.unwrap(), "");
    assert_text(&client.delete("/delete").send().await.unwrap(), "DELETE");
    assert_text(&client.options("/options").send().await.unwrap(), "OPTIONS");

    assert_text(&client.post("/_post/1").body(DATA.clone()).send().await.unwrap(), "_POST");
    assert_echo(&client.post("/post/1").body(DATA.clone()).send().await.unwrap());

    assert_text(&client.put("/_put").body(DATA.clone()).send().await.unwrap(), "_PUT");
    assert_echo(&client.put("/put").body(DATA.clone()).send().await.unwrap());

    assert_text(&client.patch("/_patch").body(DATA.clone()).send().await.unwrap(), "_PATCH");
    assert_echo(&client.patch("/patch").body(DATA.clone()).send().await.unwrap());

    assert_echo(&client.post("/post/add_route").body(DATA.clone()).send().await.unwrap());
}

#[tokio::test]
async fn request_stream_composition_view() {
    let router = Router::builder().composition("/composition_view", composition_view()).build().unwrap();
    assert!(router.is_request_stream());
    let client = client(router);

    assert_text(&client.get("/composition_view").send().await.unwrap(), "OK");
    assert_echo(&client.post("/composition_view").body(DATA.clone()).send().await.unwrap());
}

#[tokio::test]
async fn request_stream() {
    let blueprint = Blueprint::new("test_blueprint_request_stream")
        .route("/bp_stream", post(echo()).stream())
        .route("/bp_get", get(reply("OK")));

    let router = Router::builder()
        .route("/stream", post(echo()).stream())
        .route("/get", get(reply("OK")))
        .view("/method_view", SimpleView)
        .blueprint(blueprint)
        .composition("/composition_view", composition_view())
        .build()
        .unwrap();
    assert!(router.is_request_stream());
    let client = client(router);

    assert_text(&client.get("/method_view").send().await.unwrap(), "OK");
    assert_echo(&client.post("/method_view").body(DATA.clone()).send().await.unwrap());

    assert_text(&client.get("/composition_view").send().await.unwrap(), "OK");
    assert_echo(&client.post("/composition_view").body(DATA.clone()).send().await.unwrap());

    assert_text(&client.get("/get").send().await.unwrap(), "OK");
    assert_echo(&client.post("/stream").body(DATA.clone()).send().await.unwrap());

    assert_text(&client.get("/bp_get").send().await.unwrap(), "OK");
    assert_echo(&client.post("/bp_stream").body(DATA.clone()).send().await.unwrap());
}

#[tokio::test]
async fn chunked_request_is_streamed_in_order() {
    let router = Router::builder().route("/stream", post(echo()).stream()).build().unwrap();
    let client = client(router);

    let response = client
        .post("/stream")
        .header("transfer-encoding", "chunked")
        .body("5\r\nhello\r\n1;ext=1\r\n \r\n5\r\nworld\r\n0\r\n\r\n")
        .send()
        .await
        .unwrap();
    assert_text(&response, "hello world");
}

#[tokio::test]
async fn buffered_route_respects_request_max_size() {
    let router = Router::builder().route("/upload", post(reply("stored"))).route("/stream", post(echo()).stream()).build().unwrap();
    let client = client_with_config(router, ServerConfig { request_max_size: 1024, ..ServerConfig::default() });

    let response = client.post("/upload").body("a".repeat(2048)).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(response.text(), "Payload Too Large");

    assert_text(&client.post("/upload").body("a".repeat(512)).send().await.unwrap(), "stored");

    // streaming routes are not limited
    let response = client.post("/stream").body("a".repeat(2048)).send().await.unwrap();
    assert_eq!(response.body().len(), 2048);
}
