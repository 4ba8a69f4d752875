//! An HTTP client wired to a [`Server`] through an in-memory pipe.
//!
//! Every request opens a fresh connection served by the real connection loop, so
//! requests go through header parsing, `Expect` handling, body streaming and response
//! encoding exactly as over TCP, without binding a port.
//!
//! ```
//! use sluice_web::router::{Router, post};
//! use sluice_web::{Request, Server, WebError, handler_fn};
//!
//! async fn count(mut req: Request) -> Result<String, WebError> {
//!     let mut size = 0;
//!     if let Some(stream) = req.stream_mut() {
//!         while let Some(chunk) = stream.read().await? {
//!             size += chunk.len();
//!         }
//!     }
//!     Ok(size.to_string())
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let router = Router::builder().route("/count", post(handler_fn(count)).stream()).build().unwrap();
//! let client = Server::builder().router(router).address("127.0.0.1:0").build().unwrap().test_client();
//!
//! let response = client.post("/count").body("abc".repeat(1000)).send().await.unwrap();
//! assert_eq!(response.text(), "3000");
//! # }
//! ```

use crate::error::ClientError;
use crate::server::Server;
use bytes::{Buf, Bytes, BytesMut};
use http::header::{CONNECTION, CONTENT_LENGTH, EXPECT, HOST, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use httparse::Status;
use serde::de::DeserializeOwned;
use sluice_http::codec::PayloadDecoder;
use sluice_http::connection::HttpConnection;
use sluice_http::protocol::{PayloadItem, PayloadSize};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, duplex, split};
use tokio_util::codec::Decoder;
use tracing::{debug, error};

const BUFFER_SIZE: usize = 64 * 1024;

const MAX_HEADER_NUM: usize = 64;

#[derive(Debug, Clone)]
pub struct TestClient {
    server: Arc<Server>,
}

macro_rules! client_method {
    ($method:ident, $method_const:ident) => {
        pub fn $method(&self, path: impl Into<String>) -> TestRequestBuilder<'_> {
            self.request(Method::$method_const, path)
        }
    };
}

impl TestClient {
    pub(crate) fn new(server: Arc<Server>) -> Self {
        Self { server }
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    pub fn request(&self, method: Method, path: impl Into<String>) -> TestRequestBuilder<'_> {
        TestRequestBuilder { client: self, method, path: path.into(), headers: HeaderMap::new(), body: Bytes::new(), error: None }
    }

    client_method!(get, GET);
    client_method!(head, HEAD);
    client_method!(delete, DELETE);
    client_method!(options, OPTIONS);
    client_method!(post, POST);
    client_method!(put, PUT);
    client_method!(patch, PATCH);
}

/// One request of a [`TestClient`], sent by [`send`](TestRequestBuilder::send).
#[derive(Debug)]
pub struct TestRequestBuilder<'client> {
    client: &'client TestClient,
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Bytes,
    error: Option<ClientError>,
}

impl TestRequestBuilder<'_> {
    #[must_use]
    pub fn header<K, V>(mut self, name: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        let name: Result<HeaderName, http::Error> = HeaderName::try_from(name).map_err(Into::into);
        let value: Result<HeaderValue, http::Error> = HeaderValue::try_from(value).map_err(Into::into);
        match name.and_then(|name| value.map(|value| (name, value))) {
            Ok((name, value)) => {
                self.headers.append(name, value);
            }
            Err(e) => {
                self.error.get_or_insert(ClientError::from(e));
            }
        }
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sends the request over a new connection and reads the whole response.
    ///
    /// With an `Expect` header and a body, the body is only sent once the server
    /// answered `100 Continue`.
    ///
    /// # Errors
    /// [`ClientError::ExpectationFailed`] when the server rejects the `Expect` header,
    /// or any I/O or protocol failure on the connection.
    pub async fn send(self) -> Result<TestResponse, ClientError> {
        if let Some(e) = self.error {
            return Err(e);
        }

        let server = Arc::clone(&self.client.server);
        let connection_config = server.config().connection_config();
        let (client_io, server_io) = duplex(BUFFER_SIZE);
        tokio::spawn(async move {
            let (reader, writer) = split(server_io);
            if let Err(e) = HttpConnection::with_config(reader, writer, connection_config).process(server).await
                && !e.is_disconnect()
            {
                error!(cause = %e, "test connection failed");
            }
        });

        let (mut reader, mut writer) = split(client_io);
        let mut buffer = BytesMut::with_capacity(BUFFER_SIZE);
        let is_head = self.method == Method::HEAD;
        let expects = self.headers.contains_key(EXPECT);

        writer.write_all(&self.request_head()).await?;
        writer.flush().await?;

        if expects && !self.body.is_empty() {
            let (status, headers) = read_head(&mut reader, &mut buffer).await?;
            if status != StatusCode::CONTINUE {
                debug!(%status, "server answered before the request body was sent");
                let body = read_body(&mut reader, &mut buffer, status, &headers, is_head).await?;
                return check_expectation(TestResponse { status, headers, body }, expects);
            }
        }

        let write = async {
            writer.write_all(&self.body).await?;
            writer.flush().await
        };
        let (written, response) = tokio::join!(write, read_response(&mut reader, &mut buffer, is_head));
        let response = response?;
        if let Err(e) = written {
            debug!(cause = %e, "request body was not sent completely");
        }

        check_expectation(response, expects)
    }

    fn request_head(&self) -> Vec<u8> {
        let mut head = format!("{} {} HTTP/1.1\r\n", self.method, self.path).into_bytes();

        if !self.headers.contains_key(HOST) {
            head.extend_from_slice(b"host: localhost\r\n");
        }
        if !self.headers.contains_key(CONNECTION) {
            head.extend_from_slice(b"connection: close\r\n");
        }

        let framed = self.headers.contains_key(CONTENT_LENGTH) || self.headers.contains_key(TRANSFER_ENCODING);
        let has_body_method = [Method::POST, Method::PUT, Method::PATCH].contains(&self.method);
        if !framed && (has_body_method || !self.body.is_empty()) {
            head.extend_from_slice(format!("content-length: {}\r\n", self.body.len()).as_bytes());
        }

        for (name, value) in &self.headers {
            head.extend_from_slice(name.as_ref());
            head.extend_from_slice(b": ");
            head.extend_from_slice(value.as_bytes());
            head.extend_from_slice(b"\r\n");
        }
        head.extend_from_slice(b"\r\n");
        head
    }
}

#[derive(Debug, Clone)]
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The body as text, invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

fn check_expectation(response: TestResponse, expects: bool) -> Result<TestResponse, ClientError> {
    if expects && response.status == StatusCode::EXPECTATION_FAILED {
        return Err(ClientError::ExpectationFailed { status: response.status, message: response.text() });
    }
    Ok(response)
}

/// Reads the final response, skipping interim 1xx ones.
async fn read_response<R>(reader: &mut R, buffer: &mut BytesMut, is_head: bool) -> Result<TestResponse, ClientError>
where
    R: AsyncRead + Unpin,
{
    loop {
        let (status, headers) = read_head(reader, buffer).await?;
        if status.is_informational() {
            debug!(%status, "skip interim response");
            continue;
        }

        let body = read_body(reader, buffer, status, &headers, is_head).await?;
        return Ok(TestResponse { status, headers, body });
    }
}

async fn read_head<R>(reader: &mut R, buffer: &mut BytesMut) -> Result<(StatusCode, HeaderMap), ClientError>
where
    R: AsyncRead + Unpin,
{
    loop {
        if let Some(head) = parse_head(buffer)? {
            return Ok(head);
        }
        if fill(reader, buffer).await? == 0 {
            return Err(ClientError::invalid_response("connection closed before the response header was complete"));
        }
    }
}

fn parse_head(buffer: &mut BytesMut) -> Result<Option<(StatusCode, HeaderMap)>, ClientError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
    let mut response = httparse::Response::new(&mut headers);

    let offset = match response.parse(buffer).map_err(ClientError::invalid_response)? {
        Status::Complete(offset) => offset,
        Status::Partial => return Ok(None),
    };

    let status = StatusCode::from_u16(response.code.unwrap_or_default()).map_err(ClientError::invalid_response)?;
    let mut header_map = HeaderMap::with_capacity(response.headers.len());
    for header in response.headers.iter() {
        let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(ClientError::invalid_response)?;
        let value = HeaderValue::from_bytes(header.value).map_err(ClientError::invalid_response)?;
        header_map.append(name, value);
    }

    buffer.advance(offset);
    Ok(Some((status, header_map)))
}

async fn read_body<R>(reader: &mut R, buffer: &mut BytesMut, status: StatusCode, headers: &HeaderMap, is_head: bool) -> Result<Bytes, ClientError>
where
    R: AsyncRead + Unpin,
{
    if is_head || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED {
        return Ok(Bytes::new());
    }

    let payload_size = if headers.get(TRANSFER_ENCODING).is_some_and(|value| value.as_bytes().eq_ignore_ascii_case(b"chunked")) {
        PayloadSize::new_chunked()
    } else if let Some(value) = headers.get(CONTENT_LENGTH) {
        let length = value.to_str().ok().and_then(|value| value.parse().ok()).ok_or_else(|| ClientError::invalid_response("invalid content-length"))?;
        PayloadSize::new_length(length)
    } else {
        // no framing: the body ends with the connection
        while fill(reader, buffer).await? != 0 {}
        return Ok(buffer.split().freeze());
    };

    let mut decoder = PayloadDecoder::from(payload_size);
    let mut body = BytesMut::with_capacity(payload_size.exact().and_then(|size| usize::try_from(size).ok()).unwrap_or_default());
    loop {
        match decoder.decode(buffer)? {
            Some(PayloadItem::Chunk(bytes)) => body.extend_from_slice(&bytes),
            Some(PayloadItem::Eof) => return Ok(body.freeze()),
            None => {
                if fill(reader, buffer).await? == 0 {
                    return Err(ClientError::invalid_response("connection closed before the response body was complete"));
                }
            }
        }
    }
}

async fn fill<R>(reader: &mut R, buffer: &mut BytesMut) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    buffer.reserve(BUFFER_SIZE);
    reader.read_buf(buffer).await
}
