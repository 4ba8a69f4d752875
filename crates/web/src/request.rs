//! The request a handler receives.
//!
//! - [`Request`]: header, path parameters and the body, either buffered or as a
//!   [`StreamBuffer`] depending on how the route was registered
//! - [`PathParams`]: named segments captured from the URL path

use crate::error::WebError;
use crate::stream::StreamBuffer;
use bytes::Bytes;
use http::{HeaderMap, Method, Uri, Version};
use serde::de::DeserializeOwned;
use sluice_http::protocol::RequestHeader;

/// A dispatched request.
///
/// For a streaming route [`stream`](Request::stream) is `Some` and [`body`](Request::body)
/// is empty; the handler reads the body itself. For every other route the body was
/// read completely before the handler was called and `stream` is `None`.
#[derive(Debug)]
pub struct Request {
    header: RequestHeader,
    params: PathParams,
    body: Bytes,
    stream: Option<StreamBuffer>,
}

impl Request {
    /// A request whose body is already in memory.
    pub fn buffered(header: RequestHeader, params: PathParams, body: Bytes) -> Self {
        Self { header, params, body, stream: None }
    }

    /// A request whose body is read by the handler.
    pub fn streaming(header: RequestHeader, params: PathParams, stream: StreamBuffer) -> Self {
        Self { header, params, body: Bytes::new(), stream: Some(stream) }
    }

    pub fn request_header(&self) -> &RequestHeader {
        &self.header
    }

    pub fn method(&self) -> &Method {
        self.header.method()
    }

    pub fn uri(&self) -> &Uri {
        self.header.uri()
    }

    pub fn path(&self) -> &str {
        self.header.uri().path()
    }

    pub fn version(&self) -> Version {
        self.header.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.header.headers()
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    /// A path parameter by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// The buffered body, empty for streaming routes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn text(&self) -> Result<&str, WebError> {
        std::str::from_utf8(&self.body).map_err(WebError::bad_request)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, WebError> {
        serde_json::from_slice(&self.body).map_err(WebError::bad_request)
    }

    pub fn form<T: DeserializeOwned>(&self) -> Result<T, WebError> {
        serde_urlencoded::from_bytes(&self.body).map_err(WebError::bad_request)
    }

    /// Deserializes the query string; a missing one reads as empty.
    pub fn query<T: DeserializeOwned>(&self) -> Result<T, WebError> {
        serde_qs::from_str(self.uri().query().unwrap_or_default()).map_err(WebError::bad_request)
    }

    pub fn is_stream(&self) -> bool {
        self.stream.is_some()
    }

    pub fn stream(&self) -> Option<&StreamBuffer> {
        self.stream.as_ref()
    }

    pub fn stream_mut(&mut self) -> Option<&mut StreamBuffer> {
        self.stream.as_mut()
    }

    pub fn take_stream(&mut self) -> Option<StreamBuffer> {
        self.stream.take()
    }
}

/// Path parameters captured by the matched route, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    params: Vec<(String, String)>,
}

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl From<matchit::Params<'_, '_>> for PathParams {
    fn from(params: matchit::Params<'_, '_>) -> Self {
        Self { params: params.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect() }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PathParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { params: iter.into_iter().map(|(key, value)| (key.into(), value.into())).collect() }
    }
}
