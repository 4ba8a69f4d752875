//! The parsed request line and header fields.

use http::header::{CONNECTION, EXPECT};
use http::request::Parts;
use http::{HeaderMap, HeaderValue, Method, Request, Uri, Version};

/// A request without its body, wrapping `http::Request<()>`.
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

/// What the client announced in its `Expect` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation<'a> {
    /// no `Expect` header
    Nothing,
    /// `Expect: 100-continue`
    Continue,
    /// any other value, which the server must reject with 417
    Unsupported(&'a HeaderValue),
}

impl AsRef<Request<()>> for RequestHeader {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl AsMut<Request<()>> for RequestHeader {
    fn as_mut(&mut self) -> &mut Request<()> {
        &mut self.inner
    }
}

impl RequestHeader {
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    /// Attaches a body, producing a full `Request<T>`.
    pub fn body<T>(self, body: T) -> Request<T> {
        self.inner.map(|()| body)
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn expectation(&self) -> Expectation<'_> {
        match self.headers().get(EXPECT) {
            None => Expectation::Nothing,
            Some(value) if value.as_bytes().eq_ignore_ascii_case(b"100-continue") => Expectation::Continue,
            Some(value) => Expectation::Unsupported(value),
        }
    }

    /// Whether the connection may be reused after this request.
    ///
    /// HTTP/1.1 is persistent unless `Connection: close` is sent; HTTP/1.0 only
    /// with an explicit `Connection: keep-alive`.
    pub fn keep_alive(&self) -> bool {
        let has_token = |token: &[u8]| {
            self.headers()
                .get_all(CONNECTION)
                .iter()
                .flat_map(|value| value.as_bytes().split(|b| *b == b','))
                .any(|item| item.trim_ascii().eq_ignore_ascii_case(token))
        };

        match self.version() {
            Version::HTTP_11 => !has_token(b"close"),
            Version::HTTP_10 => has_token(b"keep-alive"),
            _ => false,
        }
    }
}

impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Request::from_parts(parts, ()) }
    }
}

impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(builder: http::request::Builder) -> RequestHeader {
        builder.body(()).unwrap().into()
    }

    #[test]
    fn expectation_values() {
        let plain = header(Request::builder().method(Method::POST).uri("/"));
        assert_eq!(plain.expectation(), Expectation::Nothing);

        let cont = header(Request::builder().header(EXPECT, "100-Continue"));
        assert_eq!(cont.expectation(), Expectation::Continue);

        let extra = header(Request::builder().header(EXPECT, "100-continue-extra"));
        match extra.expectation() {
            Expectation::Unsupported(value) => assert_eq!(value, "100-continue-extra"),
            other => panic!("unexpected expectation: {other:?}"),
        }
    }

    #[test]
    fn keep_alive_rules() {
        assert!(header(Request::builder()).keep_alive());
        assert!(!header(Request::builder().header(CONNECTION, "close")).keep_alive());
        assert!(!header(Request::builder().header(CONNECTION, "Upgrade, Close")).keep_alive());
        assert!(!header(Request::builder().version(Version::HTTP_10)).keep_alive());
        assert!(header(Request::builder().version(Version::HTTP_10).header(CONNECTION, "keep-alive")).keep_alive());
    }

    #[test]
    fn attach_body() {
        let head = header(Request::builder().method(Method::PUT).uri("/put"));
        let request = head.body("payload");
        assert_eq!(request.method(), Method::PUT);
        assert_eq!(request.uri().path(), "/put");
        assert_eq!(*request.body(), "payload");
    }
}
