//! Converts handler return values into HTTP responses.
//!
//! Handlers return anything implementing [`Responder`]: plain strings and bytes,
//! `()` for an empty 200, `Option`, `Result`, a `(StatusCode, T)` pair or a fully
//! built `http::Response`. Errors of the framework itself ([`WebError`]) become the
//! matching 4xx response.

use crate::body::ResponseBody;
use crate::error::WebError;
use bytes::Bytes;
use http::header::{ALLOW, CONTENT_TYPE};
use http::{HeaderValue, Response, StatusCode};
use sluice_http::protocol::ParseError;
use std::convert::Infallible;

/// A type that can be turned into a response.
pub trait Responder {
    fn into_response(self) -> Response<ResponseBody>;
}

impl<T: Responder, E: Responder> Responder for Result<T, E> {
    fn into_response(self) -> Response<ResponseBody> {
        match self {
            Ok(t) => t.into_response(),
            Err(e) => e.into_response(),
        }
    }
}

/// `None` is an empty 404.
impl<T: Responder> Responder for Option<T> {
    fn into_response(self) -> Response<ResponseBody> {
        match self {
            Some(t) => t.into_response(),
            None => status_response(StatusCode::NOT_FOUND, ResponseBody::empty()),
        }
    }
}

impl<B> Responder for Response<B>
where
    B: Into<ResponseBody>,
{
    fn into_response(self) -> Response<ResponseBody> {
        self.map(Into::into)
    }
}

impl<T: Responder> Responder for (StatusCode, T) {
    fn into_response(self) -> Response<ResponseBody> {
        let (status, responder) = self;
        let mut response = responder.into_response();
        *response.status_mut() = status;
        response
    }
}

impl<T: Responder> Responder for (T, StatusCode) {
    fn into_response(self) -> Response<ResponseBody> {
        let (responder, status) = self;
        (status, responder).into_response()
    }
}

impl<T: Responder> Responder for Box<T> {
    fn into_response(self) -> Response<ResponseBody> {
        (*self).into_response()
    }
}

impl Responder for () {
    fn into_response(self) -> Response<ResponseBody> {
        Response::new(ResponseBody::empty())
    }
}

impl Responder for ResponseBody {
    fn into_response(self) -> Response<ResponseBody> {
        Response::new(self)
    }
}

impl Responder for &'static str {
    fn into_response(self) -> Response<ResponseBody> {
        text_response(StatusCode::OK, ResponseBody::from(self))
    }
}

impl Responder for String {
    fn into_response(self) -> Response<ResponseBody> {
        text_response(StatusCode::OK, ResponseBody::from(self))
    }
}

impl Responder for Bytes {
    fn into_response(self) -> Response<ResponseBody> {
        let mut response = Response::new(ResponseBody::from(self));
        set_content_type(&mut response, &mime::APPLICATION_OCTET_STREAM);
        response
    }
}

impl Responder for Infallible {
    fn into_response(self) -> Response<ResponseBody> {
        match self {}
    }
}

impl Responder for WebError {
    fn into_response(self) -> Response<ResponseBody> {
        let status = match &self {
            WebError::NotFound { .. } => StatusCode::NOT_FOUND,
            WebError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            WebError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            WebError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            WebError::Body { source: ParseError::Io { .. } | ParseError::IncompleteBody } => StatusCode::INTERNAL_SERVER_ERROR,
            WebError::Body { .. } => StatusCode::BAD_REQUEST,
        };

        let body = match &self {
            WebError::PayloadTooLarge { .. } => ResponseBody::from(self.to_string()),
            _ => ResponseBody::from(format!("Error: {self}")),
        };
        let mut response = text_response(status, body);

        if let WebError::MethodNotAllowed { allowed, .. } = &self {
            let allow = allowed.iter().map(http::Method::as_str).collect::<Vec<_>>().join(", ");
            if let Ok(value) = HeaderValue::from_str(&allow) {
                response.headers_mut().insert(ALLOW, value);
            }
        }
        response
    }
}

fn status_response(status: StatusCode, body: ResponseBody) -> Response<ResponseBody> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
}

fn text_response(status: StatusCode, body: ResponseBody) -> Response<ResponseBody> {
    let mut response = status_response(status, body);
    set_content_type(&mut response, &mime::TEXT_PLAIN_UTF_8);
    response
}

fn set_content_type(response: &mut Response<ResponseBody>, mime: &mime::Mime) {
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
}
