//! Errors of the web layer.
//!
//! [`WebError`] is what a request can fail with once it reached the framework; it is a
//! [`Responder`](crate::Responder) itself, so handlers can bubble it up with `?`.
//! [`RouteError`] and [`ServerBuildError`] are reported while building the router and
//! the server, before anything is served. [`ClientError`] belongs to the
//! [`TestClient`](crate::TestClient).

use http::{Method, StatusCode};
use sluice_http::protocol::ParseError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebError {
    #[error("Requested URL {path} not found")]
    NotFound { path: String },

    #[error("Method {method} not allowed for URL {path}")]
    MethodNotAllowed { method: Method, path: String, allowed: Vec<Method> },

    #[error("Payload Too Large")]
    PayloadTooLarge { limit: usize },

    #[error("Bad Request: {reason}")]
    BadRequest { reason: String },

    #[error("invalid request body: {source}")]
    Body {
        #[from]
        source: ParseError,
    },
}

impl WebError {
    pub fn not_found<S: ToString>(path: S) -> Self {
        Self::NotFound { path: path.to_string() }
    }

    pub fn bad_request<S: ToString>(reason: S) -> Self {
        Self::BadRequest { reason: reason.to_string() }
    }
}

/// A routing table that cannot be built.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route {method} {path} is registered twice")]
    Duplicate { path: String, method: Method },

    #[error("invalid route pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("route {path} conflicts with an existing route: {source}")]
    Conflict {
        path: String,
        #[source]
        source: matchit::InsertError,
    },

    #[error("route {path} has no methods")]
    NoMethods { path: String },

    #[error("blueprint {name} is registered twice")]
    DuplicateBlueprint { name: String },

    #[error("method {method} is added twice to a composition view")]
    DuplicateCompositionMethod { method: Method },
}

impl RouteError {
    pub(crate) fn invalid_pattern<S: ToString>(pattern: &str, reason: S) -> Self {
        Self::InvalidPattern { pattern: pattern.to_string(), reason: reason.to_string() }
    }
}

#[derive(Debug, Error)]
pub enum ServerBuildError {
    #[error("router must be set")]
    MissingRouter,

    #[error("address must be set")]
    MissingAddress,

    #[error("invalid address: {source}")]
    InvalidAddress {
        #[from]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid request: {source}")]
    InvalidRequest {
        #[from]
        source: http::Error,
    },

    #[error("invalid response: {reason}")]
    InvalidResponse { reason: String },

    /// the server refused the `Expect` header of the request
    #[error("expectation failed with status {status}: {message}")]
    ExpectationFailed { status: StatusCode, message: String },

    #[error("invalid response body: {source}")]
    Body {
        #[from]
        source: ParseError,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ClientError {
    pub(crate) fn invalid_response<S: ToString>(reason: S) -> Self {
        Self::InvalidResponse { reason: reason.to_string() }
    }
}
