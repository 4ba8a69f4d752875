//! Request line and header fields, parsed with `httparse`.
//!
//! Limits: at most [`MAX_HEADER_NUM`] fields and [`MAX_HEADER_BYTES`] bytes for the
//! whole header section. Only HTTP/1.0 and HTTP/1.1 are accepted.
//!
//! Header values are not copied: `httparse` reports slices of the input buffer, their
//! offsets are recorded, and once the header section is split off as `Bytes` each value
//! becomes a cheap slice of it.

use std::mem::MaybeUninit;

use bytes::BytesMut;
use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Uri, Version};
use httparse::Status;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{ParseError, PayloadSize, RequestHeader};

pub const MAX_HEADER_NUM: usize = 64;

pub const MAX_HEADER_BYTES: usize = 8 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct HeaderDecoder;

impl Decoder for HeaderDecoder {
    type Item = (RequestHeader, PayloadSize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut headers = [const { MaybeUninit::<httparse::Header<'_>>::uninit() }; MAX_HEADER_NUM];
        let mut req = httparse::Request::new(&mut []);

        let body_offset = match req.parse_with_uninit_headers(src, &mut headers) {
            Ok(Status::Complete(body_offset)) => body_offset,
            Ok(Status::Partial) => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                return Ok(None);
            }
            Err(httparse::Error::TooManyHeaders) => return Err(ParseError::too_many_headers(MAX_HEADER_NUM)),
            Err(e) => return Err(ParseError::invalid_header(e)),
        };

        trace!(header_size = body_offset, "parsed request header");
        ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

        let version = match req.version {
            Some(0) => Version::HTTP_10,
            Some(1) => Version::HTTP_11,
            other => return Err(ParseError::InvalidVersion(other)),
        };
        let method = req.method.and_then(|method| Method::from_bytes(method.as_bytes()).ok()).ok_or(ParseError::InvalidMethod)?;
        let uri = req.path.and_then(|path| Uri::try_from(path).ok()).ok_or(ParseError::InvalidUri)?;

        let base = src.as_ptr() as usize;
        let ranges: Vec<(&str, (usize, usize))> = req
            .headers
            .iter()
            .map(|header| {
                let start = header.value.as_ptr() as usize - base;
                (header.name, (start, start + header.value.len()))
            })
            .collect();

        let mut header_map = HeaderMap::with_capacity(ranges.len());
        let mut names = Vec::with_capacity(ranges.len());
        for (name, range) in ranges {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(ParseError::invalid_header)?;
            names.push((name, range));
        }

        let header_bytes = src.split_to(body_offset).freeze();
        for (name, (start, end)) in names {
            let value = HeaderValue::from_maybe_shared(header_bytes.slice(start..end)).map_err(ParseError::invalid_header)?;
            header_map.append(name, value);
        }

        let mut request = Request::new(());
        *request.method_mut() = method;
        *request.uri_mut() = uri;
        *request.version_mut() = version;
        *request.headers_mut() = header_map;

        let header = RequestHeader::from(request);
        let payload_size = parse_payload(header.headers())?;
        Ok(Some((header, payload_size)))
    }
}

/// Works out the body framing of a request, see RFC 9112 section 6.3.
///
/// A request without `Content-Length` or `Transfer-Encoding` has no body, whatever
/// its method.
fn parse_payload(headers: &HeaderMap) -> Result<PayloadSize, ParseError> {
    let te = headers.get(TRANSFER_ENCODING);
    let mut cl_values = headers.get_all(CONTENT_LENGTH).iter().peekable();

    match (te, cl_values.peek()) {
        (None, None) => Ok(PayloadSize::new_empty()),

        (Some(te), None) => {
            ensure!(is_chunked(te), ParseError::invalid_header("transfer-encoding of a request must end with chunked"));
            Ok(PayloadSize::new_chunked())
        }

        (None, Some(_)) => {
            let mut length = None;
            for value in cl_values {
                let parsed = value
                    .to_str()
                    .ok()
                    .and_then(|value| value.trim().parse::<u64>().ok())
                    .ok_or_else(|| ParseError::invalid_content_length(format!("{value:?} is not a length")))?;
                ensure!(length.is_none_or(|length| length == parsed), ParseError::invalid_content_length("conflicting values"));
                length = Some(parsed);
            }
            Ok(PayloadSize::new_length(length.unwrap_or_default()))
        }

        (Some(_), Some(_)) => Err(ParseError::invalid_content_length("transfer-encoding and content-length both present")),
    }
}

/// Chunked must be the final coding when present.
fn is_chunked(value: &HeaderValue) -> bool {
    value.as_bytes().rsplit(|b| *b == b',').next().is_some_and(|last| last.trim_ascii().eq_ignore_ascii_case(b"chunked"))
}
