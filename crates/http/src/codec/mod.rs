//! Wire codecs for HTTP/1.x, built on `tokio_util::codec`.
//!
//! [`RequestDecoder`] turns bytes into a [`Message`](crate::protocol::Message) stream:
//! one header followed by payload items ending in `Eof`. [`ResponseEncoder`] does the
//! reverse for responses. Both pick the body framing (content-length or chunked) from
//! the [`PayloadSize`](crate::protocol::PayloadSize) that travels with the header.
//!
//! ```
//! use bytes::BytesMut;
//! use sluice_http::codec::RequestDecoder;
//! use sluice_http::protocol::{Message, PayloadItem};
//! use tokio_util::codec::Decoder;
//!
//! let mut buf = BytesMut::from(&b"POST /upload HTTP/1.1\r\nContent-Length: 3\r\n\r\nabc"[..]);
//! let mut decoder = RequestDecoder::new();
//!
//! let Some(Message::Header((header, _))) = decoder.decode(&mut buf).unwrap() else { panic!() };
//! assert_eq!(header.uri().path(), "/upload");
//!
//! let Some(Message::Payload(PayloadItem::Chunk(bytes))) = decoder.decode(&mut buf).unwrap() else { panic!() };
//! assert_eq!(&bytes[..], b"abc");
//! ```

mod body;
mod header;
mod request_decoder;
mod response_encoder;

pub use body::PayloadDecoder;
pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;
