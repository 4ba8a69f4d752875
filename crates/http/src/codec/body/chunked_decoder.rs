//! `Transfer-Encoding: chunked` request bodies, see RFC 9112 section 7.1.
//!
//! ```text
//! chunked-body = *chunk last-chunk trailer-section CRLF
//! chunk        = chunk-size [ chunk-ext ] CRLF chunk-data CRLF
//! last-chunk   = 1*("0") [ chunk-ext ] CRLF
//! ```
//!
//! Framing bytes are consumed one at a time; chunk data is handed out in slices as
//! large as the buffer allows, so a single wire chunk may become several items.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::protocol::{ParseError, PayloadItem};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: State,
    /// size of the chunk being read, or bytes left of it while in `Data`
    size: u64,
    size_digits: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Size,
    SizeLws,
    Extension,
    SizeLf,
    Data,
    DataCr,
    DataLf,
    /// start of a trailer line, or the final CRLF
    TrailerStart,
    Trailer,
    TrailerLf,
    EndLf,
    Done,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: State::Size, size: 0, size_digits: 0 }
    }

    fn next_state(&mut self, byte: u8) -> Result<State, ParseError> {
        let state = match (self.state, byte) {
            (State::Size, b'0'..=b'9' | b'a'..=b'f' | b'A'..=b'F') => {
                let digit = u64::from(hex_value(byte));
                self.size = self
                    .size
                    .checked_mul(16)
                    .and_then(|size| size.checked_add(digit))
                    .ok_or_else(|| ParseError::invalid_body("chunk size overflow"))?;
                self.size_digits += 1;
                State::Size
            }
            (State::Size, _) if self.size_digits == 0 => return Err(ParseError::invalid_body("missing chunk size")),
            (State::Size | State::SizeLws, b' ' | b'\t') => State::SizeLws,
            (State::Size | State::SizeLws, b';') => State::Extension,
            (State::Size | State::SizeLws | State::Extension, b'\r') => State::SizeLf,
            (State::Extension, b'\n') => return Err(ParseError::invalid_body("bare LF in chunk extension")),
            (State::Extension, _) => State::Extension,
            (State::SizeLf, b'\n') if self.size == 0 => State::TrailerStart,
            (State::SizeLf, b'\n') => State::Data,
            (State::DataCr, b'\r') => State::DataLf,
            (State::DataLf, b'\n') => {
                self.size_digits = 0;
                State::Size
            }
            (State::TrailerStart, b'\r') => State::EndLf,
            (State::Trailer, b'\r') => State::TrailerLf,
            (State::TrailerStart | State::Trailer, _) => State::Trailer,
            (State::TrailerLf, b'\n') => State::TrailerStart,
            (State::EndLf, b'\n') => State::Done,
            (state, byte) => {
                return Err(ParseError::invalid_body(format!("unexpected byte {byte:#04x} in chunked body while in {state:?}")));
            }
        };
        Ok(state)
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                State::Done => {
                    trace!("finished reading chunked body");
                    return Ok(Some(PayloadItem::Eof));
                }
                _ if src.is_empty() => return Ok(None),
                State::Data => {
                    let len = usize::try_from(self.size).map_or(src.len(), |size| size.min(src.len()));
                    let bytes = src.split_to(len).freeze();
                    self.size -= bytes.len() as u64;
                    if self.size == 0 {
                        self.state = State::DataCr;
                    }
                    trace!(len = bytes.len(), "read chunk data");
                    return Ok(Some(PayloadItem::Chunk(bytes)));
                }
                _ => {
                    let byte = src.get_u8();
                    self.state = self.next_state(byte)?;
                }
            }
        }
    }
}

fn hex_value(byte: u8) -> u8 {
    match byte {
        b'0'..=b'9' => byte - b'0',
        b'a'..=b'f' => byte - b'a' + 10,
        _ => byte - b'A' + 10,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn decode_all(decoder: &mut ChunkedDecoder, buffer: &mut BytesMut) -> Result<(Vec<Bytes>, bool), ParseError> {
        let mut chunks = vec![];
        while let Some(item) = decoder.decode(buffer)? {
            match item {
                PayloadItem::Chunk(bytes) => chunks.push(bytes),
                PayloadItem::Eof => return Ok((chunks, true)),
            }
        }
        Ok((chunks, false))
    }

    #[test]
    fn basic() {
        let mut buffer = BytesMut::from(&b"5\r\nhello\r\n7\r\n, world\r\n0\r\n\r\nGET /"[..]);
        let (chunks, eof) = decode_all(&mut ChunkedDecoder::new(), &mut buffer).unwrap();

        assert!(eof);
        assert_eq!(chunks, vec![Bytes::from_static(b"hello"), Bytes::from_static(b", world")]);
        assert_eq!(&buffer[..], b"GET /");
    }

    #[test]
    fn byte_by_byte() {
        let wire = b"A;name=value\r\n0123456789\r\n0\r\n\r\n";
        let mut decoder = ChunkedDecoder::new();
        let mut buffer = BytesMut::new();
        let mut body = Vec::new();
        let mut eof = false;

        for byte in wire {
            buffer.extend_from_slice(&[*byte]);
            let (chunks, done) = decode_all(&mut decoder, &mut buffer).unwrap();
            chunks.iter().for_each(|chunk| body.extend_from_slice(chunk));
            eof |= done;
        }

        assert!(eof);
        assert_eq!(body, b"0123456789");
    }

    #[test]
    fn trailers_are_skipped() {
        let mut buffer = BytesMut::from(&b"3 \r\nabc\r\n0\r\nExpires: never\r\nX-Checksum: 1\r\n\r\n"[..]);
        let (chunks, eof) = decode_all(&mut ChunkedDecoder::new(), &mut buffer).unwrap();

        assert!(eof);
        assert_eq!(chunks, vec![Bytes::from_static(b"abc")]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn partial_chunk_waits_for_more() {
        let mut decoder = ChunkedDecoder::new();
        let mut buffer = BytesMut::from(&b"8\r\nabcd"[..]);

        let (chunks, eof) = decode_all(&mut decoder, &mut buffer).unwrap();
        assert!(!eof);
        assert_eq!(chunks, vec![Bytes::from_static(b"abcd")]);

        buffer.extend_from_slice(b"efgh\r\n0\r\n\r\n");
        let (chunks, eof) = decode_all(&mut decoder, &mut buffer).unwrap();
        assert!(eof);
        assert_eq!(chunks, vec![Bytes::from_static(b"efgh")]);
    }

    #[test]
    fn invalid_input() {
        for wire in [&b"zz\r\n"[..], b"\r\n", b"3\r\nabcX\r\n", b"3\n", b"FFFFFFFFFFFFFFFFF\r\n"] {
            let mut buffer = BytesMut::from(wire);
            assert!(decode_all(&mut ChunkedDecoder::new(), &mut buffer).is_err(), "{wire:?} should be rejected");
        }
    }
}
