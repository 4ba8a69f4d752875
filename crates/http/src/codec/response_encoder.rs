use crate::codec::body::PayloadEncoder;
use crate::codec::header::HeaderEncoder;
use crate::protocol::{Message, PayloadSize, ResponseHead, SendError};
use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;
use tracing::error;

/// Encodes responses: a header, then the payload items its [`PayloadSize`] calls for.
#[derive(Debug)]
pub struct ResponseEncoder {
    header_encoder: HeaderEncoder,
    payload_encoder: Option<PayloadEncoder>,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets the body of the response just encoded.
    ///
    /// Used for `HEAD`, where the header announces a body that is never sent.
    pub fn discard_payload(&mut self) {
        self.payload_encoder = None;
    }
}

impl Default for ResponseEncoder {
    fn default() -> Self {
        Self { header_encoder: HeaderEncoder, payload_encoder: None }
    }
}

impl<D: Buf> Encoder<Message<(ResponseHead, PayloadSize), D>> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Message<(ResponseHead, PayloadSize), D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Message::Header((head, payload_size)) => {
                if self.payload_encoder.is_some() {
                    error!("expect payload item but receive response head");
                    return Err(SendError::invalid_body("previous response body is not finished"));
                }

                self.payload_encoder = PayloadEncoder::for_size(payload_size);
                self.header_encoder.encode((head, payload_size), dst)
            }

            Message::Payload(payload_item) => {
                let Some(payload_encoder) = &mut self.payload_encoder else {
                    error!("expect response header but receive payload item");
                    return Err(SendError::invalid_body("payload item without a response header"));
                };

                let result = payload_encoder.encode(payload_item, dst);
                if payload_encoder.is_finish() {
                    self.payload_encoder = None;
                }
                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PayloadItem;
    use bytes::Bytes;
    use http::Response;

    fn head() -> ResponseHead {
        Response::new(())
    }

    #[test]
    fn response_with_body() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        encoder.encode(Message::<_, Bytes>::Header((head(), PayloadSize::Length(2))), &mut dst).unwrap();
        encoder.encode(Message::<(ResponseHead, PayloadSize)>::Payload(PayloadItem::Chunk(Bytes::from_static(b"ok"))), &mut dst).unwrap();
        encoder.encode(Message::<(ResponseHead, PayloadSize)>::Payload(PayloadItem::Eof), &mut dst).unwrap();

        assert_eq!(&dst[..], b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\n\r\nok");

        // ready for the next response
        encoder.encode(Message::<_, Bytes>::Header((head(), PayloadSize::Empty)), &mut dst).unwrap();
    }

    #[test]
    fn head_response_discards_body() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        encoder.encode(Message::<_, Bytes>::Header((head(), PayloadSize::Length(10))), &mut dst).unwrap();
        assert!(encoder.encode(Message::<_, Bytes>::Header((head(), PayloadSize::Empty)), &mut dst).is_err());

        encoder.discard_payload();
        encoder.encode(Message::<_, Bytes>::Header((head(), PayloadSize::Empty)), &mut dst).unwrap();
    }

    #[test]
    fn payload_without_header() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();
        let item = Message::<(ResponseHead, PayloadSize)>::Payload(PayloadItem::Chunk(Bytes::from_static(b"x")));
        assert!(encoder.encode(item, &mut dst).is_err());
    }
}
