//! Read-once access to a request body while it is still arriving.
//!
//! Routes registered with `.stream()` receive their body as a [`StreamBuffer`]
//! instead of a buffered `Bytes`. Each [`StreamBuffer::read`] pulls exactly one chunk
//! from the connection, so the handler decides the pace and the server never holds
//! more than one chunk of the body in memory.

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use http_body::{Body as HttpBody, SizeHint};
use sluice_http::protocol::body::ReqBody;
use sluice_http::protocol::ParseError;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

/// Upper bound on what [`StreamBuffer::read_to_end`] reserves ahead of the data it
/// has actually received. `Content-Length` is only a claim of the client.
const MAX_PREALLOCATE: usize = 1024 * 1024;

/// Sequential reader over the chunks of a streaming request body.
///
/// Chunks come out in arrival order and their concatenation is the body as sent.
/// Once the body is complete, or once reading it failed, the buffer is finished and
/// every further [`read`](StreamBuffer::read) returns `Ok(None)`.
#[derive(Debug)]
pub struct StreamBuffer {
    body: ReqBody,
    finished: bool,
}

impl StreamBuffer {
    pub fn new(body: ReqBody) -> Self {
        Self { body, finished: false }
    }

    /// Waits for the next chunk.
    ///
    /// Returns `Ok(None)` after the last chunk. A client that disconnects mid-body or
    /// sends malformed chunked framing produces an `Err`, after which the buffer is
    /// finished.
    pub async fn read(&mut self) -> Result<Option<Bytes>, ParseError> {
        self.next().await.transpose()
    }

    /// Drains every remaining chunk into one buffer.
    pub async fn read_to_end(&mut self) -> Result<Bytes, ParseError> {
        let Some(first) = self.read().await? else {
            return Ok(Bytes::new());
        };
        let Some(second) = self.read().await? else {
            return Ok(first);
        };

        let received = first.len() + second.len();
        let capacity = StreamBuffer::size_hint(self)
            .exact()
            .and_then(|size| usize::try_from(size).ok())
            .map_or(received, |size| size.clamp(received, received.saturating_add(MAX_PREALLOCATE)));
        let mut buffer = BytesMut::with_capacity(capacity);
        buffer.extend_from_slice(&first);
        buffer.extend_from_slice(&second);
        while let Some(chunk) = self.read().await? {
            buffer.extend_from_slice(&chunk);
        }
        Ok(buffer.freeze())
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Size of the whole body, exact when the client sent `Content-Length`.
    pub fn size_hint(&self) -> SizeHint {
        self.body.size_hint()
    }
}

impl From<ReqBody> for StreamBuffer {
    fn from(body: ReqBody) -> Self {
        Self::new(body)
    }
}

impl Stream for StreamBuffer {
    type Item = Result<Bytes, ParseError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        while !this.finished {
            match ready!(Pin::new(&mut this.body).poll_frame(cx)) {
                Some(Ok(frame)) => {
                    // trailers and empty frames carry nothing for the reader
                    if let Ok(data) = frame.into_data()
                        && !data.is_empty()
                    {
                        return Poll::Ready(Some(Ok(data)));
                    }
                }
                Some(Err(e)) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(e)));
                }
                None => this.finished = true,
            }
        }
        Poll::Ready(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ResponseBody;
    use http::Response;
    use sluice_http::connection::HttpConnection;
    use sluice_http::handler::make_handler;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex, split};
    use tokio::sync::mpsc;

    /// Sends a request that announces `content_length` bytes but carries only `body`,
    /// then closes the client's write side. `consume` gets the request body and its
    /// output is returned once the connection is done.
    async fn send_truncated<F, Fut, T>(content_length: u64, body: &[u8], consume: F) -> T
    where
        F: Fn(StreamBuffer) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let handler = make_handler(move |request: http::Request<ReqBody>| {
            let consumed = consume(StreamBuffer::from(request.into_body()));
            let sender = sender.clone();
            async move {
                let _ = sender.send(consumed.await);
                Ok::<_, ParseError>(Response::new(ResponseBody::empty()))
            }
        });

        // a small pipe makes the body arrive in several chunks
        let (server_io, mut client) = duplex(1024);
        let (reader, writer) = split(server_io);
        let server = tokio::spawn(HttpConnection::new(reader, writer).process(Arc::new(handler)));

        let head = format!("POST /upload HTTP/1.1\r\nContent-Length: {content_length}\r\n\r\n");
        client.write_all(head.as_bytes()).await.unwrap();
        client.write_all(body).await.unwrap();
        client.shutdown().await.unwrap();

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        let _ = server.await.unwrap();
        receiver.recv().await.expect("the handler must have run")
    }

    #[tokio::test]
    async fn read_until_sentinel() {
        let mut buffer = StreamBuffer::from(ReqBody::full("hello"));

        assert_eq!(buffer.size_hint().exact(), Some(5));
        assert_eq!(buffer.read().await.unwrap(), Some(Bytes::from_static(b"hello")));
        assert_eq!(buffer.read().await.unwrap(), None);
        assert!(buffer.is_finished());
        assert_eq!(buffer.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_body_is_finished_on_first_read() {
        let mut buffer = StreamBuffer::new(ReqBody::empty());

        assert!(!buffer.is_finished());
        assert_eq!(buffer.read().await.unwrap(), None);
        assert!(buffer.is_finished());
    }

    #[tokio::test]
    async fn read_to_end_collects_remaining() {
        let mut buffer = StreamBuffer::new(ReqBody::full("abc".repeat(1000)));
        let body = buffer.read_to_end().await.unwrap();

        assert_eq!(body.len(), 3000);
        assert!(buffer.read_to_end().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn disconnect_mid_body_is_an_error_then_finished() {
        let (received, error, after) = send_truncated(10, b"abcd", |mut buffer: StreamBuffer| async move {
            let mut received = Vec::new();
            let error = loop {
                match buffer.read().await {
                    Ok(Some(chunk)) => received.extend_from_slice(&chunk),
                    Ok(None) => panic!("a truncated body must not end cleanly"),
                    Err(e) => break e,
                }
            };
            let after = [buffer.read().await.ok(), buffer.read().await.ok()];
            assert!(buffer.is_finished());
            (received, error, after)
        })
        .await;

        assert_eq!(received, b"abcd");
        assert!(matches!(error, ParseError::IncompleteBody), "unexpected error: {error}");
        assert_eq!(after, [Some(None), Some(None)]);
    }

    #[tokio::test]
    async fn read_to_end_ignores_oversized_content_length() {
        let body = vec![b'x'; 4096];
        let result = send_truncated(9_223_372_036_854_775_900, &body, |mut buffer: StreamBuffer| async move {
            assert_eq!(buffer.size_hint().exact(), Some(9_223_372_036_854_775_900));
            buffer.read_to_end().await
        })
        .await;

        assert!(matches!(result, Err(ParseError::IncompleteBody)));
    }
}
