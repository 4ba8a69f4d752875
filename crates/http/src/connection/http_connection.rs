use std::error::Error;
use std::fmt::Display;
use std::sync::Arc;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use http::header::{CONNECTION, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method, Response, StatusCode, Version};
use http_body::Body;
use http_body_util::{BodyExt, Empty, Full};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::select;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, warn};

use super::ConnectionConfig;
use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::handler::Handler;
use crate::protocol::body::{ReqBody, body_channel};
use crate::protocol::{Expectation, HttpError, Message, ParseError, PayloadItem, PayloadSize, RequestHeader, ResponseHead, SendError};

/// Serves HTTP/1.x requests from one reader/writer pair.
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    framed_write: FramedWrite<W, ResponseEncoder>,
    config: ConnectionConfig,
}

/// What happens to the connection once a response is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Next {
    KeepAlive,
    Close,
}

impl<R, W> std::fmt::Debug for HttpConnection<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpConnection").field("config", &self.config).finish_non_exhaustive()
    }
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_config(reader, writer, ConnectionConfig::default())
    }

    pub fn with_config(reader: R, writer: W, config: ConnectionConfig) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::new(), config.read_buffer_size),
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
            config,
        }
    }

    /// Runs the request loop until the connection is closed.
    ///
    /// Returns `Ok(())` when the peer closes the connection between two requests or
    /// when the server decided not to keep it alive.
    pub async fn process<H>(mut self, handler: Arc<H>) -> Result<(), HttpError>
    where
        H: Handler,
        H::RespBody: Body<Data = Bytes> + Unpin,
        <H::RespBody as Body>::Error: Display,
    {
        loop {
            match self.framed_read.next().await {
                Some(Ok(Message::Header((header, payload_size)))) => {
                    if self.do_process(header, payload_size, &*handler).await? == Next::Close {
                        self.shutdown().await;
                        return Ok(());
                    }
                }

                Some(Ok(Message::Payload(_))) => {
                    error!("received body data while waiting for a request header");
                    self.send_error_status(StatusCode::BAD_REQUEST).await?;
                    return Err(ParseError::invalid_body("body data without a request header").into());
                }

                Some(Err(e)) if e.is_disconnect() => {
                    debug!(cause = %e, "peer went away while sending a request");
                    return Err(e.into());
                }

                Some(Err(e)) => {
                    warn!(cause = %e, "failed to read request, closing connection");
                    let status = match e {
                        ParseError::TooLargeHeader { .. } | ParseError::TooManyHeaders { .. } => {
                            StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE
                        }
                        _ => StatusCode::BAD_REQUEST,
                    };
                    self.send_error_status(status).await?;
                    return Err(e.into());
                }

                None => {
                    debug!("peer closed connection");
                    return Ok(());
                }
            }
        }
    }

    async fn do_process<H>(&mut self, header: RequestHeader, payload_size: PayloadSize, handler: &H) -> Result<Next, HttpError>
    where
        H: Handler,
        H::RespBody: Body<Data = Bytes> + Unpin,
        <H::RespBody as Body>::Error: Display,
    {
        let keep_alive = self.config.keep_alive && header.keep_alive();
        let is_head = header.method() == Method::HEAD;
        let version = header.version();

        match header.expectation() {
            Expectation::Nothing => {}
            // nothing to wait for when there is no body
            Expectation::Continue if payload_size.is_empty() => {}
            Expectation::Continue => self.send_continue().await?,
            Expectation::Unsupported(value) => {
                let message = format!("Unknown Expect: {}", String::from_utf8_lossy(value.as_bytes()));
                warn!(uri = %header.uri(), %message, "rejected request expectation");
                let mut response = text_response(StatusCode::EXPECTATION_FAILED, message);
                mark_connection(response.headers_mut(), Next::Close, version);
                self.do_send_response(response, is_head).await?;
                return Ok(Next::Close);
            }
        }

        let (mut body_sender, body_receiver) = body_channel(&mut self.framed_read, payload_size);
        let request = header.body(ReqBody::receiver(body_receiver));

        // The handler and the body sender are polled together: the handler may be waiting
        // for body data that only the sender can pull from the socket.
        let response_result = {
            let handler_future = handler.call(request);
            let body_future = body_sender.start();
            tokio::pin!(handler_future, body_future);

            let mut body_done = false;
            loop {
                select! {
                    biased;
                    result = &mut handler_future => break result,
                    () = &mut body_future, if !body_done => body_done = true,
                }
            }
        };

        let body_result = body_sender.finish().await;
        drop(body_sender);

        let next = match &body_result {
            Ok(()) if keep_alive => Next::KeepAlive,
            Ok(()) => Next::Close,
            Err(e) => {
                warn!(cause = %e, "request body was not received completely, closing connection");
                Next::Close
            }
        };

        // nobody is left to read a response
        if let Err(e) = body_result
            && e.is_disconnect()
        {
            return Err(e.into());
        }

        self.send_response(response_result, is_head, next, version).await?;
        Ok(next)
    }

    async fn send_response<T, E>(
        &mut self,
        response_result: Result<Response<T>, E>,
        is_head: bool,
        next: Next,
        version: Version,
    ) -> Result<(), HttpError>
    where
        T: Body + Unpin,
        T::Error: Display,
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        match response_result {
            Ok(mut response) => {
                mark_connection(response.headers_mut(), next, version);
                self.do_send_response(response, is_head).await
            }
            Err(e) => {
                let e: Box<dyn Error + Send + Sync> = e.into();
                error!(cause = %e, "request handler failed");
                let mut response = status_response(StatusCode::INTERNAL_SERVER_ERROR);
                mark_connection(response.headers_mut(), next, version);
                self.do_send_response(response, is_head).await
            }
        }
    }

    async fn do_send_response<T>(&mut self, response: Response<T>, is_head: bool) -> Result<(), HttpError>
    where
        T: Body + Unpin,
        T::Error: Display,
    {
        let (parts, mut body) = response.into_parts();
        let payload_size = PayloadSize::from(body.size_hint());
        let header = Message::<_, T::Data>::Header((ResponseHead::from_parts(parts, ()), payload_size));

        if is_head || payload_size.is_empty() {
            self.framed_write.send(header).await?;
            self.framed_write.encoder_mut().discard_payload();
            return Ok(());
        }

        // feed only flushes once the write buffer is full, the eof below flushes the rest
        self.framed_write.feed(header).await?;
        while let Some(frame) = body.frame().await {
            let frame = frame.map_err(|e| SendError::invalid_body(format!("failed to produce response body: {e}")))?;
            if let Ok(data) = frame.into_data() {
                self.framed_write.feed(Message::Payload(PayloadItem::Chunk(data))).await?;
            }
        }
        self.framed_write.send(Message::Payload(PayloadItem::<T::Data>::Eof)).await?;
        Ok(())
    }

    async fn send_continue(&mut self) -> Result<(), HttpError> {
        let writer = self.framed_write.get_mut();
        writer.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await.map_err(SendError::io)?;
        writer.flush().await.map_err(SendError::io)?;
        info!("sent 100 continue");
        Ok(())
    }

    async fn send_error_status(&mut self, status: StatusCode) -> Result<(), HttpError> {
        let mut response = status_response(status);
        mark_connection(response.headers_mut(), Next::Close, Version::HTTP_11);
        self.do_send_response(response, false).await?;
        self.shutdown().await;
        Ok(())
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.framed_write.get_mut().shutdown().await {
            debug!(cause = %e, "failed to shutdown connection");
        }
    }
}

fn mark_connection(headers: &mut HeaderMap, next: Next, version: Version) {
    match (next, version) {
        (Next::Close, _) => {
            headers.insert(CONNECTION, HeaderValue::from_static("close"));
        }
        (Next::KeepAlive, Version::HTTP_10) => {
            headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        }
        (Next::KeepAlive, _) => {}
    }
}

fn status_response(status: StatusCode) -> Response<Empty<Bytes>> {
    let mut response = Response::new(Empty::new());
    *response.status_mut() = status;
    response
}

fn text_response(status: StatusCode, message: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(message)));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}
