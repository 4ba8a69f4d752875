use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};
use bytes::Bytes;
use futures::{SinkExt, Stream, StreamExt, channel::mpsc};
use http_body::{Body, Frame, SizeHint};
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tracing::{debug, error, trace};

/// Creates the connection side and the handler side of one request body.
pub(crate) fn body_channel<S>(payload_stream: &mut S, payload_size: PayloadSize) -> (BodySender<'_, S>, BodyReceiver)
where
    S: Stream<Item = Result<Message<(RequestHeader, PayloadSize)>, ParseError>> + Unpin,
{
    let (signal_sender, signal_receiver) = mpsc::channel(1);
    let (data_sender, data_receiver) = mpsc::channel(1);

    (BodySender::new(payload_stream, signal_receiver, data_sender), BodyReceiver::new(signal_sender, data_receiver, payload_size))
}

#[derive(Debug)]
pub(crate) struct DemandSignal;

pub(crate) struct BodySender<'conn, S> {
    payload_stream: &'conn mut S,
    signal_receiver: mpsc::Receiver<DemandSignal>,
    data_sender: mpsc::Sender<Result<PayloadItem, ParseError>>,
    eof: bool,
    broken: bool,
}

impl<'conn, S> BodySender<'conn, S>
where
    S: Stream<Item = Result<Message<(RequestHeader, PayloadSize)>, ParseError>> + Unpin,
{
    fn new(
        payload_stream: &'conn mut S,
        signal_receiver: mpsc::Receiver<DemandSignal>,
        data_sender: mpsc::Sender<Result<PayloadItem, ParseError>>,
    ) -> Self {
        Self { payload_stream, signal_receiver, data_sender, eof: false, broken: false }
    }

    /// Serves demand from the receiver until the body ends, the receiver is dropped,
    /// or reading from the connection fails.
    pub(crate) async fn start(&mut self) {
        while !self.eof && !self.broken {
            if self.signal_receiver.next().await.is_none() {
                trace!("body receiver dropped, stop serving body data");
                return;
            }

            match self.read_data().await {
                Ok(payload_item) => {
                    self.eof = payload_item.is_eof();
                    if self.data_sender.send(Ok(payload_item)).await.is_err() {
                        debug!("body receiver dropped while sending body data");
                        return;
                    }
                }
                Err(e) => {
                    error!(cause = %e, "failed to read request body");
                    self.broken = true;
                    let forwarded = if e.is_disconnect() { ParseError::IncompleteBody } else { ParseError::invalid_body(&e) };
                    // the receiver may be gone already, the error is still reported by `finish`
                    let _ = self.data_sender.send(Err(forwarded)).await;
                }
            }
        }
    }

    /// Drops whatever body data the handler did not read, leaving the connection
    /// positioned at the next request.
    pub(crate) async fn finish(&mut self) -> Result<(), ParseError> {
        if self.broken {
            return Err(ParseError::invalid_body("request body stream is broken"));
        }

        let mut skipped: usize = 0;
        while !self.eof {
            let payload_item = self.read_data().await?;
            match payload_item {
                PayloadItem::Chunk(bytes) => skipped += bytes.len(),
                PayloadItem::Eof => self.eof = true,
            }
        }

        if skipped > 0 {
            debug!(size = skipped, "skipped unread request body");
        }
        Ok(())
    }

    async fn read_data(&mut self) -> Result<PayloadItem, ParseError> {
        match self.payload_stream.next().await {
            Some(Ok(Message::Payload(payload_item))) => Ok(payload_item),
            Some(Ok(Message::Header(_))) => Err(ParseError::invalid_body("received a request header while reading the body")),
            Some(Err(e)) => Err(e),
            None => Err(ParseError::IncompleteBody),
        }
    }
}

/// Handler side of the body channel.
#[derive(Debug)]
pub(crate) struct BodyReceiver {
    signal_sender: mpsc::Sender<DemandSignal>,
    data_receiver: mpsc::Receiver<Result<PayloadItem, ParseError>>,
    payload_size: PayloadSize,
    in_flight: bool,
    eof: bool,
}

impl BodyReceiver {
    fn new(
        signal_sender: mpsc::Sender<DemandSignal>,
        data_receiver: mpsc::Receiver<Result<PayloadItem, ParseError>>,
        payload_size: PayloadSize,
    ) -> Self {
        Self { signal_sender, data_receiver, payload_size, in_flight: false, eof: false }
    }
}

impl Body for BodyReceiver {
    type Data = Bytes;
    type Error = ParseError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        // once finished, never signal again: nobody would answer
        if this.eof || this.payload_size.is_empty() {
            this.eof = true;
            return Poll::Ready(None);
        }

        if !this.in_flight {
            let demand = match ready!(this.signal_sender.poll_ready(cx)) {
                Ok(()) => this.signal_sender.start_send(DemandSignal),
                Err(e) => Err(e),
            };

            if let Err(e) = demand {
                debug!(cause = %e, "body sender is gone");
                this.eof = true;
                return Poll::Ready(Some(Err(ParseError::IncompleteBody)));
            }
            this.in_flight = true;
        }

        let received = ready!(this.data_receiver.poll_next_unpin(cx));
        this.in_flight = false;

        match received {
            Some(Ok(PayloadItem::Chunk(bytes))) => Poll::Ready(Some(Ok(Frame::data(bytes)))),
            Some(Ok(PayloadItem::Eof)) => {
                this.eof = true;
                Poll::Ready(None)
            }
            Some(Err(e)) => {
                this.eof = true;
                Poll::Ready(Some(Err(e)))
            }
            None => {
                this.eof = true;
                Poll::Ready(Some(Err(ParseError::IncompleteBody)))
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.eof || self.payload_size.is_empty()
    }

    fn size_hint(&self) -> SizeHint {
        self.payload_size.into()
    }
}
