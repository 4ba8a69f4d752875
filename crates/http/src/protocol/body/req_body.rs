use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};

use super::body_channel::BodyReceiver;
use crate::protocol::ParseError;

/// The body handed to a request handler.
///
/// A body read from a connection is pulled chunk by chunk on demand, so the
/// handler decides how much of it is ever held in memory. Bodies built with
/// [`ReqBody::full`] or [`ReqBody::empty`] are handy for tests and for handlers
/// invoked outside a connection.
#[derive(Debug)]
pub struct ReqBody {
    inner: Kind,
}

#[derive(Debug)]
enum Kind {
    Receiver(BodyReceiver),
    Full(Option<Bytes>),
}

impl ReqBody {
    pub(crate) fn receiver(receiver: BodyReceiver) -> Self {
        Self { inner: Kind::Receiver(receiver) }
    }

    pub fn empty() -> Self {
        Self { inner: Kind::Full(None) }
    }

    pub fn full(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        if bytes.is_empty() { Self::empty() } else { Self { inner: Kind::Full(Some(bytes)) } }
    }
}

impl Default for ReqBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Bytes> for ReqBody {
    fn from(bytes: Bytes) -> Self {
        Self::full(bytes)
    }
}

impl From<String> for ReqBody {
    fn from(s: String) -> Self {
        Self::full(s)
    }
}

impl From<&'static str> for ReqBody {
    fn from(s: &'static str) -> Self {
        Self::full(s)
    }
}

impl Body for ReqBody {
    type Data = Bytes;
    type Error = ParseError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match &mut self.get_mut().inner {
            Kind::Receiver(receiver) => Pin::new(receiver).poll_frame(cx),
            Kind::Full(bytes) => Poll::Ready(bytes.take().map(|bytes| Ok(Frame::data(bytes)))),
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.inner {
            Kind::Receiver(receiver) => receiver.is_end_stream(),
            Kind::Full(bytes) => bytes.is_none(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.inner {
            Kind::Receiver(receiver) => receiver.size_hint(),
            Kind::Full(Some(bytes)) => SizeHint::with_exact(bytes.len() as u64),
            Kind::Full(None) => SizeHint::with_exact(0),
        }
    }
}
