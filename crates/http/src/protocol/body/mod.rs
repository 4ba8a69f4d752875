//! Request body streaming.
//!
//! The connection task owns the socket, the handler owns the body. They are joined
//! by a pair of channels:
//!
//! - [`ReqBody`] is the handler side and implements `http_body::Body`. Every poll for a
//!   frame sends one demand signal.
//! - `BodySender` is the connection side. For each demand it pulls exactly one payload
//!   item from the request decoder and hands it over.
//!
//! So at most one chunk is in flight, and a handler that reads slowly slows the
//! socket down instead of filling memory. Whatever the handler leaves unread is
//! skipped by the connection after the handler returns.

mod body_channel;
mod req_body;

pub(crate) use body_channel::body_channel;
pub use req_body::ReqBody;
