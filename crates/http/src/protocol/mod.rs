//! Protocol types shared by the codec, the connection loop and handlers.
//!
//! - [`Message`] is what the request decoder yields: a header, then payload items
//!   until [`PayloadItem::Eof`].
//! - [`PayloadSize`] describes how a body is framed on the wire.
//! - [`RequestHeader`] wraps `http::Request<()>` for the parsed request line and headers.
//! - [`body`] holds the channel that streams payload items to the handler.
//! - [`HttpError`], [`ParseError`] and [`SendError`] cover everything that can fail.

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::Expectation;
pub use request::RequestHeader;

mod response;
pub use response::ResponseHead;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;

pub mod body;
