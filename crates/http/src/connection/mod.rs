//! The per-connection request loop.
//!
//! [`HttpConnection`] reads requests one after another, answers `Expect`, runs the
//! handler while streaming the request body to it, skips whatever body the handler
//! left unread and writes the response. It keeps doing so until the peer closes the
//! connection or either side asks for `Connection: close`.

mod http_connection;

pub use http_connection::HttpConnection;

/// Tuning knobs of a single connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// initial capacity of the read buffer
    pub read_buffer_size: usize,
    /// whether the connection is reused after a response
    pub keep_alive: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { read_buffer_size: 8 * 1024, keep_alive: true }
    }
}
