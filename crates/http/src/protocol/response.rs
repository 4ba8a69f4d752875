use http::Response;

/// A response before its body is attached: status line and headers only.
pub type ResponseHead = Response<()>;
