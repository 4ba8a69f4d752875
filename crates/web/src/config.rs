use serde::{Deserialize, Serialize};
use sluice_http::connection::ConnectionConfig;

/// Server settings, all optional when deserialized.
///
/// ```
/// use sluice_web::ServerConfig;
///
/// let config = ServerConfig::from_json(r#"{ "request_max_size": 1024 }"#).unwrap();
/// assert_eq!(config.request_max_size, 1024);
/// assert!(config.keep_alive);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// largest body buffered for a non-streaming route; streaming routes are not limited
    pub request_max_size: usize,
    pub read_buffer_size: usize,
    pub keep_alive: bool,
}

impl ServerConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig { read_buffer_size: self.read_buffer_size, keep_alive: self.keep_alive }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { request_max_size: 100 * 1024 * 1024, read_buffer_size: 8 * 1024, keep_alive: true }
    }
}
