//! HTTP source configuration

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8080;

/// Default bind address
pub const DEFAULT_ADDRESS: &str = "0.0.0.0";

/// Default maximum payload size (16MB)
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// HTTP source configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSourceConfig {
    /// Source identifier used in logs
    pub id: String,

    /// Bind address (e.g., "0.0.0.0")
    pub address: String,

    /// Listen port
    pub port: u16,

    /// Maximum request payload size in bytes
    pub max_payload_size: usize,
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            id: "http".into(),
            address: DEFAULT_ADDRESS.into(),
            port: DEFAULT_PORT,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }
}

impl HttpSourceConfig {
    /// Create config with custom port
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Socket address to bind to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}
