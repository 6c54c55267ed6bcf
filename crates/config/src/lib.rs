//! Beacon Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! Minimal config should just work - only specify what you need to change.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use beacon_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[server]\nport = 9000").unwrap();
//! assert_eq!(config.server.port, 9000);
//! ```
//!
//! # Example Config
//!
//! ```toml
//! [log]
//! level = "info"
//!
//! [client]
//! endpoint = "https://collector.example.com/v1/events"
//! batch_size = 10
//! max_offline_saved_events = 100
//! format = "xml"
//!
//! [server]
//! port = 8080
//! database = "data/events.db"
//! ```

mod client;
mod error;
mod logging;
mod server;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use client::{ClientConfig, DEFAULT_ENDPOINT};
pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel, LogOutput};
pub use server::ServerConfig;

use serde::Deserialize;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,

    /// Event sender settings
    pub client: ClientConfig,

    /// Ingestion server settings
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, contains invalid TOML, or fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    ///
    /// Prefer using the `FromStr` trait implementation.
    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_protocol::{TextEncoding, WireFormat};
    use std::path::PathBuf;
    use std::str::FromStr;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.client.batch_size, 3);
        assert_eq!(config.client.max_offline_saved_events, 3);
        assert_eq!(config.client.format, WireFormat::Json);
        assert_eq!(config.client.queue_dir, PathBuf::from("EventBatches"));
        assert_eq!(config.server.primary_key_column, "EventRecordId");
        assert!(config.server.include_name_column);
        assert_eq!(config.server.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_full_config_parse() {
        let toml = r#"
[log]
level = "debug"
format = "json"

[client]
endpoint = "https://collector.example.com/v1/events"
queue_dir = "/var/spool/beacon"
batch_size = 10
max_offline_saved_events = 50
format = "csv"
encoding = "us-ascii"

[server]
address = "127.0.0.1"
port = 9000
database = "data/events.db"
table_name_properties = ["Kind"]
include_name_column = false
primary_key_column = "RowId"
max_payload_size = 1024
"#;
        let config = Config::from_str(toml).unwrap();

        assert_eq!(config.log.level, LogLevel::Debug);
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.client.batch_size, 10);
        assert_eq!(config.client.format, WireFormat::Csv);
        assert_eq!(config.client.encoding, TextEncoding::Ascii);
        assert_eq!(config.server.table_name_properties, vec!["Kind"]);
        assert!(!config.server.include_name_column);
        assert_eq!(config.server.bind_address(), "127.0.0.1:9000");
    }

    #[test]
    fn test_retention_below_batch_size_rejected() {
        let err = Config::from_str("[client]\nbatch_size = 5\nmax_offline_saved_events = 4")
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "max_offline_saved_events",
                ..
            }
        ));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let err = Config::from_str("[client]\nbatch_size = 0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "batch_size",
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_format_rejected() {
        let err = Config::from_str("[client]\nformat = \"yaml\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_non_http_endpoint_rejected() {
        for endpoint in ["ftp://host/", "localhost:8080", "http://", "http:///path"] {
            let toml = format!("[client]\nendpoint = \"{endpoint}\"");
            assert!(Config::from_str(&toml).is_err(), "{endpoint}");
        }
    }

    #[test]
    fn test_empty_primary_key_rejected() {
        assert!(Config::from_str("[server]\nprimary_key_column = \"\"").is_err());
    }

    #[test]
    fn test_shipped_example_config() {
        let config = Config::from_str(include_str!("../../../configs/beacon.toml")).unwrap();
        assert_eq!(config.client.endpoint, "http://localhost:8080/v1/events");
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn test_invalid_toml() {
        let result = Config::from_str("invalid { toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("beacon.toml");
        std::fs::write(&path, "[server]\nport = 7070\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.server.port, 7070);

        let missing = Config::from_file(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::IoError { .. }));
    }
}
