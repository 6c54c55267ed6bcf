//! Ingestion server configuration

use std::path::PathBuf;

use serde::Deserialize;

/// Ingestion server settings
///
/// ```toml
/// [server]
/// address = "0.0.0.0"
/// port = 8080
/// database = "beacon.db"
/// table_name_properties = ["EventName", "EventId"]
/// include_name_column = true
/// primary_key_column = "EventRecordId"
/// max_payload_size = 16777216
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub address: String,

    /// Listen port
    pub port: u16,

    /// SQLite database file
    pub database: PathBuf,

    /// Properties whose string value names the table, first match wins
    pub table_name_properties: Vec<String>,

    /// Keep the name property as a column
    pub include_name_column: bool,

    /// Auto-assigned integer key column of every table
    pub primary_key_column: String,

    /// Largest accepted request body in bytes
    pub max_payload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".into(),
            port: 8080,
            database: PathBuf::from("beacon.db"),
            table_name_properties: vec!["EventName".into(), "EventId".into()],
            include_name_column: true,
            primary_key_column: "EventRecordId".into(),
            max_payload_size: 16 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Socket address to bind to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}
