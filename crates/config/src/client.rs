//! Sender configuration

use std::path::PathBuf;

use beacon_protocol::{TextEncoding, WireFormat};
use serde::Deserialize;

/// Default ingestion endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080/";

/// Sender settings
///
/// ```toml
/// [client]
/// endpoint = "http://localhost:8080/"
/// queue_dir = "EventBatches"
/// batch_size = 3
/// max_offline_saved_events = 3
/// format = "json"      # json, xml, csv
/// encoding = "utf8"    # utf8, ascii
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    /// Ingestion URL (http or https)
    pub endpoint: String,

    /// Offline queue directory
    pub queue_dir: PathBuf,

    /// Queued events that trigger a flush
    pub batch_size: usize,

    /// Queue entries kept while the endpoint is unreachable
    pub max_offline_saved_events: usize,

    /// Wire format
    pub format: WireFormat,

    /// Text encoding of the wire payload
    pub encoding: TextEncoding,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.into(),
            queue_dir: PathBuf::from("EventBatches"),
            batch_size: 3,
            max_offline_saved_events: 3,
            format: WireFormat::Json,
            encoding: TextEncoding::Utf8,
        }
    }
}
