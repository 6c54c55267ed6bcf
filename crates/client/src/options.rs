//! Sender options
//!
//! One `SenderOptions` value is built per sender and passed to it by value;
//! there is no process-wide default instance. Every setter validates its
//! input, so a constructed value always satisfies
//! `max_offline_saved_events >= batch_size > 0`.

use std::path::{Path, PathBuf};

use beacon_protocol::{TextEncoding, WireFormat};
use reqwest::Url;

use crate::error::{ClientError, Result};

/// Default number of queued events that triggers a flush
pub const DEFAULT_BATCH_SIZE: usize = 3;

/// Default maximum number of events kept while the server is unreachable
pub const DEFAULT_MAX_OFFLINE_SAVED_EVENTS: usize = 3;

/// Default offline queue directory
pub const DEFAULT_QUEUE_DIR: &str = "EventBatches";

/// Options for an [`EventSender`](crate::EventSender)
///
/// # Example
///
/// ```
/// use beacon_client::SenderOptions;
/// use beacon_protocol::WireFormat;
///
/// let options = SenderOptions::new("https://collector.example.com/v1/events")
///     .unwrap()
///     .with_limits(10, 50)
///     .unwrap()
///     .with_format(WireFormat::Xml);
///
/// assert_eq!(options.batch_size(), 10);
/// assert!(SenderOptions::new("ftp://example.com").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct SenderOptions {
    endpoint: Url,
    queue_dir: PathBuf,
    batch_size: usize,
    max_offline_saved_events: usize,
    format: WireFormat,
    encoding: TextEncoding,
}

impl SenderOptions {
    /// Create options for an endpoint, all other fields at their defaults
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` unless `endpoint` is an absolute
    /// http or https URL.
    pub fn new(endpoint: &str) -> Result<Self> {
        Ok(Self {
            endpoint: parse_endpoint(endpoint)?,
            queue_dir: PathBuf::from(DEFAULT_QUEUE_DIR),
            batch_size: DEFAULT_BATCH_SIZE,
            max_offline_saved_events: DEFAULT_MAX_OFFLINE_SAVED_EVENTS,
            format: WireFormat::default(),
            encoding: TextEncoding::default(),
        })
    }

    // =========================================================================
    // Getters
    // =========================================================================

    /// Server endpoint receiving batches
    #[inline]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Offline queue directory
    #[inline]
    pub fn queue_dir(&self) -> &Path {
        &self.queue_dir
    }

    /// Number of queued events that triggers a flush
    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Maximum number of events kept after a failed flush
    #[inline]
    pub fn max_offline_saved_events(&self) -> usize {
        self.max_offline_saved_events
    }

    /// Wire format used for delivery
    #[inline]
    pub fn format(&self) -> WireFormat {
        self.format
    }

    /// Text encoding used for delivery
    #[inline]
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// `Content-Type` header value for delivered payloads
    pub fn content_type(&self) -> String {
        self.format.content_type_header(self.encoding)
    }

    // =========================================================================
    // Validating setters
    // =========================================================================

    /// Change the server endpoint
    pub fn set_endpoint(&mut self, endpoint: &str) -> Result<()> {
        self.endpoint = parse_endpoint(endpoint)?;
        Ok(())
    }

    /// Change the flush threshold
    ///
    /// # Errors
    ///
    /// Rejects zero and values above `max_offline_saved_events`; raise the
    /// maximum first or use [`set_limits`](Self::set_limits).
    pub fn set_batch_size(&mut self, batch_size: usize) -> Result<()> {
        self.set_limits(batch_size, self.max_offline_saved_events)
    }

    /// Change the offline retention ceiling
    ///
    /// # Errors
    ///
    /// Rejects zero and values below the current `batch_size`.
    pub fn set_max_offline_saved_events(&mut self, max: usize) -> Result<()> {
        self.set_limits(self.batch_size, max)
    }

    /// Change flush threshold and retention ceiling together
    pub fn set_limits(&mut self, batch_size: usize, max_offline_saved_events: usize) -> Result<()> {
        if batch_size == 0 {
            return Err(ClientError::invalid_config(
                "batch_size",
                "must be a positive integer",
            ));
        }
        if max_offline_saved_events == 0 {
            return Err(ClientError::invalid_config(
                "max_offline_saved_events",
                "must be a positive integer",
            ));
        }
        if max_offline_saved_events < batch_size {
            return Err(ClientError::invalid_config(
                "max_offline_saved_events",
                format!(
                    "{max_offline_saved_events} is less than batch_size {batch_size}"
                ),
            ));
        }

        self.batch_size = batch_size;
        self.max_offline_saved_events = max_offline_saved_events;
        Ok(())
    }

    /// Change the offline queue directory
    pub fn set_queue_dir(&mut self, dir: impl Into<PathBuf>) {
        self.queue_dir = dir.into();
    }

    /// Change the wire format
    pub fn set_format(&mut self, format: WireFormat) {
        self.format = format;
    }

    /// Change the text encoding
    pub fn set_encoding(&mut self, encoding: TextEncoding) {
        self.encoding = encoding;
    }

    // =========================================================================
    // Builder-style variants
    // =========================================================================

    /// Set flush threshold and retention ceiling
    pub fn with_limits(mut self, batch_size: usize, max_offline_saved_events: usize) -> Result<Self> {
        self.set_limits(batch_size, max_offline_saved_events)?;
        Ok(self)
    }

    /// Set the offline queue directory
    #[must_use]
    pub fn with_queue_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.set_queue_dir(dir);
        self
    }

    /// Set the wire format
    #[must_use]
    pub fn with_format(mut self, format: WireFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the text encoding
    #[must_use]
    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let url = Url::parse(endpoint)
        .map_err(|e| ClientError::invalid_config("endpoint", format!("'{endpoint}': {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ClientError::invalid_config(
            "endpoint",
            format!("'{endpoint}': scheme '{other}' is not http or https"),
        )),
    }
}
