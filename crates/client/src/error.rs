//! Error types for the event sender
//!
//! Configuration, queue and encoding failures are returned to the caller.
//! Delivery failures are a separate type because the sender never raises
//! them: a failed flush becomes a `false` return.

use std::io;
use std::path::{Path, PathBuf};

use beacon_protocol::ProtocolError;
use thiserror::Error;

/// Result type for sender operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when configuring the sender or queueing events
#[derive(Debug, Error)]
pub enum ClientError {
    // =========================================================================
    // Configuration errors
    // =========================================================================
    /// An option violates its constraints
    #[error("invalid configuration: {field}: {message}")]
    InvalidConfiguration {
        /// Option name
        field: &'static str,
        /// What was wrong
        message: String,
    },

    // =========================================================================
    // Queue errors
    // =========================================================================
    /// Offline queue directory could not be read or written
    #[error("queue I/O error at '{path}': {source}")]
    Queue {
        /// File or directory involved
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    // =========================================================================
    // Encoding errors
    // =========================================================================
    /// Event could not be encoded for the queue or the wire
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Transport could not be constructed
    #[error("transport unavailable: {0}")]
    Transport(#[from] TransportError),
}

impl ClientError {
    /// Create an InvalidConfiguration error
    pub fn invalid_config(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field,
            message: message.into(),
        }
    }

    /// Create a queue I/O error
    pub fn queue(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Queue {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Errors reported by a [`Transport`](crate::Transport)
#[derive(Debug, Error)]
pub enum TransportError {
    /// Server answered with a non-success status
    #[error("server responded with status {0}")]
    Status(u16),

    /// Request could not be sent or the response not read
    #[error("request failed: {0}")]
    Request(String),

    /// Transport could not be constructed
    #[error("transport setup failed: {0}")]
    Setup(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_invalid_configuration() {
        let err = ClientError::invalid_config("batch_size", "must be positive");
        assert_eq!(
            err.to_string(),
            "invalid configuration: batch_size: must be positive"
        );
    }

    #[test]
    fn test_error_display_queue() {
        let err = ClientError::queue(
            "EventBatches/x",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "queue I/O error at 'EventBatches/x': denied");
    }

    #[test]
    fn test_error_display_protocol_is_transparent() {
        let err = ClientError::from(ProtocolError::unsupported("x"));
        assert_eq!(err.to_string(), "unsupported type: x");
    }

    #[test]
    fn test_transport_error_display() {
        assert_eq!(
            TransportError::Status(503).to_string(),
            "server responded with status 503"
        );
        assert_eq!(
            TransportError::Request("connection refused".into()).to_string(),
            "request failed: connection refused"
        );
    }
}
