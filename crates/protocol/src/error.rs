//! Protocol error types
//!
//! Errors raised while flattening, encoding, decoding or (de)serializing events.
//! All of them are data or programming errors and are returned to the immediate
//! caller, never swallowed.

use thiserror::Error;

/// Errors that can occur during protocol operations
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A value cannot be represented by the codec or the chosen wire format
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// Binary stream is truncated or corrupt
    #[error("malformed stream at offset {offset}: {message}")]
    MalformedStream { offset: usize, message: String },

    /// MIME type or format name has no wire format
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Nesting exceeded the depth guard, the event graph is cyclic or unbounded
    #[error("nesting deeper than {max_depth} levels at '{path}'")]
    CycleDetected { path: String, max_depth: usize },

    /// Wire payload is well-formed text but does not describe events
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// JSON syntax error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// XML syntax error
    #[error("XML error: {0}")]
    Xml(String),

    /// CSV syntax error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ProtocolError {
    /// Create an unsupported type error
    #[inline]
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedType(msg.into())
    }

    /// Create a malformed stream error
    #[inline]
    pub fn malformed(offset: usize, msg: impl Into<String>) -> Self {
        Self::MalformedStream {
            offset,
            message: msg.into(),
        }
    }

    /// Create a cycle detected error
    #[inline]
    pub fn cycle(path: impl Into<String>) -> Self {
        Self::CycleDetected {
            path: path.into(),
            max_depth: crate::MAX_DEPTH,
        }
    }

    /// Create an invalid payload error
    #[inline]
    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        Self::InvalidPayload(msg.into())
    }

    /// Create an XML error from any displayable source
    #[inline]
    pub fn xml(err: impl std::fmt::Display) -> Self {
        Self::Xml(err.to_string())
    }

    /// Check if the error originates from untrusted input rather than from the caller
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedStream { .. }
                | Self::UnsupportedFormat(_)
                | Self::InvalidPayload(_)
                | Self::Json(_)
                | Self::Xml(_)
                | Self::Csv(_)
        )
    }
}
