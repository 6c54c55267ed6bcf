//! HTTP source error types

use std::fmt;

/// HTTP source errors
#[derive(Debug, thiserror::Error)]
pub enum HttpSourceError {
    /// Failed to bind to address
    #[error("failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Server loop failed
    #[error("HTTP error: {0}")]
    Http(String),
}

/// A single event of a request that could not be persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFailure {
    /// 0-based position of the event in the request
    pub index: usize,
    /// Failure detail, for logs only
    pub detail: String,
}

impl fmt::Display for EventFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event {}: {}", self.index, self.detail)
    }
}

/// Outcome of ingesting one request
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Events persisted
    pub accepted: usize,
    /// Tables created while persisting
    pub tables_created: usize,
    /// Events that failed, in request order
    pub failures: Vec<EventFailure>,
}

impl IngestReport {
    /// Number of events in the request
    pub fn total(&self) -> usize {
        self.accepted + self.failures.len()
    }

    /// Check if every event was persisted
    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Client-facing summary naming the failed positions but not the causes
    pub fn summary(&self) -> String {
        if self.is_complete_success() {
            return format!("{} events stored", self.accepted);
        }
        let positions: Vec<String> = self.failures.iter().map(|f| f.index.to_string()).collect();
        format!(
            "failed to store {} of {} events (positions {})",
            self.failures.len(),
            self.total(),
            positions.join(", ")
        )
    }
}
