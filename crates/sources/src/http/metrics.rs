//! HTTP source metrics
//!
//! Atomic counters for tracking ingestion.

use std::sync::atomic::{AtomicU64, Ordering};

/// Ingestion metrics
#[derive(Debug, Default)]
pub struct IngestMetrics {
    /// Total ingestion requests received
    pub requests_total: AtomicU64,

    /// Requests where every event was stored
    pub requests_success: AtomicU64,

    /// Requests answered with a client error status
    pub requests_rejected: AtomicU64,

    /// Events stored
    pub events_accepted: AtomicU64,

    /// Events that failed to store
    pub events_rejected: AtomicU64,

    /// Tables created on first sight of a schema
    pub tables_created: AtomicU64,

    /// Request body bytes received
    pub bytes_received: AtomicU64,
}

impl IngestMetrics {
    /// Create new metrics instance
    pub const fn new() -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            requests_success: AtomicU64::new(0),
            requests_rejected: AtomicU64::new(0),
            events_accepted: AtomicU64::new(0),
            events_rejected: AtomicU64::new(0),
            tables_created: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
        }
    }

    /// Record a request received
    #[inline]
    pub fn request_received(&self, bytes: usize) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record a fully successful request
    #[inline]
    pub fn request_success(&self) {
        self.requests_success.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rejected request
    #[inline]
    pub fn request_rejected(&self) {
        self.requests_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record events processed
    #[inline]
    pub fn events_processed(&self, accepted: usize, rejected: usize) {
        self.events_accepted.fetch_add(accepted as u64, Ordering::Relaxed);
        self.events_rejected.fetch_add(rejected as u64, Ordering::Relaxed);
    }

    /// Record tables created
    #[inline]
    pub fn tables_created(&self, count: usize) {
        self.tables_created.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> IngestMetricsSnapshot {
        IngestMetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_success: self.requests_success.load(Ordering::Relaxed),
            requests_rejected: self.requests_rejected.load(Ordering::Relaxed),
            events_accepted: self.events_accepted.load(Ordering::Relaxed),
            events_rejected: self.events_rejected.load(Ordering::Relaxed),
            tables_created: self.tables_created.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`IngestMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestMetricsSnapshot {
    pub requests_total: u64,
    pub requests_success: u64,
    pub requests_rejected: u64,
    pub events_accepted: u64,
    pub events_rejected: u64,
    pub tables_created: u64,
    pub bytes_received: u64,
}
