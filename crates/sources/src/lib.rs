//! Beacon Sources - network ingestion
//!
//! Sources receive encoded event batches and hand each event to the
//! storage layer.
//!
//! # Available Sources
//!
//! - **HTTP** - axum endpoint accepting JSON, XML and CSV event batches
//!
//! # Example
//!
//! ```ignore
//! use beacon_sources::http::{HttpSource, HttpSourceConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let source = HttpSource::new(HttpSourceConfig::default(), provisioner);
//! source.run(CancellationToken::new()).await?;
//! ```

pub mod http;

pub use http::{
    HttpSource, HttpSourceConfig, HttpSourceError, IngestCoordinator, IngestMetrics,
    IngestMetricsSnapshot, IngestReport,
};
