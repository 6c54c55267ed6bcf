//! HTTP Source - REST endpoint for event ingestion
//!
//! Receives event batches encoded as JSON, XML or CSV, decodes them by
//! `Content-Type`, and persists each event into its schema's table.
//!
//! # Endpoints
//!
//! - `POST /` - Ingest a batch of events
//! - `POST /v1/events` - Same, versioned path
//! - `GET /health` - Health check
//!
//! # Protocol
//!
//! ```text
//! POST /v1/events
//! Content-Type: application/json; charset=utf-8
//!
//! [{"EventName":"signup","user":"ada"},{"EventName":"signup","user":"bob"}]
//! ```
//!
//! Responds `200 OK` with body `OK` when every event was stored, and
//! `422 Unprocessable Entity` with a short message otherwise. Storage
//! details only go to the log.
//!
//! # Example
//!
//! ```ignore
//! use beacon_sources::http::{HttpSource, HttpSourceConfig};
//!
//! let provisioner = Arc::new(TableProvisioner::new(storage, mapper));
//! let source = HttpSource::new(HttpSourceConfig::with_port(8080), provisioner);
//! source.run(cancel_token).await?;
//! ```

mod config;
mod coordinator;
mod error;
mod handlers;
mod metrics;
mod response;


use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use beacon_sinks::TableProvisioner;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use config::{DEFAULT_ADDRESS, DEFAULT_MAX_PAYLOAD_SIZE, DEFAULT_PORT, HttpSourceConfig};
pub use coordinator::IngestCoordinator;
pub use error::{EventFailure, HttpSourceError, IngestReport};
pub use metrics::{IngestMetrics, IngestMetricsSnapshot};
pub use response::OK_BODY;

use handlers::{HandlerState, health_check, ingest_events};

/// HTTP source for event ingestion
pub struct HttpSource {
    config: HttpSourceConfig,
    provisioner: Arc<TableProvisioner>,
    metrics: Arc<IngestMetrics>,
    running: Arc<AtomicBool>,
}

impl HttpSource {
    /// Create a new HTTP source
    pub fn new(config: HttpSourceConfig, provisioner: Arc<TableProvisioner>) -> Self {
        Self {
            config,
            provisioner,
            metrics: Arc::new(IngestMetrics::new()),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get reference to metrics
    pub fn metrics(&self) -> &IngestMetrics {
        &self.metrics
    }

    /// Shared handle to the metrics, usable after `run` consumes the source
    pub fn metrics_handle(&self) -> Arc<IngestMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Check if the source is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Run the HTTP source
    ///
    /// Binds to the configured address and serves until cancelled.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), HttpSourceError> {
        let bind_addr = self.config.bind_address();

        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| HttpSourceError::Bind {
                address: bind_addr.clone(),
                source: e,
            })?;

        self.serve(listener, cancel).await
    }

    /// Serve on an already bound listener until cancelled
    pub async fn serve(
        self,
        listener: TcpListener,
        cancel: CancellationToken,
    ) -> Result<(), HttpSourceError> {
        let local_addr = listener.local_addr()?;
        self.running.store(true, Ordering::Relaxed);

        tracing::info!(
            source_id = %self.config.id,
            address = %local_addr,
            "HTTP source listening"
        );

        let state = Arc::new(HandlerState {
            coordinator: IngestCoordinator::new(
                Arc::clone(&self.provisioner),
                Arc::clone(&self.metrics),
            ),
            metrics: Arc::clone(&self.metrics),
            max_payload_size: self.config.max_payload_size,
        });

        let app = build_router(state);

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(cancel))
            .await
            .map_err(|e| HttpSourceError::Http(e.to_string()));

        self.running.store(false, Ordering::Relaxed);

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            source_id = %self.config.id,
            requests = snapshot.requests_total,
            events_accepted = snapshot.events_accepted,
            events_rejected = snapshot.events_rejected,
            tables_created = snapshot.tables_created,
            "HTTP source stopped"
        );

        result
    }
}

/// Build the axum router
fn build_router(state: Arc<HandlerState>) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_payload_size);
    Router::new()
        .route("/", post(ingest_events))
        .route("/v1/events", post(ingest_events))
        .route("/health", get(health_check))
        .layer(body_limit)
        .with_state(state)
}

/// Shutdown signal future
async fn shutdown_signal(cancel: CancellationToken) {
    cancel.cancelled().await;
}
