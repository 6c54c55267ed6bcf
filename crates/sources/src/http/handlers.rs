//! HTTP route handlers
//!
//! # Endpoints
//!
//! - `POST /` and `POST /v1/events` - Event batch ingestion (JSON, XML or CSV)
//! - `GET /health` - Health check

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use super::coordinator::IngestCoordinator;
use super::metrics::IngestMetrics;
use super::response::{HealthResponse, error_response, ok_response};

/// Shared state for handlers
pub struct HandlerState {
    pub coordinator: IngestCoordinator,
    pub metrics: Arc<IngestMetrics>,
    /// Bodies above this size are refused with 413 before reaching a handler
    pub max_payload_size: usize,
}

/// POST / and /v1/events - Ingest a batch of events
pub async fn ingest_events(
    State(state): State<Arc<HandlerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.metrics.request_received(body.len());

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    match state.coordinator.ingest(&body, content_type).await {
        Ok(report) if report.is_complete_success() => {
            state.metrics.request_success();
            debug!(events = report.accepted, "ingested batch");
            ok_response()
        }
        Ok(report) => {
            state.metrics.request_rejected();
            error_response(StatusCode::UNPROCESSABLE_ENTITY, report.summary())
        }
        Err(e) => {
            state.metrics.request_rejected();
            warn!(content_type, error = %e, "rejected request body");
            let message = if e.is_input_error() {
                e.to_string()
            } else {
                "request body could not be processed".to_string()
            };
            error_response(StatusCode::UNPROCESSABLE_ENTITY, message)
        }
    }
}

/// GET /health - Health check
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}
