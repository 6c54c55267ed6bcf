//! HTTP response helpers

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Body of a successful ingestion
pub const OK_BODY: &str = "OK";

/// Health check body
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Plain-text success response
pub fn ok_response() -> Response {
    text_response(StatusCode::OK, OK_BODY.to_string())
}

/// Plain-text error response carrying a human-readable message
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    text_response(status, message.into())
}

fn text_response(status: StatusCode, body: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}
