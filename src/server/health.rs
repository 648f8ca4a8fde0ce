//! Liveness endpoint.

use axum::http::StatusCode;

/// Handles `GET /health`. Answers as long as the listener is up; it says
/// nothing about GitHub reachability or workspace health.
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
