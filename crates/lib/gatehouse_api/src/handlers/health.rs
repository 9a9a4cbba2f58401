//! Liveness check.

use axum::Json;

/// `GET /health`: always answers while the process is serving.
pub async fn health() -> Json<&'static str> {
    Json("Health is good")
}
