//! Health check endpoints.
//!
//! These endpoints are used by load balancers and monitoring systems
//! to verify service health.

use axum::{Json, extract::State, http::StatusCode};
use backline_core::record_store::RecordStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Health check response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok`, or `unavailable` when a dependency is down
    pub status: String,
    /// Crate version of the running service
    pub version: String,
}

impl HealthResponse {
    fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Liveness: the process is up. Does NOT check dependencies.
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (StatusCode::OK, Json(HealthResponse::new("ok")))
}

/// Readiness: the record store answers a ping.
///
/// Returns 503 when the store is unreachable. The router state must provide
/// an `Arc<dyn RecordStore>` (directly or through `FromRef`).
///
/// ```text
/// GET /ready
/// ```
pub async fn readiness_check(
    State(store): State<Arc<dyn RecordStore>>,
) -> (StatusCode, Json<HealthResponse>) {
    match store.ping().await {
        Ok(()) => (StatusCode::OK, Json(HealthResponse::new("ok"))),
        Err(error) => {
            tracing::warn!(%error, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse::new("unavailable")),
            )
        },
    }
}
