//! Liveness endpoint.
//!
//! `GET /healthcheck` is exempt from validation by a built-in skip rule, so
//! load balancers need no credential.

use axum::Json;
use chrono::Utc;
use tracing::instrument;

use crate::models::HealthResponse;

/// Always 200 while the process is serving.
#[instrument]
pub async fn healthcheck() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}
