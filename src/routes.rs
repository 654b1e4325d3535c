//! Demo service router.
//!
//! # Middleware Stack (outermost first)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← HTTP request/response logging
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │      CORS        │ ← preflight answered here
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   Integration    │ ← validate, inject, audit / cache signal on the way out
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │    Body limit    │
//! └────────┬─────────┘
//!          ▼
//!      Handler
//! ```
//!
//! # Routes
//!
//! - `GET /healthcheck` - liveness (exempt from validation)
//! - `ANY /echo` - reflects the request as the handler sees it

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{any, get};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers::{self, EchoLimit};
use crate::integration::GatewayIntegration;

/// Build the demo router behind the integration layer.
pub fn build_router(integration: &GatewayIntegration) -> Router {
    let max_body = integration.config().max_request_body_size;
    info!(
        max_size_mb = max_body / (1024 * 1024),
        "Request body size limit configured"
    );

    Router::new()
        .route("/healthcheck", get(handlers::healthcheck))
        .route("/echo", any(handlers::echo))
        .with_state(EchoLimit(max_body))
        .layer(DefaultBodyLimit::max(max_body))
        .layer(integration.layer())
        .layer(TraceLayer::new_for_http())
}
