//! # Gateway Integration
//!
//! Middleware and client for microservices that sit behind an API gateway:
//!
//! - **Validation**: resolves `Authorization` and `x-api-key` against the
//!   gateway and injects the caller identity into the request
//! - **Audit**: one redacted usage record per request, appended to AWS
//!   CloudWatch Logs
//! - **CDN**: Fastly surrogate-key tagging and purging driven by response
//!   headers
//! - **Outbound**: calls to other microservices with the service credential
//! - **Testing** (feature `testing`): a mock gateway plus in-memory log sink
//!   and purger for host services' own tests
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Host application (axum)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  IntegrationLayer (CORS → validate → inject → audit)        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers                          ─▶ cache signal on exit  │
//! ├──────────────────┬──────────────────┬───────────────────────┤
//! │  GatewayClient   │  AuditLog        │  CachePurger          │
//! │  (reqwest)       │  (CloudWatch)    │  (Fastly)             │
//! └──────────────────┴──────────────────┴───────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gateway_integration::{Config, GatewayIntegration};
//! use axum::{Router, routing::get};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let integration = GatewayIntegration::bootstrap(config).await?;
//!
//!     let app: Router = Router::new()
//!         .route("/api/v1/dataset", get(|| async { "datasets" }))
//!         .layer(integration.layer());
//!
//!     // Start the server...
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod cdn;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod integration;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
#[cfg(feature = "testing")]
pub mod testing;
pub mod utils;

// Re-exports for convenience
pub use config::{BootstrapOptions, Config};
pub use error::{IntegrationError, IntegrationResult};
pub use gateway::{GatewayClient, MicroserviceRequest, MicroserviceResponse, Registration};
pub use integration::GatewayIntegration;
pub use middleware::IntegrationLayer;
pub use models::{LoggedUser, RequestValidation};
pub use routes::build_router;
