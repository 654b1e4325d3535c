//! Entry point for host applications.
//!
//! ```rust,no_run
//! use axum::{Router, routing::get};
//! use gateway_integration::{Config, GatewayIntegration};
//!
//! # async fn run() -> gateway_integration::IntegrationResult<()> {
//! let integration = GatewayIntegration::bootstrap(Config::from_env()?).await?;
//! let app: Router = Router::new()
//!     .route("/api/v1/dataset", get(|| async { "datasets" }))
//!     .layer(integration.layer());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::audit::{AuditLog, CloudWatchSink};
use crate::cdn::{CachePurger, FastlyPurger};
use crate::config::Config;
use crate::error::IntegrationResult;
use crate::gateway::{GatewayClient, MicroserviceRequest, MicroserviceResponse, Registration};
use crate::middleware::IntegrationLayer;

/// Configured integration: the inbound layer plus the outbound client.
///
/// Cheap to clone; build once at startup.
#[derive(Clone)]
pub struct GatewayIntegration {
    config: Arc<Config>,
    client: GatewayClient,
    purger: Option<Arc<dyn CachePurger>>,
    audit: Option<Arc<AuditLog>>,
}

impl std::fmt::Debug for GatewayIntegration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayIntegration")
            .field("client", &self.client)
            .field("cdn", &self.purger.is_some())
            .field("audit", &self.audit)
            .finish()
    }
}

impl GatewayIntegration {
    /// Build the production backends from `config`: a reqwest client for the
    /// gateway, a Fastly purger and a CloudWatch Logs sink when enabled.
    ///
    /// # Errors
    ///
    /// Returns `IntegrationError::Config` if an HTTP client cannot be built
    /// or a credential is not a valid header value.
    pub async fn bootstrap(config: Config) -> IntegrationResult<Self> {
        let client = GatewayClient::new(&config)?;

        let purger: Option<Arc<dyn CachePurger>> = match &config.cdn {
            Some(cdn) => Some(Arc::new(FastlyPurger::new(cdn, &config)?)),
            None => None,
        };

        let audit = match &config.audit {
            Some(audit) => {
                let sink = CloudWatchSink::new(&audit.region).await;
                Some(Arc::new(AuditLog::new(
                    Arc::new(sink),
                    audit.log_group.clone(),
                    audit.log_stream.clone(),
                )))
            }
            None => None,
        };

        info!(
            gateway = %config.gateway_url,
            cdn = config.cdn_enabled(),
            audit = config.audit_enabled(),
            "Gateway integration middleware registered"
        );
        Ok(Self::with_components(config, client, purger, audit))
    }

    /// Assemble from caller-supplied backends.
    ///
    /// A backend for a feature the configuration disables is ignored; an
    /// enabled feature without a backend is turned off with a warning.
    pub fn with_components(
        config: Config,
        client: GatewayClient,
        purger: Option<Arc<dyn CachePurger>>,
        audit: Option<Arc<AuditLog>>,
    ) -> Self {
        if config.cdn_enabled() && purger.is_none() {
            warn!("CDN signalling enabled but no purger supplied; disabled");
        }
        if config.audit_enabled() && audit.is_none() {
            warn!("Audit logging enabled but no log sink supplied; disabled");
        }

        Self {
            config: Arc::new(config),
            client,
            purger,
            audit,
        }
    }

    /// The inbound layer (CORS, validation, injection, audit, cache signal).
    pub fn layer(&self) -> IntegrationLayer {
        IntegrationLayer::new(
            self.config.clone(),
            self.client.clone(),
            self.purger.clone(),
            self.audit.clone(),
        )
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client(&self) -> &GatewayClient {
        &self.client
    }

    pub fn audit_log(&self) -> Option<&Arc<AuditLog>> {
        self.audit.as_ref()
    }

    /// See [`GatewayClient::request_to_microservice`].
    pub async fn request_to_microservice(
        &self,
        request: MicroserviceRequest,
    ) -> IntegrationResult<MicroserviceResponse> {
        self.client.request_to_microservice(request).await
    }

    /// See [`GatewayClient::register_microservice`].
    pub async fn register_microservice(
        &self,
        registration: &Registration,
    ) -> IntegrationResult<Value> {
        self.client.register_microservice(registration).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::{BootstrapOptions, Flag};

    fn config() -> Config {
        Config::from_options(BootstrapOptions {
            gateway_url: "http://gateway.test".to_string(),
            microservice_token: "token".to_string(),
            fastly_enabled: Some(Flag::Bool(false)),
            aws_cloud_watch_logging_enabled: Some(Flag::Bool(false)),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_bootstrap_without_optional_backends() {
        let integration = GatewayIntegration::bootstrap(config()).await.unwrap();

        assert!(integration.audit_log().is_none());
        assert_eq!(integration.client().base_url(), "http://gateway.test");
        assert!(integration.config().require_api_key);
    }

    #[test]
    fn test_debug_does_not_leak_token() {
        let config = config();
        let client = GatewayClient::new(&config).unwrap();
        let integration = GatewayIntegration::with_components(config, client, None, None);

        assert!(!format!("{integration:?}").contains("token"));
    }
}
