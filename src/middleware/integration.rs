//! The request pipeline wrapped around the host application's routes.
//!
//! # Flow
//!
//! ```text
//! CORS ─▶ skip rule? ──yes──────────────────────────────▶ handler ─▶ cache signal
//!              │ no                                          ▲
//!              ▼                                             │
//!          validate ─▶ inject ─▶ audit ──────────────────────┘
//!              │          │        │
//!              └──────────┴────────┴──▶ error response (handler not called)
//! ```
//!
//! The resolved [`RequestValidation`] is also stored in the request
//! extensions, so axum handlers can take `Extension<RequestValidation>`.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tower_http::cors::{Cors, CorsLayer};
use tracing::{debug, instrument};

use super::cors::cors_layer;
use super::{inject, validation};
use crate::audit::{AuditLog, AuditRecord};
use crate::cdn::{self, CachePurger};
use crate::config::Config;
use crate::error::IntegrationResult;
use crate::gateway::GatewayClient;
use crate::metrics;

/// Shared per-process state of the pipeline.
struct Pipeline {
    config: Arc<Config>,
    client: GatewayClient,
    purger: Option<Arc<dyn CachePurger>>,
    audit: Option<Arc<AuditLog>>,
}

impl Pipeline {
    /// Everything that runs before the handler.
    #[instrument(skip_all, fields(method = %request.method(), path = %request.uri().path()))]
    async fn prepare(&self, request: Request<Body>) -> IntegrationResult<Request<Body>> {
        if self
            .config
            .should_skip_validation(request.method(), request.uri().path())
        {
            debug!("Skip rule matched, not validating");
            metrics::record_validation_skipped();
            return Ok(request);
        }

        let started = Instant::now();
        let credentials = validation::credentials(request.headers());
        let resolved =
            validation::resolve(&self.client, credentials, self.config.require_api_key).await?;
        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            anonymous = resolved.is_anonymous(),
            "Validation resolved"
        );

        let mut request =
            inject::inject(request, &resolved, self.config.max_request_body_size).await?;

        if let Some(audit) = &self.audit {
            let query: Vec<(String, String)> = request
                .uri()
                .query()
                .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
                .unwrap_or_default();
            let record =
                AuditRecord::build(request.method(), request.uri().path(), &query, &resolved);
            audit.submit(record).await?;
        }

        request.extensions_mut().insert(resolved);
        Ok(request)
    }
}

/// Tower layer running the integration pipeline, with CORS in front.
///
/// Built by [`GatewayIntegration::layer`](crate::GatewayIntegration::layer).
#[derive(Clone)]
pub struct IntegrationLayer {
    pipeline: Arc<Pipeline>,
    cors: CorsLayer,
}

impl IntegrationLayer {
    /// CDN signalling and auditing run only when both configured and given
    /// a backend.
    pub fn new(
        config: Arc<Config>,
        client: GatewayClient,
        purger: Option<Arc<dyn CachePurger>>,
        audit: Option<Arc<AuditLog>>,
    ) -> Self {
        let purger = purger.filter(|_| config.cdn_enabled());
        let audit = audit.filter(|_| config.audit_enabled());

        Self {
            pipeline: Arc::new(Pipeline {
                config,
                client,
                purger,
                audit,
            }),
            cors: cors_layer(),
        }
    }
}

impl<S> Layer<S> for IntegrationLayer {
    type Service = Cors<IntegrationService<S>>;

    fn layer(&self, inner: S) -> Self::Service {
        self.cors.layer(IntegrationService {
            inner,
            pipeline: self.pipeline.clone(),
        })
    }
}

/// Service wrapper produced by [`IntegrationLayer`].
#[derive(Clone)]
pub struct IntegrationService<S> {
    inner: S,
    pipeline: Arc<Pipeline>,
}

impl<S> Service<Request<Body>> for IntegrationService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let pipeline = self.pipeline.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let method = req.method().clone();
            let authorized = validation::has_user_token(req.headers());

            let req = match pipeline.prepare(req).await {
                Ok(req) => req,
                Err(e) => return Ok(e.into_response()),
            };

            let mut response = inner.call(req).await?;

            if let Some(purger) = &pipeline.purger {
                let status = response.status();
                let signalled = cdn::signal(
                    &method,
                    authorized,
                    status,
                    response.headers_mut(),
                    purger.as_ref(),
                )
                .await;
                if let Err(e) = signalled {
                    return Ok(e.into_response());
                }
            }

            Ok(response)
        })
    }
}
