//! Test doubles for host services (feature `testing`).
//!
//! - [`MockGateway`]: an in-process gateway answering
//!   `POST /v1/request/validate` and `POST /api/v1/microservice`, recording
//!   every call it receives
//! - [`MemoryLogSink`]: audit log destination kept in memory
//! - [`MemoryPurger`]: CDN purger recording the keys it was asked to purge
//!
//! ```rust,no_run
//! use gateway_integration::testing::MockGateway;
//! use axum::http::StatusCode;
//! use serde_json::json;
//!
//! # async fn run() -> std::io::Result<()> {
//! let gateway = MockGateway::start().await?;
//! gateway.reply_json(StatusCode::OK, json!({"user": {"id": "u1", "role": "USER"}}));
//! // Point `gatewayURL` at `gateway.url` and exercise the host service...
//! assert!(gateway.validations().is_empty());
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tracing::{debug, error};

use crate::gateway::{REGISTER_PATH, VALIDATE_PATH};

pub use crate::audit::{LogEvent, MemoryLogSink};
pub use crate::cdn::MemoryPurger;

/// One request received by a mock upstream.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub authorization: Option<String>,
    pub headers: HeaderMap,
    pub query: Option<String>,
    /// JSON body, `null` when empty or not JSON.
    pub body: Value,
}

impl RecordedCall {
    pub fn new(headers: &HeaderMap, query: Option<String>, body: &[u8]) -> Self {
        Self {
            authorization: headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            headers: headers.clone(),
            query,
            body: serde_json::from_slice(body).unwrap_or(Value::Null),
        }
    }
}

#[derive(Clone)]
struct Reply {
    status: StatusCode,
    content_type: &'static str,
    body: String,
}

#[derive(Clone)]
struct GatewayState {
    validations: Arc<Mutex<Vec<RecordedCall>>>,
    registrations: Arc<Mutex<Vec<RecordedCall>>>,
    reply: Arc<Mutex<Reply>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn validate(State(state): State<GatewayState>, headers: HeaderMap, body: Bytes) -> Response {
    lock(&state.validations).push(RecordedCall::new(&headers, None, &body));
    let reply = lock(&state.reply).clone();
    debug!(status = reply.status.as_u16(), "Mock gateway answering validation");
    (reply.status, [(CONTENT_TYPE, reply.content_type)], reply.body).into_response()
}

async fn register(State(state): State<GatewayState>, headers: HeaderMap, body: Bytes) -> Response {
    lock(&state.registrations).push(RecordedCall::new(&headers, None, &body));
    Json(json!({"status": "registered"})).into_response()
}

/// Gateway stand-in listening on an ephemeral port.
///
/// Validation replies with `200 {}` (anonymous) until told otherwise.
#[derive(Clone)]
pub struct MockGateway {
    /// Base URL, usable as `gatewayURL`.
    pub url: String,
    state: GatewayState,
}

impl MockGateway {
    /// Start a gateway serving only the validation and registration routes.
    ///
    /// # Errors
    ///
    /// Fails if no local port can be bound.
    pub async fn start() -> std::io::Result<Self> {
        Self::start_with(Router::new()).await
    }

    /// Start a gateway that also serves `routes`, e.g. microservices reached
    /// through the gateway URL.
    ///
    /// # Errors
    ///
    /// Fails if no local port can be bound.
    pub async fn start_with(routes: Router) -> std::io::Result<Self> {
        let state = GatewayState {
            validations: Arc::default(),
            registrations: Arc::default(),
            reply: Arc::new(Mutex::new(Reply {
                status: StatusCode::OK,
                content_type: "application/json",
                body: "{}".to_string(),
            })),
        };

        let app = Router::new()
            .route(VALIDATE_PATH, post(validate))
            .route(REGISTER_PATH, post(register))
            .with_state(state.clone())
            .merge(routes);

        let url = serve(app).await?;
        Ok(Self { url, state })
    }

    /// Answer validation calls with `status` and a JSON body.
    pub fn reply_json(&self, status: StatusCode, body: Value) {
        *lock(&self.state.reply) = Reply {
            status,
            content_type: "application/json",
            body: body.to_string(),
        };
    }

    /// Answer validation calls with `status` and a plain-text body.
    pub fn reply_text(&self, status: StatusCode, body: &str) {
        *lock(&self.state.reply) = Reply {
            status,
            content_type: "text/plain",
            body: body.to_string(),
        };
    }

    pub fn validations(&self) -> Vec<RecordedCall> {
        lock(&self.state.validations).clone()
    }

    pub fn registrations(&self) -> Vec<RecordedCall> {
        lock(&self.state.registrations).clone()
    }
}

/// Serve `app` on an ephemeral local port and return its base URL.
///
/// # Errors
///
/// Fails if no local port can be bound.
pub async fn serve(app: Router) -> std::io::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Mock server failed");
        }
    });
    Ok(format!("http://{addr}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::{BootstrapOptions, Config, Flag};
    use crate::gateway::{GatewayClient, Registration};
    use crate::models::ValidationRequest;

    fn client(url: &str) -> GatewayClient {
        let config = Config::from_options(BootstrapOptions {
            gateway_url: url.to_string(),
            microservice_token: "token".to_string(),
            fastly_enabled: Some(Flag::Bool(false)),
            aws_cloud_watch_logging_enabled: Some(Flag::Bool(false)),
            ..Default::default()
        })
        .unwrap();
        GatewayClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_mock_gateway_answers_validation() {
        let gateway = MockGateway::start().await.unwrap();
        gateway.reply_json(StatusCode::OK, json!({"user": {"id": "microservice"}}));

        let validation = client(&gateway.url)
            .validate_request(&ValidationRequest {
                user_token: Some("Bearer abc".to_string()),
                api_key: None,
            })
            .await
            .unwrap();

        assert_eq!(validation.user.unwrap().id(), "microservice");
        let calls = gateway.validations();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].authorization.as_deref(), Some("Bearer token"));
        assert_eq!(calls[0].body, json!({"userToken": "Bearer abc"}));
    }

    #[tokio::test]
    async fn test_mock_gateway_records_registration() {
        let gateway = MockGateway::start().await.unwrap();
        let registration = Registration {
            name: "dataset".to_string(),
            url: "http://dataset:3000".to_string(),
            active: true,
        };

        let body = client(&gateway.url)
            .register_microservice(&registration)
            .await
            .unwrap();

        assert_eq!(body, json!({"status": "registered"}));
        assert_eq!(gateway.registrations()[0].body["name"], "dataset");
    }

    #[tokio::test]
    async fn test_extra_routes_are_served() {
        let routes = Router::new().route("/api/v1/ping", axum::routing::get(|| async { "pong" }));
        let gateway = MockGateway::start_with(routes).await.unwrap();

        let text = reqwest::get(format!("{}/api/v1/ping", gateway.url))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();

        assert_eq!(text, "pong");
    }
}
