//! Shared fixtures: the demo service wired to a mock gateway, with mock
//! microservices served behind the gateway URL.
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{any, get};
use axum::{Json, Router};
use reqwest::Client;
use serde_json::{Value, json};

use gateway_integration::audit::AuditLog;
use gateway_integration::config::{BootstrapOptions, Flag};
use gateway_integration::testing::{
    MemoryLogSink, MemoryPurger, MockGateway, RecordedCall, serve,
};
use gateway_integration::{Config, GatewayClient, GatewayIntegration, build_router};

pub const MICROSERVICE_TOKEN: &str = "microservice-token";

/// Requests received by the mock `dataset` microservice.
pub type CallLog = Arc<Mutex<Vec<RecordedCall>>>;

/// Reflects what the downstream microservice received.
async fn dataset(
    State(calls): State<CallLog>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Json<Value> {
    let call = RecordedCall::new(&headers, query.clone(), &body);
    calls.lock().unwrap().push(call.clone());
    let header = |name: &str| headers.get(name).map(|v| v.to_str().unwrap().to_string());
    Json(json!({
        "authorization": call.authorization,
        "appKey": header("app_key"),
        "apiKey": header("x-api-key"),
        "query": query,
        "body": call.body,
    }))
}

/// Microservices reachable through the gateway URL.
fn microservices(calls: CallLog) -> Router {
    Router::new()
        .route("/api/v1/dataset", any(dataset))
        .with_state(calls)
        .route(
            "/api/v1/missing",
            get(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({"errors": [{"status": 404, "detail": "Dataset not found"}]})),
                )
            }),
        )
        .route(
            "/api/v1/broken",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
        .route(
            "/api/v1/silent",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        )
}

pub fn user() -> Value {
    json!({
        "id": "u1",
        "name": "test user",
        "role": "USER",
        "provider": "local",
        "email": "user@example.com",
        "extraUserData": {"apps": ["rw", "gfw"]},
        "createdAt": "2023-01-01T00:00:00.000Z"
    })
}

pub fn microservice() -> Value {
    json!({"id": "microservice", "createdAt": "2016-09-14"})
}

pub fn application() -> Value {
    json!({
        "data": {
            "type": "applications",
            "id": "649c4b204967792f3a4e52c9",
            "attributes": {
                "name": "grouchy-armpit",
                "organization": null,
                "user": null,
                "apiKeyValue": "a1a9e4c3-bdff-4b6b-b5ff-7a60a0454e13",
                "createdAt": "2023-06-28T15:00:48.149Z",
                "updatedAt": "2023-06-28T15:00:48.149Z"
            }
        }
    })
}

/// Options every fixture starts from: CDN and audit on, API key required.
pub fn base_options(gateway_url: &str) -> BootstrapOptions {
    BootstrapOptions {
        gateway_url: gateway_url.to_string(),
        microservice_token: MICROSERVICE_TOKEN.to_string(),
        fastly_enabled: Some(Flag::Bool(true)),
        fastly_service_id: Some("fastly-service".to_string()),
        fastly_api_key: Some("fastly-key".to_string()),
        require_api_key: Some(Flag::Bool(true)),
        aws_cloud_watch_logging_enabled: Some(Flag::Bool(true)),
        aws_region: Some("us-east-1".to_string()),
        aws_cloud_watch_log_stream_name: Some("test-service".to_string()),
        upstream_timeout_ms: Some(5_000),
        ..Default::default()
    }
}

/// Demo service behind the integration layer, with in-memory backends.
pub struct TestFixture {
    pub base_url: String,
    pub client: Client,
    pub gateway: MockGateway,
    downstream: CallLog,
    pub purger: Arc<MemoryPurger>,
    pub sink: Arc<MemoryLogSink>,
    pub integration: GatewayIntegration,
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::with_options(|_| {}).await
    }

    pub async fn with_options(customize: impl FnOnce(&mut BootstrapOptions)) -> Self {
        let downstream = CallLog::default();
        let gateway = MockGateway::start_with(microservices(downstream.clone()))
            .await
            .expect("Failed to start mock gateway");
        let mut options = base_options(&gateway.url);
        customize(&mut options);

        let config = Config::from_options(options).expect("Invalid test configuration");
        let client = GatewayClient::new(&config).expect("Failed to build gateway client");
        let purger = Arc::new(MemoryPurger::new());
        let sink = Arc::new(MemoryLogSink::new());
        let audit = config
            .audit
            .as_ref()
            .map(|a| Arc::new(AuditLog::new(sink.clone(), &a.log_group, &a.log_stream)));

        let integration =
            GatewayIntegration::with_components(config, client, Some(purger.clone()), audit);
        let base_url = serve(build_router(&integration))
            .await
            .expect("Failed to start test server");

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url,
            client,
            gateway,
            downstream,
            purger,
            sink,
            integration,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn microservice_calls(&self) -> Vec<RecordedCall> {
        self.downstream.lock().unwrap().clone()
    }
}
