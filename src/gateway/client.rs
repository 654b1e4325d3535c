use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderName, HeaderValue};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use super::request::{MicroserviceRequest, MicroserviceResponse, Registration};
use crate::config::Config;
use crate::error::{IntegrationError, IntegrationResult};
use crate::metrics;
use crate::models::{RequestValidation, ValidationRequest};

/// Gateway endpoint resolving user tokens and API keys.
pub const VALIDATE_PATH: &str = "/v1/request/validate";

/// Gateway endpoint for microservice registration.
pub const REGISTER_PATH: &str = "/api/v1/microservice";

/// Per-request API key header, inbound and outbound.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Header carrying the calling application on outbound requests.
pub const APP_KEY_HEADER: &str = "app_key";

/// HTTP client for the gateway and the microservices behind it.
///
/// Every call carries `Authorization: Bearer <microservice token>`,
/// replacing any value supplied by the caller. Cheap to clone.
#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: Arc<str>,
    bearer: HeaderValue,
    require_api_key: bool,
}

impl fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayClient")
            .field("base_url", &self.base_url)
            .field("require_api_key", &self.require_api_key)
            .finish_non_exhaustive()
    }
}

impl GatewayClient {
    /// Build a client with its own connection pool, honouring `upstream_timeout`.
    ///
    /// # Errors
    ///
    /// Returns `IntegrationError::Config` if the HTTP client cannot be built
    /// or the token is not a valid header value.
    pub fn new(config: &Config) -> IntegrationResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.upstream_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| IntegrationError::Config(format!("Failed to build HTTP client: {e}")))?;

        Self::with_http_client(http, config)
    }

    /// Build a client on top of an existing `reqwest::Client`.
    pub fn with_http_client(http: reqwest::Client, config: &Config) -> IntegrationResult<Self> {
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", config.microservice_token))
            .map_err(|_| {
                IntegrationError::Config(
                    "\"microserviceToken\" is not a valid header value".to_string(),
                )
            })?;
        bearer.set_sensitive(true);

        Ok(Self {
            http,
            base_url: Arc::from(config.gateway_url.as_str()),
            bearer,
            require_api_key: config.require_api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve `uri` against the gateway URL; absolute URLs are used as-is.
    fn url(&self, uri: &str) -> String {
        if uri.starts_with("http://") || uri.starts_with("https://") {
            uri.to_string()
        } else if uri.starts_with('/') {
            format!("{}{}", self.base_url, uri)
        } else {
            format!("{}/{}", self.base_url, uri)
        }
    }

    /// Ask the gateway who is behind a user token and/or API key.
    ///
    /// With no credential at all, no call is made and the result is anonymous.
    ///
    /// # Errors
    ///
    /// - `Response` when the gateway rejects with a JSON body (passed through)
    /// - `UnexpectedStatus` when it rejects without one
    /// - `Transport` on network failure
    #[instrument(
        skip(self, request),
        fields(
            has_user_token = request.user_token.is_some(),
            has_api_key = request.api_key.is_some()
        )
    )]
    pub async fn validate_request(
        &self,
        request: &ValidationRequest,
    ) -> IntegrationResult<RequestValidation> {
        if request.is_empty() {
            debug!("No credentials to validate");
            return Ok(RequestValidation::anonymous());
        }

        let started = Instant::now();
        let response = self
            .http
            .post(self.url(VALIDATE_PATH))
            .header(AUTHORIZATION, self.bearer.clone())
            .json(request)
            .send()
            .await
            .inspect_err(|e| warn!(error = %e, "Gateway validation call failed"))?;
        metrics::record_validation_duration(started.elapsed().as_secs_f64());

        let status = response.status();
        debug!(status = status.as_u16(), "Gateway validation responded");

        if status.is_success() {
            return Ok(response.json::<RequestValidation>().await?);
        }

        match UpstreamBody::read(response).await? {
            UpstreamBody::Json(body) => Err(IntegrationError::Response {
                status_code: status.as_u16(),
                body,
            }),
            other => Err(IntegrationError::UnexpectedStatus {
                status_code: status.as_u16(),
                text: other.into_text(),
            }),
        }
    }

    /// Call another microservice with the service credential attached.
    ///
    /// # Errors
    ///
    /// - `CredentialRequired` if API keys are required and the request has
    ///   no `x-api-key` header (no network call is made)
    /// - `Response` for a non-success reply with a body, unless tolerated by
    ///   `simple = false` (4xx) or `resolve_with_full_response`
    /// - `UnexpectedStatus` for a non-success reply without a body
    /// - `Transport` on network failure
    #[instrument(skip(self, request), fields(method = %request.method, uri = %request.uri))]
    pub async fn request_to_microservice(
        &self,
        request: MicroserviceRequest,
    ) -> IntegrationResult<MicroserviceResponse> {
        let MicroserviceRequest {
            uri,
            method,
            body,
            params,
            mut headers,
            application,
            simple,
            resolve_with_full_response,
        } = request;

        headers.insert(AUTHORIZATION, self.bearer.clone());
        if self.require_api_key && !headers.contains_key(API_KEY_HEADER) {
            return Err(IntegrationError::CredentialRequired(
                "API key required when making requests to other microservices".to_string(),
            ));
        }

        if let Some(application) = application {
            let app_key = serde_json::to_string(&json!({ "application": &application }))?;
            let value = HeaderValue::from_str(&app_key).map_err(|_| {
                IntegrationError::BodyRead(format!("application {application} is not a valid header value"))
            })?;
            headers.insert(HeaderName::from_static(APP_KEY_HEADER), value);
        }

        let mut builder = self
            .http
            .request(method.clone(), self.url(&uri))
            .headers(headers);
        if !params.is_empty() {
            builder = builder.query(&params);
        }
        if let Some(body) = &body {
            builder = builder.json(body);
        }

        let response = builder.send().await.inspect_err(|e| {
            warn!(error = %e, "Microservice request failed");
            metrics::record_microservice_request(method.as_str(), "transport_error");
        })?;

        let status_code = response.status().as_u16();
        let body = UpstreamBody::read(response).await?;

        let tolerated = !simple && status_code < 500;
        if (200..300).contains(&status_code) || tolerated {
            metrics::record_microservice_request(method.as_str(), "success");
            return Ok(shape_response(status_code, body.into_value(), resolve_with_full_response));
        }

        info!(status_code, "Microservice responded with an error");
        metrics::record_microservice_request(method.as_str(), "error");

        match body {
            UpstreamBody::Empty => Err(IntegrationError::UnexpectedStatus {
                status_code,
                text: String::new(),
            }),
            body if resolve_with_full_response => Ok(MicroserviceResponse::Full {
                status_code,
                body: body.into_value(),
            }),
            body => Err(IntegrationError::Response {
                status_code,
                body: body.into_value(),
            }),
        }
    }

    /// Announce this microservice to the gateway.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`GatewayClient::request_to_microservice`].
    #[instrument(skip(self), fields(name = %registration.name))]
    pub async fn register_microservice(&self, registration: &Registration) -> IntegrationResult<Value> {
        let response = self
            .http
            .post(self.url(REGISTER_PATH))
            .header(AUTHORIZATION, self.bearer.clone())
            .json(registration)
            .send()
            .await?;

        let status_code = response.status().as_u16();
        let body = UpstreamBody::read(response).await?;

        if (200..300).contains(&status_code) {
            info!(url = %registration.url, "Microservice registered");
            return Ok(body.into_value());
        }

        warn!(status_code, "Microservice registration rejected");
        match body {
            UpstreamBody::Empty => Err(IntegrationError::UnexpectedStatus {
                status_code,
                text: String::new(),
            }),
            body => Err(IntegrationError::Response {
                status_code,
                body: body.into_value(),
            }),
        }
    }
}

fn shape_response(status_code: u16, body: Value, full: bool) -> MicroserviceResponse {
    if full {
        MicroserviceResponse::Full { status_code, body }
    } else {
        MicroserviceResponse::Body(body)
    }
}

/// Upstream response body, classified.
#[derive(Debug, PartialEq)]
enum UpstreamBody {
    Json(Value),
    Text(String),
    Empty,
}

impl UpstreamBody {
    async fn read(response: reqwest::Response) -> IntegrationResult<Self> {
        Ok(Self::parse(response.text().await?))
    }

    fn parse(text: String) -> Self {
        if text.trim().is_empty() {
            return UpstreamBody::Empty;
        }
        match serde_json::from_str(&text) {
            Ok(value) => UpstreamBody::Json(value),
            Err(_) => UpstreamBody::Text(text),
        }
    }

    fn into_value(self) -> Value {
        match self {
            UpstreamBody::Json(value) => value,
            UpstreamBody::Text(text) => Value::String(text),
            UpstreamBody::Empty => Value::Null,
        }
    }

    fn into_text(self) -> String {
        match self {
            UpstreamBody::Json(value) => value.to_string(),
            UpstreamBody::Text(text) => text,
            UpstreamBody::Empty => String::new(),
        }
    }
}
