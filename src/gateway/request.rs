use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use serde_json::Value;

/// Outbound call to another microservice routed through the gateway.
///
/// `uri` is resolved against the gateway URL unless it is already absolute.
#[derive(Debug, Clone)]
pub struct MicroserviceRequest {
    pub uri: String,
    pub method: Method,
    pub body: Option<Value>,
    pub params: Vec<(String, String)>,
    pub headers: HeaderMap,
    /// Sent as `app_key: {"application": <value>}` when set.
    pub application: Option<String>,
    /// When false, 4xx responses resolve normally instead of failing.
    pub simple: bool,
    /// Resolve to `{statusCode, body}` instead of the bare body.
    pub resolve_with_full_response: bool,
}

impl MicroserviceRequest {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            method,
            body: None,
            params: Vec::new(),
            headers: HeaderMap::new(),
            application: None,
            simple: true,
            resolve_with_full_response: false,
        }
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn post(uri: impl Into<String>) -> Self {
        Self::new(Method::POST, uri)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_application(mut self, application: impl Into<String>) -> Self {
        self.application = Some(application.into());
        self
    }

    /// Treat 4xx responses as results (`simple = false`).
    pub fn tolerate_client_errors(mut self) -> Self {
        self.simple = false;
        self
    }

    pub fn full_response(mut self) -> Self {
        self.resolve_with_full_response = true;
        self
    }
}

/// Result of an outbound microservice call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MicroserviceResponse {
    Body(Value),
    #[serde(rename_all = "camelCase")]
    Full {
        status_code: u16,
        body: Value,
    },
}

impl MicroserviceResponse {
    pub fn body(&self) -> &Value {
        match self {
            MicroserviceResponse::Body(body) => body,
            MicroserviceResponse::Full { body, .. } => body,
        }
    }

    pub fn into_body(self) -> Value {
        match self {
            MicroserviceResponse::Body(body) => body,
            MicroserviceResponse::Full { body, .. } => body,
        }
    }

    /// Status code, when the full response was requested.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            MicroserviceResponse::Body(_) => None,
            MicroserviceResponse::Full { status_code, .. } => Some(*status_code),
        }
    }
}

/// Payload for registering a microservice with the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub name: String,
    pub url: String,
    pub active: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_defaults() {
        let request = MicroserviceRequest::get("/v1/dataset/1");
        assert_eq!(request.method, Method::GET);
        assert!(request.simple);
        assert!(!request.resolve_with_full_response);
        assert!(request.headers.is_empty());
    }

    #[test]
    fn test_full_response_serializes_camel_case() {
        let response = MicroserviceResponse::Full {
            status_code: 404,
            body: json!({"errors": []}),
        };
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"statusCode": 404, "body": {"errors": []}})
        );
        assert_eq!(response.status_code(), Some(404));
    }
}
