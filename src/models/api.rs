use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{ApplicationDescriptor, LoggedUser};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the process serves requests
    pub status: String,
    /// Service version
    pub version: String,
    /// Current timestamp
    pub timestamp: DateTime<Utc>,
}

/// What the echo endpoint saw after the middleware ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EchoResponse {
    pub method: String,
    pub path: String,
    /// Decoded query string; repeated keys keep the last value.
    pub query: Map<String, Value>,
    /// JSON body, a string for non-JSON bodies, `null` when empty.
    pub body: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logged_user: Option<LoggedUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_application: Option<ApplicationDescriptor>,
}
