//! Echo endpoint for exercising the middleware end to end.
//!
//! Returns the request as the handler received it, after injection. The
//! `cache` and `uncache` query parameters are copied to response headers of
//! the same name, to drive CDN signalling.

use axum::Json;
use axum::body::to_bytes;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::cdn::{CACHE_HEADER, UNCACHE_HEADER};
use crate::middleware::{LOGGED_USER_KEY, REQUEST_APPLICATION_KEY};
use crate::models::{EchoResponse, RequestValidation};

/// Body limit applied when buffering the echoed body.
#[derive(Debug, Clone, Copy)]
pub struct EchoLimit(pub usize);

#[instrument(skip_all, fields(method = %request.method(), path = %request.uri().path()))]
pub async fn echo(State(limit): State<EchoLimit>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let bytes = match to_bytes(body, limit.0).await {
        Ok(bytes) => bytes,
        Err(e) => return (StatusCode::PAYLOAD_TOO_LARGE, e.to_string()).into_response(),
    };
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };

    let mut query = Map::new();
    if let Some(raw) = parts.uri.query() {
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            query.insert(key.into_owned(), Value::String(value.into_owned()));
        }
    }

    let mut headers = HeaderMap::new();
    for name in [CACHE_HEADER, UNCACHE_HEADER] {
        if let Some(Value::String(tags)) = query.get(name)
            && let Ok(value) = HeaderValue::from_str(tags)
        {
            headers.insert(HeaderName::from_static(name), value);
        }
    }

    let validation = parts
        .extensions
        .get::<RequestValidation>()
        .cloned()
        .unwrap_or_default();
    debug!(
        anonymous = validation.is_anonymous(),
        injected_query =
            query.contains_key(LOGGED_USER_KEY) || query.contains_key(REQUEST_APPLICATION_KEY),
        "Echoing request"
    );

    let response = EchoResponse {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query,
        body,
        logged_user: validation.user,
        request_application: validation.application,
    };

    (headers, Json(response)).into_response()
}
