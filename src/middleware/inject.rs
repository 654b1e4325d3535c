//! Placing the resolved identity into the downstream request.
//!
//! - `GET`/`DELETE`: query string, each value JSON-encoded
//! - `POST`/`PATCH`/`PUT`: top-level keys of the body, chosen by
//!   `Content-Type`:
//!   - JSON (or no body at all): objects in the JSON object
//!   - `application/x-www-form-urlencoded`: JSON-encoded form fields
//!   - anything else (multipart, text, binary): body untouched
//! - anything else: untouched
//!
//! The identity is always available to handlers through the request
//! extensions, whatever the body format.

use axum::body::{Body, Bytes, to_bytes};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::uri::PathAndQuery;
use axum::http::{HeaderMap, HeaderValue, Method, Request, Uri};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{IntegrationError, IntegrationResult};
use crate::models::RequestValidation;

/// Key carrying the resolved identity.
pub const LOGGED_USER_KEY: &str = "loggedUser";

/// Key carrying the resolved application.
pub const REQUEST_APPLICATION_KEY: &str = "requestApplication";

/// How a write body receives injected identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFormat {
    Json,
    Form,
    /// Not rewritten.
    Opaque,
}

impl BodyFormat {
    /// Classify by `Content-Type`. A missing header is treated as JSON.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let Some(content_type) = headers.get(CONTENT_TYPE) else {
            return BodyFormat::Json;
        };
        let essence = content_type
            .to_str()
            .unwrap_or_default()
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if essence == "application/json" || essence.ends_with("+json") {
            BodyFormat::Json
        } else if essence == "application/x-www-form-urlencoded" {
            BodyFormat::Form
        } else {
            BodyFormat::Opaque
        }
    }
}

/// Where a method receives injected identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Query,
    Body,
    None,
}

impl Placement {
    pub fn for_method(method: &Method) -> Self {
        match *method {
            Method::GET | Method::DELETE => Placement::Query,
            Method::POST | Method::PATCH | Method::PUT => Placement::Body,
            _ => Placement::None,
        }
    }
}

/// Inject `validation` into `request`.
///
/// Anonymous results leave the request byte-for-byte unchanged. For body
/// placement a JSON or form body is buffered up to `body_limit` bytes; an
/// empty JSON body is treated as `{}`.
///
/// # Errors
///
/// `BodyRead` if the body exceeds the limit, or a JSON body is malformed or
/// not an object.
pub async fn inject(
    request: Request<Body>,
    validation: &RequestValidation,
    body_limit: usize,
) -> IntegrationResult<Request<Body>> {
    if validation.is_anonymous() {
        return Ok(request);
    }

    match Placement::for_method(request.method()) {
        Placement::Query => {
            let (mut parts, body) = request.into_parts();
            parts.uri = inject_query(&parts.uri, validation)?;
            debug!(uri = %parts.uri, "Injected identity into query");
            Ok(Request::from_parts(parts, body))
        }
        Placement::Body => {
            let format = BodyFormat::from_headers(request.headers());
            if format == BodyFormat::Opaque {
                debug!("Body format not rewritable, identity left in extensions only");
                return Ok(request);
            }

            let (mut parts, body) = request.into_parts();
            let bytes = to_bytes(body, body_limit)
                .await
                .map_err(|e| IntegrationError::BodyRead(e.to_string()))?;
            let bytes = match format {
                BodyFormat::Form => inject_form(&bytes, validation)?,
                _ => {
                    parts
                        .headers
                        .entry(CONTENT_TYPE)
                        .or_insert(HeaderValue::from_static("application/json"));
                    inject_body(&bytes, validation)?
                }
            };

            parts
                .headers
                .insert(CONTENT_LENGTH, HeaderValue::from(bytes.len()));
            debug!(length = bytes.len(), ?format, "Injected identity into body");
            Ok(Request::from_parts(parts, Body::from(bytes)))
        }
        Placement::None => Ok(request),
    }
}

/// Add the identity keys to the query string, replacing earlier values.
pub fn inject_query(uri: &Uri, validation: &RequestValidation) -> IntegrationResult<Uri> {
    let injected = encoded_identity(validation)?;
    if injected.is_empty() {
        return Ok(uri.clone());
    }
    let query = merge_form(uri.query().unwrap_or_default().as_bytes(), &injected);

    let path_and_query = PathAndQuery::try_from(format!("{}?{query}", uri.path()))
        .map_err(|e| IntegrationError::BodyRead(format!("rewriting query string: {e}")))?;
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(path_and_query);
    Uri::from_parts(parts)
        .map_err(|e| IntegrationError::BodyRead(format!("rewriting query string: {e}")))
}

/// Identity keys with JSON-encoded values, for form-style encodings.
fn encoded_identity(
    validation: &RequestValidation,
) -> IntegrationResult<Vec<(&'static str, String)>> {
    let mut injected = Vec::new();
    if let Some(user) = &validation.user {
        injected.push((LOGGED_USER_KEY, serde_json::to_string(user)?));
    }
    if let Some(application) = &validation.application {
        injected.push((REQUEST_APPLICATION_KEY, serde_json::to_string(application)?));
    }
    Ok(injected)
}

/// Re-serialize urlencoded `input` with `injected` replacing any earlier values.
fn merge_form(input: &[u8], injected: &[(&'static str, String)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in url::form_urlencoded::parse(input) {
        if injected.iter().any(|(k, _)| *k == key) {
            continue;
        }
        serializer.append_pair(&key, &value);
    }
    for (key, value) in injected {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

/// Add the identity keys to an urlencoded form body.
pub fn inject_form(bytes: &[u8], validation: &RequestValidation) -> IntegrationResult<Bytes> {
    let injected = encoded_identity(validation)?;
    Ok(Bytes::from(merge_form(bytes, &injected)))
}

/// Merge the identity keys into a JSON object body.
pub fn inject_body(bytes: &[u8], validation: &RequestValidation) -> IntegrationResult<Bytes> {
    let mut object = if bytes.iter().all(u8::is_ascii_whitespace) {
        Map::new()
    } else {
        match serde_json::from_slice::<Value>(bytes)
            .map_err(|e| IntegrationError::BodyRead(format!("body is not valid JSON: {e}")))?
        {
            Value::Object(object) => object,
            _ => {
                return Err(IntegrationError::BodyRead(
                    "body is not a JSON object".to_string(),
                ));
            }
        }
    };

    if let Some(user) = &validation.user {
        object.insert(LOGGED_USER_KEY.to_string(), serde_json::to_value(user)?);
    }
    if let Some(application) = &validation.application {
        object.insert(
            REQUEST_APPLICATION_KEY.to_string(),
            serde_json::to_value(application)?,
        );
    }

    Ok(Bytes::from(serde_json::to_vec(&Value::Object(object))?))
}
