use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Error types produced by the integration layer.
///
/// # Inbound vs outbound
///
/// The same enum serves both directions:
///
/// - Inbound, the orchestrator converts it into an HTTP response through
///   [`IntoResponse`] and never lets it escape the request.
/// - Outbound (`request_to_microservice`, registration), it is returned to
///   the calling application unchanged.
#[derive(Error, Debug)]
pub enum IntegrationError {
    /// Invalid or incomplete configuration. Raised at setup only.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A credential header required by configuration was not supplied.
    #[error("{0}")]
    CredentialRequired(String),

    /// Upstream service answered with a non-success status and a structured body.
    #[error("{status_code} - {body}")]
    Response { status_code: u16, body: Value },

    /// Network-level failure talking to an upstream service.
    #[error("Upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Upstream answered with a non-success status and no usable body.
    #[error("Request failed with status code {status_code}")]
    UnexpectedStatus { status_code: u16, text: String },

    /// Creating the log group/stream or appending a record failed.
    #[error("Log sink error: {0}")]
    LogSink(String),

    /// CDN provider call failed.
    #[error("CDN error: {0}")]
    Cdn(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The inbound request body could not be buffered or is not a JSON object.
    #[error("Invalid request body: {0}")]
    BodyRead(String),
}

/// Error envelope used for the missing-credential response.
#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    errors: [ErrorEntry<'a>; 1],
}

#[derive(Serialize)]
struct ErrorEntry<'a> {
    status: u16,
    detail: &'a str,
}

/// Status code carried inside the missing-credential envelope.
///
/// Consumers rely on this value even though the HTTP status is 403.
const CREDENTIAL_ENVELOPE_STATUS: u16 = 401;

impl IntoResponse for IntegrationError {
    fn into_response(self) -> Response {
        match self {
            IntegrationError::CredentialRequired(detail) => {
                tracing::warn!(detail = %detail, "Rejecting request without required credential");
                let body = ErrorEnvelope {
                    errors: [ErrorEntry {
                        status: CREDENTIAL_ENVELOPE_STATUS,
                        detail: &detail,
                    }],
                };
                (StatusCode::FORBIDDEN, axum::Json(body)).into_response()
            }
            IntegrationError::Response { status_code, body } => {
                tracing::debug!(status_code, "Passing gateway error through");
                let status =
                    StatusCode::from_u16(status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, axum::Json(body)).into_response()
            }
            other => {
                tracing::error!(error = %other, "Request validation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Error loading user info from token - {other}"),
                )
                    .into_response()
            }
        }
    }
}

/// Convenience type alias for Results with IntegrationError.
pub type IntegrationResult<T> = Result<T, IntegrationError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::json;

    async fn body_of(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_credential_required_maps_to_403_with_401_envelope() {
        let response =
            IntegrationError::CredentialRequired("Required API key not found".to_string())
                .into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body: Value = serde_json::from_slice(&body_of(response).await).unwrap();
        assert_eq!(
            body,
            json!({"errors": [{"status": 401, "detail": "Required API key not found"}]})
        );
    }

    #[tokio::test]
    async fn test_response_error_passes_status_and_body_through() {
        let upstream = json!({"errors": [{"status": 401, "detail": "Your token is outdated"}]});
        let response = IntegrationError::Response {
            status_code: 401,
            body: upstream.clone(),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: Value = serde_json::from_slice(&body_of(response).await).unwrap();
        assert_eq!(body, upstream);
    }

    #[tokio::test]
    async fn test_other_errors_map_to_500_with_wrapper_text() {
        let response = IntegrationError::LogSink("boom".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let text = String::from_utf8(body_of(response).await).unwrap();
        assert_eq!(
            text,
            "Error loading user info from token - Log sink error: boom"
        );
    }

    #[test]
    fn test_response_error_display() {
        let err = IntegrationError::Response {
            status_code: 404,
            body: json!({"errors": []}),
        };
        assert_eq!(err.to_string(), r#"404 - {"errors":[]}"#);
    }
}
