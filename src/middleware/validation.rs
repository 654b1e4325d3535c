use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use tracing::{debug, warn};

use crate::error::{IntegrationError, IntegrationResult};
use crate::gateway::{API_KEY_HEADER, GatewayClient};
use crate::metrics;
use crate::models::{RequestValidation, ValidationRequest};

/// Detail returned when a request carries no credential at all.
pub const API_KEY_REQUIRED: &str = "Required API key not found";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
}

/// Whether the request carries a non-empty `Authorization` header.
pub fn has_user_token(headers: &HeaderMap) -> bool {
    header_str(headers, AUTHORIZATION.as_str()).is_some()
}

/// Collect the credentials an inbound request presents to the gateway.
pub fn credentials(headers: &HeaderMap) -> ValidationRequest {
    ValidationRequest {
        user_token: header_str(headers, AUTHORIZATION.as_str()).map(str::to_string),
        api_key: header_str(headers, API_KEY_HEADER).map(str::to_string),
    }
}

/// Resolve who is behind an inbound request from its [`credentials`].
///
/// # Errors
///
/// `CredentialRequired` when neither `Authorization` nor `x-api-key` is
/// present and API keys are required; otherwise whatever the gateway call
/// returns.
pub async fn resolve(
    client: &GatewayClient,
    request: ValidationRequest,
    require_api_key: bool,
) -> IntegrationResult<RequestValidation> {
    if request.is_empty() {
        if require_api_key {
            metrics::record_validation("credential_required");
            return Err(IntegrationError::CredentialRequired(
                API_KEY_REQUIRED.to_string(),
            ));
        }
        debug!("No credentials presented, continuing anonymously");
        metrics::record_validation("anonymous");
        return Ok(RequestValidation::anonymous());
    }

    match client.validate_request(&request).await {
        Ok(validation) => {
            debug!(
                user = validation.user.as_ref().map(|u| u.id()),
                application = validation.application.as_ref().map(|a| a.id()),
                "Request validated"
            );
            metrics::record_validation("success");
            Ok(validation)
        }
        Err(e) => {
            warn!(error = %e, "Request validation failed");
            let outcome = match &e {
                IntegrationError::Response { .. } => "rejected",
                _ => "error",
            };
            metrics::record_validation(outcome);
            Err(e)
        }
    }
}
