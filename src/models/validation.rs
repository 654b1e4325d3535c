use serde::{Deserialize, Serialize};

use super::{ApplicationDescriptor, LoggedUser};

/// Gateway answer to `POST /v1/request/validate`.
///
/// Both halves are optional: a user token alone, an API key alone, both, or
/// neither (anonymous) are all valid outcomes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestValidation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<LoggedUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<ApplicationDescriptor>,
}

impl RequestValidation {
    /// No identity and no application.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_anonymous(&self) -> bool {
        self.user.is_none() && self.application.is_none()
    }
}

/// Body sent to the gateway validation endpoint. Absent credentials are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl ValidationRequest {
    pub fn is_empty(&self) -> bool {
        self.user_token.is_none() && self.api_key.is_none()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_members_are_anonymous() {
        let validation: RequestValidation =
            serde_json::from_value(json!({"user": null, "application": null})).unwrap();
        assert!(validation.is_anonymous());

        let validation: RequestValidation = serde_json::from_value(json!({})).unwrap();
        assert_eq!(validation, RequestValidation::anonymous());
    }

    #[test]
    fn test_validation_request_omits_missing_credentials() {
        let body = ValidationRequest {
            user_token: Some("Bearer abc".to_string()),
            api_key: None,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"userToken": "Bearer abc"})
        );
        assert!(ValidationRequest::default().is_empty());
    }
}
