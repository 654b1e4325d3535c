use axum::http::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::middleware::inject::{LOGGED_USER_KEY, REQUEST_APPLICATION_KEY};
use crate::models::{ApplicationDescriptor, LoggedUser, RequestValidation};

const ANONYMOUS: &str = "anonymous";

/// One usage record per validated request.
///
/// Identity and application are reduced to what usage reporting needs;
/// emails, extra user data and timestamps never reach the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub request: RequestSummary,
    pub logged_user: UserSummary,
    pub request_application: ApplicationSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSummary {
    pub method: String,
    pub path: String,
    pub query: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSummary {
    pub id: String,
    pub api_key_value: Option<String>,
    pub name: String,
    pub organization: Option<Value>,
    pub user: Option<Value>,
}

impl UserSummary {
    pub fn anonymous() -> Self {
        Self {
            id: ANONYMOUS.to_string(),
            name: Some(ANONYMOUS.to_string()),
            role: Some(ANONYMOUS.to_string()),
            provider: Some(ANONYMOUS.to_string()),
        }
    }

    fn from_user(user: Option<&LoggedUser>) -> Self {
        match user {
            Some(LoggedUser::Microservice(m)) => Self {
                id: m.id.clone(),
                name: None,
                role: None,
                provider: None,
            },
            Some(LoggedUser::User(u)) => Self {
                id: u.id.clone(),
                name: u.name.clone(),
                role: u.role.clone(),
                provider: u.provider.clone(),
            },
            None => Self::anonymous(),
        }
    }
}

impl ApplicationSummary {
    pub fn anonymous() -> Self {
        Self {
            id: ANONYMOUS.to_string(),
            api_key_value: None,
            name: ANONYMOUS.to_string(),
            organization: None,
            user: None,
        }
    }

    fn from_application(application: Option<&ApplicationDescriptor>) -> Self {
        match application {
            Some(app) => {
                let attributes = &app.data.attributes;
                Self {
                    id: app.data.id.clone(),
                    api_key_value: Some(attributes.api_key_value.clone()),
                    name: attributes.name.clone(),
                    organization: attributes.organization.clone(),
                    user: attributes.user.clone(),
                }
            }
            None => Self::anonymous(),
        }
    }
}

impl AuditRecord {
    /// Build the record for a request.
    ///
    /// `query` is the request's query string as decoded pairs; injected
    /// identity keys are dropped and repeated keys collapse into arrays.
    pub fn build(
        method: &Method,
        path: &str,
        query: &[(String, String)],
        validation: &RequestValidation,
    ) -> Self {
        Self {
            request: RequestSummary {
                method: method.as_str().to_string(),
                path: path.to_string(),
                query: query_object(query),
            },
            logged_user: UserSummary::from_user(validation.user.as_ref()),
            request_application: ApplicationSummary::from_application(
                validation.application.as_ref(),
            ),
        }
    }

    #[cfg(test)]
    pub(crate) fn sample() -> Self {
        Self::build(
            &Method::GET,
            "/v1/dataset",
            &[],
            &RequestValidation::anonymous(),
        )
    }
}

fn query_object(pairs: &[(String, String)]) -> Map<String, Value> {
    let mut query = Map::new();
    for (key, value) in pairs {
        if key == LOGGED_USER_KEY || key == REQUEST_APPLICATION_KEY {
            continue;
        }
        let value = Value::String(value.clone());
        match query.get_mut(key) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                query.insert(key.clone(), value);
            }
        }
    }
    query
}
