use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Identifier the gateway uses for service-to-service principals.
pub const MICROSERVICE_ID: &str = "microservice";

/// Caller identity resolved by the gateway.
///
/// Anonymous callers are represented by the absence of a `LoggedUser`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LoggedUser {
    Microservice(MicroserviceIdentity),
    User(UserIdentity),
}

impl LoggedUser {
    pub fn id(&self) -> &str {
        match self {
            LoggedUser::Microservice(m) => &m.id,
            LoggedUser::User(u) => &u.id,
        }
    }
}

/// Discriminates on `id == "microservice"` rather than probing fields.
impl<'de> Deserialize<'de> for LoggedUser {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let is_microservice = value.get("id").and_then(Value::as_str) == Some(MICROSERVICE_ID);

        if is_microservice {
            serde_json::from_value(value)
                .map(LoggedUser::Microservice)
                .map_err(D::Error::custom)
        } else {
            serde_json::from_value(value)
                .map(LoggedUser::User)
                .map_err(D::Error::custom)
        }
    }
}

/// A human user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_user_data: Option<Value>,
    /// Fields the gateway sent that are not modelled above.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Another microservice calling with the shared service credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MicroserviceIdentity {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}
