use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// API-key-bound application resolved by the gateway.
///
/// Kept in the gateway's JSON:API shape (`{data: {type, id, attributes}}`)
/// so it can be injected into downstream requests verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDescriptor {
    pub data: ApplicationData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationData {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub id: String,
    pub attributes: ApplicationAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationAttributes {
    pub name: String,
    #[serde(default)]
    pub organization: Option<Value>,
    #[serde(default)]
    pub user: Option<Value>,
    pub api_key_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl ApplicationDescriptor {
    pub fn id(&self) -> &str {
        &self.data.id
    }

    pub fn api_key_value(&self) -> &str {
        &self.data.attributes.api_key_value
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_application_roundtrips_gateway_shape() {
        let raw = json!({
            "data": {
                "type": "applications",
                "id": "649c4b204967792f3a4e52c9",
                "attributes": {
                    "name": "grouchy-armpit",
                    "organization": null,
                    "user": null,
                    "apiKeyValue": "a1a9e4c3-bdff-4b6b-b5ff-7a60a0454e13",
                    "createdAt": "2023-06-28T15:00:48.149Z",
                    "updatedAt": "2023-06-28T15:00:48.149Z"
                }
            }
        });

        let app: ApplicationDescriptor = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(app.id(), "649c4b204967792f3a4e52c9");
        assert_eq!(app.api_key_value(), "a1a9e4c3-bdff-4b6b-b5ff-7a60a0454e13");
        assert!(app.data.attributes.organization.is_none());
        assert_eq!(serde_json::to_value(&app).unwrap(), raw);
    }
}
