use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub type Variables = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    #[serde(default)]
    pub variables: Variables,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphQlResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub errors: Vec<GraphQlError>,
}

impl GraphQlResponse {
    pub fn from_data(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
        }
    }

    pub fn from_errors(errors: Vec<GraphQlError>) -> Self {
        Self { data: None, errors }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQlError {
    pub message: String,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub path: Vec<Value>,
}

impl GraphQlError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: Vec::new(),
        }
    }
}

/// Servers may send `null` where a list is absent.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn null_errors_read_as_none() {
        let response: GraphQlResponse =
            serde_json::from_str(r#"{"data":{"a":1},"errors":null}"#).expect("response");
        assert_eq!(response, GraphQlResponse::from_data(json!({ "a": 1 })));
        assert!(!response.has_errors());

        let response: GraphQlResponse =
            serde_json::from_str(r#"{"errors":[{"message":"boom","path":null}]}"#)
                .expect("response");
        assert_eq!(response.errors, vec![GraphQlError::new("boom")]);
    }

    #[test]
    fn request_uses_camel_case_operation_name() {
        let request = GraphQlRequest {
            query: "query Companies { companies { id } }".into(),
            operation_name: Some("Companies".into()),
            variables: Variables::new(),
        };
        assert_eq!(
            serde_json::to_value(&request).expect("json"),
            json!({
                "query": "query Companies { companies { id } }",
                "operationName": "Companies",
                "variables": {}
            })
        );
    }
}
