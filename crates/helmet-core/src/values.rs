//! Value trees

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::Result;

/// Reserved top-level key whose table is propagated to every chart in a tree
pub const GLOBAL_KEY: &str = "global";

/// A nested value tree (scalars, lists and string-keyed tables)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(pub JsonValue);

impl Values {
    /// Create an empty table
    pub fn new() -> Self {
        Self(JsonValue::Object(Map::new()))
    }

    /// Parse values from a YAML document. An empty document is an empty table.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: JsonValue = serde_yaml::from_str(yaml)?;
        Ok(Self::from_json_value(value))
    }

    fn from_json_value(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::new(),
            other => Self(other),
        }
    }

    /// Get a value by dotted path
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        let parts: Vec<&str> = path.split('.').filter(|p| !p.is_empty()).collect();
        get_nested(&self.0, &parts)
    }

    /// Borrow the top-level table, if this tree is one
    pub fn as_table(&self) -> Option<&Map<String, JsonValue>> {
        self.0.as_object()
    }

    /// Get the inner JSON value
    pub fn inner(&self) -> &JsonValue {
        &self.0
    }

    /// Check if values are empty
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            JsonValue::Object(map) => map.is_empty(),
            JsonValue::Null => true,
            _ => false,
        }
    }

    /// Render as a YAML document
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.0)?)
    }
}

impl From<Map<String, JsonValue>> for Values {
    fn from(map: Map<String, JsonValue>) -> Self {
        Self(JsonValue::Object(map))
    }
}

impl From<JsonValue> for Values {
    fn from(value: JsonValue) -> Self {
        Self::from_json_value(value)
    }
}

/// Human-readable name of a value's shape, used in error messages
pub fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(n) if n.is_f64() => "float64",
        JsonValue::Number(_) => "int64",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "list",
        JsonValue::Object(_) => "table",
    }
}

/// Get a nested value by path
fn get_nested<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    let Some((key, remaining)) = path.split_first() else {
        return Some(value);
    };

    match value {
        JsonValue::Object(map) => map.get(*key).and_then(|v| get_nested(v, remaining)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_empty_table() {
        let values = Values::from_yaml("").unwrap();
        assert!(values.is_empty());
        assert!(values.as_table().is_some());
    }

    #[test]
    fn test_dotted_get() {
        let values = Values::from_yaml("image:\n  tag: v1\nreplicas: 3").unwrap();

        assert_eq!(values.get("image.tag").unwrap(), "v1");
        assert_eq!(values.get("replicas").unwrap(), 3);
        assert!(values.get("image.tag.deeper").is_none());
        assert!(values.get("missing").is_none());
    }

    #[test]
    fn test_type_name() {
        assert_eq!(type_name(&serde_json::json!("x")), "string");
        assert_eq!(type_name(&serde_json::json!(1)), "int64");
        assert_eq!(type_name(&serde_json::json!(1.5)), "float64");
        assert_eq!(type_name(&serde_json::json!({})), "table");
    }
}
