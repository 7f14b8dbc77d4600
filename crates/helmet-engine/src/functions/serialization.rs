//! YAML, JSON and TOML conversions
//!
//! The `to*` helpers swallow encoder failures (empty output, or the error
//! text for TOML) while the `mustTo*` variants surface them. The `from*`
//! helpers never fail a render: malformed input yields a map with an `Error`
//! key, or a one-element list holding the message for the array variants.

use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;

use super::{Arity, FunctionTable, str_arg};
use crate::template::{FuncError, Map, Value};

pub(super) fn register(table: &mut FunctionTable) {
    use Arity::*;

    table.plain("toYaml", Exact(1), |a| Ok(to_yaml(&a[0]).unwrap_or_default().into()));
    table.plain("mustToYaml", Exact(1), |a| to_yaml(&a[0]).map(Value::from));
    table.plain("fromYaml", Exact(1), |a| Ok(from_yaml(str_arg(&a[0])?)));
    table.plain("fromYamlArray", Exact(1), |a| Ok(from_yaml_array(str_arg(&a[0])?)));

    table.plain("toJson", Exact(1), |a| Ok(to_json(&a[0], false).unwrap_or_default().into()));
    table.plain("mustToJson", Exact(1), |a| to_json(&a[0], false).map(Value::from));
    table.plain("toPrettyJson", Exact(1), |a| Ok(to_json(&a[0], true).unwrap_or_default().into()));
    table.plain("mustToPrettyJson", Exact(1), |a| to_json(&a[0], true).map(Value::from));
    table.plain("toRawJson", Exact(1), |a| {
        Ok(serde_json::to_string(&a[0]).unwrap_or_default().into())
    });
    table.plain("fromJson", Exact(1), |a| Ok(from_json(str_arg(&a[0])?)));
    table.plain("fromJsonArray", Exact(1), |a| Ok(from_json_array(str_arg(&a[0])?)));

    table.plain("toToml", Exact(1), |a| Ok(to_toml(&a[0]).unwrap_or_else(|e| e.to_string()).into()));
    table.plain("fromToml", Exact(1), |a| Ok(from_toml(str_arg(&a[0])?)));
}

fn error_map(message: impl Into<String>) -> Value {
    let mut map = Map::new();
    map.insert("Error".to_string(), Value::from(message.into()));
    Value::from_map(map)
}

/// Usage: {{ .Values.resources | toYaml | nindent 12 }}
///
/// The trailing newline of the document is removed.
fn to_yaml(value: &Value) -> Result<String, FuncError> {
    let text = serde_yaml::to_string(value).map_err(|e| FuncError::msg(e.to_string()))?;
    Ok(text.trim_end_matches('\n').to_string())
}

/// Usage: {{ (.Files.Get "config.yaml" | fromYaml).port }}
fn from_yaml(text: &str) -> Value {
    match serde_yaml::from_str::<YamlValue>(text) {
        Ok(YamlValue::Null) => Value::empty_map(),
        Ok(doc @ YamlValue::Mapping(_)) => from_yaml_value(&doc),
        Ok(other) => error_map(format!(
            "error unmarshaling JSON: json: cannot unmarshal {} into Go value of type map[string]interface {{}}",
            yaml_kind(&other)
        )),
        Err(e) => error_map(format!("error converting YAML to JSON: {}", e)),
    }
}

fn from_yaml_array(text: &str) -> Value {
    match serde_yaml::from_str::<YamlValue>(text) {
        Ok(YamlValue::Null) => Value::from_list(Vec::new()),
        Ok(doc @ YamlValue::Sequence(_)) => from_yaml_value(&doc),
        Ok(other) => Value::from_list(vec![Value::from(format!(
            "error unmarshaling JSON: json: cannot unmarshal {} into Go value of type []interface {{}}",
            yaml_kind(&other)
        ))]),
        Err(e) => Value::from_list(vec![Value::from(format!(
            "error converting YAML to JSON: {}",
            e
        ))]),
    }
}

fn yaml_kind(value: &YamlValue) -> &'static str {
    match value {
        YamlValue::Null => "null",
        YamlValue::Bool(_) => "bool",
        YamlValue::Number(_) => "number",
        YamlValue::String(_) => "string",
        YamlValue::Sequence(_) => "array",
        YamlValue::Mapping(_) => "object",
        YamlValue::Tagged(tagged) => yaml_kind(&tagged.value),
    }
}

/// Convert a YAML document, turning every mapping key into a string
fn from_yaml_value(value: &YamlValue) -> Value {
    match value {
        YamlValue::Null => Value::Null,
        YamlValue::Bool(b) => Value::Bool(*b),
        YamlValue::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or_default()),
        },
        YamlValue::String(s) => Value::from(s.as_str()),
        YamlValue::Sequence(items) => Value::from_list(items.iter().map(from_yaml_value).collect()),
        YamlValue::Mapping(mapping) => Value::from_map(
            mapping
                .iter()
                .map(|(k, v)| (yaml_key(k), from_yaml_value(v)))
                .collect(),
        ),
        YamlValue::Tagged(tagged) => from_yaml_value(&tagged.value),
    }
}

fn yaml_key(key: &YamlValue) -> String {
    match key {
        YamlValue::String(s) => s.clone(),
        YamlValue::Number(n) => n.to_string(),
        YamlValue::Bool(b) => b.to_string(),
        YamlValue::Null => "null".to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Encode as JSON with `<`, `>`, `&` and line separators escaped
///
/// Usage: {{ .Values.annotations | toJson | quote }}
fn to_json(value: &Value, pretty: bool) -> Result<String, FuncError> {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| FuncError::msg(e.to_string()))?;
    Ok(escape_html(&text))
}

fn escape_html(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    out
}

fn from_json(text: &str) -> Value {
    match serde_json::from_str::<JsonValue>(text) {
        Ok(json @ JsonValue::Object(_)) => Value::from_json(&json),
        Ok(other) => error_map(format!(
            "json: cannot unmarshal {} into Go value of type map[string]interface {{}}",
            json_kind(&other)
        )),
        Err(e) => error_map(e.to_string()),
    }
}

fn from_json_array(text: &str) -> Value {
    match serde_json::from_str::<JsonValue>(text) {
        Ok(json @ JsonValue::Array(_)) => Value::from_json(&json),
        Ok(other) => Value::from_list(vec![Value::from(format!(
            "json: cannot unmarshal {} into Go value of type []interface {{}}",
            json_kind(&other)
        ))]),
        Err(e) => Value::from_list(vec![Value::from(e.to_string())]),
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Usage: {{ .Values.config | toToml }}
fn to_toml(value: &Value) -> Result<String, FuncError> {
    match to_toml_value(value) {
        Some(toml::Value::Table(table)) => {
            toml::to_string(&table).map_err(|e| FuncError::msg(e.to_string()))
        }
        _ => Err(FuncError::msg(
            "toml: top-level values must be Go maps or structs",
        )),
    }
}

/// TOML has no null, so nil entries are dropped
fn to_toml_value(value: &Value) -> Option<toml::Value> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(toml::Value::Boolean(*b)),
        Value::Int(i) => Some(toml::Value::Integer(*i)),
        Value::Float(f) => Some(toml::Value::Float(*f)),
        Value::String(s) => Some(toml::Value::String(s.clone())),
        Value::List(items) => Some(toml::Value::Array(
            items.iter().filter_map(to_toml_value).collect(),
        )),
        Value::Map(map) => Some(toml::Value::Table(
            map.borrow()
                .iter()
                .filter_map(|(k, v)| to_toml_value(v).map(|v| (k.clone(), v)))
                .collect(),
        )),
        Value::Object(object) => to_toml_value(&object.to_value()),
    }
}

fn from_toml(text: &str) -> Value {
    match text.parse::<toml::Table>() {
        Ok(table) => from_toml_value(&toml::Value::Table(table)),
        Err(e) => error_map(e.to_string()),
    }
}

fn from_toml_value(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::from(s.as_str()),
        toml::Value::Integer(i) => Value::Int(*i),
        toml::Value::Float(f) => Value::Float(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(dt) => Value::from(dt.to_string()),
        toml::Value::Array(items) => Value::from_list(items.iter().map(from_toml_value).collect()),
        toml::Value::Table(table) => Value::from_map(
            table
                .iter()
                .map(|(k, v)| (k.clone(), from_toml_value(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v(json: serde_json::Value) -> Value {
        Value::from_json(&json)
    }

    #[test]
    fn test_to_yaml_trims_newline() {
        let out = to_yaml(&v(json!({"b": [1, 2], "a": "x"}))).unwrap();
        assert_eq!(out, "a: x\nb:\n- 1\n- 2");
    }

    #[test]
    fn test_from_yaml_shapes() {
        assert_eq!(
            from_yaml("name: web\nports:\n  - 80\n1: one").to_json(),
            json!({"name": "web", "ports": [80], "1": "one"})
        );
        assert_eq!(from_yaml("").to_json(), json!({}));

        let scalar = from_yaml("just a string");
        assert!(scalar.get_key("Error").is_some());
        let broken = from_yaml("a: [unclosed");
        assert!(broken.get_key("Error").is_some());
    }

    #[test]
    fn test_from_yaml_array() {
        assert_eq!(from_yaml_array("- a\n- b").to_json(), json!(["a", "b"]));
        let err = from_yaml_array("a: b");
        assert_eq!(err.as_list().map(<[Value]>::len), Some(1));
    }

    #[test]
    fn test_to_json_escapes_html() {
        let out = to_json(&v(json!({"html": "<a href='x'>&</a>"})), false).unwrap();
        assert_eq!(out, r#"{"html":"\u003ca href='x'\u003e\u0026\u003c/a\u003e"}"#);
        let pretty = to_json(&v(json!({"a": 1})), true).unwrap();
        assert_eq!(pretty, "{\n  \"a\": 1\n}");
    }

    #[test]
    fn test_from_json_errors() {
        assert_eq!(from_json(r#"{"a": [1, true]}"#).to_json(), json!({"a": [1, true]}));
        assert_eq!(
            from_json("[1]").get_key("Error"),
            Some(Value::from(
                "json: cannot unmarshal array into Go value of type map[string]interface {}"
            ))
        );
        assert_eq!(from_json_array("[1, 2]").to_json(), json!([1, 2]));
        assert_eq!(from_json_array("{").as_list().map(<[Value]>::len), Some(1));
    }

    #[test]
    fn test_toml_conversions() {
        let out = to_toml(&v(json!({"name": "web", "skip": null, "port": 80}))).unwrap();
        assert_eq!(out, "name = \"web\"\nport = 80\n");
        assert!(to_toml(&Value::from("scalar")).is_err());

        let parsed = from_toml("[server]\nport = 8080\nwhen = 1979-05-27T07:32:00Z\n");
        assert_eq!(
            parsed.to_json(),
            json!({"server": {"port": 8080, "when": "1979-05-27T07:32:00Z"}})
        );
        assert!(from_toml("= broken").get_key("Error").is_some());
    }
}
