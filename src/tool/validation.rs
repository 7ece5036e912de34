//! Check tool call arguments against a tool's JSON Schema.

use serde_json::{Map, Value};

/// Top-level schema check: object type, required fields, property types
/// (a property may list several types) and enums.
///
/// Returns the first violation found.
pub fn validate_arguments(args: &Value, schema: &Value) -> Result<(), String> {
    let wants_object = schema.get("type").and_then(Value::as_str) == Some("object");
    let Some(fields) = args.as_object() else {
        if wants_object {
            return Err(format!(
                "expected object arguments, got {}",
                json_type_name(args)
            ));
        }
        return Ok(());
    };

    let required = schema.get("required").and_then(Value::as_array);
    if let Some(missing) = required
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .find(|name| !fields.contains_key(*name))
    {
        return Err(format!("missing required field '{missing}'"));
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        check_properties(fields, properties)?;
    }
    Ok(())
}

fn check_properties(fields: &Map<String, Value>, properties: &Map<String, Value>) -> Result<(), String> {
    for (key, value) in fields {
        let Some(prop) = properties.get(key) else {
            continue;
        };
        let accepted: Vec<&str> = match prop.get("type") {
            Some(Value::String(t)) => vec![t.as_str()],
            Some(Value::Array(ts)) => ts.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        if !accepted.is_empty() && !accepted.iter().any(|t| value_matches_type(value, t)) {
            let expected = match accepted.as_slice() {
                [single] => format!("type '{single}'"),
                many => format!("one of types [{}]", many.join(", ")),
            };
            return Err(format!(
                "field '{key}' expected {expected}, got {}",
                json_type_name(value)
            ));
        }
        if let Some(allowed) = prop.get("enum").and_then(Value::as_array) {
            if !allowed.contains(value) {
                return Err(format!(
                    "field '{key}' must be one of {}",
                    Value::Array(allowed.clone())
                ));
            }
        }
    }
    Ok(())
}

fn value_matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
