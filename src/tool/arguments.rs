//! Typed access to tool call arguments.

use serde_json::Value;

use crate::error::{AgentScopeError, Result};

/// Wrapper around tool call arguments providing typed extraction.
#[derive(Debug, Clone)]
pub struct ToolArguments {
    value: Value,
}

impl ToolArguments {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    /// Normalize raw model input: JSON text is parsed, blank text and null
    /// become an empty object.
    pub fn parse(input: &Value) -> Result<Self> {
        let value = match input {
            Value::String(raw) if raw.trim().is_empty() => Value::Object(Default::default()),
            Value::String(raw) => serde_json::from_str(raw.trim()).map_err(|e| {
                AgentScopeError::InvalidArgument(format!("arguments are not valid JSON: {e}"))
            })?,
            Value::Null => Value::Object(Default::default()),
            other => other.clone(),
        };
        Ok(Self { value })
    }

    pub fn raw(&self) -> &Value {
        &self.value
    }

    pub fn get_str(&self, key: &str) -> Result<&str> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| missing("string", key))
    }

    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    pub fn get_i64(&self, key: &str) -> Result<i64> {
        self.value
            .get(key)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| missing("integer", key))
    }

    pub fn get_f64(&self, key: &str) -> Result<f64> {
        self.value
            .get(key)
            .and_then(|v| v.as_f64())
            .ok_or_else(|| missing("float", key))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.value
            .get(key)
            .and_then(|v| v.as_bool())
            .ok_or_else(|| missing("boolean", key))
    }

    pub fn get_array(&self, key: &str) -> Result<&Vec<Value>> {
        self.value
            .get(key)
            .and_then(|v| v.as_array())
            .ok_or_else(|| missing("array", key))
    }

    /// Deserialize all arguments into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.value.clone()).map_err(|e| {
            AgentScopeError::InvalidArgument(format!("failed to deserialize arguments: {e}"))
        })
    }
}

fn missing(kind: &str, key: &str) -> AgentScopeError {
    AgentScopeError::InvalidArgument(format!("missing {kind} argument: {key}"))
}
