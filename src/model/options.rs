//! Generation options shared by every vendor.

use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Settings controlling generation.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, Default, PartialEq)]
pub struct GenerateOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub top_k: Option<u32>,
    pub stop: Option<Vec<String>>,
    pub seed: Option<u64>,
    pub tool_choice: Option<ToolChoice>,
    pub thinking: Option<ThinkingConfig>,
}

/// How the model may use the provided tools.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    None,
    Required,
    /// Force a call to the named function.
    Function(String),
}

impl ToolChoice {
    /// The `tool_choice` value used by OpenAI-style APIs.
    pub fn to_function_choice(&self) -> Value {
        match self {
            Self::Auto => json!("auto"),
            Self::None => json!("none"),
            Self::Required => json!("required"),
            Self::Function(name) => json!({"type": "function", "function": {"name": name}}),
        }
    }
}

/// Reasoning ("thinking") control.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThinkingConfig {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_tokens: Option<u32>,
}

impl ThinkingConfig {
    pub fn enabled(budget_tokens: Option<u32>) -> Self {
        Self {
            enabled: true,
            budget_tokens,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            budget_tokens: None,
        }
    }
}
