//! Chat models: send a formatted prompt to a vendor and parse the reply.

pub mod http;
pub mod options;
pub mod stream;
pub mod vendor;

#[cfg(feature = "dashscope")]
pub mod dashscope;
#[cfg(feature = "gemini")]
pub mod gemini;
#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;

pub use options::{GenerateOptions, ThinkingConfig, ToolChoice};
pub use stream::StreamAccumulator;
pub use vendor::Vendor;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::Result;
use crate::message::{ContentBlock, Msg, Role, ToolUseBlock};
use crate::tool::ToolSchema;

/// Stream of accumulated response snapshots.
pub type ChatStream = BoxStream<'static, Result<ChatResponse>>;

/// Core trait implemented by every vendor client.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Prompt type produced by the matching formatter.
    type Prompt: Serialize + Send + Sync;

    /// Vendor name (e.g. "openai", "gemini").
    fn provider_name(&self) -> &str;

    /// The model this client talks to.
    fn model_name(&self) -> &str;

    /// Generate a complete response.
    async fn call(
        &self,
        prompt: &Self::Prompt,
        tools: &[ToolSchema],
        options: &GenerateOptions,
    ) -> Result<ChatResponse>;

    /// Generate a response incrementally. Each item holds everything
    /// received so far.
    async fn stream(
        &self,
        prompt: &Self::Prompt,
        tools: &[ToolSchema],
        options: &GenerateOptions,
    ) -> Result<ChatStream>;
}

/// Token usage reported by the vendor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ChatUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl ChatUsage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}

/// Why generation finished.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Error,
}

/// A parsed model reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub id: String,
    pub content: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<ChatUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    pub created_at: DateTime<Utc>,
}

impl ChatResponse {
    pub fn new(id: impl Into<String>, content: Vec<ContentBlock>) -> Self {
        Self {
            id: id.into(),
            content,
            usage: None,
            finish_reason: None,
            created_at: Utc::now(),
        }
    }

    /// Text blocks joined with newlines.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn tool_uses(&self) -> Vec<&ToolUseBlock> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse(tool_use) => Some(tool_use),
                _ => None,
            })
            .collect()
    }

    /// Turn the reply into an assistant message spoken by `name`.
    pub fn into_msg(self, name: impl Into<String>) -> Msg {
        let mut msg = Msg::new(name, Role::Assistant, self.content);
        if let Some(usage) = self.usage {
            let mut metadata = serde_json::Map::new();
            if let Ok(value) = serde_json::to_value(usage) {
                metadata.insert("usage".to_string(), value);
            }
            msg.metadata = Some(metadata);
        }
        msg
    }
}

pub(crate) fn new_response_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
