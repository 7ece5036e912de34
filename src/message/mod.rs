//! Message model: a conversation turn is a role plus a list of content blocks.

pub mod block;
pub mod media;

pub use block::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Conversation role.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Msg {
    #[serde(default = "new_msg_id")]
    pub id: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

fn new_msg_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Msg {
    /// Create a message from content blocks.
    pub fn new(name: impl Into<String>, role: Role, content: Vec<ContentBlock>) -> Self {
        Self {
            id: new_msg_id(),
            name: name.into(),
            role,
            content,
            metadata: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a message holding a single text block.
    pub fn text_msg(name: impl Into<String>, role: Role, text: impl Into<String>) -> Self {
        Self::new(name, role, vec![ContentBlock::text(text)])
    }

    /// Create a system message named `system`.
    pub fn system(text: impl Into<String>) -> Self {
        Self::text_msg("system", Role::System, text)
    }

    /// Create a user message.
    pub fn user(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::text_msg(name, Role::User, text)
    }

    /// Create an assistant message.
    pub fn assistant(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::text_msg(name, Role::Assistant, text)
    }

    /// Attach metadata to this message.
    pub fn with_metadata(mut self, metadata: serde_json::Map<String, serde_json::Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Concatenate the text blocks, separated by newlines.
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

    /// Tool calls requested in this message.
    pub fn tool_uses(&self) -> Vec<&ToolUseBlock> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse(tool_use) => Some(tool_use),
                _ => None,
            })
            .collect()
    }

    /// Tool results carried by this message.
    pub fn tool_results(&self) -> Vec<&ToolResultBlock> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolResult(result) => Some(result),
                _ => None,
            })
            .collect()
    }

    /// Thinking blocks in this message.
    pub fn thinking(&self) -> Vec<&ThinkingBlock> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Thinking(thinking) => Some(thinking),
                _ => None,
            })
            .collect()
    }

    /// Whether the message takes part in a tool call exchange.
    pub fn has_tool_blocks(&self) -> bool {
        self.content
            .iter()
            .any(|block| matches!(block, ContentBlock::ToolUse(_) | ContentBlock::ToolResult(_)))
    }

    /// Whether the message holds nothing but text blocks.
    pub fn is_text_only(&self) -> bool {
        self.content
            .iter()
            .all(|block| matches!(block, ContentBlock::Text { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_joins_blocks_with_newlines() {
        let msg = Msg::new(
            "alice",
            Role::User,
            vec![
                ContentBlock::text("first"),
                ContentBlock::image(Source::url("https://example.com/a.png")),
                ContentBlock::text("second"),
            ],
        );
        assert_eq!(msg.text(), "first\nsecond");
        assert!(!msg.is_text_only());
    }

    #[test]
    fn deserializes_minimal_json() {
        let msg: Msg = serde_json::from_value(json!({
            "name": "bob",
            "role": "assistant",
            "content": [{"type": "text", "text": "hi"}]
        }))
        .unwrap();
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.text(), "hi");
        assert!(!msg.id.is_empty());
    }

    #[test]
    fn detects_tool_blocks() {
        let msg = Msg::new(
            "bob",
            Role::Assistant,
            vec![ContentBlock::ToolUse(ToolUseBlock::new(
                "call_1",
                "search",
                json!({"q": "rust"}),
            ))],
        );
        assert!(msg.has_tool_blocks());
        assert_eq!(msg.tool_uses()[0].name, "search");
        assert!(msg.tool_results().is_empty());
    }
}
