//! Accumulates streamed deltas into full response snapshots.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::message::{ContentBlock, ThinkingBlock, ToolUseBlock};

use super::{new_response_id, ChatResponse, ChatUsage, FinishReason};

#[derive(Debug, Default)]
struct PartialToolCall {
    index: Option<u32>,
    id: String,
    name: String,
    arguments: String,
    input: Option<Value>,
    thought_signature: Option<String>,
}

/// Collects text, thinking, and tool-call fragments across stream chunks.
#[derive(Debug)]
pub struct StreamAccumulator {
    id: Option<String>,
    created_at: DateTime<Utc>,
    thinking: String,
    thinking_signature: Option<String>,
    text: String,
    tool_calls: Vec<PartialToolCall>,
    usage: Option<ChatUsage>,
    finish_reason: Option<FinishReason>,
}

impl Default for StreamAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self {
            id: None,
            created_at: Utc::now(),
            thinking: String::new(),
            thinking_signature: None,
            text: String::new(),
            tool_calls: Vec::new(),
            usage: None,
            finish_reason: None,
        }
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        if self.id.is_none() {
            self.id = Some(id.into());
        }
    }

    pub fn push_text(&mut self, delta: &str) {
        self.text.push_str(delta);
    }

    pub fn push_thinking(&mut self, delta: &str) {
        self.thinking.push_str(delta);
    }

    pub fn set_thinking_signature(&mut self, signature: impl Into<String>) {
        self.thinking_signature = Some(signature.into());
    }

    /// Merge an indexed tool-call fragment. Arguments arrive as partial JSON
    /// text and are concatenated.
    pub fn push_tool_fragment(
        &mut self,
        index: u32,
        id: Option<&str>,
        name: Option<&str>,
        arguments: &str,
    ) {
        let pos = match self
            .tool_calls
            .iter()
            .position(|call| call.index == Some(index))
        {
            Some(pos) => pos,
            None => {
                self.tool_calls.push(PartialToolCall {
                    index: Some(index),
                    ..Default::default()
                });
                self.tool_calls.len() - 1
            }
        };
        let call = &mut self.tool_calls[pos];
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            call.id = id.to_string();
        }
        if let Some(name) = name.filter(|name| !name.is_empty()) {
            call.name = name.to_string();
        }
        call.arguments.push_str(arguments);
    }

    /// Record a tool call that arrived whole.
    pub fn push_tool_call(&mut self, block: ToolUseBlock) {
        self.tool_calls.push(PartialToolCall {
            index: None,
            id: block.id,
            name: block.name,
            arguments: String::new(),
            input: Some(block.input),
            thought_signature: block.thought_signature,
        });
    }

    /// Fold a parsed block into the running state.
    pub fn push_block(&mut self, block: ContentBlock) {
        match block {
            ContentBlock::Text { text } => self.push_text(&text),
            ContentBlock::Thinking(ThinkingBlock {
                thinking,
                signature,
            }) => {
                self.push_thinking(&thinking);
                if let Some(signature) = signature {
                    self.set_thinking_signature(signature);
                }
            }
            ContentBlock::ToolUse(call) => self.push_tool_call(call),
            other => tracing::debug!(kind = other.type_name(), "Ignoring block in model output"),
        }
    }

    pub fn set_usage(&mut self, usage: ChatUsage) {
        self.usage = Some(usage);
    }

    pub fn set_finish_reason(&mut self, reason: FinishReason) {
        self.finish_reason = Some(reason);
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Build a response from everything received so far.
    pub fn snapshot(&mut self) -> ChatResponse {
        let id = self.id.get_or_insert_with(new_response_id).clone();

        let mut content = Vec::new();
        if !self.thinking.is_empty() || self.thinking_signature.is_some() {
            content.push(ContentBlock::Thinking(ThinkingBlock {
                thinking: self.thinking.clone(),
                signature: self.thinking_signature.clone(),
            }));
        }
        if !self.text.is_empty() {
            content.push(ContentBlock::text(self.text.clone()));
        }
        for call in &mut self.tool_calls {
            if call.id.is_empty() {
                call.id = new_response_id();
            }
            let input = match &call.input {
                Some(input) => input.clone(),
                None => parse_arguments(&call.arguments),
            };
            content.push(ContentBlock::ToolUse(ToolUseBlock {
                id: call.id.clone(),
                name: call.name.clone(),
                input,
                thought_signature: call.thought_signature.clone(),
            }));
        }

        ChatResponse {
            id,
            content,
            usage: self.usage,
            finish_reason: self.finish_reason,
            created_at: self.created_at,
        }
    }
}

/// Parse tool-call argument text. Empty text becomes `{}`; text that is not
/// valid JSON (yet) is kept as a string.
pub(crate) fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
