//! Ollama `/api/chat` formatters.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    group_messages, history_parts, split_system, system_text, tool_result_to_text, Formatter,
    HistoryPart, MessageGroup, DEFAULT_HISTORY_PROMPT,
};
use crate::error::Result;
use crate::message::media;
use crate::message::{ContentBlock, MediaKind, Msg, Role, Source};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct OllamaMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
    /// Base64-encoded images without a data URL prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OllamaToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OllamaToolCall {
    pub function: OllamaFunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OllamaFunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::Assistant => "assistant",
        Role::User | Role::Tool => "user",
    }
}

fn ollama_image(source: &Source) -> Result<Option<String>> {
    match media::resolve_inline(source)? {
        Some(inline) => Ok(Some(inline.data)),
        None => {
            warn!(?source, "Ollama only accepts inline images, remote image skipped");
            Ok(None)
        }
    }
}

/// Single-agent Ollama formatter.
#[derive(Debug, Clone, Copy, Default)]
pub struct OllamaChatFormatter;

impl OllamaChatFormatter {
    pub fn new() -> Self {
        Self
    }

    pub(crate) fn format_into(&self, msgs: &[Msg], out: &mut Vec<OllamaMessage>) -> Result<()> {
        for msg in msgs {
            let mut texts = Vec::new();
            let mut images = Vec::new();
            let mut tool_calls = Vec::new();
            let mut results = Vec::new();

            for block in &msg.content {
                match block {
                    ContentBlock::Text { text } => texts.push(text.as_str()),
                    ContentBlock::ToolUse(tool_use) => tool_calls.push(OllamaToolCall {
                        function: OllamaFunctionCall {
                            name: tool_use.name.clone(),
                            arguments: tool_use.input.clone(),
                        },
                    }),
                    ContentBlock::ToolResult(result) => results.push(OllamaMessage {
                        role: "tool".to_string(),
                        content: tool_result_to_text(&result.output),
                        tool_name: Some(result.name.clone()),
                        ..Default::default()
                    }),
                    ContentBlock::Image { source } => images.extend(ollama_image(source)?),
                    ContentBlock::Thinking(_) => debug!("Thinking block not sent to Ollama"),
                    other => warn!(
                        block_type = other.type_name(),
                        "Ollama does not accept this block, skipped"
                    ),
                }
            }

            let content = texts.join("\n");
            if !content.is_empty() || !images.is_empty() || !tool_calls.is_empty() {
                out.push(OllamaMessage {
                    role: role_name(msg.role).to_string(),
                    content,
                    images: (!images.is_empty()).then_some(images),
                    tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                    tool_name: None,
                });
            }
            out.extend(results);
        }
        Ok(())
    }
}

impl Formatter for OllamaChatFormatter {
    type Output = Vec<OllamaMessage>;

    fn format(&self, msgs: &[Msg]) -> Result<Vec<OllamaMessage>> {
        let mut out = Vec::with_capacity(msgs.len());
        self.format_into(msgs, &mut out)?;
        Ok(out)
    }
}

/// Merges a run of speaker messages into one Ollama user message.
///
/// Ollama content is a plain string, so the history text is joined into it
/// and every image is collected into the message's `images`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OllamaConversationMerger;

impl OllamaConversationMerger {
    pub fn merge(&self, msgs: &[Msg], history_prompt: &str) -> Result<Option<OllamaMessage>> {
        let parts = history_parts(msgs, history_prompt, |kind, source| match kind {
            MediaKind::Image => ollama_image(source),
            _ => {
                warn!(%kind, "Ollama does not accept this media kind, skipped");
                Ok(None)
            }
        })?;
        if parts.is_empty() {
            return Ok(None);
        }

        let mut content = String::new();
        let mut images = Vec::new();
        for part in parts {
            match part {
                HistoryPart::Text(text) => {
                    if !content.is_empty() && !content.ends_with('\n') {
                        content.push('\n');
                    }
                    content.push_str(&text);
                }
                HistoryPart::Media(image) => images.push(image),
            }
        }
        Ok(Some(OllamaMessage {
            role: "user".to_string(),
            content,
            images: (!images.is_empty()).then_some(images),
            ..Default::default()
        }))
    }
}

/// Multi-agent Ollama formatter.
#[derive(Debug, Clone)]
pub struct OllamaMultiAgentFormatter {
    chat: OllamaChatFormatter,
    merger: OllamaConversationMerger,
    history_prompt: String,
}

impl Default for OllamaMultiAgentFormatter {
    fn default() -> Self {
        Self {
            chat: OllamaChatFormatter,
            merger: OllamaConversationMerger,
            history_prompt: DEFAULT_HISTORY_PROMPT.to_string(),
        }
    }
}

impl OllamaMultiAgentFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.history_prompt = prompt.into();
        self
    }
}

impl Formatter for OllamaMultiAgentFormatter {
    type Output = Vec<OllamaMessage>;

    fn format(&self, msgs: &[Msg]) -> Result<Vec<OllamaMessage>> {
        let (system, rest) = split_system(msgs);
        let mut out = Vec::new();
        if let Some(content) = system.and_then(system_text) {
            out.push(OllamaMessage {
                role: "system".to_string(),
                content,
                ..Default::default()
            });
        }

        let mut first = true;
        for group in group_messages(rest) {
            match group {
                MessageGroup::ToolSequence(run) => self.chat.format_into(run, &mut out)?,
                MessageGroup::Agent(run) => {
                    let prompt = if first { self.history_prompt.as_str() } else { "" };
                    if let Some(merged) = self.merger.merge(run, prompt)? {
                        first = false;
                        out.push(merged);
                    }
                }
            }
        }
        Ok(out)
    }
}
