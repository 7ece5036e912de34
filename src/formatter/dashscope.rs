//! DashScope (Qwen) generation formatters.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    group_messages, history_parts, split_system, system_text, tool_result_to_text, Formatter,
    HistoryPart, MessageGroup, DEFAULT_HISTORY_PROMPT,
};
use crate::error::{AgentScopeError, Result};
use crate::message::media;
use crate::message::{ContentBlock, MediaKind, Msg, Role, Source, ToolUseBlock};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DashScopeMessage {
    pub role: String,
    #[serde(default)]
    pub content: Vec<DashScopePart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<DashScopeToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl DashScopeMessage {
    /// Whether every part is text.
    pub fn is_text_only(&self) -> bool {
        self.content
            .iter()
            .all(|part| matches!(part, DashScopePart::Text(_)))
    }
}

/// A content part, serialized as a single-key object such as `{"image": url}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum DashScopePart {
    Text(String),
    Image(String),
    Audio(String),
    Video(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashScopeToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub kind: String,
    pub function: DashScopeFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashScopeFunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

impl DashScopeToolCall {
    pub fn from_block(block: &ToolUseBlock) -> Result<Self> {
        Ok(Self {
            id: block.id.clone(),
            kind: function_type(),
            function: DashScopeFunctionCall {
                name: block.name.clone(),
                arguments: serde_json::to_string(&block.input)?,
            },
        })
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::Assistant => "assistant",
        Role::User | Role::Tool => "user",
    }
}

/// Local paths become `file://` URLs, base64 becomes a data URL.
fn media_url(source: &Source) -> Result<String> {
    match source {
        Source::Base64 { media_type, data } => Ok(media::data_url(media_type, data)),
        Source::Url { url } if url.contains("://") || media::is_data_url(url) => Ok(url.clone()),
        Source::Url { url } => {
            let path = media::local_path(url).ok_or_else(|| {
                AgentScopeError::format(format!(
                    "media URL '{url}' is neither a web URL nor an existing local file"
                ))
            })?;
            let absolute = std::fs::canonicalize(&path)?;
            Ok(format!("file://{}", absolute.display()))
        }
    }
}

fn media_part(kind: MediaKind, source: &Source) -> Result<DashScopePart> {
    let url = media_url(source)?;
    Ok(match kind {
        MediaKind::Image => DashScopePart::Image(url),
        MediaKind::Audio => DashScopePart::Audio(url),
        MediaKind::Video => DashScopePart::Video(url),
    })
}

/// Single-agent DashScope formatter.
#[derive(Debug, Clone, Copy, Default)]
pub struct DashScopeChatFormatter;

impl DashScopeChatFormatter {
    pub fn new() -> Self {
        Self
    }

    pub(crate) fn format_into(&self, msgs: &[Msg], out: &mut Vec<DashScopeMessage>) -> Result<()> {
        for msg in msgs {
            let mut content = Vec::new();
            let mut tool_calls = Vec::new();
            let mut results = Vec::new();

            for block in &msg.content {
                match block {
                    ContentBlock::Text { text } => content.push(DashScopePart::Text(text.clone())),
                    ContentBlock::ToolUse(tool_use) => {
                        tool_calls.push(DashScopeToolCall::from_block(tool_use)?)
                    }
                    ContentBlock::ToolResult(result) => results.push(DashScopeMessage {
                        role: "tool".to_string(),
                        content: vec![DashScopePart::Text(tool_result_to_text(&result.output))],
                        tool_calls: None,
                        tool_call_id: Some(result.id.clone()),
                        name: Some(result.name.clone()),
                    }),
                    ContentBlock::Thinking(_) => debug!("Thinking block not sent to DashScope"),
                    other => {
                        if let Some((kind, source)) = other.media() {
                            content.push(media_part(kind, source)?);
                        }
                    }
                }
            }

            if !content.is_empty() || !tool_calls.is_empty() {
                out.push(DashScopeMessage {
                    role: role_name(msg.role).to_string(),
                    content,
                    tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                    tool_call_id: None,
                    name: None,
                });
            }
            out.extend(results);
        }
        Ok(())
    }
}

impl Formatter for DashScopeChatFormatter {
    type Output = Vec<DashScopeMessage>;

    fn format(&self, msgs: &[Msg]) -> Result<Vec<DashScopeMessage>> {
        let mut out = Vec::with_capacity(msgs.len());
        self.format_into(msgs, &mut out)?;
        Ok(out)
    }
}

/// Multi-agent DashScope formatter.
#[derive(Debug, Clone)]
pub struct DashScopeMultiAgentFormatter {
    chat: DashScopeChatFormatter,
    history_prompt: String,
}

impl Default for DashScopeMultiAgentFormatter {
    fn default() -> Self {
        Self {
            chat: DashScopeChatFormatter,
            history_prompt: DEFAULT_HISTORY_PROMPT.to_string(),
        }
    }
}

impl DashScopeMultiAgentFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.history_prompt = prompt.into();
        self
    }
}

impl Formatter for DashScopeMultiAgentFormatter {
    type Output = Vec<DashScopeMessage>;

    fn format(&self, msgs: &[Msg]) -> Result<Vec<DashScopeMessage>> {
        let (system, rest) = split_system(msgs);
        let mut out = Vec::new();
        if let Some(text) = system.and_then(system_text) {
            out.push(DashScopeMessage {
                role: "system".to_string(),
                content: vec![DashScopePart::Text(text)],
                ..Default::default()
            });
        }

        let mut first = true;
        for group in group_messages(rest) {
            match group {
                MessageGroup::ToolSequence(run) => self.chat.format_into(run, &mut out)?,
                MessageGroup::Agent(run) => {
                    let prompt = if first { self.history_prompt.as_str() } else { "" };
                    let parts = history_parts(run, prompt, |kind, source| {
                        media_part(kind, source).map(Some)
                    })?;
                    if parts.is_empty() {
                        continue;
                    }
                    first = false;
                    out.push(DashScopeMessage {
                        role: "user".to_string(),
                        content: parts
                            .into_iter()
                            .map(|part| match part {
                                HistoryPart::Text(text) => DashScopePart::Text(text),
                                HistoryPart::Media(part) => part,
                            })
                            .collect(),
                        ..Default::default()
                    });
                }
            }
        }
        Ok(out)
    }
}
