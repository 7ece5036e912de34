//! Gemini `generateContent` formatters and the message converter they share.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::sanitize::sanitize_tool_pairs;
use super::{
    group_messages, history_parts, split_system, system_text, tool_result_to_text, Formatter,
    HistoryPart, MessageGroup, DEFAULT_HISTORY_PROMPT,
};
use crate::error::{AgentScopeError, Result};
use crate::message::media::{self, require_mime_type};
use crate::message::{ContentBlock, Msg, Role, Source, ThinkingBlock, ToolUseBlock};

/// The formatted prompt: optional system instruction plus contents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPrompt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiContent>,
    pub contents: Vec<GeminiContent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

impl GeminiContent {
    fn with_role(role: &str, parts: Vec<GeminiPart>) -> Self {
        Self {
            role: Some(role.to_string()),
            parts,
        }
    }
}

/// A Gemini part. Exactly one payload field is expected to be set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<GeminiBlob>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_data: Option<GeminiFileData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<GeminiFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<GeminiFunctionResponse>,
}

impl GeminiPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeminiBlob {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeminiFileData {
    pub mime_type: String,
    pub file_uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeminiFunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeminiFunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub response: serde_json::Value,
}

/// Converts single messages to Gemini contents and model parts back to blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiMessageConverter;

impl GeminiMessageConverter {
    /// Convert one message.
    ///
    /// Returns the message's own content (if it has any parts) followed by one
    /// `user` content per tool result.
    pub fn convert(&self, msg: &Msg) -> Result<Vec<GeminiContent>> {
        let mut parts = Vec::new();
        let mut responses = Vec::new();
        let mut pending_signature: Option<String> = None;

        for block in &msg.content {
            let mut part = match block {
                ContentBlock::Text { text } => GeminiPart::text(text.clone()),
                ContentBlock::Thinking(thinking) => {
                    if let Some(signature) = &thinking.signature {
                        pending_signature = Some(signature.clone());
                    }
                    continue;
                }
                ContentBlock::ToolUse(tool_use) => GeminiPart {
                    function_call: Some(GeminiFunctionCall {
                        id: Some(tool_use.id.clone()),
                        name: tool_use.name.clone(),
                        args: tool_use.input.clone(),
                    }),
                    thought_signature: tool_use.thought_signature.clone(),
                    ..Default::default()
                },
                ContentBlock::ToolResult(result) => {
                    responses.push(GeminiContent::with_role(
                        "user",
                        vec![GeminiPart {
                            function_response: Some(GeminiFunctionResponse {
                                id: Some(result.id.clone()),
                                name: result.name.clone(),
                                response: serde_json::json!({
                                    "output": tool_result_to_text(&result.output),
                                }),
                            }),
                            ..Default::default()
                        }],
                    ));
                    continue;
                }
                ContentBlock::Image { source }
                | ContentBlock::Audio { source }
                | ContentBlock::Video { source } => self.media_part(source)?,
            };
            if part.thought_signature.is_none() {
                part.thought_signature = pending_signature.take();
            }
            parts.push(part);
        }

        if pending_signature.is_some() {
            debug!(msg_id = %msg.id, "Thought signature with no following part dropped");
        }

        let mut contents = Vec::with_capacity(responses.len() + 1);
        if !parts.is_empty() {
            let role = if msg.role == Role::Assistant { "model" } else { "user" };
            contents.push(GeminiContent::with_role(role, parts));
        }
        contents.extend(responses);
        Ok(contents)
    }

    /// Inline data for base64 sources and local files, file data for URIs.
    pub fn media_part(&self, source: &Source) -> Result<GeminiPart> {
        if let Some(inline) = media::resolve_inline(source)? {
            return Ok(GeminiPart {
                inline_data: Some(GeminiBlob {
                    mime_type: inline.mime_type,
                    data: inline.data,
                }),
                ..Default::default()
            });
        }
        match source {
            Source::Url { url } if url.contains("://") => Ok(GeminiPart {
                file_data: Some(GeminiFileData {
                    mime_type: require_mime_type(url)?.to_string(),
                    file_uri: url.clone(),
                }),
                ..Default::default()
            }),
            _ => Err(AgentScopeError::format(format!(
                "media source {source:?} is neither a URI nor an existing local file"
            ))),
        }
    }

    /// Convert response parts into content blocks.
    ///
    /// A signature found on a plain text part is kept in an empty thinking
    /// block placed before the text, so it survives the next round trip.
    pub fn parts_to_blocks(&self, parts: &[GeminiPart]) -> Vec<ContentBlock> {
        let mut blocks = Vec::new();
        for part in parts {
            if let Some(call) = &part.function_call {
                let id = call
                    .id
                    .clone()
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                let args = match &call.args {
                    serde_json::Value::Null => serde_json::json!({}),
                    other => other.clone(),
                };
                let mut tool_use = ToolUseBlock::new(id, call.name.clone(), args);
                tool_use.thought_signature = part.thought_signature.clone();
                blocks.push(ContentBlock::ToolUse(tool_use));
                continue;
            }
            let Some(text) = &part.text else {
                if let Some(signature) = &part.thought_signature {
                    blocks.push(ContentBlock::Thinking(ThinkingBlock {
                        thinking: String::new(),
                        signature: Some(signature.clone()),
                    }));
                }
                continue;
            };
            if part.thought == Some(true) {
                blocks.push(ContentBlock::Thinking(ThinkingBlock {
                    thinking: text.clone(),
                    signature: part.thought_signature.clone(),
                }));
                continue;
            }
            if let Some(signature) = &part.thought_signature {
                blocks.push(ContentBlock::Thinking(ThinkingBlock {
                    thinking: String::new(),
                    signature: Some(signature.clone()),
                }));
            }
            blocks.push(ContentBlock::text(text.clone()));
        }
        blocks
    }
}

fn system_instruction(parts: Vec<GeminiPart>) -> Option<GeminiContent> {
    (!parts.is_empty()).then_some(GeminiContent { role: None, parts })
}

/// Single-agent Gemini formatter.
#[derive(Debug, Clone, Default)]
pub struct GeminiChatFormatter {
    converter: GeminiMessageConverter,
}

impl GeminiChatFormatter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Formatter for GeminiChatFormatter {
    type Output = GeminiPrompt;

    fn format(&self, msgs: &[Msg]) -> Result<GeminiPrompt> {
        let msgs = sanitize_tool_pairs(msgs);
        let mut system_parts = Vec::new();
        let mut contents = Vec::new();
        for msg in &msgs {
            if msg.role == Role::System && msg.is_text_only() {
                system_parts.extend(msg.content.iter().filter_map(|block| match block {
                    ContentBlock::Text { text } => Some(GeminiPart::text(text.clone())),
                    _ => None,
                }));
                continue;
            }
            contents.extend(self.converter.convert(msg)?);
        }
        Ok(GeminiPrompt {
            system_instruction: system_instruction(system_parts),
            contents,
        })
    }
}

/// Multi-agent Gemini formatter.
#[derive(Debug, Clone)]
pub struct GeminiMultiAgentFormatter {
    converter: GeminiMessageConverter,
    history_prompt: String,
}

impl Default for GeminiMultiAgentFormatter {
    fn default() -> Self {
        Self {
            converter: GeminiMessageConverter,
            history_prompt: DEFAULT_HISTORY_PROMPT.to_string(),
        }
    }
}

impl GeminiMultiAgentFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.history_prompt = prompt.into();
        self
    }
}

impl Formatter for GeminiMultiAgentFormatter {
    type Output = GeminiPrompt;

    fn format(&self, msgs: &[Msg]) -> Result<GeminiPrompt> {
        let msgs = sanitize_tool_pairs(msgs);
        let (system, rest) = split_system(&msgs);
        let system_parts = system
            .and_then(system_text)
            .map(|text| vec![GeminiPart::text(text)])
            .unwrap_or_default();

        let mut contents = Vec::new();
        let mut first = true;
        for group in group_messages(rest) {
            match group {
                MessageGroup::ToolSequence(run) => {
                    for msg in run {
                        contents.extend(self.converter.convert(msg)?);
                    }
                }
                MessageGroup::Agent(run) => {
                    let prompt = if first { self.history_prompt.as_str() } else { "" };
                    let parts = history_parts(run, prompt, |_, source| {
                        self.converter.media_part(source).map(Some)
                    })?;
                    if parts.is_empty() {
                        continue;
                    }
                    first = false;
                    let parts = parts
                        .into_iter()
                        .map(|part| match part {
                            HistoryPart::Text(text) => GeminiPart::text(text),
                            HistoryPart::Media(part) => part,
                        })
                        .collect();
                    contents.push(GeminiContent::with_role("user", parts));
                }
            }
        }

        Ok(GeminiPrompt {
            system_instruction: system_instruction(system_parts),
            contents,
        })
    }
}
