//! OpenAI chat-completions formatters.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    group_messages, history_parts, split_system, system_text, tool_result_to_text, Formatter,
    HistoryPart, MessageGroup, DEFAULT_HISTORY_PROMPT,
};
use crate::error::{AgentScopeError, Result};
use crate::message::media::{self, audio_format};
use crate::message::{ContentBlock, MediaKind, Msg, Role, Source, ToolResultBlock, ToolUseBlock};

/// One entry of the `messages` array.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenAiMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub content: Option<OpenAiContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Message content: a plain string (tool messages) or a list of parts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum OpenAiContent {
    Text(String),
    Parts(Vec<OpenAiPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpenAiPart {
    Text { text: String },
    ImageUrl { image_url: OpenAiImageUrl },
    InputAudio { input_audio: OpenAiInputAudio },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenAiImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenAiInputAudio {
    pub data: String,
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenAiToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub kind: String,
    pub function: OpenAiFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenAiFunctionCall {
    pub name: String,
    /// JSON-encoded arguments.
    pub arguments: String,
}

impl OpenAiToolCall {
    pub fn from_block(block: &ToolUseBlock) -> Result<Self> {
        Ok(Self {
            id: block.id.clone(),
            kind: function_type(),
            function: OpenAiFunctionCall {
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

/// Single-agent formatter for OpenAI chat completions.
#[derive(Debug, Clone, Default)]
pub struct OpenAiChatFormatter {
    promote_tool_result_images: bool,
}

impl OpenAiChatFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also show images returned by tools in a follow-up user message, since
    /// tool messages can only carry text.
    pub fn with_promoted_tool_result_images(mut self, enabled: bool) -> Self {
        self.promote_tool_result_images = enabled;
        self
    }

    pub(crate) fn format_into(&self, msgs: &[Msg], out: &mut Vec<OpenAiMessage>) -> Result<()> {
        let mut promoted = Vec::new();
        for (index, msg) in msgs.iter().enumerate() {
            self.convert_message(msg, out, &mut promoted)?;
            let next_is_result = msgs
                .get(index + 1)
                .is_some_and(|next| !next.content.is_empty() && is_result_only(next));
            if !next_is_result {
                out.append(&mut promoted);
            }
        }
        out.append(&mut promoted);
        Ok(())
    }

    fn convert_message(
        &self,
        msg: &Msg,
        out: &mut Vec<OpenAiMessage>,
        promoted: &mut Vec<OpenAiMessage>,
    ) -> Result<()> {
        let mut parts = Vec::new();
        let mut tool_calls = Vec::new();
        let mut tool_messages = Vec::new();

        for block in &msg.content {
            match block {
                ContentBlock::Text { text } => parts.push(OpenAiPart::Text { text: text.clone() }),
                ContentBlock::ToolUse(tool_use) => tool_calls.push(OpenAiToolCall::from_block(tool_use)?),
                ContentBlock::ToolResult(result) => {
                    tool_messages.push(tool_message(result));
                    if self.promote_tool_result_images {
                        if let Some(message) = promoted_images(result)? {
                            promoted.push(message);
                        }
                    }
                }
                ContentBlock::Thinking(_) => debug!("Thinking block not sent to OpenAI"),
                ContentBlock::Image { source } => {
                    parts.push(OpenAiPart::ImageUrl {
                        image_url: OpenAiImageUrl { url: image_url(source)? },
                    });
                }
                ContentBlock::Audio { source } => {
                    if let Some(audio) = input_audio(source)? {
                        parts.push(OpenAiPart::InputAudio { input_audio: audio });
                    }
                }
                ContentBlock::Video { .. } => {
                    warn!("OpenAI chat completions do not accept video, block skipped");
                }
            }
        }

        if !parts.is_empty() || !tool_calls.is_empty() {
            out.push(OpenAiMessage {
                role: role_name(msg.role).to_string(),
                name: Some(msg.name.clone()),
                content: (!parts.is_empty()).then_some(OpenAiContent::Parts(parts)),
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                tool_call_id: None,
            });
        }
        out.extend(tool_messages);
        Ok(())
    }
}

impl Formatter for OpenAiChatFormatter {
    type Output = Vec<OpenAiMessage>;

    fn format(&self, msgs: &[Msg]) -> Result<Vec<OpenAiMessage>> {
        let mut out = Vec::with_capacity(msgs.len());
        self.format_into(msgs, &mut out)?;
        Ok(out)
    }
}

/// Multi-agent formatter: speaker turns are merged into `<history>` blocks.
#[derive(Debug, Clone)]
pub struct OpenAiMultiAgentFormatter {
    chat: OpenAiChatFormatter,
    history_prompt: String,
}

impl Default for OpenAiMultiAgentFormatter {
    fn default() -> Self {
        Self {
            chat: OpenAiChatFormatter::default(),
            history_prompt: DEFAULT_HISTORY_PROMPT.to_string(),
        }
    }
}

impl OpenAiMultiAgentFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.history_prompt = prompt.into();
        self
    }

    pub fn with_promoted_tool_result_images(mut self, enabled: bool) -> Self {
        self.chat = self.chat.with_promoted_tool_result_images(enabled);
        self
    }
}

impl Formatter for OpenAiMultiAgentFormatter {
    type Output = Vec<OpenAiMessage>;

    fn format(&self, msgs: &[Msg]) -> Result<Vec<OpenAiMessage>> {
        let (system, rest) = split_system(msgs);
        let mut out = Vec::new();
        if let Some(text) = system.and_then(system_text) {
            out.push(OpenAiMessage {
                role: "system".to_string(),
                name: None,
                content: Some(OpenAiContent::Parts(vec![OpenAiPart::Text { text }])),
                tool_calls: None,
                tool_call_id: None,
            });
        }

        let mut first = true;
        for group in group_messages(rest) {
            match group {
                MessageGroup::ToolSequence(run) => self.chat.format_into(run, &mut out)?,
                MessageGroup::Agent(run) => {
                    let prompt = if first { self.history_prompt.as_str() } else { "" };
                    let parts = history_parts(run, prompt, |kind, source| match kind {
                        MediaKind::Image => Ok(Some(OpenAiPart::ImageUrl {
                            image_url: OpenAiImageUrl { url: image_url(source)? },
                        })),
                        MediaKind::Audio => Ok(input_audio(source)?
                            .map(|audio| OpenAiPart::InputAudio { input_audio: audio })),
                        MediaKind::Video => {
                            warn!("OpenAI chat completions do not accept video, block skipped");
                            Ok(None)
                        }
                    })?;
                    if parts.is_empty() {
                        continue;
                    }
                    first = false;
                    let parts = parts
                        .into_iter()
                        .map(|part| match part {
                            HistoryPart::Text(text) => OpenAiPart::Text { text },
                            HistoryPart::Media(part) => part,
                        })
                        .collect();
                    out.push(OpenAiMessage {
                        role: "user".to_string(),
                        name: None,
                        content: Some(OpenAiContent::Parts(parts)),
                        tool_calls: None,
                        tool_call_id: None,
                    });
                }
            }
        }
        Ok(out)
    }
}

fn is_result_only(msg: &Msg) -> bool {
    msg.content
        .iter()
        .all(|block| matches!(block, ContentBlock::ToolResult(_)))
}

fn tool_message(result: &ToolResultBlock) -> OpenAiMessage {
    OpenAiMessage {
        role: "tool".to_string(),
        name: Some(result.name.clone()),
        content: Some(OpenAiContent::Text(tool_result_to_text(&result.output))),
        tool_calls: None,
        tool_call_id: Some(result.id.clone()),
    }
}

fn promoted_images(result: &ToolResultBlock) -> Result<Option<OpenAiMessage>> {
    let mut images = Vec::new();
    for block in &result.output {
        if let ContentBlock::Image { source } = block {
            images.push(OpenAiPart::ImageUrl {
                image_url: OpenAiImageUrl { url: image_url(source)? },
            });
        }
    }
    if images.is_empty() {
        return Ok(None);
    }
    let mut parts = Vec::with_capacity(images.len() + 2);
    parts.push(OpenAiPart::Text {
        text: format!(
            "<system-info>The following are the image contents from the tool result of '{}':",
            result.name
        ),
    });
    parts.extend(images);
    parts.push(OpenAiPart::Text {
        text: "</system-info>".to_string(),
    });
    Ok(Some(OpenAiMessage {
        role: "user".to_string(),
        name: Some("user".to_string()),
        content: Some(OpenAiContent::Parts(parts)),
        tool_calls: None,
        tool_call_id: None,
    }))
}

/// Web and data URLs pass through; local files and base64 become data URLs.
fn image_url(source: &Source) -> Result<String> {
    if let Source::Url { url } = source {
        if media::is_web_url(url) || media::is_data_url(url) {
            return Ok(url.clone());
        }
    }
    match media::resolve_inline(source)? {
        Some(inline) => Ok(inline.to_data_url()),
        None => Err(AgentScopeError::format(format!(
            "image source {source:?} is neither a web URL nor an existing local file"
        ))),
    }
}

fn input_audio(source: &Source) -> Result<Option<OpenAiInputAudio>> {
    let Some(inline) = media::resolve_inline(source)? else {
        warn!(?source, "OpenAI input_audio needs inline data, remote audio skipped");
        return Ok(None);
    };
    let format = audio_format(&inline.mime_type).ok_or_else(|| {
        AgentScopeError::format(format!(
            "unsupported audio type '{}' (expected wav or mp3)",
            inline.mime_type
        ))
    })?;
    Ok(Some(OpenAiInputAudio {
        data: inline.data,
        format: format.to_string(),
    }))
}
