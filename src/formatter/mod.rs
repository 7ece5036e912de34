//! Formatters: translate a `Msg` transcript into a vendor request payload.
//!
//! Every vendor comes in two flavours. The chat formatters map one message to
//! one (or a few) vendor turns. The multi-agent formatters flatten runs of
//! plain messages into a single user turn wrapped in `<history>` tags, so a
//! model can follow a conversation between several named speakers, while
//! tool-call exchanges keep their native structure.

pub mod sanitize;
pub mod truncate;

#[cfg(feature = "dashscope")]
pub mod dashscope;
#[cfg(feature = "gemini")]
pub mod gemini;
#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "dashscope")]
pub use dashscope::{DashScopeChatFormatter, DashScopeMessage, DashScopeMultiAgentFormatter};
#[cfg(feature = "gemini")]
pub use gemini::{GeminiChatFormatter, GeminiMultiAgentFormatter, GeminiPrompt};
#[cfg(feature = "ollama")]
pub use ollama::{OllamaChatFormatter, OllamaMessage, OllamaMultiAgentFormatter};
#[cfg(feature = "openai")]
pub use openai::{OpenAiChatFormatter, OpenAiMessage, OpenAiMultiAgentFormatter};
pub use sanitize::sanitize_tool_pairs;
pub use truncate::{CharTokenCounter, TokenCounter, TruncatedFormatter};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::message::{ContentBlock, MediaKind, Msg, Role, Source};

/// Default preamble placed before the first `<history>` block.
pub const DEFAULT_HISTORY_PROMPT: &str = "# Conversation History\n\
The content between <history></history> tags contains your conversation history\n";

/// Translates messages into a vendor prompt.
pub trait Formatter: Send + Sync {
    /// Vendor prompt type.
    type Output: Serialize + Send + Sync;

    /// Format a transcript.
    fn format(&self, msgs: &[Msg]) -> Result<Self::Output>;
}

/// Render tool output as the plain text most vendors expect.
///
/// A single item is returned as is; several items become a `- ` bullet list.
pub fn tool_result_to_text(output: &[ContentBlock]) -> String {
    let mut items = Vec::new();
    for block in output {
        match block {
            ContentBlock::Text { text } => items.push(text.clone()),
            other => match other.media() {
                Some((kind, Source::Url { url })) => {
                    items.push(format!("The returned {kind} can be found at: {url}"));
                }
                Some((kind, Source::Base64 { media_type, .. })) => {
                    items.push(format!(
                        "The returned {kind} ({media_type}) is provided inline as base64 data."
                    ));
                }
                None => warn!(
                    block_type = other.type_name(),
                    "Unsupported block in tool result, skipped"
                ),
            },
        }
    }
    match items.len() {
        0 => String::new(),
        1 => items.remove(0),
        _ => items
            .iter()
            .map(|item| format!("- {item}"))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// A run of consecutive messages of the same kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum MessageGroup<'a> {
    /// Plain messages between speakers.
    Agent(&'a [Msg]),
    /// Messages carrying tool calls or tool results.
    ToolSequence(&'a [Msg]),
}

pub(crate) fn group_messages(msgs: &[Msg]) -> Vec<MessageGroup<'_>> {
    let mut groups = Vec::new();
    let mut start = 0;
    while start < msgs.len() {
        let is_tool = msgs[start].has_tool_blocks();
        let mut end = start + 1;
        while end < msgs.len() && msgs[end].has_tool_blocks() == is_tool {
            end += 1;
        }
        let run = &msgs[start..end];
        groups.push(if is_tool {
            MessageGroup::ToolSequence(run)
        } else {
            MessageGroup::Agent(run)
        });
        start = end;
    }
    groups
}

/// Split off a leading system message.
pub(crate) fn split_system(msgs: &[Msg]) -> (Option<&Msg>, &[Msg]) {
    match msgs.first() {
        Some(first) if first.role == Role::System => (Some(first), &msgs[1..]),
        _ => (None, msgs),
    }
}

/// Text of a leading system message, `None` when there is none.
///
/// A system turn carries text only; other blocks are dropped with a warning.
pub(crate) fn system_text(msg: &Msg) -> Option<String> {
    for block in &msg.content {
        if !matches!(block, ContentBlock::Text { .. }) {
            warn!(
                block_type = block.type_name(),
                "Non-text block in system message, skipped"
            );
        }
    }
    let text = msg.text();
    (!text.is_empty()).then_some(text)
}

/// A piece of a flattened conversation history.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum HistoryPart<M> {
    Text(String),
    Media(M),
}

/// Flatten an agent-message group into history-wrapped parts.
///
/// `media` converts a media block into the vendor's part type; returning
/// `None` skips the block without splitting the surrounding text.
pub(crate) fn history_parts<M>(
    msgs: &[Msg],
    prompt: &str,
    mut media: impl FnMut(MediaKind, &Source) -> Result<Option<M>>,
) -> Result<Vec<HistoryPart<M>>> {
    let mut parts = Vec::new();
    let mut lines: Vec<String> = Vec::new();

    for msg in msgs {
        for block in &msg.content {
            match block {
                ContentBlock::Text { text } => lines.push(format!("{}: {}", msg.name, text)),
                ContentBlock::Thinking(_) => {
                    debug!(speaker = %msg.name, "Thinking block left out of history");
                }
                other => match other.media() {
                    Some((kind, source)) => {
                        if let Some(part) = media(kind, source)? {
                            if !lines.is_empty() {
                                parts.push(HistoryPart::Text(lines.join("\n")));
                                lines.clear();
                            }
                            parts.push(HistoryPart::Media(part));
                        }
                    }
                    None => warn!(
                        block_type = other.type_name(),
                        "Unsupported block in conversation history, skipped"
                    ),
                },
            }
        }
    }
    if !lines.is_empty() {
        parts.push(HistoryPart::Text(lines.join("\n")));
    }
    if parts.is_empty() {
        return Ok(parts);
    }

    match parts.first_mut() {
        Some(HistoryPart::Text(text)) => *text = format!("{prompt}<history>\n{text}"),
        _ => parts.insert(0, HistoryPart::Text(format!("{prompt}<history>\n"))),
    }
    match parts.last_mut() {
        Some(HistoryPart::Text(text)) => text.push_str("\n</history>"),
        _ => parts.push(HistoryPart::Text("</history>".to_string())),
    }
    Ok(parts)
}
