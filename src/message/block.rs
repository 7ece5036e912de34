//! Content blocks carried by a [`Msg`](super::Msg).

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A single block of message content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Thinking(ThinkingBlock),
    Image { source: Source },
    Audio { source: Source },
    Video { source: Source },
    ToolUse(ToolUseBlock),
    ToolResult(ToolResultBlock),
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(source: Source) -> Self {
        Self::Image { source }
    }

    pub fn audio(source: Source) -> Self {
        Self::Audio { source }
    }

    pub fn video(source: Source) -> Self {
        Self::Video { source }
    }

    pub fn thinking(thinking: impl Into<String>) -> Self {
        Self::Thinking(ThinkingBlock {
            thinking: thinking.into(),
            signature: None,
        })
    }

    /// The media kind and source, if this is an image, audio or video block.
    pub fn media(&self) -> Option<(MediaKind, &Source)> {
        match self {
            Self::Image { source } => Some((MediaKind::Image, source)),
            Self::Audio { source } => Some((MediaKind::Audio, source)),
            Self::Video { source } => Some((MediaKind::Video, source)),
            _ => None,
        }
    }

    /// Wire name of the block type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Thinking(_) => "thinking",
            Self::Image { .. } => "image",
            Self::Audio { .. } => "audio",
            Self::Video { .. } => "video",
            Self::ToolUse(_) => "tool_use",
            Self::ToolResult(_) => "tool_result",
        }
    }
}

/// Kind of a media block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum MediaKind {
    Image,
    Audio,
    Video,
}

/// Where the bytes of a media block live.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Source {
    /// A web URL, a `file://` URL or a local path.
    Url { url: String },
    /// Inline base64 data.
    Base64 { media_type: String, data: String },
}

impl Source {
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url { url: url.into() }
    }

    pub fn base64(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::Base64 {
            media_type: media_type.into(),
            data: data.into(),
        }
    }
}

/// Model reasoning, optionally carrying an opaque signature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThinkingBlock {
    pub thinking: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolUseBlock {
    pub id: String,
    pub name: String,
    #[serde(default = "empty_object")]
    pub input: serde_json::Value,
    /// Gemini thought signature attached to this call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

impl ToolUseBlock {
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
            thought_signature: None,
        }
    }

    pub fn with_thought_signature(mut self, signature: impl Into<String>) -> Self {
        self.thought_signature = Some(signature.into());
        self
    }
}

/// The outcome of a tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResultBlock {
    pub id: String,
    pub name: String,
    /// Text and media blocks returned by the tool.
    #[serde(default)]
    pub output: Vec<ContentBlock>,
}

impl ToolResultBlock {
    pub fn new(id: impl Into<String>, name: impl Into<String>, output: Vec<ContentBlock>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            output,
        }
    }

    /// A result holding a single text block.
    pub fn text(id: impl Into<String>, name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, name, vec![ContentBlock::text(text)])
    }
}
