//! Convenience re-exports for common use.

pub use crate::agent::{Agent, ChatAgent, InMemoryMemory, Memory};
pub use crate::config::AgentScopeConfig;
pub use crate::error::{AgentScopeError, Result};
pub use crate::formatter::{Formatter, TruncatedFormatter};
pub use crate::hub::MsgHub;
pub use crate::message::{ContentBlock, Msg, Role, Source, ToolResultBlock, ToolUseBlock};
pub use crate::model::{ChatModel, ChatResponse, GenerateOptions, ToolChoice, Vendor};
pub use crate::pipeline::{fanout_pipeline, sequential_pipeline};
pub use crate::tool::{FnTool, Tool, ToolArguments, ToolParameters, ToolResponse, Toolkit};

#[cfg(feature = "dashscope")]
pub use crate::formatter::{DashScopeChatFormatter, DashScopeMultiAgentFormatter};
#[cfg(feature = "gemini")]
pub use crate::formatter::{GeminiChatFormatter, GeminiMultiAgentFormatter};
#[cfg(feature = "ollama")]
pub use crate::formatter::{OllamaChatFormatter, OllamaMultiAgentFormatter};
#[cfg(feature = "openai")]
pub use crate::formatter::{OpenAiChatFormatter, OpenAiMultiAgentFormatter};
