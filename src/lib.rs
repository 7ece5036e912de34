//! agentscope: building blocks for multi-agent applications.
//!
//! A transcript is a list of [`message::Msg`] values made of typed content
//! blocks. Formatters turn a transcript into the request payload of a model
//! vendor (OpenAI, Gemini, Ollama, DashScope), chat models send it, and
//! agents, pipelines and the message hub orchestrate who speaks when.
//!
//! # Quick Start
//!
//! ```no_run
//! use agentscope::prelude::*;
//! use agentscope::model::openai::OpenAiChatModel;
//!
//! # async fn example() -> agentscope::error::Result<()> {
//! let config = AgentScopeConfig::from_env();
//! let model = OpenAiChatModel::from_config(&config, None)?;
//! let agent = ChatAgent::new("assistant", model, OpenAiChatFormatter::new())
//!     .with_sys_prompt("You are a helpful assistant.");
//! let reply = agent.reply(Some(Msg::user("user", "Hello!"))).await?;
//! println!("{}", reply.text());
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod formatter;
pub mod hub;
pub mod message;
pub mod model;
pub mod pipeline;
pub mod prelude;
pub mod tool;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
