//! Agents: named participants that reply to and observe messages.

pub mod chat;
pub mod memory;

pub use chat::ChatAgent;
pub use memory::{InMemoryMemory, Memory};

use async_trait::async_trait;

use crate::error::Result;
use crate::message::Msg;

/// Anything that can take part in a conversation.
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    /// Produce a reply, optionally to a new incoming message.
    async fn reply(&self, msg: Option<Msg>) -> Result<Msg>;

    /// Record messages without replying.
    async fn observe(&self, msgs: &[Msg]) -> Result<()>;
}
