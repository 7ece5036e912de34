//! Conversation memory.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{AgentScopeError, Result};
use crate::message::Msg;

/// Storage for the messages an agent has seen.
#[async_trait]
pub trait Memory: Send + Sync {
    async fn add(&self, msgs: &[Msg]) -> Result<()>;

    /// All stored messages, oldest first.
    async fn get(&self) -> Vec<Msg>;

    /// Delete the message at `index`.
    async fn delete(&self, index: usize) -> Result<Msg>;

    async fn size(&self) -> usize;

    async fn clear(&self);
}

/// In-process memory. Messages whose id is already stored are skipped
/// unless duplicates are allowed.
#[derive(Debug, Default)]
pub struct InMemoryMemory {
    messages: RwLock<Vec<Msg>>,
    allow_duplicates: bool,
}

impl InMemoryMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duplicates(mut self, allow: bool) -> Self {
        self.allow_duplicates = allow;
        self
    }
}

#[async_trait]
impl Memory for InMemoryMemory {
    async fn add(&self, msgs: &[Msg]) -> Result<()> {
        let mut messages = self.messages.write().await;
        for msg in msgs {
            if !self.allow_duplicates && messages.iter().any(|m| m.id == msg.id) {
                continue;
            }
            messages.push(msg.clone());
        }
        Ok(())
    }

    async fn get(&self) -> Vec<Msg> {
        self.messages.read().await.clone()
    }

    async fn delete(&self, index: usize) -> Result<Msg> {
        let mut messages = self.messages.write().await;
        if index >= messages.len() {
            return Err(AgentScopeError::InvalidArgument(format!(
                "memory index {index} out of range (size {})",
                messages.len()
            )));
        }
        Ok(messages.remove(index))
    }

    async fn size(&self) -> usize {
        self.messages.read().await.len()
    }

    async fn clear(&self) {
        self.messages.write().await.clear();
    }
}
