//! An agent backed by a chat model.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::debug;

use super::memory::{InMemoryMemory, Memory};
use super::Agent;
use crate::error::{AgentScopeError, Result};
use crate::formatter::Formatter;
use crate::message::Msg;
use crate::model::{ChatModel, ChatResponse, GenerateOptions};
use crate::tool::ToolSchema;

/// System prompt + memory + formatter + model. Each reply is one model
/// call; tool calls in the reply are returned to the caller, not executed.
pub struct ChatAgent<M, F> {
    name: String,
    sys_prompt: Option<String>,
    model: M,
    formatter: F,
    memory: Arc<dyn Memory>,
    tools: Vec<ToolSchema>,
    options: GenerateOptions,
    streaming: bool,
}

impl<M, F> ChatAgent<M, F>
where
    M: ChatModel,
    F: Formatter<Output = M::Prompt>,
{
    pub fn new(name: impl Into<String>, model: M, formatter: F) -> Self {
        Self {
            name: name.into(),
            sys_prompt: None,
            model,
            formatter,
            memory: Arc::new(InMemoryMemory::new()),
            tools: Vec::new(),
            options: GenerateOptions::default(),
            streaming: false,
        }
    }

    pub fn with_sys_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.sys_prompt = Some(prompt.into());
        self
    }

    pub fn with_memory(mut self, memory: Arc<dyn Memory>) -> Self {
        self.memory = memory;
        self
    }

    /// Tool declarations offered to the model.
    pub fn with_tools(mut self, tools: Vec<ToolSchema>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }

    /// Use the streaming endpoint; the final snapshot becomes the reply.
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn memory(&self) -> &Arc<dyn Memory> {
        &self.memory
    }

    async fn generate(&self, prompt: &M::Prompt) -> Result<ChatResponse> {
        if !self.streaming {
            return self.model.call(prompt, &self.tools, &self.options).await;
        }
        let mut stream = self.model.stream(prompt, &self.tools, &self.options).await?;
        let mut last = None;
        while let Some(snapshot) = stream.next().await {
            last = Some(snapshot?);
        }
        last.ok_or_else(|| AgentScopeError::Stream("model stream ended without output".into()))
    }
}

#[async_trait]
impl<M, F> Agent for ChatAgent<M, F>
where
    M: ChatModel,
    F: Formatter<Output = M::Prompt>,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn reply(&self, msg: Option<Msg>) -> Result<Msg> {
        if let Some(msg) = msg {
            self.memory.add(&[msg]).await?;
        }

        let mut transcript = Vec::new();
        if let Some(sys_prompt) = &self.sys_prompt {
            transcript.push(Msg::system(sys_prompt.clone()));
        }
        transcript.extend(self.memory.get().await);

        let prompt = self.formatter.format(&transcript)?;
        debug!(
            agent = self.name.as_str(),
            model = self.model.model_name(),
            messages = transcript.len(),
            "Generating reply"
        );
        let response = self.generate(&prompt).await?;

        let reply = response.into_msg(self.name.clone());
        self.memory.add(std::slice::from_ref(&reply)).await?;
        Ok(reply)
    }

    async fn observe(&self, msgs: &[Msg]) -> Result<()> {
        self.memory.add(msgs).await
    }
}

impl<M, F> std::fmt::Debug for ChatAgent<M, F>
where
    M: ChatModel,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatAgent")
            .field("name", &self.name)
            .field("provider", &self.model.provider_name())
            .field("model", &self.model.model_name())
            .finish()
    }
}
