//! Pipelines: fixed orchestration patterns over agents.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::debug;

use crate::agent::Agent;
use crate::error::Result;
use crate::message::Msg;

/// Pass `msg` through each agent in turn, feeding each reply to the next.
/// With no agents the input is returned unchanged.
pub async fn sequential_pipeline(agents: &[Arc<dyn Agent>], msg: Option<Msg>) -> Result<Option<Msg>> {
    let mut current = msg;
    for agent in agents {
        debug!(agent = agent.name(), "Sequential pipeline step");
        current = Some(agent.reply(current).await?);
    }
    Ok(current)
}

/// Give every agent its own copy of `msg` and collect the replies in agent
/// order. Replies are generated concurrently when `concurrent` is set.
pub async fn fanout_pipeline(
    agents: &[Arc<dyn Agent>],
    msg: Option<Msg>,
    concurrent: bool,
) -> Result<Vec<Msg>> {
    if concurrent {
        return try_join_all(agents.iter().map(|agent| agent.reply(msg.clone()))).await;
    }
    let mut replies = Vec::with_capacity(agents.len());
    for agent in agents {
        replies.push(agent.reply(msg.clone()).await?);
    }
    Ok(replies)
}

/// Reusable [`sequential_pipeline`].
#[derive(Clone, Default)]
pub struct SequentialPipeline {
    agents: Vec<Arc<dyn Agent>>,
}

impl SequentialPipeline {
    pub fn new(agents: Vec<Arc<dyn Agent>>) -> Self {
        Self { agents }
    }

    pub async fn run(&self, msg: Option<Msg>) -> Result<Option<Msg>> {
        sequential_pipeline(&self.agents, msg).await
    }
}

/// Reusable [`fanout_pipeline`].
#[derive(Clone, Default)]
pub struct FanoutPipeline {
    agents: Vec<Arc<dyn Agent>>,
    concurrent: bool,
}

impl FanoutPipeline {
    /// Concurrent by default.
    pub fn new(agents: Vec<Arc<dyn Agent>>) -> Self {
        Self {
            agents,
            concurrent: true,
        }
    }

    pub fn with_concurrency(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    pub async fn run(&self, msg: Option<Msg>) -> Result<Vec<Msg>> {
        fanout_pipeline(&self.agents, msg, self.concurrent).await
    }
}
