//! Message hub: share every participant's replies with the others.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use tokio::sync::RwLock;
use tracing::debug;

use crate::agent::Agent;
use crate::error::Result;
use crate::message::Msg;

struct HubState {
    name: String,
    participants: RwLock<Vec<Arc<dyn Agent>>>,
    auto_broadcast: AtomicBool,
}

/// A named group of agents. Agents wrapped with [`MsgHub::member`] deliver
/// their replies to every other participant's `observe`.
#[derive(Clone)]
pub struct MsgHub {
    state: Arc<HubState>,
}

fn same_agent(a: &Arc<dyn Agent>, b: &Arc<dyn Agent>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

impl MsgHub {
    pub fn new(name: impl Into<String>, participants: Vec<Arc<dyn Agent>>) -> Self {
        Self {
            state: Arc::new(HubState {
                name: name.into(),
                participants: RwLock::new(participants),
                auto_broadcast: AtomicBool::new(true),
            }),
        }
    }

    /// Create a hub and deliver the announcement to all participants.
    pub async fn enter(
        name: impl Into<String>,
        participants: Vec<Arc<dyn Agent>>,
        announcement: &[Msg],
    ) -> Result<Self> {
        let hub = Self::new(name, participants);
        if !announcement.is_empty() {
            hub.broadcast(announcement).await?;
        }
        Ok(hub)
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// Deliver messages to every participant.
    pub async fn broadcast(&self, msgs: &[Msg]) -> Result<()> {
        let participants = self.participants().await;
        debug!(hub = self.name(), count = participants.len(), "Broadcasting");
        try_join_all(participants.iter().map(|agent| agent.observe(msgs))).await?;
        Ok(())
    }

    async fn broadcast_from(&self, sender: &Arc<dyn Agent>, msgs: &[Msg]) -> Result<()> {
        let participants = self.participants().await;
        try_join_all(
            participants
                .iter()
                .filter(|agent| !same_agent(agent, sender))
                .map(|agent| agent.observe(msgs)),
        )
        .await?;
        Ok(())
    }

    /// Add agents not already present.
    pub async fn add(&self, agents: Vec<Arc<dyn Agent>>) {
        let mut participants = self.state.participants.write().await;
        for agent in agents {
            if !participants.iter().any(|p| same_agent(p, &agent)) {
                participants.push(agent);
            }
        }
    }

    /// Remove every participant with the given name. Returns how many left.
    pub async fn remove(&self, name: &str) -> usize {
        let mut participants = self.state.participants.write().await;
        let before = participants.len();
        participants.retain(|agent| agent.name() != name);
        before - participants.len()
    }

    pub fn set_auto_broadcast(&self, enabled: bool) {
        self.state.auto_broadcast.store(enabled, Ordering::SeqCst);
    }

    pub fn auto_broadcast(&self) -> bool {
        self.state.auto_broadcast.load(Ordering::SeqCst)
    }

    pub async fn participants(&self) -> Vec<Arc<dyn Agent>> {
        self.state.participants.read().await.clone()
    }

    /// Wrap an agent so its replies are shared through this hub.
    pub fn member(&self, agent: Arc<dyn Agent>) -> HubMember {
        HubMember {
            hub: self.clone(),
            agent,
        }
    }

    /// Wrap every current participant.
    pub async fn members(&self) -> Vec<HubMember> {
        self.participants()
            .await
            .into_iter()
            .map(|agent| self.member(agent))
            .collect()
    }

    /// Leave the hub: no more deliveries to anyone.
    pub async fn close(&self) {
        self.state.participants.write().await.clear();
        debug!(hub = self.name(), "Closed");
    }
}

impl std::fmt::Debug for MsgHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MsgHub")
            .field("name", &self.state.name)
            .field("auto_broadcast", &self.auto_broadcast())
            .finish()
    }
}

/// An agent speaking inside a hub.
#[derive(Clone)]
pub struct HubMember {
    hub: MsgHub,
    agent: Arc<dyn Agent>,
}

impl HubMember {
    pub fn agent(&self) -> &Arc<dyn Agent> {
        &self.agent
    }
}

#[async_trait]
impl Agent for HubMember {
    fn name(&self) -> &str {
        self.agent.name()
    }

    async fn reply(&self, msg: Option<Msg>) -> Result<Msg> {
        let reply = self.agent.reply(msg).await?;
        if self.hub.auto_broadcast() {
            self.hub
                .broadcast_from(&self.agent, std::slice::from_ref(&reply))
                .await?;
        }
        Ok(reply)
    }

    async fn observe(&self, msgs: &[Msg]) -> Result<()> {
        self.agent.observe(msgs).await
    }
}
