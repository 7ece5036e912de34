//! Shared test fixtures and a scripted agent.
#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use agentscope::agent::Agent;
use agentscope::error::{AgentScopeError, Result};
use agentscope::message::{ContentBlock, Msg, Role, ToolResultBlock, ToolUseBlock};
use agentscope::util::RetryPolicy;
use async_trait::async_trait;
use serde_json::json;

pub const SYSTEM_PROMPT: &str = "You're a helpful assistant.";

/// A short conversation with one tool round trip in the middle.
pub fn weather_conversation() -> Vec<Msg> {
    vec![
        Msg::system(SYSTEM_PROMPT),
        Msg::user("user", "What is the capital of France?"),
        Msg::assistant("assistant", "The capital of France is Paris."),
        Msg::user("user", "What is the weather there?"),
        tool_call_msg("call_1", "get_weather", json!({"city": "Paris"})),
        tool_result_msg("call_1", "get_weather", "Sunny, 25C"),
        Msg::assistant("assistant", "It is sunny and 25C in Paris."),
    ]
}

pub fn tool_call_msg(id: &str, name: &str, input: serde_json::Value) -> Msg {
    Msg::new(
        "assistant",
        Role::Assistant,
        vec![ContentBlock::ToolUse(ToolUseBlock::new(id, name, input))],
    )
}

pub fn tool_result_msg(id: &str, name: &str, text: &str) -> Msg {
    Msg::new(
        "system",
        Role::Tool,
        vec![ContentBlock::ToolResult(ToolResultBlock::text(id, name, text))],
    )
}

/// Fast retries for wiremock-backed tests.
pub fn test_retry_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(1),
        multiplier: 1.0,
    }
}

/// An agent that answers "<name> heard: <text>" and records what it observes.
pub struct ScriptedAgent {
    name: String,
    observed: Mutex<Vec<Msg>>,
    fail: bool,
}

impl ScriptedAgent {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            observed: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(name)
        }
    }

    pub fn observed_texts(&self) -> Vec<String> {
        self.observed
            .lock()
            .unwrap()
            .iter()
            .map(|msg| format!("{}: {}", msg.name, msg.text()))
            .collect()
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn reply(&self, msg: Option<Msg>) -> Result<Msg> {
        if self.fail {
            return Err(AgentScopeError::Agent(format!("{} refuses", self.name)));
        }
        let heard = msg.map(|m| m.text()).unwrap_or_default();
        Ok(Msg::assistant(
            self.name.clone(),
            format!("{} heard: {heard}", self.name),
        ))
    }

    async fn observe(&self, msgs: &[Msg]) -> Result<()> {
        self.observed.lock().unwrap().extend_from_slice(msgs);
        Ok(())
    }
}
