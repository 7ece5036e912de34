mod common;

use std::sync::Arc;

use agentscope::agent::Agent;
use agentscope::error::AgentScopeError;
use agentscope::message::Msg;
use agentscope::pipeline::{fanout_pipeline, sequential_pipeline, FanoutPipeline, SequentialPipeline};
use pretty_assertions::assert_eq;

use common::ScriptedAgent;

fn agents(names: &[&str]) -> Vec<Arc<dyn Agent>> {
    names
        .iter()
        .map(|name| Arc::new(ScriptedAgent::new(name)) as Arc<dyn Agent>)
        .collect()
}

#[tokio::test]
async fn sequential_feeds_each_reply_forward() {
    let chain = agents(&["a", "b"]);

    let out = sequential_pipeline(&chain, Some(Msg::user("user", "hi")))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(out.name, "b");
    assert_eq!(out.text(), "b heard: a heard: hi");
}

#[tokio::test]
async fn sequential_with_no_agents_returns_input() {
    let input = Msg::user("user", "unchanged");
    let out = sequential_pipeline(&[], Some(input.clone())).await.unwrap();
    assert_eq!(out, Some(input));

    assert_eq!(sequential_pipeline(&[], None).await.unwrap(), None);
}

#[tokio::test]
async fn sequential_stops_at_first_error() {
    let chain: Vec<Arc<dyn Agent>> = vec![
        Arc::new(ScriptedAgent::failing("grumpy")),
        Arc::new(ScriptedAgent::new("never")),
    ];

    let err = SequentialPipeline::new(chain)
        .run(Some(Msg::user("user", "hi")))
        .await
        .unwrap_err();

    assert!(matches!(err, AgentScopeError::Agent(message) if message == "grumpy refuses"));
}

#[tokio::test]
async fn fanout_keeps_agent_order() {
    let group = agents(&["x", "y", "z"]);

    for concurrent in [true, false] {
        let replies = fanout_pipeline(&group, Some(Msg::user("user", "ping")), concurrent)
            .await
            .unwrap();
        let texts: Vec<String> = replies.iter().map(Msg::text).collect();
        assert_eq!(texts, vec!["x heard: ping", "y heard: ping", "z heard: ping"]);
    }
}

#[tokio::test]
async fn fanout_fails_if_any_agent_fails() {
    let group: Vec<Arc<dyn Agent>> = vec![
        Arc::new(ScriptedAgent::new("ok")),
        Arc::new(ScriptedAgent::failing("bad")),
    ];

    let result = FanoutPipeline::new(group)
        .with_concurrency(false)
        .run(None)
        .await;

    assert!(result.is_err());
}
