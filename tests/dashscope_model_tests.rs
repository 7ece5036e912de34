#![cfg(feature = "dashscope")]

mod common;

use agentscope::error::AgentScopeError;
use agentscope::formatter::{DashScopeChatFormatter, DashScopeMessage, Formatter};
use agentscope::message::{ContentBlock, Msg, Role, Source};
use agentscope::model::dashscope::DashScopeChatModel;
use agentscope::model::{ChatModel, FinishReason, GenerateOptions, ThinkingConfig};
use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEXT_PATH: &str = "/services/aigc/text-generation/generation";
const MULTIMODAL_PATH: &str = "/services/aigc/multimodal-generation/generation";

fn model(server: &MockServer, attempts: u32) -> DashScopeChatModel {
    DashScopeChatModel::new("qwen-max", "test-key")
        .with_base_url(server.uri())
        .with_retry_policy(common::test_retry_policy(attempts))
}

fn text_prompt() -> Vec<DashScopeMessage> {
    DashScopeChatFormatter::new()
        .format(&[Msg::system("be brief"), Msg::user("user", "hi")])
        .unwrap()
}

fn text_reply(request_id: &str, text: &str) -> Value {
    json!({
        "request_id": request_id,
        "output": {"choices": [{
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }]},
        "usage": {"input_tokens": 5, "output_tokens": 1, "total_tokens": 6}
    })
}

#[tokio::test]
async fn text_prompt_uses_text_endpoint_with_flat_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TEXT_PATH))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_reply("req-1", "Hi!")))
        .expect(1)
        .mount(&server)
        .await;

    let options = GenerateOptions::builder()
        .thinking(ThinkingConfig::enabled(Some(256)))
        .build();
    let response = model(&server, 1)
        .call(&text_prompt(), &[], &options)
        .await
        .unwrap();

    assert_eq!(response.id, "req-1");
    assert_eq!(response.content, vec![ContentBlock::text("Hi!")]);
    assert_eq!(response.finish_reason, Some(FinishReason::Stop));
    assert_eq!(response.usage.map(|u| u.total_tokens), Some(6));

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["model"], "qwen-max");
    assert_eq!(
        body["input"]["messages"],
        json!([
            {"role": "system", "content": "be brief"},
            {"role": "user", "content": "hi"}
        ])
    );
    assert_eq!(body["parameters"]["result_format"], "message");
    assert_eq!(body["parameters"]["enable_thinking"], true);
    assert_eq!(body["parameters"]["thinking_budget"], 256);
}

#[tokio::test]
async fn media_prompt_uses_multimodal_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MULTIMODAL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "request_id": "req-2",
            "output": {"choices": [{
                "message": {"role": "assistant", "content": [{"text": "A cat."}]},
                "finish_reason": "stop"
            }]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let prompt = DashScopeChatFormatter::new()
        .format(&[Msg::new(
            "user",
            Role::User,
            vec![
                ContentBlock::text("what is it?"),
                ContentBlock::image(Source::url("https://example.com/cat.png")),
            ],
        )])
        .unwrap();
    let response = model(&server, 1)
        .call(&prompt, &[], &GenerateOptions::default())
        .await
        .unwrap();

    assert_eq!(response.text(), "A cat.");
    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        body["input"]["messages"][0]["content"],
        json!([{"text": "what is it?"}, {"image": "https://example.com/cat.png"}])
    );
}

#[tokio::test]
async fn stream_sends_sse_header_and_accumulates() {
    let server = MockServer::start().await;
    let body = [
        "id:1",
        "event:result",
        r#"data:{"request_id":"req-3","output":{"choices":[{"message":{"role":"assistant","reasoning_content":"hmm","content":""},"finish_reason":"null"}]}}"#,
        "",
        "id:2",
        "event:result",
        r#"data:{"request_id":"req-3","output":{"choices":[{"message":{"role":"assistant","content":"Ni hao"},"finish_reason":"stop"}]},"usage":{"input_tokens":3,"output_tokens":2}}"#,
    ]
    .join("\n");
    Mock::given(method("POST"))
        .and(path(TEXT_PATH))
        .and(header("X-DashScope-SSE", "enable"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .expect(1)
        .mount(&server)
        .await;

    let snapshots: Vec<_> = model(&server, 1)
        .stream(&text_prompt(), &[], &GenerateOptions::default())
        .await
        .unwrap()
        .map(|item| item.unwrap())
        .collect()
        .await;

    assert_eq!(snapshots.len(), 2);
    let last = &snapshots[1];
    assert_eq!(last.id, "req-3");
    assert_eq!(last.text(), "Ni hao");
    assert!(matches!(&last.content[0], ContentBlock::Thinking(t) if t.thinking == "hmm"));
    assert_eq!(last.finish_reason, Some(FinishReason::Stop));

    let requests = server.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(sent["parameters"]["incremental_output"], true);
}

#[tokio::test]
async fn error_code_in_body_is_a_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TEXT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "request_id": "req-4",
            "code": "InvalidParameter",
            "message": "Model not exist."
        })))
        .mount(&server)
        .await;

    let err = model(&server, 1)
        .call(&text_prompt(), &[], &GenerateOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AgentScopeError::Provider { provider, message }
            if provider == "dashscope" && message == "InvalidParameter: Model not exist."
    ));
}

#[tokio::test]
async fn rate_limit_is_retried_then_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TEXT_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string("Throttling"))
        .expect(2)
        .mount(&server)
        .await;

    let err = model(&server, 2)
        .call(&text_prompt(), &[], &GenerateOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, AgentScopeError::RateLimited { retry_after_ms: None }));
}
