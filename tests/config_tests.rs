//! Config files driving real model clients.
#![cfg(feature = "all-vendors")]

use std::io::Write;

use agentscope::config::AgentScopeConfig;
use agentscope::error::AgentScopeError;
use agentscope::formatter::{Formatter, OllamaChatFormatter, OpenAiChatFormatter};
use agentscope::message::Msg;
use agentscope::model::dashscope::DashScopeChatModel;
use agentscope::model::gemini::GeminiChatModel;
use agentscope::model::ollama::OllamaChatModel;
use agentscope::model::openai::OpenAiChatModel;
use agentscope::model::{ChatModel, GenerateOptions, Vendor};
use serde_json::json;
use tempfile::NamedTempFile;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn openai_client_follows_config_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer from-file"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "c",
            "choices": [{"message": {"content": "configured"}, "finish_reason": "stop"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let file = config_file(&format!(
        "[vendors.openai]\napi_key = \"from-file\"\nbase_url = \"{}/v1/\"\nmodel = \"gpt-test\"\n",
        server.uri()
    ));
    let config = AgentScopeConfig::from_file(file.path()).unwrap();
    let model = OpenAiChatModel::from_config(&config, None).unwrap();
    assert_eq!(model.model_name(), "gpt-test");

    let prompt = OpenAiChatFormatter::new().format(&[Msg::user("user", "hi")]).unwrap();
    let response = model.call(&prompt, &[], &GenerateOptions::default()).await.unwrap();
    assert_eq!(response.text(), "configured");
}

#[tokio::test]
async fn ollama_needs_no_key_and_accepts_bare_host() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"role": "assistant", "content": "local"},
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = AgentScopeConfig::new();
    let host = server.uri().trim_start_matches("http://").to_string();
    config.apply_env(|var| (var == "OLLAMA_HOST").then(|| host.clone()));

    let model = OllamaChatModel::from_config(&config, Some("llama3.2")).unwrap();
    assert_eq!(model.model_name(), "llama3.2");

    let prompt = OllamaChatFormatter::new().format(&[Msg::user("user", "hi")]).unwrap();
    let response = model.call(&prompt, &[], &GenerateOptions::default()).await.unwrap();
    assert_eq!(response.text(), "local");
}

#[test]
fn keyed_vendors_require_a_key() {
    let config = AgentScopeConfig::new();

    let err = GeminiChatModel::from_config(&config, None).unwrap_err();
    assert!(matches!(err, AgentScopeError::Configuration(message) if message.contains("GEMINI_API_KEY")));

    let err = DashScopeChatModel::from_config(&config, None).unwrap_err();
    assert!(matches!(err, AgentScopeError::Configuration(message) if message.contains("DASHSCOPE_API_KEY")));

    config.set_api_key(Vendor::DashScope, "sk-ds");
    let model = DashScopeChatModel::from_config(&config, None).unwrap();
    assert_eq!(model.model_name(), "qwen-max");
    assert_eq!(model.provider_name(), "dashscope");
}
