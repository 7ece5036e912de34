//! Ollama `/api/chat` client.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::http::{join_url, json_headers, line_stream, send_checked, shared_client};
use super::{
    ChatModel, ChatResponse, ChatStream, ChatUsage, FinishReason, GenerateOptions,
    StreamAccumulator, Vendor,
};
use crate::config::AgentScopeConfig;
use crate::error::{AgentScopeError, Result};
use crate::formatter::ollama::OllamaToolCall;
use crate::formatter::OllamaMessage;
use crate::message::ToolUseBlock;
use crate::tool::ToolSchema;
use crate::util::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Local Ollama server. No authentication.
#[derive(Debug, Clone)]
pub struct OllamaChatModel {
    model: String,
    base_url: String,
    retry: RetryPolicy,
    keep_alive: Option<String>,
}

impl OllamaChatModel {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryPolicy::default(),
            keep_alive: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// How long the server keeps the model loaded (e.g. "5m").
    pub fn with_keep_alive(mut self, keep_alive: impl Into<String>) -> Self {
        self.keep_alive = Some(keep_alive.into());
        self
    }

    pub fn from_config(config: &AgentScopeConfig, model: Option<&str>) -> Result<Self> {
        let vendor = Vendor::Ollama;
        let model = model.map(str::to_string).unwrap_or_else(|| config.model(vendor));
        let mut client = Self::new(model);
        if let Some(url) = config.base_url(vendor) {
            client = client.with_base_url(url);
        }
        Ok(client)
    }

    fn build_request_body(
        &self,
        messages: &[OllamaMessage],
        tools: &[ToolSchema],
        options: &GenerateOptions,
        stream: bool,
    ) -> Result<Value> {
        let mut body = Map::new();
        body.insert("model".into(), json!(self.model));
        body.insert("messages".into(), serde_json::to_value(messages)?);
        body.insert("stream".into(), json!(stream));

        if !tools.is_empty() {
            let tools: Vec<Value> = tools.iter().map(ToolSchema::to_function_tool).collect();
            body.insert("tools".into(), Value::Array(tools));
        }
        if options.tool_choice.is_some() {
            debug!("Ollama has no tool_choice; ignored");
        }

        let mut model_options = Map::new();
        if let Some(temperature) = options.temperature {
            model_options.insert("temperature".into(), json!(temperature));
        }
        if let Some(top_p) = options.top_p {
            model_options.insert("top_p".into(), json!(top_p));
        }
        if let Some(top_k) = options.top_k {
            model_options.insert("top_k".into(), json!(top_k));
        }
        if let Some(max_tokens) = options.max_tokens {
            model_options.insert("num_predict".into(), json!(max_tokens));
        }
        if let Some(stop) = &options.stop {
            model_options.insert("stop".into(), json!(stop));
        }
        if let Some(seed) = options.seed {
            model_options.insert("seed".into(), json!(seed));
        }
        if !model_options.is_empty() {
            body.insert("options".into(), Value::Object(model_options));
        }

        if let Some(thinking) = options.thinking {
            body.insert("think".into(), json!(thinking.enabled));
        }
        if let Some(keep_alive) = &self.keep_alive {
            body.insert("keep_alive".into(), json!(keep_alive));
        }

        Ok(Value::Object(body))
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response> {
        let url = join_url(&self.base_url, "api/chat");
        self.retry
            .execute(|| send_checked(shared_client().post(&url).headers(json_headers()).json(body)))
            .await
    }
}

fn absorb(acc: &mut StreamAccumulator, chunk: ChatChunk) -> Result<()> {
    if let Some(error) = chunk.error {
        return Err(AgentScopeError::Provider {
            provider: Vendor::Ollama.to_string(),
            message: error,
        });
    }
    if let Some(message) = chunk.message {
        if let Some(thinking) = message.thinking {
            acc.push_thinking(&thinking);
        }
        acc.push_text(&message.content);
        for call in message.tool_calls.unwrap_or_default() {
            let input = match call.function.arguments {
                Value::Null => json!({}),
                other => other,
            };
            acc.push_tool_call(ToolUseBlock::new(String::new(), call.function.name, input));
        }
    }
    if chunk.done {
        let reason = match chunk.done_reason.as_deref() {
            Some("length") => FinishReason::Length,
            _ if acc.has_tool_calls() => FinishReason::ToolCalls,
            _ => FinishReason::Stop,
        };
        acc.set_finish_reason(reason);
        acc.set_usage(ChatUsage::new(
            chunk.prompt_eval_count.unwrap_or(0),
            chunk.eval_count.unwrap_or(0),
        ));
    }
    Ok(())
}

#[async_trait]
impl ChatModel for OllamaChatModel {
    type Prompt = Vec<OllamaMessage>;

    fn provider_name(&self) -> &str {
        Vendor::Ollama.as_str()
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn call(
        &self,
        prompt: &Self::Prompt,
        tools: &[ToolSchema],
        options: &GenerateOptions,
    ) -> Result<ChatResponse> {
        let body = self.build_request_body(prompt, tools, options, false)?;
        debug!(model = self.model.as_str(), "Ollama call");

        let resp = self.post(&body).await?;
        let data: ChatChunk = resp.json().await?;
        let mut acc = StreamAccumulator::new();
        absorb(&mut acc, data)?;
        Ok(acc.snapshot())
    }

    async fn stream(
        &self,
        prompt: &Self::Prompt,
        tools: &[ToolSchema],
        options: &GenerateOptions,
    ) -> Result<ChatStream> {
        let body = self.build_request_body(prompt, tools, options, true)?;
        debug!(model = self.model.as_str(), "Ollama stream");

        let resp = self.post(&body).await?;
        let mut lines = line_stream(resp);

        let stream = async_stream::stream! {
            let mut acc = StreamAccumulator::new();
            while let Some(line) = lines.next().await {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                let chunk: ChatChunk = match serde_json::from_str(&line) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        warn!(error = %e, "Skipping unparseable Ollama line");
                        continue;
                    }
                };
                let done = chunk.done;
                if let Err(e) = absorb(&mut acc, chunk) {
                    yield Err(e);
                    return;
                }
                yield Ok(acc.snapshot());
                if done {
                    return;
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[derive(Deserialize)]
struct ChatChunk {
    message: Option<ResponseMessage>,
    #[serde(default)]
    done: bool,
    done_reason: Option<String>,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
    thinking: Option<String>,
    tool_calls: Option<Vec<OllamaToolCall>>,
}
