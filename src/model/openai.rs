//! OpenAI Chat Completions client.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::http::{bearer_headers, join_url, line_stream, parse_sse_data, send_checked, shared_client};
use super::{
    ChatModel, ChatResponse, ChatStream, ChatUsage, FinishReason, GenerateOptions,
    StreamAccumulator, Vendor,
};
use crate::config::AgentScopeConfig;
use crate::error::{AgentScopeError, Result};
use crate::formatter::OpenAiMessage;
use crate::tool::ToolSchema;
use crate::util::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Talks to `/chat/completions` on OpenAI or any compatible server.
#[derive(Debug, Clone)]
pub struct OpenAiChatModel {
    model: String,
    api_key: String,
    base_url: String,
    retry: RetryPolicy,
}

impl OpenAiChatModel {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryPolicy::default(),
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

    pub fn from_config(config: &AgentScopeConfig, model: Option<&str>) -> Result<Self> {
        let vendor = Vendor::OpenAi;
        let model = model.map(str::to_string).unwrap_or_else(|| config.model(vendor));
        let mut client = Self::new(model, config.require_api_key(vendor)?);
        if let Some(url) = config.base_url(vendor) {
            client = client.with_base_url(url);
        }
        Ok(client)
    }

    fn build_request_body(
        &self,
        messages: &[OpenAiMessage],
        tools: &[ToolSchema],
        options: &GenerateOptions,
        stream: bool,
    ) -> Result<Value> {
        let mut body = Map::new();
        body.insert("model".into(), json!(self.model));
        body.insert("messages".into(), serde_json::to_value(messages)?);

        if stream {
            body.insert("stream".into(), json!(true));
            body.insert("stream_options".into(), json!({"include_usage": true}));
        }
        if let Some(max_tokens) = options.max_tokens {
            body.insert("max_tokens".into(), json!(max_tokens));
        }
        if let Some(temperature) = options.temperature {
            body.insert("temperature".into(), json!(temperature));
        }
        if let Some(top_p) = options.top_p {
            body.insert("top_p".into(), json!(top_p));
        }
        if let Some(stop) = &options.stop {
            body.insert("stop".into(), json!(stop));
        }
        if let Some(seed) = options.seed {
            body.insert("seed".into(), json!(seed));
        }
        if options.top_k.is_some() || options.thinking.is_some() {
            debug!("top_k and thinking are not supported by chat completions; ignored");
        }

        if !tools.is_empty() {
            let tools: Vec<Value> = tools.iter().map(ToolSchema::to_function_tool).collect();
            body.insert("tools".into(), Value::Array(tools));
            if let Some(choice) = &options.tool_choice {
                body.insert("tool_choice".into(), choice.to_function_choice());
            }
        }

        Ok(Value::Object(body))
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response> {
        let url = join_url(&self.base_url, "chat/completions");
        self.retry
            .execute(|| {
                send_checked(
                    shared_client()
                        .post(&url)
                        .headers(bearer_headers(&self.api_key))
                        .json(body),
                )
            })
            .await
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    type Prompt = Vec<OpenAiMessage>;

    fn provider_name(&self) -> &str {
        Vendor::OpenAi.as_str()
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
        debug!(model = self.model.as_str(), "OpenAI call");

        let resp = self.post(&body).await?;
        let data: CompletionResponse = resp.json().await?;
        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentScopeError::api(200, "No choices in OpenAI response"))?;

        let mut acc = StreamAccumulator::new();
        if let Some(id) = data.id {
            acc.set_id(id);
        }
        if let Some(reasoning) = choice.message.reasoning_content {
            acc.push_thinking(&reasoning);
        }
        if let Some(content) = choice.message.content {
            acc.push_text(&content);
        }
        for (index, call) in choice.message.tool_calls.unwrap_or_default().into_iter().enumerate() {
            acc.push_tool_fragment(
                index as u32,
                Some(&call.id),
                Some(&call.function.name),
                &call.function.arguments,
            );
        }
        if let Some(reason) = choice.finish_reason.as_deref().and_then(parse_finish_reason) {
            acc.set_finish_reason(reason);
        }
        if let Some(usage) = data.usage {
            acc.set_usage(usage.into());
        }
        Ok(acc.snapshot())
    }

    async fn stream(
        &self,
        prompt: &Self::Prompt,
        tools: &[ToolSchema],
        options: &GenerateOptions,
    ) -> Result<ChatStream> {
        let body = self.build_request_body(prompt, tools, options, true)?;
        debug!(model = self.model.as_str(), "OpenAI stream");

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
                let Some(data) = parse_sse_data(&line) else {
                    continue;
                };
                let chunk: StreamChunk = match serde_json::from_str(data) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        debug!(error = %e, "Skipping unparseable OpenAI chunk");
                        continue;
                    }
                };

                if let Some(id) = chunk.id {
                    acc.set_id(id);
                }
                for choice in chunk.choices {
                    if let Some(reasoning) = choice.delta.reasoning_content {
                        acc.push_thinking(&reasoning);
                    }
                    if let Some(content) = choice.delta.content {
                        acc.push_text(&content);
                    }
                    for call in choice.delta.tool_calls.unwrap_or_default() {
                        let function = call.function.unwrap_or_default();
                        acc.push_tool_fragment(
                            call.index,
                            call.id.as_deref(),
                            function.name.as_deref(),
                            function.arguments.as_deref().unwrap_or_default(),
                        );
                    }
                    if let Some(reason) = choice.finish_reason.as_deref().and_then(parse_finish_reason) {
                        acc.set_finish_reason(reason);
                    }
                }
                if let Some(usage) = chunk.usage {
                    acc.set_usage(usage.into());
                }
                yield Ok(acc.snapshot());
            }
        };

        Ok(Box::pin(stream))
    }
}

fn parse_finish_reason(s: &str) -> Option<FinishReason> {
    match s {
        "stop" => Some(FinishReason::Stop),
        "length" => Some(FinishReason::Length),
        "tool_calls" | "function_call" => Some(FinishReason::ToolCalls),
        "content_filter" => Some(FinishReason::ContentFilter),
        _ => None,
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    id: Option<String>,
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    reasoning_content: Option<String>,
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Deserialize)]
struct ResponseToolCall {
    id: String,
    function: ResponseFunction,
}

#[derive(Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: Option<u32>,
}

impl From<OpenAiUsage> for ChatUsage {
    fn from(u: OpenAiUsage) -> Self {
        let mut usage = ChatUsage::new(u.prompt_tokens, u.completion_tokens);
        if let Some(total) = u.total_tokens {
            usage.total_tokens = total;
        }
        usage
    }
}

#[derive(Deserialize)]
struct StreamChunk {
    id: Option<String>,
    #[serde(default)]
    choices: Vec<StreamChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
    reasoning_content: Option<String>,
    tool_calls: Option<Vec<StreamToolCall>>,
}

#[derive(Deserialize)]
struct StreamToolCall {
    #[serde(default)]
    index: u32,
    id: Option<String>,
    function: Option<StreamFunction>,
}

#[derive(Deserialize, Default)]
struct StreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::{Formatter, OpenAiChatFormatter};
    use crate::message::Msg;
    use crate::model::ToolChoice;

    #[test]
    fn request_body_carries_options_and_tools() {
        let model = OpenAiChatModel::new("gpt-4o", "sk");
        let prompt = OpenAiChatFormatter::new()
            .format(&[Msg::user("user", "hi")])
            .unwrap();
        let tools = vec![ToolSchema::new("f", "does f", json!({"type": "object"}))];
        let options = GenerateOptions::builder()
            .max_tokens(64)
            .temperature(0.2)
            .tool_choice(ToolChoice::Function("f".into()))
            .build();

        let body = model.build_request_body(&prompt, &tools, &options, true).unwrap();

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 64);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(body["tools"][0]["function"]["name"], "f");
        assert_eq!(body["tool_choice"]["function"]["name"], "f");
    }

    #[test]
    fn tool_choice_omitted_without_tools() {
        let model = OpenAiChatModel::new("gpt-4o", "sk");
        let options = GenerateOptions::builder().tool_choice(ToolChoice::Required).build();
        let body = model.build_request_body(&[], &[], &options, false).unwrap();
        assert!(body.get("tool_choice").is_none());
        assert!(body.get("stream").is_none());
    }
}
