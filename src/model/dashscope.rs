//! Alibaba Cloud DashScope (Qwen) generation client.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::HeaderValue;
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
use crate::formatter::dashscope::DashScopePart;
use crate::formatter::DashScopeMessage;
use crate::tool::ToolSchema;
use crate::util::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com/api/v1";

const TEXT_GENERATION_PATH: &str = "services/aigc/text-generation/generation";
const MULTIMODAL_GENERATION_PATH: &str = "services/aigc/multimodal-generation/generation";

#[derive(Debug, Clone)]
pub struct DashScopeChatModel {
    model: String,
    api_key: String,
    base_url: String,
    retry: RetryPolicy,
}

impl DashScopeChatModel {
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
        let vendor = Vendor::DashScope;
        let model = model.map(str::to_string).unwrap_or_else(|| config.model(vendor));
        let mut client = Self::new(model, config.require_api_key(vendor)?);
        if let Some(url) = config.base_url(vendor) {
            client = client.with_base_url(url);
        }
        Ok(client)
    }

    /// Returns the endpoint path together with the request body.
    fn build_request(
        &self,
        messages: &[DashScopeMessage],
        tools: &[ToolSchema],
        options: &GenerateOptions,
        stream: bool,
    ) -> Result<(&'static str, Value)> {
        let multimodal = messages.iter().any(|msg| !msg.is_text_only());
        let path = if multimodal {
            MULTIMODAL_GENERATION_PATH
        } else {
            TEXT_GENERATION_PATH
        };

        let mut wire_messages = Vec::with_capacity(messages.len());
        for msg in messages {
            let mut value = serde_json::to_value(msg)?;
            if !multimodal {
                value["content"] = json!(flatten_text(&msg.content));
            }
            wire_messages.push(value);
        }

        let mut parameters = Map::new();
        parameters.insert("result_format".into(), json!("message"));
        if stream {
            parameters.insert("incremental_output".into(), json!(true));
        }
        if let Some(max_tokens) = options.max_tokens {
            parameters.insert("max_tokens".into(), json!(max_tokens));
        }
        if let Some(temperature) = options.temperature {
            parameters.insert("temperature".into(), json!(temperature));
        }
        if let Some(top_p) = options.top_p {
            parameters.insert("top_p".into(), json!(top_p));
        }
        if let Some(top_k) = options.top_k {
            parameters.insert("top_k".into(), json!(top_k));
        }
        if let Some(stop) = &options.stop {
            parameters.insert("stop".into(), json!(stop));
        }
        if let Some(seed) = options.seed {
            parameters.insert("seed".into(), json!(seed));
        }
        if !tools.is_empty() {
            let tools: Vec<Value> = tools.iter().map(ToolSchema::to_function_tool).collect();
            parameters.insert("tools".into(), Value::Array(tools));
            if let Some(choice) = &options.tool_choice {
                parameters.insert("tool_choice".into(), choice.to_function_choice());
            }
        }
        if let Some(thinking) = options.thinking {
            parameters.insert("enable_thinking".into(), json!(thinking.enabled));
            if let Some(budget) = thinking.budget_tokens.filter(|_| thinking.enabled) {
                parameters.insert("thinking_budget".into(), json!(budget));
            }
        }

        let body = json!({
            "model": self.model,
            "input": {"messages": wire_messages},
            "parameters": parameters,
        });
        Ok((path, body))
    }

    async fn post(&self, path: &str, body: &Value, stream: bool) -> Result<reqwest::Response> {
        let url = join_url(&self.base_url, path);
        let mut headers = bearer_headers(&self.api_key);
        if stream {
            headers.insert("X-DashScope-SSE", HeaderValue::from_static("enable"));
        }
        self.retry
            .execute(|| send_checked(shared_client().post(&url).headers(headers.clone()).json(body)))
            .await
    }
}

fn flatten_text(parts: &[DashScopePart]) -> String {
    parts
        .iter()
        .filter_map(|part| match part {
            DashScopePart::Text(text) => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn absorb(acc: &mut StreamAccumulator, data: GenerationResponse) -> Result<()> {
    if let Some(code) = data.code.filter(|code| !code.is_empty()) {
        return Err(AgentScopeError::Provider {
            provider: Vendor::DashScope.to_string(),
            message: format!("{code}: {}", data.message.unwrap_or_default()),
        });
    }
    if let Some(id) = data.request_id {
        acc.set_id(id);
    }
    let Some(output) = data.output else {
        return Ok(());
    };
    for choice in output.choices {
        if let Some(reasoning) = choice.message.reasoning_content {
            acc.push_thinking(&reasoning);
        }
        match choice.message.content {
            Some(ResponseContent::Text(text)) => acc.push_text(&text),
            Some(ResponseContent::Parts(parts)) => {
                for part in parts {
                    if let Some(text) = part.text {
                        acc.push_text(&text);
                    }
                }
            }
            None => {}
        }
        for (position, call) in choice.message.tool_calls.unwrap_or_default().into_iter().enumerate() {
            let function = call.function.unwrap_or_default();
            acc.push_tool_fragment(
                call.index.unwrap_or(position as u32),
                call.id.as_deref(),
                function.name.as_deref(),
                function.arguments.as_deref().unwrap_or_default(),
            );
        }
        if let Some(reason) = choice.finish_reason.as_deref().and_then(parse_finish_reason) {
            acc.set_finish_reason(reason);
        }
    }
    if let Some(usage) = data.usage {
        acc.set_usage(usage.into());
    }
    Ok(())
}

fn parse_finish_reason(s: &str) -> Option<FinishReason> {
    match s {
        "stop" => Some(FinishReason::Stop),
        "length" => Some(FinishReason::Length),
        "tool_calls" => Some(FinishReason::ToolCalls),
        _ => None,
    }
}

#[async_trait]
impl ChatModel for DashScopeChatModel {
    type Prompt = Vec<DashScopeMessage>;

    fn provider_name(&self) -> &str {
        Vendor::DashScope.as_str()
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
        let (path, body) = self.build_request(prompt, tools, options, false)?;
        debug!(model = self.model.as_str(), path, "DashScope call");

        let resp = self.post(path, &body, false).await?;
        let data: GenerationResponse = resp.json().await?;
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
        let (path, body) = self.build_request(prompt, tools, options, true)?;
        debug!(model = self.model.as_str(), path, "DashScope stream");

        let resp = self.post(path, &body, true).await?;
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
                let chunk: GenerationResponse = match serde_json::from_str(data) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        debug!(error = %e, "Skipping unparseable DashScope chunk");
                        continue;
                    }
                };
                if let Err(e) = absorb(&mut acc, chunk) {
                    yield Err(e);
                    return;
                }
                yield Ok(acc.snapshot());
            }
        };

        Ok(Box::pin(stream))
    }
}

#[derive(Deserialize)]
struct GenerationResponse {
    request_id: Option<String>,
    output: Option<GenerationOutput>,
    usage: Option<DashScopeUsage>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct GenerationOutput {
    #[serde(default)]
    choices: Vec<GenerationChoice>,
}

#[derive(Deserialize)]
struct GenerationChoice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<ResponseContent>,
    reasoning_content: Option<String>,
    tool_calls: Option<Vec<ResponseToolCall>>,
}

/// Text endpoints return a string, multimodal endpoints a list of parts.
#[derive(Deserialize)]
#[serde(untagged)]
enum ResponseContent {
    Text(String),
    Parts(Vec<ResponsePart>),
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ResponseToolCall {
    index: Option<u32>,
    id: Option<String>,
    function: Option<ResponseFunction>,
}

#[derive(Deserialize, Default)]
struct ResponseFunction {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Deserialize)]
struct DashScopeUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
    total_tokens: Option<u32>,
}

impl From<DashScopeUsage> for ChatUsage {
    fn from(u: DashScopeUsage) -> Self {
        let mut usage = ChatUsage::new(u.input_tokens, u.output_tokens);
        if let Some(total) = u.total_tokens {
            usage.total_tokens = total;
        }
        usage
    }
}
