//! Google Gemini `generateContent` client.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::http::{goog_headers, join_url, line_stream, parse_sse_data, send_checked, shared_client};
use super::{
    ChatModel, ChatResponse, ChatStream, ChatUsage, FinishReason, GenerateOptions,
    StreamAccumulator, ToolChoice, Vendor,
};
use crate::config::AgentScopeConfig;
use crate::error::{AgentScopeError, Result};
use crate::formatter::gemini::{GeminiContent, GeminiMessageConverter};
use crate::formatter::GeminiPrompt;
use crate::tool::ToolSchema;
use crate::util::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct GeminiChatModel {
    model: String,
    api_key: String,
    base_url: String,
    retry: RetryPolicy,
    converter: GeminiMessageConverter,
}

impl GeminiChatModel {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryPolicy::default(),
            converter: GeminiMessageConverter,
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
        let vendor = Vendor::Gemini;
        let model = model.map(str::to_string).unwrap_or_else(|| config.model(vendor));
        let mut client = Self::new(model, config.require_api_key(vendor)?);
        if let Some(url) = config.base_url(vendor) {
            client = client.with_base_url(url);
        }
        Ok(client)
    }

    fn build_request_body(
        &self,
        prompt: &GeminiPrompt,
        tools: &[ToolSchema],
        options: &GenerateOptions,
    ) -> Result<Value> {
        let mut body = match serde_json::to_value(prompt)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        if !tools.is_empty() {
            let declarations: Vec<Value> = tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    })
                })
                .collect();
            body.insert("tools".into(), json!([{"functionDeclarations": declarations}]));
            if let Some(choice) = &options.tool_choice {
                body.insert(
                    "toolConfig".into(),
                    json!({"functionCallingConfig": function_calling_config(choice)}),
                );
            }
        }

        let mut config = Map::new();
        if let Some(max_tokens) = options.max_tokens {
            config.insert("maxOutputTokens".into(), json!(max_tokens));
        }
        if let Some(temperature) = options.temperature {
            config.insert("temperature".into(), json!(temperature));
        }
        if let Some(top_p) = options.top_p {
            config.insert("topP".into(), json!(top_p));
        }
        if let Some(top_k) = options.top_k {
            config.insert("topK".into(), json!(top_k));
        }
        if let Some(stop) = &options.stop {
            config.insert("stopSequences".into(), json!(stop));
        }
        if let Some(seed) = options.seed {
            config.insert("seed".into(), json!(seed));
        }
        if let Some(thinking) = options.thinking {
            let mut thinking_config = Map::new();
            thinking_config.insert("includeThoughts".into(), json!(thinking.enabled));
            match (thinking.enabled, thinking.budget_tokens) {
                (true, Some(budget)) => {
                    thinking_config.insert("thinkingBudget".into(), json!(budget));
                }
                (false, _) => {
                    thinking_config.insert("thinkingBudget".into(), json!(0));
                }
                _ => {}
            }
            config.insert("thinkingConfig".into(), Value::Object(thinking_config));
        }
        if !config.is_empty() {
            body.insert("generationConfig".into(), Value::Object(config));
        }

        Ok(Value::Object(body))
    }

    async fn post(&self, method: &str, body: &Value) -> Result<reqwest::Response> {
        let url = join_url(&self.base_url, &format!("models/{}:{method}", self.model));
        self.retry
            .execute(|| {
                send_checked(
                    shared_client()
                        .post(&url)
                        .headers(goog_headers(&self.api_key))
                        .json(body),
                )
            })
            .await
    }

    fn absorb(&self, acc: &mut StreamAccumulator, chunk: GenerateResponse) {
        if let Some(id) = chunk.response_id {
            acc.set_id(id);
        }
        if let Some(candidate) = chunk.candidates.into_iter().next() {
            if let Some(content) = candidate.content {
                for block in self.converter.parts_to_blocks(&content.parts) {
                    acc.push_block(block);
                }
            }
            if let Some(reason) = candidate.finish_reason.as_deref().and_then(parse_finish_reason) {
                let reason = if reason == FinishReason::Stop && acc.has_tool_calls() {
                    FinishReason::ToolCalls
                } else {
                    reason
                };
                acc.set_finish_reason(reason);
            }
        }
        if let Some(usage) = chunk.usage_metadata {
            acc.set_usage(usage.into());
        }
    }
}

fn function_calling_config(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!({"mode": "AUTO"}),
        ToolChoice::None => json!({"mode": "NONE"}),
        ToolChoice::Required => json!({"mode": "ANY"}),
        ToolChoice::Function(name) => json!({"mode": "ANY", "allowedFunctionNames": [name]}),
    }
}

fn parse_finish_reason(s: &str) -> Option<FinishReason> {
    match s {
        "STOP" => Some(FinishReason::Stop),
        "MAX_TOKENS" => Some(FinishReason::Length),
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" => {
            Some(FinishReason::ContentFilter)
        }
        "MALFORMED_FUNCTION_CALL" => Some(FinishReason::Error),
        _ => None,
    }
}

#[async_trait]
impl ChatModel for GeminiChatModel {
    type Prompt = GeminiPrompt;

    fn provider_name(&self) -> &str {
        Vendor::Gemini.as_str()
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
        let body = self.build_request_body(prompt, tools, options)?;
        debug!(model = self.model.as_str(), "Gemini call");

        let resp = self.post("generateContent", &body).await?;
        let data: GenerateResponse = resp.json().await?;
        if data.candidates.is_empty() {
            return Err(AgentScopeError::api(200, "No candidates in Gemini response"));
        }

        let mut acc = StreamAccumulator::new();
        self.absorb(&mut acc, data);
        Ok(acc.snapshot())
    }

    async fn stream(
        &self,
        prompt: &Self::Prompt,
        tools: &[ToolSchema],
        options: &GenerateOptions,
    ) -> Result<ChatStream> {
        let body = self.build_request_body(prompt, tools, options)?;
        debug!(model = self.model.as_str(), "Gemini stream");

        let resp = self.post("streamGenerateContent?alt=sse", &body).await?;
        let mut lines = line_stream(resp);
        let this = self.clone();

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
                match serde_json::from_str::<GenerateResponse>(data) {
                    Ok(chunk) => {
                        this.absorb(&mut acc, chunk);
                        yield Ok(acc.snapshot());
                    }
                    Err(e) => debug!(error = %e, "Skipping unparseable Gemini chunk"),
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    response_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    thoughts_token_count: u32,
    total_token_count: Option<u32>,
}

impl From<UsageMetadata> for ChatUsage {
    fn from(u: UsageMetadata) -> Self {
        let mut usage = ChatUsage::new(
            u.prompt_token_count,
            u.candidates_token_count + u.thoughts_token_count,
        );
        if let Some(total) = u.total_token_count {
            usage.total_tokens = total;
        }
        usage
    }
}
