//! Command handlers.

use std::io::Write;

use futures::StreamExt;
use serde_json::Value;

use super::{ChatArgs, FormatArgs};
use crate::config::AgentScopeConfig;
use crate::error::Result;
use crate::formatter::{
    DashScopeChatFormatter, DashScopeMultiAgentFormatter, Formatter, GeminiChatFormatter,
    GeminiMultiAgentFormatter, OllamaChatFormatter, OllamaMultiAgentFormatter,
    OpenAiChatFormatter, OpenAiMultiAgentFormatter,
};
use crate::message::Msg;
use crate::model::dashscope::DashScopeChatModel;
use crate::model::gemini::GeminiChatModel;
use crate::model::ollama::OllamaChatModel;
use crate::model::openai::OpenAiChatModel;
use crate::model::{ChatModel, GenerateOptions, Vendor};

fn to_value<F: Formatter>(formatter: F, msgs: &[Msg]) -> Result<Value> {
    Ok(serde_json::to_value(formatter.format(msgs)?)?)
}

/// Format messages for a vendor, as JSON.
pub fn format_messages(vendor: Vendor, multi_agent: bool, msgs: &[Msg]) -> Result<Value> {
    match (vendor, multi_agent) {
        (Vendor::OpenAi, false) => to_value(OpenAiChatFormatter::new(), msgs),
        (Vendor::OpenAi, true) => to_value(OpenAiMultiAgentFormatter::new(), msgs),
        (Vendor::Gemini, false) => to_value(GeminiChatFormatter::new(), msgs),
        (Vendor::Gemini, true) => to_value(GeminiMultiAgentFormatter::new(), msgs),
        (Vendor::Ollama, false) => to_value(OllamaChatFormatter::new(), msgs),
        (Vendor::Ollama, true) => to_value(OllamaMultiAgentFormatter::new(), msgs),
        (Vendor::DashScope, false) => to_value(DashScopeChatFormatter::new(), msgs),
        (Vendor::DashScope, true) => to_value(DashScopeMultiAgentFormatter::new(), msgs),
    }
}

pub fn handle_format(args: &FormatArgs) -> Result<()> {
    let vendor: Vendor = args.vendor.parse()?;
    let raw = std::fs::read_to_string(&args.file)?;
    let msgs: Vec<Msg> = serde_json::from_str(&raw)?;
    let formatted = format_messages(vendor, args.multi_agent, &msgs)?;
    println!("{}", serde_json::to_string_pretty(&formatted)?);
    Ok(())
}

pub async fn handle_chat(args: &ChatArgs, config: &AgentScopeConfig) -> Result<()> {
    let vendor: Vendor = args.vendor.parse()?;
    let model = args.model.as_deref();

    let mut msgs = Vec::new();
    if let Some(system) = &args.system {
        msgs.push(Msg::system(system.clone()));
    }
    msgs.push(Msg::user("user", args.prompt.clone()));

    let options = GenerateOptions {
        temperature: args.temperature,
        max_tokens: args.max_tokens,
        ..Default::default()
    };
    let stream = !args.no_stream;

    match vendor {
        Vendor::OpenAi => {
            let client = OpenAiChatModel::from_config(config, model)?;
            chat(&client, OpenAiChatFormatter::new(), &msgs, &options, stream).await
        }
        Vendor::Gemini => {
            let client = GeminiChatModel::from_config(config, model)?;
            chat(&client, GeminiChatFormatter::new(), &msgs, &options, stream).await
        }
        Vendor::Ollama => {
            let client = OllamaChatModel::from_config(config, model)?;
            chat(&client, OllamaChatFormatter::new(), &msgs, &options, stream).await
        }
        Vendor::DashScope => {
            let client = DashScopeChatModel::from_config(config, model)?;
            chat(&client, DashScopeChatFormatter::new(), &msgs, &options, stream).await
        }
    }
}

async fn chat<M, F>(
    model: &M,
    formatter: F,
    msgs: &[Msg],
    options: &GenerateOptions,
    stream: bool,
) -> Result<()>
where
    M: ChatModel,
    F: Formatter<Output = M::Prompt>,
{
    let prompt = formatter.format(msgs)?;

    if !stream {
        let response = model.call(&prompt, &[], options).await?;
        println!("{}", response.text());
        return Ok(());
    }

    let mut snapshots = model.stream(&prompt, &[], options).await?;
    let mut printed = 0;
    while let Some(snapshot) = snapshots.next().await {
        let text = snapshot?.text();
        if let Some(delta) = text.get(printed..) {
            print!("{delta}");
            let _ = std::io::stdout().flush();
        }
        printed = text.len();
    }
    println!();
    Ok(())
}
