//! Command-line interface.

pub mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// agentscope CLI
#[derive(Parser, Debug)]
#[command(name = "agentscope", version, about = "Format transcripts for model vendors and chat with them")]
pub struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the vendor prompt for a JSON file of messages
    Format(FormatArgs),
    /// Send a prompt to a model
    Chat(ChatArgs),
}

/// Arguments for `agentscope format`.
#[derive(Parser, Debug)]
pub struct FormatArgs {
    /// Vendor to format for (openai, gemini, ollama, dashscope)
    #[arg(short, long)]
    pub vendor: String,

    /// Flatten plain messages into a single history turn
    #[arg(long)]
    pub multi_agent: bool,

    /// JSON file holding an array of messages
    pub file: PathBuf,
}

/// Arguments for `agentscope chat`.
#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// Vendor to talk to
    #[arg(short, long, default_value = "openai")]
    pub vendor: String,

    /// Model name (defaults to the configured or built-in model)
    #[arg(short, long)]
    pub model: Option<String>,

    /// System prompt
    #[arg(short, long)]
    pub system: Option<String>,

    /// Temperature
    #[arg(short, long)]
    pub temperature: Option<f64>,

    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Disable streaming output
    #[arg(long)]
    pub no_stream: bool,

    /// User prompt
    pub prompt: String,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
