//! Typed vendor identifiers and alias handling.

use std::fmt;
use std::str::FromStr;

use crate::error::AgentScopeError;

/// The model vendors this crate can format for and talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vendor {
    OpenAi,
    Gemini,
    Ollama,
    DashScope,
}

impl Vendor {
    pub const ALL: [Vendor; 4] = [Self::OpenAi, Self::Gemini, Self::Ollama, Self::DashScope];

    /// Canonical vendor key string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
            Self::DashScope => "dashscope",
        }
    }

    /// Parse user-facing aliases into a typed vendor.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "gemini" | "google" => Some(Self::Gemini),
            "ollama" => Some(Self::Ollama),
            "dashscope" | "qwen" | "aliyun" => Some(Self::DashScope),
            _ => None,
        }
    }

    /// Model used when none is configured.
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Gemini => "gemini-2.5-flash",
            Self::Ollama => "qwen3",
            Self::DashScope => "qwen-max",
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vendor {
    type Err = AgentScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| AgentScopeError::Configuration(format!("unknown vendor: {s}")))
    }
}
