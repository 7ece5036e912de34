//! Configuration system (layered: code > env > config file).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, RwLock};

use serde::Deserialize;
use tracing::debug;

use crate::error::{AgentScopeError, Result};
use crate::model::Vendor;

/// Global default config (lazy-initialized from env and the user config file).
static DEFAULT_CONFIG: OnceLock<AgentScopeConfig> = OnceLock::new();

/// API keys, base URLs and default models per vendor.
///
/// Resolution order:
/// 1. Values set in code (`set_api_key`, `set_base_url`, `set_model`)
/// 2. Environment variables (a `.env` file is loaded first if present)
/// 3. The TOML config file
#[derive(Debug, Clone, Default)]
pub struct AgentScopeConfig {
    api_keys: Arc<RwLock<HashMap<Vendor, String>>>,
    base_urls: Arc<RwLock<HashMap<Vendor, String>>>,
    models: Arc<RwLock<HashMap<Vendor, String>>>,
}

/// On-disk layout:
///
/// ```toml
/// [vendors.openai]
/// api_key = "sk-..."
/// base_url = "https://api.openai.com/v1"
/// model = "gpt-4o-mini"
/// ```
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    vendors: HashMap<String, VendorSection>,
}

#[derive(Debug, Default, Deserialize)]
struct VendorSection {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
}

const API_KEY_VARS: [(&str, Vendor); 4] = [
    ("OPENAI_API_KEY", Vendor::OpenAi),
    ("GOOGLE_API_KEY", Vendor::Gemini),
    ("GEMINI_API_KEY", Vendor::Gemini),
    ("DASHSCOPE_API_KEY", Vendor::DashScope),
];

const BASE_URL_VARS: [(&str, Vendor); 5] = [
    ("OPENAI_BASE_URL", Vendor::OpenAi),
    ("GEMINI_BASE_URL", Vendor::Gemini),
    ("DASHSCOPE_BASE_URL", Vendor::DashScope),
    ("OLLAMA_HOST", Vendor::Ollama),
    ("OLLAMA_BASE_URL", Vendor::Ollama),
];

impl AgentScopeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment only (`.env` included).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let config = Self::new();
        config.apply_env(|var| std::env::var(var).ok());
        config
    }

    /// A TOML file only.
    pub fn from_file(path: &Path) -> Result<Self> {
        let config = Self::new();
        config.apply_file(path)?;
        Ok(config)
    }

    /// Config file (explicit path, or the user config file when it exists)
    /// overlaid with the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();
        let config = Self::new();
        match path {
            Some(path) => config.apply_file(path)?,
            None => {
                if let Some(default) = Self::default_path().filter(|p| p.is_file()) {
                    config.apply_file(&default)?;
                }
            }
        }
        config.apply_env(|var| std::env::var(var).ok());
        Ok(config)
    }

    /// `config.toml` inside the platform config directory.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "agentscope")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get (or create) the global default config. A broken config file is
    /// logged and ignored.
    pub fn global() -> &'static AgentScopeConfig {
        DEFAULT_CONFIG.get_or_init(|| {
            Self::load(None).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Ignoring unreadable config file");
                Self::from_env()
            })
        })
    }

    /// Overlay values from an environment lookup.
    pub fn apply_env(&self, lookup: impl Fn(&str) -> Option<String>) {
        for (var, vendor) in API_KEY_VARS {
            if let Some(key) = lookup(var).filter(|v| !v.is_empty()) {
                self.set_api_key(vendor, key);
            }
        }
        for (var, vendor) in BASE_URL_VARS {
            if let Some(url) = lookup(var).filter(|v| !v.is_empty()) {
                self.set_base_url(vendor, normalize_base_url(&url));
            }
        }
    }

    fn apply_file(&self, path: &Path) -> Result<()> {
        let raw = std::fs::read_to_string(path)?;
        let file: FileConfig = toml::from_str(&raw)?;
        debug!(path = %path.display(), "Loaded config file");

        for (name, section) in file.vendors {
            let vendor = Vendor::parse(&name).ok_or_else(|| {
                AgentScopeError::Configuration(format!("unknown vendor '{name}' in config file"))
            })?;
            if let Some(key) = section.api_key {
                self.set_api_key(vendor, key);
            }
            if let Some(url) = section.base_url {
                self.set_base_url(vendor, normalize_base_url(&url));
            }
            if let Some(model) = section.model {
                self.set_model(vendor, model);
            }
        }
        Ok(())
    }

    pub fn set_api_key(&self, vendor: Vendor, key: impl Into<String>) {
        write(&self.api_keys).insert(vendor, key.into());
    }

    pub fn api_key(&self, vendor: Vendor) -> Option<String> {
        read(&self.api_keys).get(&vendor).cloned()
    }

    /// API key or a configuration error naming the variable to set.
    pub fn require_api_key(&self, vendor: Vendor) -> Result<String> {
        self.api_key(vendor).ok_or_else(|| {
            let var = API_KEY_VARS
                .iter()
                .rev()
                .find(|(_, v)| *v == vendor)
                .map(|(var, _)| *var)
                .unwrap_or("an API key");
            AgentScopeError::Configuration(format!("no API key for {vendor}; set {var}"))
        })
    }

    pub fn set_base_url(&self, vendor: Vendor, url: impl Into<String>) {
        write(&self.base_urls).insert(vendor, url.into());
    }

    pub fn base_url(&self, vendor: Vendor) -> Option<String> {
        read(&self.base_urls).get(&vendor).cloned()
    }

    pub fn set_model(&self, vendor: Vendor, model: impl Into<String>) {
        write(&self.models).insert(vendor, model.into());
    }

    /// Configured model, falling back to the vendor default.
    pub fn model(&self, vendor: Vendor) -> String {
        read(&self.models)
            .get(&vendor)
            .cloned()
            .unwrap_or_else(|| vendor.default_model().to_string())
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

/// `OLLAMA_HOST` is commonly given as `host:port`.
fn normalize_base_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.contains("://") {
        url.to_string()
    } else {
        format!("http://{url}")
    }
}
