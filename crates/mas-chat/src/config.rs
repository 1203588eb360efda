use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use url::Url;

use crate::errors::ConfigError;

pub const ENV_PREFIX: &str = "MAS";
const PLACEHOLDER_KEY: &str = "PASTE_YOUR_TOKEN_HERE";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProviderKind {
    /// Single-string prompt in, list of generations out
    #[default]
    HuggingFace,
    /// Messages API with content blocks and SSE streaming
    Anthropic,
    /// Forward the prompt to the factory backend as `agent.message`
    Relay,
}

impl ProviderKind {
    fn default_api_url(&self) -> &'static str {
        match self {
            ProviderKind::HuggingFace => {
                "https://api-inference.huggingface.co/models/mistralai/Mistral-7B-Instruct-v0.2"
            }
            ProviderKind::Anthropic => "https://api.anthropic.com/v1/messages",
            ProviderKind::Relay => "",
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::HuggingFace => "Mistral-7B-Instruct",
            ProviderKind::Anthropic => "claude-3-5-sonnet-latest",
            ProviderKind::Relay => "factory-backend",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        !matches!(self, ProviderKind::Relay)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendSettings {
    #[serde(default = "default_backend_url")]
    pub base_url: String,
    #[serde(default = "default_mcp_endpoint")]
    pub mcp_endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_health_timeout_secs")]
    pub health_timeout_secs: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            mcp_endpoint: default_mcp_endpoint(),
            timeout_secs: default_timeout_secs(),
            health_timeout_secs: default_health_timeout_secs(),
        }
    }
}

impl BackendSettings {
    pub fn with_base_url<S: Into<String>>(base_url: S) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn mcp_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.mcp_endpoint
        )
    }

    pub fn health_url(&self) -> String {
        format!("{}/health", self.base_url.trim_end_matches('/'))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }
}

#[derive(Clone, Deserialize, Serialize)]
pub struct ChatSettings {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

// Keeps the credential out of logs and panics
impl fmt::Debug for ChatSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatSettings")
            .field("provider", &self.provider)
            .field("api_url", &self.api_url())
            .field("api_key", &if self.has_api_key() { "<set>" } else { "<unset>" })
            .field("model", &self.model())
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self::new(ProviderKind::default(), "")
    }
}

impl ChatSettings {
    pub fn new<S: Into<String>>(provider: ProviderKind, api_key: S) -> Self {
        Self {
            provider,
            api_url: None,
            api_key: api_key.into(),
            model: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn with_api_url<S: Into<String>>(mut self, api_url: S) -> Self {
        self.api_url = Some(api_url.into());
        self
    }

    pub fn api_url(&self) -> String {
        self.api_url
            .clone()
            .unwrap_or_else(|| self.provider.default_api_url().to_string())
    }

    pub fn model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn has_api_key(&self) -> bool {
        let key = self.api_key.trim();
        !key.is_empty() && key != PLACEHOLDER_KEY
    }

    /// Check everything a request needs before any network call is made
    pub fn validate(&self) -> ConfigReport {
        let mut issues = Vec::new();

        if self.provider.requires_api_key() {
            if !self.has_api_key() {
                issues.push("API key not configured".to_string());
            } else if self.provider == ProviderKind::HuggingFace
                && !self.api_key.trim().starts_with("hf_")
            {
                issues.push(
                    "Invalid Hugging Face token format. Token should start with \"hf_\"".to_string(),
                );
            }

            if let Err(e) = Url::parse(&self.api_url()) {
                issues.push(format!("Invalid API URL {}: {}", self.api_url(), e));
            }
        }

        ConfigReport {
            valid: issues.is_empty(),
            issues,
            provider: self.provider,
            has_api_key: self.has_api_key(),
            api_url: self.api_url(),
            model: self.model(),
        }
    }
}

/// Outcome of validating the chat configuration, safe to print
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigReport {
    pub valid: bool,
    pub issues: Vec<String>,
    pub provider: ProviderKind,
    pub has_api_key: bool,
    pub api_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub chat: ChatSettings,
}

impl Settings {
    /// Load from the default config file (if present) and `MAS_*` environment variables
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(default_config_file().as_deref().filter(|p| p.exists()))
    }

    /// Layer built-in defaults, an optional TOML file and the environment
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("backend.base_url", default_backend_url())?
            .set_default("backend.mcp_endpoint", default_mcp_endpoint())?
            .set_default("chat.provider", ProviderKind::default().to_string())?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.check()?;
        Ok(settings)
    }

    fn check(&self) -> Result<(), ConfigError> {
        Url::parse(&self.backend.base_url).map_err(|e| ConfigError::Invalid {
            key: "backend.base_url".to_string(),
            reason: e.to_string(),
        })?;

        if !self.backend.mcp_endpoint.starts_with('/') {
            return Err(ConfigError::Invalid {
                key: "backend.mcp_endpoint".to_string(),
                reason: "must start with '/'".to_string(),
            });
        }

        if self.backend.timeout_secs == 0 || self.chat.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

/// `~/.config/mas-chat/config.toml`
pub fn default_config_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("mas-chat").join("config.toml"))
}

fn default_backend_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_mcp_endpoint() -> String {
    "/api/mcp".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_health_timeout_secs() -> u64 {
    5
}

fn default_max_tokens() -> u32 {
    200
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.95
}
