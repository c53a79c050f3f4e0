//! Provider and model declarations.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::llm::SimulatedBehavior;
use crate::models::{AccuracyClass, Capability, ModelDescriptor, SpeedClass};

/// Backend protocol spoken by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Ollama API (local, default)
    #[default]
    Ollama,
    /// OpenAI-compatible API (OpenAI, Groq, Together.ai, etc.)
    #[serde(rename = "openai", alias = "groq", alias = "together")]
    OpenAi,
    /// In-process scripted backend
    Simulated,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::Simulated => "simulated",
        }
    }

    fn default_endpoint(&self) -> &'static str {
        match self {
            Self::Ollama => "http://localhost:11434",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Simulated => "",
        }
    }
}

/// Connection settings for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    #[serde(default)]
    pub kind: ProviderKind,
    /// API endpoint (provider-specific defaults apply)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Environment variable holding the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Default reply behavior (simulated providers only)
    #[serde(default)]
    pub behavior: SimulatedBehavior,
    /// Artificial latency (simulated providers only)
    #[serde(default)]
    pub latency_ms: u64,
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl ProviderConfig {
    pub fn new(id: impl Into<String>, kind: ProviderKind) -> Self {
        Self {
            id: id.into(),
            kind,
            endpoint: None,
            api_key_env: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            behavior: SimulatedBehavior::default(),
            latency_ms: 0,
        }
    }

    pub fn endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| self.kind.default_endpoint().to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Name of the environment variable holding the API key.
    pub fn api_key_env(&self) -> String {
        self.api_key_env
            .clone()
            .unwrap_or_else(|| "OPENAI_API_KEY".to_string())
    }

    /// Resolve the API key from the environment.
    pub fn api_key(&self) -> Option<String> {
        let var = self.api_key_env();
        match std::env::var(&var) {
            Ok(value) if !value.trim().is_empty() => Some(value),
            _ => {
                if self.kind == ProviderKind::OpenAi {
                    warn!(provider = %self.id, env_var = %var, "API key environment variable is not set");
                }
                None
            }
        }
    }
}

/// Declaration of one model in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    pub provider: String,
    pub capabilities: Vec<Capability>,
    #[serde(default)]
    pub speed: SpeedClass,
    #[serde(default)]
    pub accuracy: AccuracyClass,
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default = "default_available")]
    pub available: bool,
    /// Probe this model through its provider on every health interval.
    #[serde(default)]
    pub health_probe: bool,
}

fn default_priority() -> u32 {
    1
}

fn default_available() -> bool {
    true
}

impl From<&ModelConfig> for ModelDescriptor {
    fn from(config: &ModelConfig) -> Self {
        ModelDescriptor {
            name: config.name.clone(),
            provider: config.provider.clone(),
            capabilities: config.capabilities.iter().copied().collect(),
            speed: config.speed,
            accuracy: config.accuracy,
            priority: config.priority,
            available: config.available,
            health_probe: config.health_probe.then(|| config.provider.clone()),
        }
    }
}
