//! Smaller configuration sections.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Background health probing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub probe_timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            probe_timeout_ms: 5000,
        }
    }
}

impl HealthConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Custom prompt templates. Placeholders: `{title}`, `{kind}`, `{path}`,
/// `{existing}`, `{operation}`, `{categories}`; correction prompts also get
/// `{previous}` and `{errors}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correction: Option<String>,
}

/// Generation and correction loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Correction rounds for single-target annotation.
    pub max_retries: u32,
    /// Retries that parse failures may consume; unset shares `max_retries`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_retry_budget: Option<u32>,
    /// Base backoff between retries after a transport error.
    pub retry_delay_ms: u64,
    /// Per-call provider timeout.
    pub invoke_timeout_secs: u64,
    /// Maximum characters of existing metadata included in prompts.
    pub max_context_chars: usize,
    pub prompts: PromptOverrides,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            parse_retry_budget: None,
            retry_delay_ms: 1000,
            invoke_timeout_secs: 60,
            max_context_chars: 2000,
            prompts: PromptOverrides::default(),
        }
    }
}

impl GenerationConfig {
    pub fn invoke_timeout(&self) -> Duration {
        Duration::from_secs(self.invoke_timeout_secs.max(1))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
