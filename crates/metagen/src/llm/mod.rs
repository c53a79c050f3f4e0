//! Provider adapters for AI backends.
//!
//! Each adapter is a thin transport: it sends a prompt to one backend and returns
//! the raw text. Parsing, validation and retries live in the annotation layer.

mod factory;
mod ollama;
mod openai;
mod pool;
mod simulated;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::ModelDescriptor;

pub use factory::ProviderFactory;
pub use ollama::OllamaAdapter;
pub use openai::OpenAiAdapter;
pub use pool::ProviderPool;
pub use simulated::{SimulatedAdapter, SimulatedBehavior, SimulatedReply};

/// Errors raised while talking to a provider.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("Connection error ({provider}): {message}")]
    Connection { provider: String, message: String },

    #[error("API error ({provider}): HTTP {status}: {body}")]
    Api {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse { provider: String, message: String },

    #[error("{provider} timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },

    #[error("Missing API key for {provider} (set {env_var})")]
    MissingApiKey { provider: String, env_var: String },

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
}

impl TransportError {
    pub(crate) fn connection(provider: &str, err: impl std::fmt::Display) -> Self {
        Self::Connection {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn invalid(provider: &str, err: impl std::fmt::Display) -> Self {
        Self::InvalidResponse {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    }
}

/// A transport to one AI backend.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider id that model descriptors reference.
    fn id(&self) -> &str;

    /// Send `prompt` to `model` and return the raw response text.
    async fn invoke(&self, prompt: &str, model: &ModelDescriptor) -> Result<String, TransportError>;

    /// Cheap liveness check for `model`.
    async fn probe(&self, model: &ModelDescriptor) -> Result<(), TransportError>;
}
