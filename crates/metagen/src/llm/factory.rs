//! Builds provider adapters from configuration.

use std::sync::Arc;

use super::{OllamaAdapter, OpenAiAdapter, ProviderAdapter, SimulatedAdapter, TransportError};
use crate::config::{ProviderConfig, ProviderKind};

/// Creates adapters keyed by provider kind.
pub struct ProviderFactory;

impl ProviderFactory {
    pub fn create(config: &ProviderConfig) -> Result<Arc<dyn ProviderAdapter>, TransportError> {
        Ok(match config.kind {
            ProviderKind::Ollama => Arc::new(OllamaAdapter::new(config)?),
            ProviderKind::OpenAi => Arc::new(OpenAiAdapter::new(config)?),
            ProviderKind::Simulated => Arc::new(SimulatedAdapter::from_config(config)),
        })
    }
}
