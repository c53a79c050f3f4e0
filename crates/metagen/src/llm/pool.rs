//! Adapter lookup with timeouts and metrics recording.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use super::{ProviderAdapter, ProviderFactory, TransportError};
use crate::config::ProviderConfig;
use crate::models::ModelDescriptor;
use crate::registry::ModelRegistry;

/// All configured adapters, keyed by provider id.
///
/// Every `invoke` is bounded by the call timeout and folded into the registry's
/// performance metrics, whether it succeeded or not.
pub struct ProviderPool {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
    registry: Arc<ModelRegistry>,
    invoke_timeout: Duration,
    probe_timeout: Duration,
}

impl ProviderPool {
    pub fn new(registry: Arc<ModelRegistry>, invoke_timeout: Duration, probe_timeout: Duration) -> Self {
        Self {
            adapters: HashMap::new(),
            registry,
            invoke_timeout,
            probe_timeout,
        }
    }

    /// Build a pool with one adapter per provider config.
    pub fn from_configs(
        configs: &[ProviderConfig],
        registry: Arc<ModelRegistry>,
        invoke_timeout: Duration,
        probe_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let mut pool = Self::new(registry, invoke_timeout, probe_timeout);
        for config in configs {
            pool.register(ProviderFactory::create(config)?);
        }
        Ok(pool)
    }

    /// Add or replace an adapter.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.id().to_string(), adapter);
    }

    pub fn get(&self, provider: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(provider).cloned()
    }

    pub fn provider_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.adapters.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Invoke `model` through its provider and record the outcome.
    pub async fn invoke(&self, prompt: &str, model: &ModelDescriptor) -> Result<String, TransportError> {
        let adapter = self
            .get(&model.provider)
            .ok_or_else(|| TransportError::UnknownProvider(model.provider.clone()))?;

        let started = Instant::now();
        let result = match tokio::time::timeout(self.invoke_timeout, adapter.invoke(prompt, model)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                provider: model.provider.clone(),
                timeout_ms: self.invoke_timeout.as_millis() as u64,
            }),
        };
        let elapsed = started.elapsed();
        self.registry.record_call(&model.name, result.is_ok(), elapsed);

        debug!(
            model = %model.name,
            provider = %model.provider,
            success = result.is_ok(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Provider call finished"
        );
        result
    }

    /// Probe `model` through the adapter named `provider`.
    pub async fn probe(&self, provider: &str, model: &ModelDescriptor) -> Result<(), TransportError> {
        let adapter = self
            .get(provider)
            .ok_or_else(|| TransportError::UnknownProvider(provider.to_string()))?;

        match tokio::time::timeout(self.probe_timeout, adapter.probe(model)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                provider: provider.to_string(),
                timeout_ms: self.probe_timeout.as_millis() as u64,
            }),
        }
    }
}
