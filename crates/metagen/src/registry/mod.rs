//! Model registry: descriptors, availability, health and performance metrics.
//!
//! Descriptors are fixed at construction and keep registration order. The mutable
//! parts (availability overrides, health, metrics) live in concurrent maps so that
//! selection never blocks on in-flight probes or calls.

mod health;
mod selector;

use std::collections::HashMap;
use std::time::Duration;

use dashmap::DashMap;
use tracing::info;

use crate::models::{ModelDescriptor, PerformanceMetrics};

pub use health::{HealthMonitor, HealthMonitorHandle};
pub use selector::{ModelSelector, SelectionError, SelectionWeights};

/// The set of known models.
pub struct ModelRegistry {
    models: Vec<ModelDescriptor>,
    available: DashMap<String, bool>,
    health: DashMap<String, bool>,
    metrics: DashMap<String, PerformanceMetrics>,
    fallback_model: Option<String>,
}

impl ModelRegistry {
    /// Create a registry. `fallback_model` names the model returned when no
    /// candidate can serve a capability.
    pub fn new(models: Vec<ModelDescriptor>, fallback_model: Option<String>) -> Self {
        let available = models
            .iter()
            .map(|m| (m.name.clone(), m.available))
            .collect();
        Self {
            models,
            available,
            health: DashMap::new(),
            metrics: DashMap::new(),
            fallback_model,
        }
    }

    /// All descriptors in registration order, with current availability applied.
    pub fn models(&self) -> Vec<ModelDescriptor> {
        self.models.iter().map(|m| self.with_state(m)).collect()
    }

    pub fn get(&self, name: &str) -> Option<ModelDescriptor> {
        self.models
            .iter()
            .find(|m| m.name == name)
            .map(|m| self.with_state(m))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Registration index, used as the final selection tie-breaker.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.models.iter().position(|m| m.name == name)
    }

    /// The designated fallback descriptor, if one is registered.
    pub fn fallback(&self) -> Option<ModelDescriptor> {
        self.fallback_model.as_deref().and_then(|name| self.get(name))
    }

    /// Toggle a model's availability. Returns false for unknown models.
    pub fn set_available(&self, name: &str, available: bool) -> bool {
        if self.position(name).is_none() {
            return false;
        }
        self.available.insert(name.to_string(), available);
        info!("Model {} marked {}", name, if available { "available" } else { "unavailable" });
        true
    }

    /// Health as last reported by the monitor; models never probed count as healthy.
    pub fn is_healthy(&self, name: &str) -> bool {
        self.health.get(name).map(|h| *h).unwrap_or(true)
    }

    /// Record a health observation, returning the previous value.
    pub fn set_health(&self, name: &str, healthy: bool) -> Option<bool> {
        self.health.insert(name.to_string(), healthy)
    }

    /// Health of every registered model.
    pub fn health_snapshot(&self) -> HashMap<String, bool> {
        self.models
            .iter()
            .map(|m| (m.name.clone(), self.is_healthy(&m.name)))
            .collect()
    }

    /// Fold one provider call into the model's metrics.
    pub fn record_call(&self, name: &str, success: bool, elapsed: Duration) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .record(success, elapsed);
    }

    pub fn metrics(&self, name: &str) -> PerformanceMetrics {
        self.metrics.get(name).map(|m| *m).unwrap_or_default()
    }

    /// Metrics for every registered model, zeroed where no calls were made.
    pub fn performance_snapshot(&self) -> HashMap<String, PerformanceMetrics> {
        self.models
            .iter()
            .map(|m| (m.name.clone(), self.metrics(&m.name)))
            .collect()
    }

    fn with_state(&self, model: &ModelDescriptor) -> ModelDescriptor {
        let mut model = model.clone();
        if let Some(available) = self.available.get(&model.name) {
            model.available = *available;
        }
        model
    }
}
