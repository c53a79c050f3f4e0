//! Capability-aware model selection.
//!
//! Candidates are filtered on capability, availability and health, then scored:
//!
//! ```text
//! score = priority_weight(priority)
//!       + success_rate * success_weight          (only once calls were recorded)
//!       + latency_weight / avg_response_ms       (only once calls were recorded)
//!       + mode bonus for speed / accuracy class
//! ```
//!
//! Ties keep the lower priority number first, then registration order.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::ModelRegistry;
use crate::models::{AccuracyClass, Capability, ModelDescriptor, PriorityMode, SpeedClass};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SelectionError {
    #[error("No model can serve capability '{0}' and no fallback model is registered")]
    NoCapableModel(Capability),
}

/// Scoring constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionWeights {
    /// Score for priority 0.
    pub priority_base: f64,
    /// Score lost per priority step.
    pub priority_step: f64,
    pub success_weight: f64,
    pub latency_weight: f64,
    /// Bonus for a fast model in speed mode or a high-accuracy model in accuracy mode.
    pub class_bonus: f64,
}

impl Default for SelectionWeights {
    fn default() -> Self {
        Self {
            priority_base: 30.0,
            priority_step: 5.0,
            success_weight: 50.0,
            latency_weight: 1000.0,
            class_bonus: 20.0,
        }
    }
}

impl SelectionWeights {
    pub fn priority_weight(&self, priority: u32) -> f64 {
        (self.priority_base - self.priority_step * priority as f64).max(0.0)
    }
}

/// Picks the best model for a capability.
pub struct ModelSelector {
    registry: Arc<ModelRegistry>,
    weights: SelectionWeights,
}

impl ModelSelector {
    pub fn new(registry: Arc<ModelRegistry>, weights: SelectionWeights) -> Self {
        Self { registry, weights }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Score a single model. Exposed so callers can explain a choice.
    pub fn score(&self, model: &ModelDescriptor, mode: PriorityMode) -> f64 {
        let mut score = self.weights.priority_weight(model.priority);

        let metrics = self.registry.metrics(&model.name);
        if let Some(rate) = metrics.success_rate() {
            score += rate * self.weights.success_weight;
            if metrics.avg_response_ms > 0.0 {
                score += self.weights.latency_weight / metrics.avg_response_ms;
            }
        }

        score + self.mode_bonus(model, mode)
    }

    fn mode_bonus(&self, model: &ModelDescriptor, mode: PriorityMode) -> f64 {
        let speed = match model.speed {
            SpeedClass::Fast => 1.0,
            SpeedClass::Medium => 0.5,
            SpeedClass::Slow => 0.0,
        };
        let accuracy = match model.accuracy {
            AccuracyClass::High => 1.0,
            AccuracyClass::Medium => 0.5,
            AccuracyClass::Low => 0.0,
        };
        let bonus = self.weights.class_bonus;
        match mode {
            PriorityMode::Speed => speed * bonus,
            PriorityMode::Accuracy => accuracy * bonus,
            PriorityMode::Balanced => (speed + accuracy) * bonus / 2.0,
        }
    }

    /// Available, healthy models that serve `capability`, in registration order.
    pub fn candidates(&self, capability: Capability) -> Vec<ModelDescriptor> {
        self.registry
            .models()
            .into_iter()
            .filter(|m| m.available && m.supports(capability) && self.registry.is_healthy(&m.name))
            .collect()
    }

    /// Candidates with their scores, best first.
    pub fn rank(&self, capability: Capability, mode: PriorityMode) -> Vec<(ModelDescriptor, f64)> {
        let mut ranked: Vec<(ModelDescriptor, f64)> = self
            .candidates(capability)
            .into_iter()
            .map(|m| {
                let score = self.score(&m, mode);
                (m, score)
            })
            .collect();

        // Stable sort keeps registration order for full ties.
        ranked.sort_by(|(a, sa), (b, sb)| {
            sb.partial_cmp(sa)
                .unwrap_or(Ordering::Equal)
                .then(a.priority.cmp(&b.priority))
        });
        ranked
    }

    /// Best model for `capability`, or the registered fallback model.
    pub fn select(
        &self,
        capability: Capability,
        mode: PriorityMode,
    ) -> Result<ModelDescriptor, SelectionError> {
        if let Some((model, score)) = self.rank(capability, mode).into_iter().next() {
            debug!(
                model = %model.name,
                capability = %capability,
                mode = mode.as_str(),
                score,
                "Selected model"
            );
            return Ok(model);
        }

        match self.registry.fallback() {
            Some(model) => {
                debug!(
                    model = %model.name,
                    capability = %capability,
                    "No capable candidate, using fallback model"
                );
                Ok(model)
            }
            None => Err(SelectionError::NoCapableModel(capability)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn record(registry: &ModelRegistry, name: &str, successes: u32, total: u32) {
        for i in 0..total {
            registry.record_call(name, i < successes, Duration::from_millis(100));
        }
    }

    #[test]
    fn priority_weight_floors_at_zero() {
        let weights = SelectionWeights::default();
        assert_eq!(weights.priority_weight(0), 30.0);
        assert_eq!(weights.priority_weight(2), 20.0);
        assert_eq!(weights.priority_weight(10), 0.0);
    }

    #[test]
    fn priority_outweighs_small_success_gap() {
        let registry = Arc::new(ModelRegistry::new(
            vec![
                ModelDescriptor::new("a", "p")
                    .with_capabilities([Capability::Meta])
                    .with_priority(1),
                ModelDescriptor::new("b", "p")
                    .with_capabilities([Capability::Meta])
                    .with_priority(2),
            ],
            None,
        ));
        record(&registry, "a", 9, 10);
        record(&registry, "b", 99, 100);
        let selector = ModelSelector::new(registry, SelectionWeights::default());

        let a = selector.registry().get("a").unwrap();
        let b = selector.registry().get("b").unwrap();
        // a: 25 + 45 + 10 + 10, b: 20 + 49.5 + 10 + 10
        assert!((selector.score(&a, PriorityMode::Balanced) - 90.0).abs() < 1e-9);
        assert!((selector.score(&b, PriorityMode::Balanced) - 89.5).abs() < 1e-9);

        for _ in 0..5 {
            let chosen = selector.select(Capability::Meta, PriorityMode::Balanced).unwrap();
            assert_eq!(chosen.name, "a");
        }
    }

    #[test]
    fn mode_changes_the_winner() {
        let registry = Arc::new(ModelRegistry::new(
            vec![
                ModelDescriptor::new("quick", "p")
                    .with_capabilities([Capability::Meta])
                    .with_speed(SpeedClass::Fast)
                    .with_accuracy(AccuracyClass::Low),
                ModelDescriptor::new("careful", "p")
                    .with_capabilities([Capability::Meta])
                    .with_speed(SpeedClass::Slow)
                    .with_accuracy(AccuracyClass::High),
            ],
            None,
        ));
        let selector = ModelSelector::new(registry, SelectionWeights::default());

        assert_eq!(
            selector.select(Capability::Meta, PriorityMode::Speed).unwrap().name,
            "quick"
        );
        assert_eq!(
            selector.select(Capability::Meta, PriorityMode::Accuracy).unwrap().name,
            "careful"
        );
        // Balanced is a full tie: registration order wins.
        assert_eq!(
            selector.select(Capability::Meta, PriorityMode::Balanced).unwrap().name,
            "quick"
        );
    }

    #[test]
    fn unhealthy_and_unavailable_are_skipped() {
        let registry = Arc::new(ModelRegistry::new(
            vec![
                ModelDescriptor::new("a", "p").with_capabilities([Capability::Schema]),
                ModelDescriptor::new("b", "p").with_capabilities([Capability::ComplexWildcard]),
                ModelDescriptor::new("c", "p")
                    .with_capabilities([Capability::Schema])
                    .with_priority(5),
            ],
            None,
        ));
        registry.set_health("a", false);
        registry.set_available("b", false);
        let selector = ModelSelector::new(registry, SelectionWeights::default());

        let names: Vec<String> = selector
            .candidates(Capability::Schema)
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["c"]);
    }

    #[test]
    fn falls_back_to_designated_model() {
        let registry = Arc::new(ModelRegistry::new(
            vec![
                ModelDescriptor::new("meta-only", "p").with_capabilities([Capability::Meta]),
                ModelDescriptor::new("backup", "p").with_capabilities([Capability::Meta]),
            ],
            Some("backup".to_string()),
        ));
        let selector = ModelSelector::new(registry, SelectionWeights::default());

        let chosen = selector.select(Capability::Rule, PriorityMode::Balanced).unwrap();
        assert_eq!(chosen.name, "backup");
    }

    #[test]
    fn no_candidates_and_no_fallback_is_an_error() {
        let registry = Arc::new(ModelRegistry::new(
            vec![ModelDescriptor::new("meta-only", "p").with_capabilities([Capability::Meta])],
            None,
        ));
        let selector = ModelSelector::new(registry, SelectionWeights::default());

        assert_eq!(
            selector.select(Capability::Rule, PriorityMode::Speed),
            Err(SelectionError::NoCapableModel(Capability::Rule))
        );
    }
}
