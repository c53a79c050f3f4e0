//! Periodic liveness probing for models that declare a health probe.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::ModelRegistry;
use crate::llm::ProviderPool;

/// Shortest probe interval accepted; tokio intervals cannot be zero.
const MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Probes models and publishes results into the registry's health map.
pub struct HealthMonitor {
    registry: Arc<ModelRegistry>,
    providers: Arc<ProviderPool>,
    interval: Duration,
}

impl HealthMonitor {
    pub fn new(registry: Arc<ModelRegistry>, providers: Arc<ProviderPool>, interval: Duration) -> Self {
        Self {
            registry,
            providers,
            interval: interval.max(MIN_INTERVAL),
        }
    }

    /// Probe every model with a health probe concurrently and record the results.
    ///
    /// Returns the observations from this round only.
    pub async fn run_once(&self) -> HashMap<String, bool> {
        let probes = self.registry.models().into_iter().filter_map(|model| {
            let provider = model.health_probe.clone()?;
            Some(async move {
                let result = self.providers.probe(&provider, &model).await;
                if let Err(e) = &result {
                    debug!("Health probe for {} failed: {}", model.name, e);
                }
                (model.name, result.is_ok())
            })
        });

        let results = join_all(probes).await;
        for (name, healthy) in &results {
            let previous = self.registry.set_health(name, *healthy);
            match (previous, *healthy) {
                (Some(true) | None, false) => warn!("Model {} is unhealthy", name),
                (Some(false), true) => info!("Model {} recovered", name),
                _ => {}
            }
        }
        results.into_iter().collect()
    }

    /// Run probes once immediately, then on every interval tick until shut down.
    pub fn spawn(self: Arc<Self>) -> HealthMonitorHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_once().await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Health monitor stopped");
        });

        HealthMonitorHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Owner of a running monitor task.
pub struct HealthMonitorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl HealthMonitorHandle {
    /// Stop the probe loop and wait for the task to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{SimulatedAdapter, SimulatedBehavior};
    use crate::models::{Capability, ModelDescriptor};

    fn setup() -> (Arc<ModelRegistry>, Arc<SimulatedAdapter>, Arc<HealthMonitor>) {
        let registry = Arc::new(ModelRegistry::new(
            vec![
                ModelDescriptor::new("probed", "sim")
                    .with_capabilities([Capability::Meta])
                    .with_health_probe(),
                ModelDescriptor::new("unprobed", "sim").with_capabilities([Capability::Meta]),
            ],
            None,
        ));
        let adapter = Arc::new(SimulatedAdapter::new("sim", SimulatedBehavior::Valid));
        let mut pool = ProviderPool::new(
            registry.clone(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        pool.register(adapter.clone());
        let monitor = Arc::new(HealthMonitor::new(
            registry.clone(),
            Arc::new(pool),
            Duration::from_millis(100),
        ));
        (registry, adapter, monitor)
    }

    #[tokio::test]
    async fn only_probed_models_are_checked() {
        let (registry, adapter, monitor) = setup();
        adapter.set_reachable(false);

        let results = monitor.run_once().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results.get("probed"), Some(&false));
        assert!(!registry.is_healthy("probed"));
        assert!(registry.is_healthy("unprobed"));
    }

    #[tokio::test]
    async fn recovery_is_observed() {
        let (registry, adapter, monitor) = setup();
        adapter.set_reachable(false);
        monitor.run_once().await;
        adapter.set_reachable(true);
        monitor.run_once().await;
        assert!(registry.is_healthy("probed"));
    }

    #[tokio::test]
    async fn spawned_monitor_probes_at_startup_and_shuts_down() {
        let (registry, adapter, monitor) = setup();
        adapter.set_reachable(false);

        let handle = monitor.spawn();
        let mut healthy = true;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            healthy = registry.is_healthy("probed");
            if !healthy {
                break;
            }
        }
        assert!(!healthy);
        handle.shutdown().await;
    }
}
