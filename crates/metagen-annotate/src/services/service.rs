//! Caller-facing facade wiring configuration into the pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

use metagen::config::{Config, ConfigError};
use metagen::llm::{ProviderPool, TransportError};
use metagen::models::{
    AnnotationTarget, BatchItemResult, BatchJob, BatchOptions, GeneratedArtifact, Operation,
    PerformanceMetrics, TargetFilter,
};
use metagen::registry::{HealthMonitor, HealthMonitorHandle, ModelRegistry, ModelSelector};
use metagen::repository::CatalogRepository;
use metagen::validation::ValidationEngine;

use super::annotation::{AnnotationGenerator, CorrectionPolicy, PromptBuilder};
use super::batch::{BatchError, BatchEvent, BatchExecutor};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Provider setup failed: {0}")]
    Provider(#[from] TransportError),
}

/// Single entry point for annotation and batch operations.
pub struct AnnotationService {
    registry: Arc<ModelRegistry>,
    providers: Arc<ProviderPool>,
    generator: Arc<AnnotationGenerator>,
    executor: BatchExecutor,
    repository: Arc<dyn CatalogRepository>,
    health_interval: std::time::Duration,
}

impl AnnotationService {
    /// Build every component from configuration.
    pub fn new(config: &Config, repository: Arc<dyn CatalogRepository>) -> Result<Self, ServiceError> {
        config.validate()?;

        let registry = Arc::new(ModelRegistry::new(
            config.model_descriptors(),
            config.fallback_model.clone(),
        ));
        let providers = Arc::new(ProviderPool::from_configs(
            &config.providers,
            registry.clone(),
            config.generation.invoke_timeout(),
            config.health.probe_timeout(),
        )?);

        let validator = ValidationEngine::new(config.validation.clone());
        let prompts = PromptBuilder::new(
            config.generation.prompts.clone(),
            config.validation.clone(),
            config.generation.max_context_chars,
        );
        let generator = AnnotationGenerator::new(
            ModelSelector::new(registry.clone(), config.selection),
            providers.clone(),
            validator,
            prompts,
        )
        .with_policy(CorrectionPolicy {
            max_retries: config.generation.max_retries,
            parse_retry_budget: config.generation.parse_retry_budget,
            retry_delay: config.generation.retry_delay(),
        });

        Ok(Self::with_components(
            Arc::new(generator),
            repository,
            config.health.interval(),
        ))
    }

    /// Assemble from prebuilt parts.
    pub fn with_components(
        generator: Arc<AnnotationGenerator>,
        repository: Arc<dyn CatalogRepository>,
        health_interval: std::time::Duration,
    ) -> Self {
        let providers = generator.providers().clone();
        let registry = generator.selector().registry().clone();
        let executor = BatchExecutor::new(generator.clone(), repository.clone());
        Self {
            registry,
            providers,
            generator,
            executor,
            repository,
            health_interval,
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn generator(&self) -> &Arc<AnnotationGenerator> {
        &self.generator
    }

    pub async fn submit_batch(
        &self,
        operation: Operation,
        filter: TargetFilter,
        options: BatchOptions,
        events: Option<mpsc::Sender<BatchEvent>>,
    ) -> String {
        self.executor.submit(operation, filter, options, events).await
    }

    pub async fn poll_batch(&self, job_id: &str) -> Result<BatchJob, BatchError> {
        self.executor.poll(job_id).await
    }

    pub async fn cancel_batch(&self, job_id: &str) -> Result<bool, BatchError> {
        self.executor.cancel(job_id).await
    }

    pub async fn wait_batch(&self, job_id: &str) -> Result<BatchJob, BatchError> {
        self.executor.wait(job_id).await
    }

    pub async fn batch_results(&self, job_id: &str) -> Result<Vec<BatchItemResult>, BatchError> {
        self.executor.results(job_id).await
    }

    /// Annotate one target outside any batch. Always returns an artifact;
    /// saving it is best-effort.
    pub async fn annotate_single(
        &self,
        target: &AnnotationTarget,
        operation: Operation,
    ) -> GeneratedArtifact {
        let existing = match self.repository.load_existing_metadata(&target.id).await {
            Ok(Some(metadata)) => Some(metadata),
            Ok(None) => target.metadata.clone(),
            Err(e) => {
                warn!("Could not load metadata for {}: {}", target.id, e);
                target.metadata.clone()
            }
        };

        let outcome = self
            .generator
            .generate(target, operation, existing.as_ref())
            .await;
        if let Err(e) = self
            .repository
            .save_artifact(&target.id, &outcome.artifact)
            .await
        {
            warn!("Could not save artifact for {}: {}", target.id, e);
        }
        outcome.artifact
    }

    /// Last known health per probed model.
    pub fn model_health(&self) -> HashMap<String, bool> {
        self.registry.health_snapshot()
    }

    pub fn performance_snapshot(&self) -> HashMap<String, PerformanceMetrics> {
        self.registry.performance_snapshot()
    }

    /// Probe all models with a health probe once, now.
    pub async fn probe_models(&self) -> HashMap<String, bool> {
        self.monitor().run_once().await
    }

    /// Start periodic health probing in the background.
    pub fn start_health_monitor(&self) -> HealthMonitorHandle {
        Arc::new(self.monitor()).spawn()
    }

    fn monitor(&self) -> HealthMonitor {
        HealthMonitor::new(
            self.registry.clone(),
            self.providers.clone(),
            self.health_interval,
        )
    }
}
