//! Catalog storage: target lookup, artifact persistence and batch state.
//!
//! The engine only talks to storage through [`CatalogRepository`]. Two backends
//! ship with the crate: an in-memory catalog and a JSON file catalog.

mod json_file;
mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{
    AnnotationTarget, BatchJob, GeneratedArtifact, JobStatus, Operation, TargetFilter,
};

pub use json_file::JsonCatalog;
pub use memory::InMemoryCatalog;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Catalog unavailable: {0}")]
    Unavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Storage operations the annotation engine depends on.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Targets matching `filter`, in catalog order.
    async fn resolve_targets(
        &self,
        filter: &TargetFilter,
    ) -> Result<Vec<AnnotationTarget>, RepositoryError>;

    async fn save_artifact(
        &self,
        target_id: &str,
        artifact: &GeneratedArtifact,
    ) -> Result<(), RepositoryError>;

    /// Metadata already known for a target, used to ground prompts.
    async fn load_existing_metadata(
        &self,
        target_id: &str,
    ) -> Result<Option<serde_json::Value>, RepositoryError>;

    async fn persist_batch_state(&self, job: &BatchJob) -> Result<(), RepositoryError>;

    async fn update_batch_progress(
        &self,
        job_id: &str,
        progress: f64,
        status: Option<JobStatus>,
    ) -> Result<(), RepositoryError>;
}

/// Full catalog contents; also the on-disk format of [`JsonCatalog`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub targets: Vec<AnnotationTarget>,
    /// Saved artifacts per target id, oldest first.
    #[serde(default)]
    pub artifacts: BTreeMap<String, Vec<GeneratedArtifact>>,
    #[serde(default)]
    pub jobs: BTreeMap<String, BatchJob>,
}

impl CatalogSnapshot {
    pub fn new(targets: Vec<AnnotationTarget>) -> Self {
        Self {
            targets,
            ..Self::default()
        }
    }

    fn resolve(&self, filter: &TargetFilter) -> Vec<AnnotationTarget> {
        filter.apply(&self.targets)
    }

    fn save_artifact(
        &mut self,
        target_id: &str,
        artifact: &GeneratedArtifact,
    ) -> Result<(), RepositoryError> {
        let target = self
            .targets
            .iter_mut()
            .find(|t| t.id == target_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("target {}", target_id)))?;

        // Accepted descriptive metadata becomes the target's existing metadata.
        if artifact.operation == Operation::GenerateMeta {
            target.metadata = Some(artifact.payload.body());
        }
        self.artifacts
            .entry(target_id.to_string())
            .or_default()
            .push(artifact.clone());
        Ok(())
    }

    fn existing_metadata(&self, target_id: &str) -> Option<serde_json::Value> {
        self.targets
            .iter()
            .find(|t| t.id == target_id)
            .and_then(|t| t.metadata.clone())
    }

    fn update_progress(
        &mut self,
        job_id: &str,
        progress: f64,
        status: Option<JobStatus>,
    ) -> Result<(), RepositoryError> {
        let job = self
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("job {}", job_id)))?;
        job.progress = job.progress.max(progress);
        if let Some(status) = status {
            if !job.status.is_terminal() {
                job.status = status;
            }
        }
        Ok(())
    }

    /// Saved artifacts for a target, oldest first.
    pub fn artifacts_for(&self, target_id: &str) -> &[GeneratedArtifact] {
        self.artifacts
            .get(target_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
