//! In-memory catalog for single-process operation.
//!
//! State is not persisted across restarts. Supports injecting storage faults so
//! retry and failure paths can be exercised.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CatalogRepository, CatalogSnapshot, RepositoryError};
use crate::models::{AnnotationTarget, BatchJob, GeneratedArtifact, JobStatus, TargetFilter};

pub struct InMemoryCatalog {
    state: RwLock<CatalogSnapshot>,
    unavailable: AtomicBool,
    failing_saves: AtomicUsize,
}

impl InMemoryCatalog {
    pub fn new(targets: Vec<AnnotationTarget>) -> Self {
        Self::from_snapshot(CatalogSnapshot::new(targets))
    }

    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
            unavailable: AtomicBool::new(false),
            failing_saves: AtomicUsize::new(0),
        }
    }

    /// Make target resolution fail until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fail the next `count` artifact saves.
    pub fn fail_next_saves(&self, count: usize) {
        self.failing_saves.store(count, Ordering::SeqCst);
    }

    pub async fn snapshot(&self) -> CatalogSnapshot {
        self.state.read().await.clone()
    }

    pub async fn artifacts_for(&self, target_id: &str) -> Vec<GeneratedArtifact> {
        self.state.read().await.artifacts_for(target_id).to_vec()
    }

    pub async fn job(&self, job_id: &str) -> Option<BatchJob> {
        self.state.read().await.jobs.get(job_id).cloned()
    }

    fn take_save_failure(&self) -> bool {
        self.failing_saves
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalog {
    async fn resolve_targets(
        &self,
        filter: &TargetFilter,
    ) -> Result<Vec<AnnotationTarget>, RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(
                "in-memory catalog marked unavailable".to_string(),
            ));
        }
        Ok(self.state.read().await.resolve(filter))
    }

    async fn save_artifact(
        &self,
        target_id: &str,
        artifact: &GeneratedArtifact,
    ) -> Result<(), RepositoryError> {
        if self.take_save_failure() {
            return Err(RepositoryError::Unavailable(format!(
                "injected save failure for {}",
                target_id
            )));
        }
        self.state.write().await.save_artifact(target_id, artifact)
    }

    async fn load_existing_metadata(
        &self,
        target_id: &str,
    ) -> Result<Option<serde_json::Value>, RepositoryError> {
        Ok(self.state.read().await.existing_metadata(target_id))
    }

    async fn persist_batch_state(&self, job: &BatchJob) -> Result<(), RepositoryError> {
        self.state
            .write()
            .await
            .jobs
            .insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn update_batch_progress(
        &self,
        job_id: &str,
        progress: f64,
        status: Option<JobStatus>,
    ) -> Result<(), RepositoryError> {
        self.state
            .write()
            .await
            .update_progress(job_id, progress, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ArtifactPayload, BatchOptions, GeneratedBy, MetaPayload, Operation, TargetKind,
    };
    use chrono::Utc;

    fn artifact(target_id: &str) -> GeneratedArtifact {
        GeneratedArtifact {
            target_id: target_id.to_string(),
            operation: Operation::GenerateMeta,
            payload: ArtifactPayload::Meta(MetaPayload {
                title: "Invoices".to_string(),
                ..MetaPayload::default()
            }),
            confidence: 0.8,
            generated_by: GeneratedBy::Ai,
            model: Some("m".to_string()),
            validation_score: 1.0,
            corrections: Vec::new(),
            generated_at: Utc::now(),
        }
    }

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new(vec![
            AnnotationTarget::new("t1", "Invoices", TargetKind::Category),
            AnnotationTarget::new("t2", "Payroll", TargetKind::Procedure),
        ])
    }

    #[tokio::test]
    async fn saved_meta_becomes_existing_metadata() {
        let catalog = catalog();
        assert!(catalog.load_existing_metadata("t1").await.unwrap().is_none());

        catalog.save_artifact("t1", &artifact("t1")).await.unwrap();
        let existing = catalog.load_existing_metadata("t1").await.unwrap().unwrap();
        assert_eq!(existing["title"], "Invoices");

        let filter = TargetFilter {
            only_missing: true,
            ..TargetFilter::default()
        };
        let remaining = catalog.resolve_targets(&filter).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "t2");
    }

    #[tokio::test]
    async fn unknown_target_is_not_found() {
        let err = catalog().save_artifact("nope", &artifact("nope")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn injected_faults() {
        let catalog = catalog();
        catalog.fail_next_saves(1);
        assert!(catalog.save_artifact("t1", &artifact("t1")).await.is_err());
        assert!(catalog.save_artifact("t1", &artifact("t1")).await.is_ok());

        catalog.set_unavailable(true);
        assert!(catalog.resolve_targets(&TargetFilter::default()).await.is_err());
    }

    #[tokio::test]
    async fn progress_updates_never_regress_or_reopen() {
        let catalog = catalog();
        let mut job = BatchJob::new(
            Operation::GenerateMeta,
            TargetFilter::default(),
            BatchOptions::default(),
        );
        job.status = JobStatus::Completed;
        catalog.persist_batch_state(&job).await.unwrap();

        catalog
            .update_batch_progress(&job.id, 40.0, Some(JobStatus::Running))
            .await
            .unwrap();
        catalog.update_batch_progress(&job.id, 10.0, None).await.unwrap();

        let stored = catalog.job(&job.id).await.unwrap();
        assert_eq!(stored.progress, 40.0);
        assert_eq!(stored.status, JobStatus::Completed);
    }
}
