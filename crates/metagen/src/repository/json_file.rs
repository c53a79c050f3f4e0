//! Catalog stored as a single JSON file.
//!
//! The whole file is loaded on open and rewritten after every mutation through
//! a temp file and rename, so readers never observe a half-written catalog.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{CatalogRepository, CatalogSnapshot, RepositoryError};
use crate::models::{AnnotationTarget, BatchJob, GeneratedArtifact, JobStatus, TargetFilter};

pub struct JsonCatalog {
    path: PathBuf,
    state: Mutex<CatalogSnapshot>,
}

impl JsonCatalog {
    /// Open a catalog file, starting empty if it does not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let path = path.into();
        let snapshot = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Catalog {} not found, starting empty", path.display());
                CatalogSnapshot::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            state: Mutex::new(snapshot),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn snapshot(&self) -> CatalogSnapshot {
        self.state.lock().await.clone()
    }

    /// Add targets, replacing any with the same id, and write the file.
    pub async fn upsert_targets(&self, targets: Vec<AnnotationTarget>) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        for target in targets {
            match state.targets.iter_mut().find(|t| t.id == target.id) {
                Some(existing) => *existing = target,
                None => state.targets.push(target),
            }
        }
        self.write(&state).await
    }

    async fn write(&self, snapshot: &CatalogSnapshot) -> Result<(), RepositoryError> {
        let json = serde_json::to_string_pretty(snapshot)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl CatalogRepository for JsonCatalog {
    async fn resolve_targets(
        &self,
        filter: &TargetFilter,
    ) -> Result<Vec<AnnotationTarget>, RepositoryError> {
        Ok(self.state.lock().await.resolve(filter))
    }

    async fn save_artifact(
        &self,
        target_id: &str,
        artifact: &GeneratedArtifact,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        state.save_artifact(target_id, artifact)?;
        self.write(&state).await
    }

    async fn load_existing_metadata(
        &self,
        target_id: &str,
    ) -> Result<Option<serde_json::Value>, RepositoryError> {
        Ok(self.state.lock().await.existing_metadata(target_id))
    }

    async fn persist_batch_state(&self, job: &BatchJob) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        state.jobs.insert(job.id.clone(), job.clone());
        self.write(&state).await
    }

    async fn update_batch_progress(
        &self,
        job_id: &str,
        progress: f64,
        status: Option<JobStatus>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        state.update_progress(job_id, progress, status)?;
        self.write(&state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ArtifactPayload, BatchOptions, GeneratedBy, MetaPayload, Operation, TargetKind,
    };
    use chrono::Utc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let catalog = JsonCatalog::open(dir.path().join("catalog.json")).await.unwrap();
        let targets = catalog.resolve_targets(&TargetFilter::default()).await.unwrap();
        assert!(targets.is_empty());
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("catalog.json");

        let catalog = JsonCatalog::open(&path).await.unwrap();
        catalog
            .upsert_targets(vec![AnnotationTarget::new("t1", "Invoices", TargetKind::Category)])
            .await
            .unwrap();
        let artifact = GeneratedArtifact {
            target_id: "t1".to_string(),
            operation: Operation::GenerateMeta,
            payload: ArtifactPayload::Meta(MetaPayload {
                title: "Invoices".to_string(),
                ..MetaPayload::default()
            }),
            confidence: 0.3,
            generated_by: GeneratedBy::Fallback,
            model: None,
            validation_score: 1.0,
            corrections: Vec::new(),
            generated_at: Utc::now(),
        };
        catalog.save_artifact("t1", &artifact).await.unwrap();
        let job = BatchJob::new(
            Operation::GenerateMeta,
            TargetFilter::default(),
            BatchOptions::default(),
        );
        catalog.persist_batch_state(&job).await.unwrap();
        catalog
            .update_batch_progress(&job.id, 50.0, Some(JobStatus::Running))
            .await
            .unwrap();
        drop(catalog);

        let reopened = JsonCatalog::open(&path).await.unwrap();
        let snapshot = reopened.snapshot().await;
        assert_eq!(snapshot.targets.len(), 1);
        assert_eq!(snapshot.artifacts_for("t1").len(), 1);
        assert_eq!(snapshot.jobs[&job.id].progress, 50.0);
        assert_eq!(snapshot.jobs[&job.id].status, JobStatus::Running);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            JsonCatalog::open(&path).await,
            Err(RepositoryError::Serialization(_))
        ));
    }
}
