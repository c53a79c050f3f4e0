//! Job lifecycle: submit, run chunk by chunk, poll, cancel, wait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tracing::{debug, info, warn};

use metagen::models::{
    BatchItemResult, BatchJob, BatchOptions, JobStatus, Operation, TargetFilter,
};
use metagen::repository::CatalogRepository;

use super::chunk::ChunkContext;
use super::summary::summarize;
use super::{emit, BatchError, BatchEvent};
use crate::services::annotation::AnnotationGenerator;

/// Mutable state of one submitted job.
struct JobEntry {
    job: RwLock<BatchJob>,
    results: Mutex<Vec<BatchItemResult>>,
    cancelled: Arc<AtomicBool>,
    done: watch::Sender<bool>,
}

impl JobEntry {
    fn new(job: BatchJob) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            job: RwLock::new(job),
            results: Mutex::new(Vec::new()),
            cancelled: Arc::new(AtomicBool::new(false)),
            done,
        }
    }
}

/// Runs batch jobs in background tasks.
///
/// Jobs live in a map owned by this executor; clones share it.
#[derive(Clone)]
pub struct BatchExecutor {
    generator: Arc<AnnotationGenerator>,
    repository: Arc<dyn CatalogRepository>,
    jobs: Arc<DashMap<String, Arc<JobEntry>>>,
}

impl BatchExecutor {
    pub fn new(generator: Arc<AnnotationGenerator>, repository: Arc<dyn CatalogRepository>) -> Self {
        Self {
            generator,
            repository,
            jobs: Arc::new(DashMap::new()),
        }
    }

    /// Create a job and start it in the background. Returns the job id.
    pub async fn submit(
        &self,
        operation: Operation,
        filter: TargetFilter,
        options: BatchOptions,
        events: Option<mpsc::Sender<BatchEvent>>,
    ) -> String {
        let job = BatchJob::new(operation, filter, options);
        let job_id = job.id.clone();

        if let Err(e) = self.repository.persist_batch_state(&job).await {
            warn!("Could not persist new job {}: {}", job_id, e);
        }

        let entry = Arc::new(JobEntry::new(job));
        self.jobs.insert(job_id.clone(), entry.clone());
        info!("Submitted {} batch job {}", operation, job_id);

        let executor = self.clone();
        tokio::spawn(async move {
            executor.run_job(entry, events).await;
        });
        job_id
    }

    /// Current job state, including the partial summary.
    pub async fn poll(&self, job_id: &str) -> Result<BatchJob, BatchError> {
        let entry = self.entry(job_id)?;
        let job = entry.job.read().await.clone();
        Ok(job)
    }

    /// Request cancellation. Returns false if the job had already finished.
    ///
    /// Workers finish the item they hold; nothing new is dispatched.
    pub async fn cancel(&self, job_id: &str) -> Result<bool, BatchError> {
        let entry = self.entry(job_id)?;
        let mut job = entry.job.write().await;
        if job.status.is_terminal() {
            return Ok(false);
        }
        entry.cancelled.store(true, Ordering::SeqCst);
        job.status = JobStatus::Cancelled;
        info!("Cancelling batch job {}", job_id);
        Ok(true)
    }

    /// Wait until the job's background task has finished.
    pub async fn wait(&self, job_id: &str) -> Result<BatchJob, BatchError> {
        let entry = self.entry(job_id)?;
        let mut done = entry.done.subscribe();
        if done.wait_for(|finished| *finished).await.is_err() {
            debug!("Job {} signal closed before completion", job_id);
        }
        let job = entry.job.read().await.clone();
        Ok(job)
    }

    /// Item results produced so far.
    pub async fn results(&self, job_id: &str) -> Result<Vec<BatchItemResult>, BatchError> {
        let entry = self.entry(job_id)?;
        let results = entry.results.lock().await.clone();
        Ok(results)
    }

    /// Ids of all jobs known to this executor.
    pub fn job_ids(&self) -> Vec<String> {
        self.jobs.iter().map(|e| e.key().clone()).collect()
    }

    fn entry(&self, job_id: &str) -> Result<Arc<JobEntry>, BatchError> {
        self.jobs
            .get(job_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| BatchError::NotFound(job_id.to_string()))
    }

    async fn run_job(&self, entry: Arc<JobEntry>, events: Option<mpsc::Sender<BatchEvent>>) {
        let started = Instant::now();
        let events = events.as_ref();

        let (job_id, operation, filter, options, status) = {
            let mut job = entry.job.write().await;
            if !job.status.is_terminal() {
                job.status = JobStatus::Running;
            }
            job.started_at = Some(Utc::now());
            (
                job.id.clone(),
                job.operation,
                job.filter.clone(),
                job.options.clone(),
                job.status,
            )
        };
        if let Err(e) = self
            .repository
            .update_batch_progress(&job_id, 0.0, Some(status))
            .await
        {
            warn!("Could not record start of job {}: {}", job_id, e);
        }

        let targets = match self.repository.resolve_targets(&filter).await {
            Ok(targets) => targets,
            Err(e) => {
                warn!("Batch job {} failed to resolve targets: {}", job_id, e);
                let job = {
                    let mut job = entry.job.write().await;
                    if !job.status.is_terminal() {
                        job.status = JobStatus::Failed;
                    }
                    job.error = Some(e.to_string());
                    job.summary = Some(summarize(0, &[], started.elapsed()));
                    job.completed_at = Some(Utc::now());
                    job.clone()
                };
                self.finish(&entry, job, events).await;
                return;
            }
        };

        let total = targets.len();
        entry.job.write().await.total = total;
        info!("Batch job {}: {} targets", job_id, total);
        emit(
            events,
            BatchEvent::JobStarted {
                job_id: job_id.clone(),
                total,
            },
        );

        let ctx = ChunkContext {
            job_id: job_id.clone(),
            operation,
            options: options.clone(),
            generator: self.generator.clone(),
            repository: self.repository.clone(),
            events: events.cloned(),
            cancelled: entry.cancelled.clone(),
        };

        let chunks: Vec<&[_]> = targets.chunks(options.chunk_size).collect();
        let chunk_count = chunks.len();
        for (index, chunk) in chunks.into_iter().enumerate() {
            if entry.cancelled.load(Ordering::SeqCst) {
                break;
            }

            let chunk_results = ctx.run(index, chunk).await;

            let (processed, progress, status) = {
                let mut results = entry.results.lock().await;
                results.extend(chunk_results.iter().cloned());

                let mut job = entry.job.write().await;
                job.processed += chunk_results.len();
                job.succeeded += chunk_results.iter().filter(|r| r.success).count();
                job.failed += chunk_results.iter().filter(|r| !r.success).count();
                job.advance_progress();
                job.summary = Some(summarize(total, &results, started.elapsed()));
                (job.processed, job.progress, job.status)
            };
            debug!(
                "Batch job {} chunk {}/{}: {}/{} processed",
                job_id,
                index + 1,
                chunk_count,
                processed,
                total
            );

            if let Err(e) = self
                .repository
                .update_batch_progress(&job_id, progress, Some(status))
                .await
            {
                warn!("Could not record progress for job {}: {}", job_id, e);
            }
            emit(
                events,
                BatchEvent::ChunkCompleted {
                    job_id: job_id.clone(),
                    chunk: index,
                    processed,
                    total,
                    progress,
                },
            );

            let last = index + 1 == chunk_count;
            if !last && !options.chunk_pause().is_zero() && !entry.cancelled.load(Ordering::SeqCst) {
                tokio::time::sleep(options.chunk_pause()).await;
            }
        }

        let job = {
            let results = entry.results.lock().await;
            let mut job = entry.job.write().await;
            if entry.cancelled.load(Ordering::SeqCst) {
                job.status = JobStatus::Cancelled;
            } else {
                job.status = JobStatus::Completed;
                job.advance_progress();
            }
            job.summary = Some(summarize(total, &results, started.elapsed()));
            job.completed_at = Some(Utc::now());
            job.clone()
        };
        self.finish(&entry, job, events).await;
    }

    /// Persist the terminal state, emit `JobFinished` and wake waiters.
    async fn finish(
        &self,
        entry: &JobEntry,
        job: BatchJob,
        events: Option<&mpsc::Sender<BatchEvent>>,
    ) {
        info!(
            "Batch job {} {}: {} succeeded, {} failed, {} remaining",
            job.id,
            job.status,
            job.succeeded,
            job.failed,
            job.remaining()
        );
        if let Err(e) = self.repository.persist_batch_state(&job).await {
            warn!("Could not persist final state of job {}: {}", job.id, e);
        }
        emit(
            events,
            BatchEvent::JobFinished {
                job_id: job.id.clone(),
                status: job.status,
                summary: job.summary.clone().unwrap_or_default(),
            },
        );
        entry.done.send_replace(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use metagen::config::PromptOverrides;
    use metagen::llm::{ProviderPool, SimulatedAdapter, SimulatedBehavior};
    use metagen::models::{AnnotationTarget, Capability, ModelDescriptor, TargetKind};
    use metagen::registry::{ModelRegistry, ModelSelector, SelectionWeights};
    use metagen::models::GeneratedArtifact;
    use metagen::repository::{InMemoryCatalog, RepositoryError};
    use metagen::validation::{ValidationEngine, ValidationRules};

    use crate::services::annotation::PromptBuilder;

    /// Catalog that remembers every status passed to `update_batch_progress`.
    struct RecordingCatalog {
        inner: InMemoryCatalog,
        statuses: std::sync::Mutex<Vec<Option<JobStatus>>>,
    }

    impl RecordingCatalog {
        fn new(targets: Vec<AnnotationTarget>) -> Self {
            Self {
                inner: InMemoryCatalog::new(targets),
                statuses: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn statuses(&self) -> Vec<Option<JobStatus>> {
            self.statuses.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl CatalogRepository for RecordingCatalog {
        async fn resolve_targets(
            &self,
            filter: &TargetFilter,
        ) -> Result<Vec<AnnotationTarget>, RepositoryError> {
            self.inner.resolve_targets(filter).await
        }

        async fn save_artifact(
            &self,
            target_id: &str,
            artifact: &GeneratedArtifact,
        ) -> Result<(), RepositoryError> {
            self.inner.save_artifact(target_id, artifact).await
        }

        async fn load_existing_metadata(
            &self,
            target_id: &str,
        ) -> Result<Option<serde_json::Value>, RepositoryError> {
            self.inner.load_existing_metadata(target_id).await
        }

        async fn persist_batch_state(&self, job: &BatchJob) -> Result<(), RepositoryError> {
            self.inner.persist_batch_state(job).await
        }

        async fn update_batch_progress(
            &self,
            job_id: &str,
            progress: f64,
            status: Option<JobStatus>,
        ) -> Result<(), RepositoryError> {
            self.statuses.lock().unwrap().push(status);
            self.inner.update_batch_progress(job_id, progress, status).await
        }
    }

    fn executor(targets: usize) -> (BatchExecutor, Arc<InMemoryCatalog>) {
        let registry = Arc::new(ModelRegistry::new(
            vec![ModelDescriptor::new("sim-model", "sim")
                .with_capabilities([Capability::ComplexWildcard])],
            None,
        ));
        let mut pool = ProviderPool::new(registry.clone(), Duration::from_secs(5), Duration::from_secs(1));
        pool.register(Arc::new(SimulatedAdapter::new("sim", SimulatedBehavior::Valid)));
        let generator = AnnotationGenerator::new(
            ModelSelector::new(registry, SelectionWeights::default()),
            Arc::new(pool),
            ValidationEngine::default(),
            PromptBuilder::new(PromptOverrides::default(), ValidationRules::default(), 2000),
        );
        let catalog = Arc::new(InMemoryCatalog::new(
            (0..targets)
                .map(|i| AnnotationTarget::new(format!("t{}", i), format!("Item {}", i), TargetKind::Product))
                .collect(),
        ));
        (
            BatchExecutor::new(Arc::new(generator), catalog.clone()),
            catalog,
        )
    }

    #[tokio::test]
    async fn runs_to_completion() {
        let (executor, catalog) = executor(5);
        let options = BatchOptions {
            chunk_size: 2,
            ..BatchOptions::default()
        }
        .immediate();
        let job_id = executor
            .submit(Operation::GenerateMeta, TargetFilter::default(), options, None)
            .await;

        let job = executor.wait(&job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.total, 5);
        assert_eq!(job.processed, 5);
        assert_eq!(job.succeeded, 5);
        assert_eq!(job.progress, 100.0);
        assert_eq!(job.summary.as_ref().unwrap().ai, 5);

        let results = executor.results(&job_id).await.unwrap();
        assert_eq!(results.iter().filter(|r| r.chunk == 2).count(), 1);
        assert_eq!(catalog.artifacts_for("t4").await.len(), 1);
        assert_eq!(catalog.job(&job_id).await.unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn empty_selection_completes() {
        let (executor, _) = executor(0);
        let job_id = executor
            .submit(
                Operation::GenerateRules,
                TargetFilter::default(),
                BatchOptions::default().immediate(),
                None,
            )
            .await;
        let job = executor.wait(&job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.total, 0);
        assert_eq!(job.progress, 100.0);
    }

    #[tokio::test]
    async fn unknown_job() {
        let (executor, _) = executor(1);
        assert!(matches!(
            executor.poll("nope").await,
            Err(BatchError::NotFound(_))
        ));
        assert!(executor.cancel("nope").await.is_err());
    }

    #[tokio::test]
    async fn cancel_after_finish_is_a_no_op() {
        let (executor, _) = executor(1);
        let job_id = executor
            .submit(
                Operation::GenerateMeta,
                TargetFilter::default(),
                BatchOptions::default().immediate(),
                None,
            )
            .await;
        executor.wait(&job_id).await.unwrap();
        assert!(!executor.cancel(&job_id).await.unwrap());
        assert_eq!(
            executor.poll(&job_id).await.unwrap().status,
            JobStatus::Completed
        );
    }

    #[tokio::test]
    async fn cancel_before_start_is_never_recorded_as_running() {
        let (base, _) = executor(0);
        let targets = (0..3)
            .map(|i| AnnotationTarget::new(format!("t{}", i), format!("Item {}", i), TargetKind::Product))
            .collect();
        let catalog = Arc::new(RecordingCatalog::new(targets));
        let executor = BatchExecutor::new(base.generator.clone(), catalog.clone());

        let job_id = executor
            .submit(
                Operation::GenerateMeta,
                TargetFilter::default(),
                BatchOptions::default().immediate(),
                None,
            )
            .await;
        assert!(executor.cancel(&job_id).await.unwrap());

        let job = executor.wait(&job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert_eq!(job.processed, 0);
        let statuses = catalog.statuses();
        assert!(!statuses.is_empty());
        assert!(!statuses.contains(&Some(JobStatus::Running)));
    }

    #[tokio::test]
    async fn undrained_event_receiver_does_not_stall_the_job() {
        let (executor, _) = executor(6);
        let (event_tx, _event_rx) = mpsc::channel(1);
        let options = BatchOptions {
            chunk_size: 2,
            ..BatchOptions::default()
        }
        .immediate();

        let job_id = executor
            .submit(Operation::GenerateMeta, TargetFilter::default(), options, Some(event_tx))
            .await;
        let job = tokio::time::timeout(Duration::from_secs(5), executor.wait(&job_id))
            .await
            .expect("job finished while events were not drained")
            .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.processed, 6);
    }
}
