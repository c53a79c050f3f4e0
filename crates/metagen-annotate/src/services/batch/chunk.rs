//! One chunk: a bounded pool of workers pulling from a shared cursor.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use metagen::models::{AnnotationTarget, BatchItemResult, BatchOptions, Operation};
use metagen::repository::CatalogRepository;
use metagen::utils::linear_backoff;

use super::{emit, BatchEvent};
use crate::services::annotation::{AnnotationGenerator, CorrectionPolicy};

/// Everything a worker task needs; cheap to clone into each task.
#[derive(Clone)]
pub(super) struct ChunkContext {
    pub job_id: String,
    pub operation: Operation,
    pub options: BatchOptions,
    pub generator: Arc<AnnotationGenerator>,
    pub repository: Arc<dyn CatalogRepository>,
    pub events: Option<mpsc::Sender<BatchEvent>>,
    pub cancelled: Arc<AtomicBool>,
}

impl ChunkContext {
    /// Process `targets` on at most `options.parallelism` worker tasks.
    ///
    /// Cancellation is checked before each claim; an item already claimed runs to
    /// completion. Results come back grouped by worker.
    pub async fn run(&self, chunk: usize, targets: &[AnnotationTarget]) -> Vec<BatchItemResult> {
        let targets: Arc<[AnnotationTarget]> = targets.into();
        let cursor = Arc::new(AtomicUsize::new(0));
        let workers = self.options.parallelism.min(targets.len());

        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let ctx = self.clone();
                let targets = targets.clone();
                let cursor = cursor.clone();
                tokio::spawn(async move { ctx.worker(worker, chunk, &targets, &cursor).await })
            })
            .collect();

        let mut results = Vec::with_capacity(targets.len());
        for handle in join_all(handles).await {
            match handle {
                Ok(items) => results.extend(items),
                Err(e) => warn!("Worker in chunk {} of job {} aborted: {}", chunk, self.job_id, e),
            }
        }
        results
    }

    async fn worker(
        &self,
        worker: usize,
        chunk: usize,
        targets: &[AnnotationTarget],
        cursor: &AtomicUsize,
    ) -> Vec<BatchItemResult> {
        let mut results = Vec::new();
        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                debug!("Worker {} stopping: job {} cancelled", worker, self.job_id);
                break;
            }
            let index = cursor.fetch_add(1, Ordering::SeqCst);
            let Some(target) = targets.get(index) else {
                break;
            };

            let stagger = self.options.stagger() * (index % self.options.parallelism) as u32;
            if !stagger.is_zero() {
                tokio::time::sleep(stagger).await;
            }

            results.push(self.process_item(chunk, target).await);
        }
        results
    }

    async fn process_item(&self, chunk: usize, target: &AnnotationTarget) -> BatchItemResult {
        let started = Instant::now();

        let existing = match self.repository.load_existing_metadata(&target.id).await {
            Ok(Some(metadata)) => Some(metadata),
            Ok(None) => target.metadata.clone(),
            Err(e) => {
                warn!("Could not load metadata for {}: {}", target.id, e);
                target.metadata.clone()
            }
        };

        let policy = CorrectionPolicy {
            max_retries: self.options.max_retries,
            retry_delay: self.options.base_delay(),
            ..self.generator.policy()
        };
        let outcome = self
            .generator
            .generate_with(target, self.operation, existing.as_ref(), policy)
            .await;
        let absorbed_errors: Vec<String> = outcome.errors.iter().map(ToString::to_string).collect();
        if !absorbed_errors.is_empty() {
            debug!(
                "{} absorbed {} error(s) over {} attempt(s)",
                target.id,
                absorbed_errors.len(),
                outcome.attempts
            );
        }
        let artifact = outcome.artifact;

        // Generation retries and save retries share one budget per item.
        let max_retries = self.options.max_retries;
        let mut retries = outcome.attempts.saturating_sub(1).min(max_retries);
        let mut save_retries = 0u32;
        let saved = loop {
            match self.repository.save_artifact(&target.id, &artifact).await {
                Ok(()) => break Ok(()),
                Err(e) if retries < max_retries => {
                    retries += 1;
                    save_retries += 1;
                    let delay = linear_backoff(self.options.base_delay(), save_retries);
                    warn!(
                        "Saving {} failed (retry {}/{} in {:?}): {}",
                        target.id, retries, max_retries, delay, e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => break Err(e),
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        match saved {
            Ok(()) => {
                emit(
                    self.events.as_ref(),
                    BatchEvent::ItemCompleted {
                        job_id: self.job_id.clone(),
                        target_id: target.id.clone(),
                        generated_by: artifact.generated_by,
                        confidence: artifact.confidence,
                    },
                );
                BatchItemResult {
                    target_id: target.id.clone(),
                    success: true,
                    retries,
                    duration_ms,
                    quality_score: artifact.validation_score,
                    generated_by: Some(artifact.generated_by),
                    confidence: Some(artifact.confidence),
                    category: artifact.payload.category().map(str::to_string),
                    error: None,
                    absorbed_errors,
                    chunk,
                }
            }
            Err(e) => {
                let error = e.to_string();
                warn!("Item {} failed after {} retries: {}", target.id, retries, error);
                emit(
                    self.events.as_ref(),
                    BatchEvent::ItemFailed {
                        job_id: self.job_id.clone(),
                        target_id: target.id.clone(),
                        error: error.clone(),
                    },
                );
                BatchItemResult {
                    target_id: target.id.clone(),
                    success: false,
                    retries,
                    duration_ms,
                    quality_score: 0.0,
                    generated_by: None,
                    confidence: None,
                    category: None,
                    error: Some(error),
                    absorbed_errors,
                    chunk,
                }
            }
        }
    }
}
