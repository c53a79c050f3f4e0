//! Bulk annotation: chunked execution with a bounded worker pool per chunk.

mod chunk;
mod executor;
mod summary;

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use metagen::models::{BatchSummary, GeneratedBy, JobStatus};

pub use executor::BatchExecutor;
pub use summary::summarize;

/// Events emitted while a batch job runs.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    JobStarted {
        job_id: String,
        total: usize,
    },
    ItemCompleted {
        job_id: String,
        target_id: String,
        generated_by: GeneratedBy,
        confidence: f64,
    },
    ItemFailed {
        job_id: String,
        target_id: String,
        error: String,
    },
    /// Emitted once per chunk; progress is chunk-granular.
    ChunkCompleted {
        job_id: String,
        chunk: usize,
        processed: usize,
        total: usize,
        progress: f64,
    },
    JobFinished {
        job_id: String,
        status: JobStatus,
        summary: BatchSummary,
    },
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Batch job not found: {0}")]
    NotFound(String),
}

/// Deliver an event without blocking the job.
///
/// A receiver that stops draining loses events once the channel is full; a
/// dropped receiver is ignored.
pub(super) fn emit(events: Option<&mpsc::Sender<BatchEvent>>, event: BatchEvent) {
    let Some(tx) = events else {
        return;
    };
    if let Err(TrySendError::Full(event)) = tx.try_send(event) {
        debug!("Event channel full, dropping {:?}", event);
    }
}
