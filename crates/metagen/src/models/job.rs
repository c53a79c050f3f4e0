//! Batch job state, per-item outcomes and summaries.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::artifact::{GeneratedBy, Operation};
use super::target::TargetFilter;

/// Lifecycle of a batch job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Terminal states never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tuning knobs for a batch job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Targets per chunk.
    pub chunk_size: usize,
    /// Concurrent workers inside one chunk.
    pub parallelism: usize,
    /// Retries per item, shared by generation attempts and persistence.
    pub max_retries: u32,
    /// Linear backoff unit for transport and persistence retries.
    pub base_delay_ms: u64,
    /// Per-slot delay applied when dispatching items within a chunk.
    pub stagger_ms: u64,
    /// Pause between chunks.
    pub chunk_pause_ms: u64,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            chunk_size: 10,
            parallelism: 2,
            max_retries: 3,
            base_delay_ms: 1000,
            stagger_ms: 100,
            chunk_pause_ms: 500,
        }
    }
}

impl BatchOptions {
    /// Options with zero sizes clamped to one.
    pub fn normalized(mut self) -> Self {
        self.chunk_size = self.chunk_size.max(1);
        self.parallelism = self.parallelism.max(1);
        self
    }

    /// Options with every delay zeroed, for tests and local runs.
    pub fn immediate(mut self) -> Self {
        self.base_delay_ms = 0;
        self.stagger_ms = 0;
        self.chunk_pause_ms = 0;
        self
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }

    pub fn chunk_pause(&self) -> Duration {
        Duration::from_millis(self.chunk_pause_ms)
    }
}

/// Outcome of processing one target inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItemResult {
    pub target_id: String,
    pub success: bool,
    /// Retries consumed by generation and persistence together, never more than `max_retries`.
    pub retries: u32,
    pub duration_ms: u64,
    pub quality_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_by: Option<GeneratedBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Why the item failed; set only when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Provider, parse and validation errors absorbed on the way to the artifact.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub absorbed_errors: Vec<String>,
    /// Zero-based chunk this item was processed in.
    pub chunk: usize,
}

/// Aggregate statistics for a batch job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub remaining: usize,
    pub ai: usize,
    pub hybrid: usize,
    pub fallback: usize,
    pub average_confidence: f64,
    pub category_distribution: BTreeMap<String, usize>,
    /// `succeeded / processed`, zero when nothing was processed.
    pub success_ratio: f64,
    pub throughput_per_minute: f64,
    pub elapsed_ms: u64,
}

/// A bulk annotation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    pub id: String,
    pub operation: Operation,
    pub filter: TargetFilter,
    pub options: BatchOptions,
    pub status: JobStatus,
    /// Percentage in `[0, 100]`, never decreasing.
    pub progress: f64,
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<BatchSummary>,
}

impl BatchJob {
    pub fn new(operation: Operation, filter: TargetFilter, options: BatchOptions) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            operation,
            filter,
            options: options.normalized(),
            status: JobStatus::Pending,
            progress: 0.0,
            total: 0,
            processed: 0,
            succeeded: 0,
            failed: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
            summary: None,
        }
    }

    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.processed)
    }

    /// Raise progress to match `processed`; progress never moves backwards.
    pub fn advance_progress(&mut self) {
        let current = if self.total == 0 {
            100.0
        } else {
            (self.processed as f64 / self.total as f64 * 100.0).min(100.0)
        };
        self.progress = self.progress.max(current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn options_are_normalized() {
        let options = BatchOptions {
            chunk_size: 0,
            parallelism: 0,
            ..BatchOptions::default()
        };
        let job = BatchJob::new(Operation::GenerateMeta, TargetFilter::default(), options);
        assert_eq!(job.options.chunk_size, 1);
        assert_eq!(job.options.parallelism, 1);
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[test]
    fn progress_is_monotonic() {
        let mut job = BatchJob::new(
            Operation::GenerateMeta,
            TargetFilter::default(),
            BatchOptions::default(),
        );
        job.total = 4;
        job.processed = 2;
        job.advance_progress();
        assert_eq!(job.progress, 50.0);

        job.processed = 1;
        job.advance_progress();
        assert_eq!(job.progress, 50.0);
        assert_eq!(job.remaining(), 3);
    }

    #[test]
    fn partial_options_use_defaults() {
        let options: BatchOptions = serde_json::from_str(r#"{"parallelism": 4}"#).unwrap();
        assert_eq!(options.parallelism, 4);
        assert_eq!(options.chunk_size, 10);
        assert_eq!(options.max_retries, 3);
    }
}
