//! Types shared across the generation pipeline.

use std::time::Duration;

use thiserror::Error;

use metagen::llm::TransportError;
use metagen::models::GeneratedArtifact;
use metagen::registry::SelectionError;

/// Errors observed while generating one artifact.
///
/// None of these escape `generate`: they are collected as evidence alongside
/// the artifact that was eventually produced.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AnnotationError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Malformed payload: {0}")]
    Parse(String),

    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("{0}")]
    NoCapableModel(#[from] SelectionError),
}

/// Bounds for the correction loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrectionPolicy {
    /// Retries after the first attempt; the loop makes at most `max_retries + 1` calls.
    pub max_retries: u32,
    /// Retries parse failures may consume; `None` shares `max_retries`.
    pub parse_retry_budget: Option<u32>,
    /// Base delay before retrying after a transport error; retry `n` waits `n * retry_delay`.
    pub retry_delay: Duration,
}

impl Default for CorrectionPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            parse_retry_budget: None,
            retry_delay: Duration::ZERO,
        }
    }
}

impl CorrectionPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }
}

/// What `generate` returns: always an artifact, plus what went wrong on the way.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub artifact: GeneratedArtifact,
    /// Model calls made (transport failures included).
    pub attempts: u32,
    pub errors: Vec<AnnotationError>,
}
