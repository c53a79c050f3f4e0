//! Data models for metagen.

mod artifact;
mod job;
mod metrics;
mod model;
mod target;

pub use artifact::{
    ArtifactPayload, CorrectionRecord, FormField, FormPayload, GeneratedArtifact, GeneratedBy,
    MetaPayload, Operation, RulePayload, RuleSpec,
};
pub use job::{BatchItemResult, BatchJob, BatchOptions, BatchSummary, JobStatus};
pub use metrics::PerformanceMetrics;
pub use model::{
    AccuracyClass, Capability, CapabilitySet, ModelDescriptor, PriorityMode, SpeedClass,
};
pub use target::{AnnotationTarget, TargetFilter, TargetKind};
