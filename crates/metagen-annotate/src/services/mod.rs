pub mod annotation;
pub mod batch;
mod service;

pub use annotation::{
    AnnotationError, AnnotationGenerator, CorrectionPolicy, FallbackGenerator, GenerationOutcome,
    PromptBuilder,
};
pub use batch::{BatchError, BatchEvent, BatchExecutor};
pub use service::{AnnotationService, ServiceError};
