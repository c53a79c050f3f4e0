//! Annotation generation, correction and batch execution for metagen.

pub mod services;

pub use services::{
    AnnotationError, AnnotationGenerator, AnnotationService, BatchError, BatchEvent,
    BatchExecutor, CorrectionPolicy, FallbackGenerator, GenerationOutcome, ServiceError,
};
