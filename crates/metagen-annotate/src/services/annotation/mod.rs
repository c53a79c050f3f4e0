//! Annotation generation: prompt, invoke, parse, validate, correct, fall back.
//!
//! The `AnnotationGenerator` runs a bounded correction loop against the selected
//! model. When the loop cannot produce a valid artifact, the deterministic
//! `FallbackGenerator` takes over, so generation itself never fails.

mod fallback;
mod generator;
mod parser;
mod prompts;
mod types;

pub use fallback::{FallbackGenerator, FALLBACK_CONFIDENCE};
pub use generator::{merge_confidence, AnnotationGenerator};
pub use parser::{extract_json, parse_payload, ParsedPayload};
pub use prompts::PromptBuilder;
pub use types::{AnnotationError, CorrectionPolicy, GenerationOutcome};
