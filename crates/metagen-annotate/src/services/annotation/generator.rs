//! The correction loop: select, prompt, invoke, parse, validate, retry.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use metagen::llm::ProviderPool;
use metagen::models::{
    AnnotationTarget, CorrectionRecord, GeneratedArtifact, GeneratedBy, Operation, PriorityMode,
};
use metagen::registry::ModelSelector;
use metagen::utils::{linear_backoff, truncate};
use metagen::validation::ValidationEngine;

use super::fallback::FallbackGenerator;
use super::parser::parse_payload;
use super::prompts::PromptBuilder;
use super::types::{AnnotationError, CorrectionPolicy, GenerationOutcome};

/// Confidence assumed when the model does not report one.
const DEFAULT_REPORTED_CONFIDENCE: f64 = 0.7;

/// Penalty per correction round that was needed.
const CORRECTION_PENALTY: f64 = 0.1;

/// Longest rejected output echoed back in a correction prompt.
const MAX_PREVIOUS_CHARS: usize = 4000;

/// Combine model-reported confidence with the validation score.
pub fn merge_confidence(reported: Option<f64>, validation_score: f64, corrections: usize) -> f64 {
    let reported = reported.unwrap_or(DEFAULT_REPORTED_CONFIDENCE);
    (0.6 * reported + 0.4 * validation_score - CORRECTION_PENALTY * corrections as f64)
        .clamp(0.0, 1.0)
}

/// Produces one artifact per call, never failing.
pub struct AnnotationGenerator {
    selector: ModelSelector,
    providers: Arc<ProviderPool>,
    validator: ValidationEngine,
    prompts: PromptBuilder,
    fallback: FallbackGenerator,
    policy: CorrectionPolicy,
}

impl AnnotationGenerator {
    pub fn new(
        selector: ModelSelector,
        providers: Arc<ProviderPool>,
        validator: ValidationEngine,
        prompts: PromptBuilder,
    ) -> Self {
        let fallback = FallbackGenerator::new(validator.rules().clone());
        Self {
            selector,
            providers,
            validator,
            prompts,
            fallback,
            policy: CorrectionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: CorrectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> CorrectionPolicy {
        self.policy
    }

    pub fn validator(&self) -> &ValidationEngine {
        &self.validator
    }

    pub fn selector(&self) -> &ModelSelector {
        &self.selector
    }

    pub fn providers(&self) -> &Arc<ProviderPool> {
        &self.providers
    }

    /// Generate with the default correction policy.
    pub async fn generate(
        &self,
        target: &AnnotationTarget,
        operation: Operation,
        existing: Option<&Value>,
    ) -> GenerationOutcome {
        self.generate_with(target, operation, existing, self.policy)
            .await
    }

    /// Run at most `policy.max_retries + 1` attempts, then fall back.
    ///
    /// Transport errors retry the same prompt after a linear backoff of
    /// `policy.retry_delay`. Parse and validation failures
    /// turn into a correction prompt carrying the rejected output and its errors.
    pub async fn generate_with(
        &self,
        target: &AnnotationTarget,
        operation: Operation,
        existing: Option<&Value>,
        policy: CorrectionPolicy,
    ) -> GenerationOutcome {
        let capability = operation.capability();
        let parse_budget = policy.parse_retry_budget.unwrap_or(policy.max_retries);

        let mut errors: Vec<AnnotationError> = Vec::new();
        let mut corrections: Vec<CorrectionRecord> = Vec::new();
        // Rejected output and the reasons, fed into the next prompt.
        let mut rejected: Option<(String, Vec<String>)> = None;
        let mut parse_failures = 0u32;
        let mut attempts = 0u32;

        for attempt in 0..=policy.max_retries {
            let mode = if corrections.is_empty() {
                PriorityMode::Balanced
            } else {
                PriorityMode::Accuracy
            };

            let model = match self.selector.select(capability, mode) {
                Ok(model) => model,
                Err(e) => {
                    warn!("No model for {} on {}: {}", operation, target.id, e);
                    errors.push(e.into());
                    break;
                }
            };

            let prompt = match &rejected {
                None => self.prompts.initial(target, operation, existing),
                Some((previous, reasons)) => {
                    self.prompts.correction(target, operation, previous, reasons)
                }
            };

            attempts += 1;
            let raw = match self.providers.invoke(&prompt, &model).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(
                        "Attempt {} for {} via {} failed: {}",
                        attempt + 1,
                        target.id,
                        model.name,
                        e
                    );
                    errors.push(e.into());
                    if attempt < policy.max_retries && !policy.retry_delay.is_zero() {
                        let delay = linear_backoff(policy.retry_delay, attempt + 1);
                        debug!("Retrying {} in {:?}", target.id, delay);
                        tokio::time::sleep(delay).await;
                    }
                    continue;
                }
            };

            let parsed = match parse_payload(&raw, operation) {
                Ok(parsed) => parsed,
                Err(e) => {
                    parse_failures += 1;
                    let message = e.to_string();
                    debug!("Unparseable output from {} for {}: {}", model.name, target.id, message);
                    corrections.push(CorrectionRecord {
                        attempt: attempt + 1,
                        model: Some(model.name.clone()),
                        errors: vec![message.clone()],
                    });
                    errors.push(e);
                    if parse_failures > parse_budget {
                        debug!("Parse retry budget exhausted for {}", target.id);
                        break;
                    }
                    rejected = Some((truncate(&raw, MAX_PREVIOUS_CHARS), vec![message]));
                    continue;
                }
            };

            let report = self.validator.validate(&parsed.payload);
            if report.valid {
                let generated_by = if corrections.is_empty() {
                    GeneratedBy::Ai
                } else {
                    GeneratedBy::Hybrid
                };
                let validation_score = report.score();
                let confidence = merge_confidence(
                    parsed.reported_confidence,
                    validation_score,
                    corrections.len(),
                );
                debug!(
                    target = %target.id,
                    model = %model.name,
                    generated_by = generated_by.as_str(),
                    confidence,
                    "Accepted artifact"
                );
                return GenerationOutcome {
                    artifact: GeneratedArtifact {
                        target_id: target.id.clone(),
                        operation,
                        payload: parsed.payload,
                        confidence,
                        generated_by,
                        model: Some(model.name),
                        validation_score,
                        corrections,
                        generated_at: Utc::now(),
                    },
                    attempts,
                    errors,
                };
            }

            let messages = report.messages();
            debug!(
                "Output from {} for {} rejected: {}",
                model.name,
                target.id,
                messages.join("; ")
            );
            corrections.push(CorrectionRecord {
                attempt: attempt + 1,
                model: Some(model.name.clone()),
                errors: messages.clone(),
            });
            errors.push(AnnotationError::Validation(messages.clone()));
            let previous = serde_json::to_string_pretty(&parsed.payload.body()).unwrap_or_default();
            rejected = Some((truncate(&previous, MAX_PREVIOUS_CHARS), messages));
        }

        info!(
            "Using fallback {} for {} after {} attempt(s)",
            operation, target.id, attempts
        );
        let artifact = self
            .fallback
            .artifact(target, operation, &self.validator, corrections);
        GenerationOutcome {
            artifact,
            attempts,
            errors,
        }
    }
}
