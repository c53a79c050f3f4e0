//! Default prompts and prompt rendering.

use metagen::config::PromptOverrides;
use metagen::models::{AnnotationTarget, Operation};
use metagen::utils::truncate;
use metagen::validation::ValidationRules;

/// Default prompt for descriptive metadata.
pub const DEFAULT_META_PROMPT: &str = r#"You are cataloguing entries for a business catalog. Write descriptive metadata for the entry below.

Operation: {operation}
Title: {title}
Kind: {kind}
Location: {path}

Existing metadata (may be empty, keep what is still accurate):
{existing}

Respond with ONLY a JSON object with these keys:
- "title": short display title
- "description": 1-3 sentences, at least {min_description} characters
- "keywords": 3-8 lowercase search keywords
- "category": one of {categories}
- "tags": optional short labels
- "confidence": your confidence in this answer, from 0 to 1"#;

/// Default prompt for business rules.
pub const DEFAULT_RULES_PROMPT: &str = r#"You are writing business rules for an entry in a business catalog.

Operation: {operation}
Title: {title}
Kind: {kind}
Location: {path}

Existing metadata:
{existing}

Respond with ONLY a JSON object with these keys:
- "description": what the rules govern, at least {min_description} characters
- "category": one of {categories}
- "rules": list of {"name", "condition", "action", "severity"} where severity is one of {severities}
- "confidence": your confidence in this answer, from 0 to 1"#;

/// Default prompt for input forms.
pub const DEFAULT_FORM_PROMPT: &str = r#"You are designing the data-entry form for an entry in a business catalog.

Operation: {operation}
Title: {title}
Kind: {kind}
Location: {path}

Existing metadata:
{existing}

Respond with ONLY a JSON object with these keys:
- "title": form title
- "description": purpose of the form, at least {min_description} characters
- "fields": list of {"name", "label", "field_type", "required", "options"} where field_type is one of {field_types}; "select" fields need options
- "confidence": your confidence in this answer, from 0 to 1"#;

/// Default prompt for a correction round.
pub const DEFAULT_CORRECTION_PROMPT: &str = r#"Your previous answer for this catalog entry was rejected.

Operation: {operation}
Title: {title}
Kind: {kind}
Location: {path}

Previous answer:
{previous}

Problems found:
{errors}

Return a corrected version as ONLY a JSON object with the same keys, fixing every problem listed. Allowed categories: {categories}. Allowed field types: {field_types}. Allowed severities: {severities}."#;

/// Renders prompts from templates, honoring configured overrides.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    overrides: PromptOverrides,
    rules: ValidationRules,
    max_context_chars: usize,
}

impl PromptBuilder {
    pub fn new(overrides: PromptOverrides, rules: ValidationRules, max_context_chars: usize) -> Self {
        Self {
            overrides,
            rules,
            max_context_chars,
        }
    }

    fn template(&self, operation: Operation) -> &str {
        let (custom, default) = match operation {
            Operation::GenerateMeta => (&self.overrides.meta, DEFAULT_META_PROMPT),
            Operation::GenerateRules => (&self.overrides.rules, DEFAULT_RULES_PROMPT),
            Operation::GenerateForm => (&self.overrides.form, DEFAULT_FORM_PROMPT),
        };
        custom.as_deref().unwrap_or(default)
    }

    /// First-attempt prompt for `target`.
    pub fn initial(
        &self,
        target: &AnnotationTarget,
        operation: Operation,
        existing: Option<&serde_json::Value>,
    ) -> String {
        let existing = existing
            .map(|v| serde_json::to_string_pretty(v).unwrap_or_default())
            .filter(|s| !s.is_empty() && s != "null")
            .unwrap_or_else(|| "(none)".to_string());

        self.render(
            self.template(operation),
            target,
            operation,
            &[("existing", truncate(&existing, self.max_context_chars))],
        )
    }

    /// Follow-up prompt carrying the rejected output and its errors.
    pub fn correction(
        &self,
        target: &AnnotationTarget,
        operation: Operation,
        previous: &str,
        errors: &[String],
    ) -> String {
        let template = self
            .overrides
            .correction
            .as_deref()
            .unwrap_or(DEFAULT_CORRECTION_PROMPT);
        let errors = errors
            .iter()
            .map(|e| format!("- {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        self.render(
            template,
            target,
            operation,
            &[
                ("previous", truncate(previous, self.max_context_chars)),
                ("errors", errors),
            ],
        )
    }

    fn render(
        &self,
        template: &str,
        target: &AnnotationTarget,
        operation: Operation,
        extra: &[(&str, String)],
    ) -> String {
        let mut vars: Vec<(&str, String)> = vec![
            ("operation", operation.as_str().to_string()),
            ("title", target.title.clone()),
            ("kind", target.kind.as_str().to_string()),
            ("path", target.path_display()),
            ("categories", self.rules.allowed_categories.join(", ")),
            ("field_types", self.rules.allowed_field_types.join(", ")),
            ("severities", self.rules.allowed_severities.join(", ")),
            ("min_description", self.rules.min_description_len.to_string()),
        ];
        vars.extend(extra.iter().cloned());

        let mut prompt = template.to_string();
        for (key, value) in vars {
            prompt = prompt.replace(&format!("{{{}}}", key), &value);
        }
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metagen::models::TargetKind;
    use serde_json::json;

    fn builder() -> PromptBuilder {
        PromptBuilder::new(PromptOverrides::default(), ValidationRules::default(), 2000)
    }

    fn target() -> AnnotationTarget {
        AnnotationTarget::new("t1", "Expense claims", TargetKind::Procedure)
            .with_path(["Finance", "Payables"])
    }

    #[test]
    fn initial_prompt_fills_placeholders() {
        let prompt = builder().initial(
            &target(),
            Operation::GenerateMeta,
            Some(&json!({"owner": "ap-team"})),
        );
        assert!(prompt.contains("Operation: generate_meta"));
        assert!(prompt.contains("Title: Expense claims"));
        assert!(prompt.contains("Finance / Payables"));
        assert!(prompt.contains("ap-team"));
        assert!(prompt.contains("human_resources"));
        assert!(!prompt.contains("{title}"));
    }

    #[test]
    fn missing_metadata_is_marked() {
        let prompt = builder().initial(&target(), Operation::GenerateRules, None);
        assert!(prompt.contains("(none)"));
        assert!(prompt.contains("info, warning, error"));
    }

    #[test]
    fn correction_lists_errors() {
        let prompt = builder().correction(
            &target(),
            Operation::GenerateForm,
            r#"{"title": ""}"#,
            &["title: is required".to_string(), "fields: must not be empty".to_string()],
        );
        assert!(prompt.contains("Operation: generate_form"));
        assert!(prompt.contains("- title: is required\n- fields: must not be empty"));
        assert!(prompt.contains(r#"{"title": ""}"#));
    }

    #[test]
    fn overrides_replace_defaults() {
        let overrides = PromptOverrides {
            meta: Some("Describe {title} ({kind}) as JSON.".to_string()),
            ..PromptOverrides::default()
        };
        let builder = PromptBuilder::new(overrides, ValidationRules::default(), 2000);
        assert_eq!(
            builder.initial(&target(), Operation::GenerateMeta, None),
            "Describe Expense claims (procedure) as JSON."
        );
    }
}
