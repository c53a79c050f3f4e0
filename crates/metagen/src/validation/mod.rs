//! Structural and semantic validation of artifact payloads.
//!
//! Validation is pure: the same payload always yields the same report.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{ArtifactPayload, FormPayload, GeneratedArtifact, MetaPayload, RulePayload};

/// Whitelists and thresholds applied to payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationRules {
    /// Minimum description length in characters.
    pub min_description_len: usize,
    pub allowed_categories: Vec<String>,
    pub allowed_field_types: Vec<String>,
    pub allowed_severities: Vec<String>,
}

impl Default for ValidationRules {
    fn default() -> Self {
        fn owned(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }

        Self {
            min_description_len: 20,
            allowed_categories: owned(&[
                "finance",
                "human_resources",
                "inventory",
                "sales",
                "operations",
                "compliance",
                "general",
            ]),
            allowed_field_types: owned(&[
                "text", "textarea", "number", "date", "select", "checkbox", "email",
            ]),
            allowed_severities: owned(&["info", "warning", "error"]),
        }
    }
}

impl ValidationRules {
    pub fn allows_category(&self, category: &str) -> bool {
        contains_ci(&self.allowed_categories, category)
    }

    pub fn allows_field_type(&self, field_type: &str) -> bool {
        contains_ci(&self.allowed_field_types, field_type)
    }

    pub fn allows_severity(&self, severity: &str) -> bool {
        contains_ci(&self.allowed_severities, severity)
    }
}

fn contains_ci(list: &[String], value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && list.iter().any(|item| item.eq_ignore_ascii_case(value))
}

/// Kind of validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    Missing,
    TooShort,
    Empty,
    NotAllowed,
}

/// One failed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub code: IssueCode,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of validating one payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    /// Number of checks evaluated.
    pub checks: usize,
}

impl ValidationReport {
    /// Fraction of checks that passed.
    pub fn score(&self) -> f64 {
        if self.checks == 0 {
            1.0
        } else {
            self.checks.saturating_sub(self.errors.len()) as f64 / self.checks as f64
        }
    }

    /// Human-readable error lines, as fed back to models.
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

/// Accumulates checks for one report.
struct Checker<'a> {
    rules: &'a ValidationRules,
    errors: Vec<ValidationIssue>,
    checks: usize,
}

impl<'a> Checker<'a> {
    fn new(rules: &'a ValidationRules) -> Self {
        Self {
            rules,
            errors: Vec::new(),
            checks: 0,
        }
    }

    fn check(&mut self, passed: bool, field: &str, code: IssueCode, message: impl Into<String>) {
        self.checks += 1;
        if !passed {
            self.errors.push(ValidationIssue {
                field: field.to_string(),
                code,
                message: message.into(),
            });
        }
    }

    fn required(&mut self, field: &str, value: &str) {
        self.check(!value.trim().is_empty(), field, IssueCode::Missing, "is required");
    }

    fn description(&mut self, value: &str) {
        let len = value.trim().chars().count();
        if len == 0 {
            self.check(false, "description", IssueCode::Missing, "is required");
        } else {
            let min = self.rules.min_description_len;
            self.check(
                len >= min,
                "description",
                IssueCode::TooShort,
                format!("must be at least {} characters (got {})", min, len),
            );
        }
    }

    fn category(&mut self, value: &str) {
        if value.trim().is_empty() {
            self.check(false, "category", IssueCode::Missing, "is required");
        } else {
            let allowed = self.rules.allows_category(value);
            self.check(
                allowed,
                "category",
                IssueCode::NotAllowed,
                format!(
                    "'{}' is not one of: {}",
                    value,
                    self.rules.allowed_categories.join(", ")
                ),
            );
        }
    }

    fn non_empty<T>(&mut self, field: &str, items: &[T]) {
        self.check(!items.is_empty(), field, IssueCode::Empty, "must not be empty");
    }

    fn finish(self) -> ValidationReport {
        ValidationReport {
            valid: self.errors.is_empty(),
            errors: self.errors,
            checks: self.checks,
        }
    }
}

/// Validates payloads against a rule set.
#[derive(Debug, Clone, Default)]
pub struct ValidationEngine {
    rules: ValidationRules,
}

impl ValidationEngine {
    pub fn new(rules: ValidationRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    pub fn validate(&self, payload: &ArtifactPayload) -> ValidationReport {
        let mut checker = Checker::new(&self.rules);
        match payload {
            ArtifactPayload::Meta(meta) => self.check_meta(&mut checker, meta),
            ArtifactPayload::Rules(rules) => self.check_rules(&mut checker, rules),
            ArtifactPayload::Form(form) => self.check_form(&mut checker, form),
        }
        checker.finish()
    }

    pub fn validate_artifact(&self, artifact: &GeneratedArtifact) -> ValidationReport {
        self.validate(&artifact.payload)
    }

    fn check_meta(&self, checker: &mut Checker<'_>, meta: &MetaPayload) {
        checker.required("title", &meta.title);
        checker.description(&meta.description);
        checker.non_empty("keywords", &meta.keywords);
        checker.category(&meta.category);
    }

    fn check_rules(&self, checker: &mut Checker<'_>, payload: &RulePayload) {
        checker.description(&payload.description);
        checker.category(&payload.category);
        checker.non_empty("rules", &payload.rules);

        for (i, rule) in payload.rules.iter().enumerate() {
            checker.required(&format!("rules[{}].condition", i), &rule.condition);
            checker.required(&format!("rules[{}].action", i), &rule.action);
            let allowed = self.rules.allows_severity(&rule.severity);
            checker.check(
                allowed,
                &format!("rules[{}].severity", i),
                IssueCode::NotAllowed,
                format!(
                    "'{}' is not one of: {}",
                    rule.severity,
                    self.rules.allowed_severities.join(", ")
                ),
            );
        }
    }

    fn check_form(&self, checker: &mut Checker<'_>, form: &FormPayload) {
        checker.required("title", &form.title);
        checker.description(&form.description);
        checker.non_empty("fields", &form.fields);

        for (i, field) in form.fields.iter().enumerate() {
            checker.required(&format!("fields[{}].name", i), &field.name);
            let allowed = self.rules.allows_field_type(&field.field_type);
            checker.check(
                allowed,
                &format!("fields[{}].field_type", i),
                IssueCode::NotAllowed,
                format!(
                    "'{}' is not one of: {}",
                    field.field_type,
                    self.rules.allowed_field_types.join(", ")
                ),
            );
            if field.field_type.eq_ignore_ascii_case("select") {
                checker.non_empty(&format!("fields[{}].options", i), &field.options);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FormField, RuleSpec};

    fn good_meta() -> MetaPayload {
        MetaPayload {
            title: "Invoices".to_string(),
            description: "Customer invoices issued by the billing team.".to_string(),
            keywords: vec!["billing".to_string()],
            category: "finance".to_string(),
            tags: Vec::new(),
        }
    }

    #[test]
    fn valid_meta_scores_one() {
        let engine = ValidationEngine::default();
        let report = engine.validate(&ArtifactPayload::Meta(good_meta()));
        assert!(report.valid);
        assert_eq!(report.score(), 1.0);
        assert_eq!(report.checks, 4);
    }

    #[test]
    fn reports_each_failed_check() {
        let engine = ValidationEngine::default();
        let mut meta = good_meta();
        meta.description = "Too short".to_string();
        meta.keywords.clear();
        meta.category = "Misc".to_string();

        let report = engine.validate(&ArtifactPayload::Meta(meta));
        assert!(!report.valid);
        let codes: Vec<IssueCode> = report.errors.iter().map(|e| e.code).collect();
        assert_eq!(
            codes,
            vec![IssueCode::TooShort, IssueCode::Empty, IssueCode::NotAllowed]
        );
        assert_eq!(report.score(), 0.25);
        assert!(report.messages()[0].starts_with("description: "));
    }

    #[test]
    fn category_whitelist_is_case_insensitive() {
        let mut meta = good_meta();
        meta.category = "Finance".to_string();
        assert!(ValidationEngine::default()
            .validate(&ArtifactPayload::Meta(meta))
            .valid);
    }

    #[test]
    fn rule_severity_is_checked() {
        let payload = ArtifactPayload::Rules(RulePayload {
            description: "Approval rules for purchase orders over budget.".to_string(),
            category: "finance".to_string(),
            rules: vec![RuleSpec {
                name: "over-budget".to_string(),
                condition: "amount > budget".to_string(),
                action: "require approval".to_string(),
                severity: "critical".to_string(),
            }],
        });
        let report = ValidationEngine::default().validate(&payload);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].field, "rules[0].severity");
    }

    #[test]
    fn select_fields_need_options() {
        let payload = ArtifactPayload::Form(FormPayload {
            title: "Leave request".to_string(),
            description: "Form used by employees to request leave.".to_string(),
            fields: vec![FormField {
                name: "leave_type".to_string(),
                label: "Leave type".to_string(),
                field_type: "select".to_string(),
                required: true,
                options: Vec::new(),
            }],
        });
        let report = ValidationEngine::default().validate(&payload);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].code, IssueCode::Empty);
    }

    #[test]
    fn validation_is_idempotent() {
        let engine = ValidationEngine::default();
        let payloads = [
            ArtifactPayload::Meta(good_meta()),
            ArtifactPayload::Meta(MetaPayload::default()),
            ArtifactPayload::Rules(RulePayload::default()),
            ArtifactPayload::Form(FormPayload::default()),
        ];
        for payload in &payloads {
            assert_eq!(engine.validate(payload), engine.validate(payload));
        }
    }

    #[test]
    fn empty_payload_fails_required_fields() {
        let report = ValidationEngine::default().validate(&ArtifactPayload::Form(FormPayload::default()));
        assert!(!report.valid);
        assert_eq!(report.checks, 3);
        assert_eq!(report.score(), 0.0);
    }
}
