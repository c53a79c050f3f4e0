//! Deterministic, rule-based artifacts used when the AI path gives up.
//!
//! Output depends only on the target and the validation rules, and is shaped to
//! pass those same rules.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;

use metagen::models::{
    AnnotationTarget, ArtifactPayload, CorrectionRecord, FormField, FormPayload,
    GeneratedArtifact, GeneratedBy, MetaPayload, Operation, RulePayload, RuleSpec, TargetKind,
};
use metagen::validation::{ValidationEngine, ValidationRules};

/// Confidence assigned to every fallback artifact.
pub const FALLBACK_CONFIDENCE: f64 = 0.3;

const MAX_KEYWORDS: usize = 8;

/// Keyword patterns mapped to categories, checked in order.
static CATEGORY_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"(?i)\b(invoices?|payments?|billing|tax(es)?|budgets?|ledgers?|accounting|accounts?|expenses?|pric(e|es|ing)|payables?|receivables?)\b").unwrap(),
            "finance",
        ),
        (
            Regex::new(r"(?i)\b(employees?|staff|payroll|salar(y|ies)|leave|hiring|recruit\w*|hr|attendance|onboarding)\b").unwrap(),
            "human_resources",
        ),
        (
            Regex::new(r"(?i)\b(stock|inventory|warehouses?|suppliers?|procurement|purchas\w*|shipments?)\b").unwrap(),
            "inventory",
        ),
        (
            Regex::new(r"(?i)\b(customers?|clients?|orders?|sales|quotes?|leads?|crm|marketing)\b").unwrap(),
            "sales",
        ),
        (
            Regex::new(r"(?i)\b(polic(y|ies)|compliance|audits?|regulat\w*|licen[cs]es?|safety|gdpr)\b").unwrap(),
            "compliance",
        ),
        (
            Regex::new(r"(?i)\b(maintenance|schedul\w*|logistics|production|operations?|dispatch)\b").unwrap(),
            "operations",
        ),
    ]
});

static STOPWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "the", "and", "for", "with", "from", "into", "of", "to", "in", "on", "a", "an", "by",
        "or", "at", "as", "is", "new", "all", "per",
    ]
    .into_iter()
    .collect()
});

/// Builds fallback artifacts.
#[derive(Debug, Clone)]
pub struct FallbackGenerator {
    rules: ValidationRules,
}

impl FallbackGenerator {
    pub fn new(rules: ValidationRules) -> Self {
        Self { rules }
    }

    /// Category inferred from the title and path, restricted to allowed categories.
    pub fn categorize(&self, target: &AnnotationTarget) -> String {
        let haystack = format!("{} {}", target.title, target.path.join(" "));
        CATEGORY_PATTERNS
            .iter()
            .find(|(pattern, category)| {
                pattern.is_match(&haystack) && self.rules.allows_category(category)
            })
            .map(|(_, category)| category.to_string())
            .unwrap_or_else(|| self.default_category())
    }

    fn default_category(&self) -> String {
        if self.rules.allows_category("general") {
            "general".to_string()
        } else {
            self.rules
                .allowed_categories
                .first()
                .cloned()
                .unwrap_or_else(|| "general".to_string())
        }
    }

    /// Lowercased title and path words without stopwords, deduplicated.
    pub fn keywords(&self, target: &AnnotationTarget, category: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut keywords: Vec<String> = target
            .title
            .split(|c: char| !c.is_alphanumeric())
            .chain(target.path.iter().flat_map(|p| p.split(|c: char| !c.is_alphanumeric())))
            .map(str::to_lowercase)
            .filter(|w| w.len() > 2 && !STOPWORDS.contains(w.as_str()))
            .filter(|w| seen.insert(w.clone()))
            .take(MAX_KEYWORDS)
            .collect();

        if keywords.is_empty() {
            keywords.push(target.kind.as_str().to_string());
            if category != target.kind.as_str() {
                keywords.push(category.to_string());
            }
        }
        keywords
    }

    fn description(&self, target: &AnnotationTarget, category: &str, subject: &str) -> String {
        let location = if target.path.is_empty() {
            "the catalog root".to_string()
        } else {
            target.path_display()
        };
        let mut description = format!(
            "{} for the {} \"{}\", filed under {} in the {} area.",
            subject,
            target.kind,
            target.title,
            location,
            category.replace('_', " ")
        );
        while description.chars().count() < self.rules.min_description_len {
            description.push_str(" Review and refine before publishing.");
        }
        description
    }

    fn severity(&self, preferred: &str) -> String {
        if self.rules.allows_severity(preferred) {
            preferred.to_string()
        } else {
            self.rules
                .allowed_severities
                .first()
                .cloned()
                .unwrap_or_else(|| preferred.to_string())
        }
    }

    fn field_type(&self, preferred: &str) -> String {
        if self.rules.allows_field_type(preferred) {
            preferred.to_string()
        } else if self.rules.allows_field_type("text") {
            "text".to_string()
        } else {
            self.rules
                .allowed_field_types
                .first()
                .cloned()
                .unwrap_or_else(|| preferred.to_string())
        }
    }

    fn field(&self, name: &str, label: &str, field_type: &str, required: bool) -> FormField {
        FormField {
            name: name.to_string(),
            label: label.to_string(),
            field_type: self.field_type(field_type),
            required,
            options: Vec::new(),
        }
    }

    /// Payload for `operation`, derived from the target alone.
    pub fn payload(&self, target: &AnnotationTarget, operation: Operation) -> ArtifactPayload {
        let category = self.categorize(target);
        match operation {
            Operation::GenerateMeta => ArtifactPayload::Meta(MetaPayload {
                title: target.title.clone(),
                description: self.description(target, &category, "Catalog entry"),
                keywords: self.keywords(target, &category),
                tags: vec![target.kind.as_str().to_string()],
                category,
            }),
            Operation::GenerateRules => ArtifactPayload::Rules(self.rules_payload(target, category)),
            Operation::GenerateForm => ArtifactPayload::Form(self.form_payload(target, &category)),
        }
    }

    fn rules_payload(&self, target: &AnnotationTarget, category: String) -> RulePayload {
        let mut rules = vec![RuleSpec {
            name: "require-title".to_string(),
            condition: "title is empty".to_string(),
            action: "reject the entry".to_string(),
            severity: self.severity("error"),
        }];
        if target.kind == TargetKind::Procedure || target.kind == TargetKind::Service {
            rules.push(RuleSpec {
                name: "require-owner".to_string(),
                condition: "owner is not assigned".to_string(),
                action: "block publication until an owner is set".to_string(),
                severity: self.severity("warning"),
            });
        }
        rules.push(RuleSpec {
            name: "category-review".to_string(),
            condition: format!("category == '{}'", category),
            action: format!("route changes to {} reviewers", category.replace('_', " ")),
            severity: self.severity("info"),
        });

        RulePayload {
            description: self.description(target, &category, "Business rules"),
            category,
            rules,
        }
    }

    fn form_payload(&self, target: &AnnotationTarget, category: &str) -> FormPayload {
        let mut fields = vec![
            self.field("name", "Name", "text", true),
            self.field("description", "Description", "textarea", false),
        ];
        match category {
            "finance" => {
                fields.push(self.field("amount", "Amount", "number", true));
                fields.push(self.field("due_date", "Due date", "date", false));
            }
            "human_resources" => {
                fields.push(self.field("employee_id", "Employee ID", "text", true));
                fields.push(self.field("start_date", "Start date", "date", false));
            }
            "inventory" => {
                fields.push(self.field("quantity", "Quantity", "number", true));
                fields.push(self.field("location", "Location", "text", false));
            }
            "sales" => {
                fields.push(self.field("customer_email", "Customer email", "email", true));
                fields.push(self.field("order_total", "Order total", "number", false));
            }
            "compliance" => {
                fields.push(self.field("reviewed_on", "Reviewed on", "date", true));
                fields.push(self.field("approved", "Approved", "checkbox", false));
            }
            _ => fields.push(self.field("notes", "Notes", "textarea", false)),
        }

        FormPayload {
            title: format!("{} form", target.title),
            description: self.description(target, category, "Input form"),
            fields,
        }
    }

    /// Complete fallback artifact, scored by `validator` and carrying the
    /// corrections that were attempted before giving up.
    pub fn artifact(
        &self,
        target: &AnnotationTarget,
        operation: Operation,
        validator: &ValidationEngine,
        corrections: Vec<CorrectionRecord>,
    ) -> GeneratedArtifact {
        let payload = self.payload(target, operation);
        let validation_score = validator.validate(&payload).score();
        GeneratedArtifact {
            target_id: target.id.clone(),
            operation,
            payload,
            confidence: FALLBACK_CONFIDENCE,
            generated_by: GeneratedBy::Fallback,
            model: None,
            validation_score,
            corrections,
            generated_at: Utc::now(),
        }
    }
}
