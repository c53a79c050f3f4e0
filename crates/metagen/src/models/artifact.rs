//! Generated artifacts and their payload shapes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::model::Capability;

/// What a generation request should produce.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    #[value(name = "meta")]
    GenerateMeta,
    #[value(name = "rules")]
    GenerateRules,
    #[value(name = "form")]
    GenerateForm,
}

impl Operation {
    /// Capability a model must advertise to serve this operation.
    pub fn capability(&self) -> Capability {
        match self {
            Self::GenerateMeta => Capability::Meta,
            Self::GenerateRules => Capability::Rule,
            Self::GenerateForm => Capability::Schema,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GenerateMeta => "generate_meta",
            Self::GenerateRules => "generate_rules",
            Self::GenerateForm => "generate_form",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "generate_meta" | "meta" => Some(Self::GenerateMeta),
            "generate_rules" | "rules" => Some(Self::GenerateRules),
            "generate_form" | "form" => Some(Self::GenerateForm),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptive metadata for a catalog entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaPayload {
    pub title: String,
    pub description: String,
    #[serde(deserialize_with = "string_or_list")]
    pub keywords: Vec<String>,
    pub category: String,
    #[serde(deserialize_with = "string_or_list")]
    pub tags: Vec<String>,
}

/// A single business rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSpec {
    pub name: String,
    pub condition: String,
    pub action: String,
    pub severity: String,
}

/// Business rules for a catalog entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulePayload {
    pub description: String,
    pub category: String,
    pub rules: Vec<RuleSpec>,
}

/// A single input on a generated form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormField {
    pub name: String,
    pub label: String,
    #[serde(alias = "type")]
    pub field_type: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

/// Input form schema for a catalog entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormPayload {
    pub title: String,
    pub description: String,
    pub fields: Vec<FormField>,
}

/// Structured content of a generated artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactPayload {
    Meta(MetaPayload),
    Rules(RulePayload),
    Form(FormPayload),
}

impl ArtifactPayload {
    /// Interpret a decoded JSON body as the payload for `operation`.
    pub fn from_value(
        operation: Operation,
        value: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        Ok(match operation {
            Operation::GenerateMeta => Self::Meta(serde_json::from_value(value)?),
            Operation::GenerateRules => Self::Rules(serde_json::from_value(value)?),
            Operation::GenerateForm => Self::Form(serde_json::from_value(value)?),
        })
    }

    pub fn operation(&self) -> Operation {
        match self {
            Self::Meta(_) => Operation::GenerateMeta,
            Self::Rules(_) => Operation::GenerateRules,
            Self::Form(_) => Operation::GenerateForm,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Meta(m) => &m.description,
            Self::Rules(r) => &r.description,
            Self::Form(f) => &f.description,
        }
    }

    /// Category label, for payload kinds that carry one.
    pub fn category(&self) -> Option<&str> {
        match self {
            Self::Meta(m) => Some(&m.category),
            Self::Rules(r) => Some(&r.category),
            Self::Form(_) => None,
        }
    }

    /// The payload body without the kind tag, as sent back to models.
    pub fn body(&self) -> serde_json::Value {
        let value = match self {
            Self::Meta(m) => serde_json::to_value(m),
            Self::Rules(r) => serde_json::to_value(r),
            Self::Form(f) => serde_json::to_value(f),
        };
        value.unwrap_or_default()
    }
}

/// Which path produced an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratedBy {
    /// Accepted on the first AI attempt.
    Ai,
    /// Deterministic rule-based output.
    Fallback,
    /// AI output accepted after at least one correction round.
    Hybrid,
}

impl GeneratedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ai => "ai",
            Self::Fallback => "fallback",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for GeneratedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evidence of one rejected attempt that led to a correction round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionRecord {
    /// Zero-based attempt index that was rejected.
    pub attempt: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub errors: Vec<String>,
}

/// The final output of annotating one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    pub target_id: String,
    pub operation: Operation,
    pub payload: ArtifactPayload,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub generated_by: GeneratedBy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Fraction of validation checks passed by the accepted payload.
    pub validation_score: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub corrections: Vec<CorrectionRecord>,
    pub generated_at: DateTime<Utc>,
}

/// Accept either a JSON list of strings or one comma-separated string.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        One(String),
        Many(Vec<String>),
    }

    Ok(match StringOrList::deserialize(deserializer)? {
        StringOrList::One(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        StringOrList::Many(items) => items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn operation_maps_to_capability() {
        assert_eq!(Operation::GenerateMeta.capability(), Capability::Meta);
        assert_eq!(Operation::GenerateRules.capability(), Capability::Rule);
        assert_eq!(Operation::GenerateForm.capability(), Capability::Schema);
    }

    #[test]
    fn meta_payload_accepts_comma_keywords() {
        let payload = ArtifactPayload::from_value(
            Operation::GenerateMeta,
            json!({"title": "Invoices", "keywords": "billing, tax ,", "category": "finance"}),
        )
        .unwrap();
        let ArtifactPayload::Meta(meta) = payload else {
            panic!("expected meta payload");
        };
        assert_eq!(meta.keywords, vec!["billing", "tax"]);
        assert!(meta.description.is_empty());
    }

    #[test]
    fn wrong_shape_is_an_error() {
        let result = ArtifactPayload::from_value(Operation::GenerateRules, json!(["not", "an", "object"]));
        assert!(result.is_err());

        let result = ArtifactPayload::from_value(Operation::GenerateForm, json!({"fields": "nope"}));
        assert!(result.is_err());
    }

    #[test]
    fn form_field_accepts_type_alias() {
        let payload = ArtifactPayload::from_value(
            Operation::GenerateForm,
            json!({"fields": [{"name": "amount", "type": "number", "required": true}]}),
        )
        .unwrap();
        let ArtifactPayload::Form(form) = payload else {
            panic!("expected form payload");
        };
        assert_eq!(form.fields[0].field_type, "number");
    }

    #[test]
    fn tagged_serialization_keeps_kind() {
        let payload = ArtifactPayload::Rules(RulePayload::default());
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["kind"], "rules");
        assert!(payload.body().get("kind").is_none());
    }
}
