//! Best-effort extraction of a JSON payload from free-form model output.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use metagen::models::{ArtifactPayload, Operation};

use super::types::AnnotationError;

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").expect("valid regex"));

/// A decoded payload plus the model's self-reported confidence, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPayload {
    pub payload: ArtifactPayload,
    pub reported_confidence: Option<f64>,
}

/// Find a JSON value in model output.
///
/// Tries, in order: the whole text, a fenced code block, the span from the first
/// `{` to the last `}`. Each candidate is retried once with trailing commas removed.
pub fn extract_json(content: &str) -> Option<Value> {
    let trimmed = content.trim();

    if let Some(value) = lenient_parse(trimmed) {
        return Some(value);
    }

    if let Some(start) = trimmed.find("```") {
        let fenced = &trimmed[start + 3..];
        let fenced = fenced
            .strip_prefix("json")
            .or_else(|| fenced.strip_prefix("JSON"))
            .unwrap_or(fenced);
        if let Some(end) = fenced.find("```") {
            if let Some(value) = lenient_parse(fenced[..end].trim()) {
                return Some(value);
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            return lenient_parse(&trimmed[start..=end]);
        }
    }

    None
}

fn lenient_parse(candidate: &str) -> Option<Value> {
    if candidate.is_empty() {
        return None;
    }
    serde_json::from_str::<Value>(candidate).ok().or_else(|| {
        let repaired = TRAILING_COMMA.replace_all(candidate, "$1");
        serde_json::from_str::<Value>(&repaired).ok()
    })
}

/// Decode model output into the payload shape for `operation`.
pub fn parse_payload(raw: &str, operation: Operation) -> Result<ParsedPayload, AnnotationError> {
    let value = extract_json(raw)
        .ok_or_else(|| AnnotationError::Parse("no JSON object found in response".to_string()))?;

    let Value::Object(mut object) = value else {
        return Err(AnnotationError::Parse(
            "expected a JSON object at the top level".to_string(),
        ));
    };

    // Some models wrap the payload in a single named key.
    let wrapped = match object.values().next() {
        Some(Value::Object(inner)) if object.len() == 1 => Some(inner.clone()),
        _ => None,
    };
    if let Some(inner) = wrapped {
        object = inner;
    }

    let reported_confidence = object
        .get("confidence")
        .and_then(Value::as_f64)
        .map(|c| c.clamp(0.0, 1.0));

    let payload = ArtifactPayload::from_value(operation, Value::Object(object))
        .map_err(|e| AnnotationError::Parse(e.to_string()))?;

    Ok(ParsedPayload {
        payload,
        reported_confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_plain_json() {
        let value = extract_json(r#"{"title": "x"}"#).unwrap();
        assert_eq!(value["title"], "x");
    }

    #[test]
    fn extracts_fenced_block_after_preamble() {
        let raw = "Sure! Here it is:\n```json\n{\"title\": \"x\"}\n```\nAnything else?";
        assert_eq!(extract_json(raw).unwrap()["title"], "x");
    }

    #[test]
    fn extracts_embedded_object_with_trailing_comma() {
        let raw = "Result: {\"keywords\": [\"a\", \"b\",], \"title\": \"x\",} done";
        let value = extract_json(raw).unwrap();
        assert_eq!(value["keywords"][1], "b");
    }

    #[test]
    fn prose_has_no_json() {
        assert!(extract_json("I cannot help with that.").is_none());
        assert!(matches!(
            parse_payload("I cannot help with that.", Operation::GenerateMeta),
            Err(AnnotationError::Parse(_))
        ));
    }

    #[test]
    fn reads_and_clamps_confidence() {
        let parsed = parse_payload(
            r#"{"title": "x", "description": "d", "confidence": 1.7}"#,
            Operation::GenerateMeta,
        )
        .unwrap();
        assert_eq!(parsed.reported_confidence, Some(1.0));
    }

    #[test]
    fn unwraps_single_key_wrapper() {
        let parsed = parse_payload(
            r#"{"form": {"title": "Leave", "fields": [{"name": "days", "type": "number"}]}}"#,
            Operation::GenerateForm,
        )
        .unwrap();
        let ArtifactPayload::Form(form) = parsed.payload else {
            panic!("expected form");
        };
        assert_eq!(form.title, "Leave");
        assert_eq!(form.fields[0].field_type, "number");
    }

    #[test]
    fn type_mismatch_is_a_parse_error() {
        assert!(matches!(
            parse_payload(r#"{"rules": 7}"#, Operation::GenerateRules),
            Err(AnnotationError::Parse(_))
        ));
        assert!(matches!(
            parse_payload("[1, 2, 3]", Operation::GenerateMeta),
            Err(AnnotationError::Parse(_))
        ));
    }
}
