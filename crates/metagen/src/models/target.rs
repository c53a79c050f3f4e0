//! Catalog entries that can be annotated.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of catalog entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Category,
    #[default]
    Product,
    Service,
    Procedure,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Product => "product",
            Self::Service => "service",
            Self::Procedure => "procedure",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "category" => Some(Self::Category),
            "product" => Some(Self::Product),
            "service" => Some(Self::Service),
            "procedure" => Some(Self::Procedure),
            _ => None,
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalog entry to annotate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationTarget {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub kind: TargetKind,
    /// Ancestor names from the catalog root down to the parent.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
    /// Metadata already attached to the entry, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl AnnotationTarget {
    pub fn new(id: impl Into<String>, title: impl Into<String>, kind: TargetKind) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            kind,
            path: Vec::new(),
            metadata: None,
        }
    }

    pub fn with_path<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path = path.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Hierarchy rendered for prompts and logs, e.g. `Finance / Billing`.
    pub fn path_display(&self) -> String {
        if self.path.is_empty() {
            "(root)".to_string()
        } else {
            self.path.join(" / ")
        }
    }
}

/// Selects which catalog entries a batch job covers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetFilter {
    /// Explicit ids; empty means no id restriction.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TargetKind>,
    /// Slash-separated ancestor prefix, e.g. `Finance/Billing`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,
    /// Only entries that carry no metadata yet.
    #[serde(default)]
    pub only_missing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl TargetFilter {
    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn matches(&self, target: &AnnotationTarget) -> bool {
        if !self.ids.is_empty() && !self.ids.iter().any(|id| id == &target.id) {
            return false;
        }
        if let Some(kind) = self.kind {
            if target.kind != kind {
                return false;
            }
        }
        if let Some(prefix) = &self.path_prefix {
            let wanted: Vec<&str> = prefix
                .split('/')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            if wanted.len() > target.path.len()
                || !wanted
                    .iter()
                    .zip(&target.path)
                    .all(|(want, have)| want.eq_ignore_ascii_case(have))
            {
                return false;
            }
        }
        if self.only_missing && target.metadata.is_some() {
            return false;
        }
        true
    }

    /// Apply the filter and limit to an ordered target list.
    pub fn apply<'a, I>(&self, targets: I) -> Vec<AnnotationTarget>
    where
        I: IntoIterator<Item = &'a AnnotationTarget>,
    {
        let matched = targets.into_iter().filter(|t| self.matches(t)).cloned();
        match self.limit {
            Some(limit) => matched.take(limit).collect(),
            None => matched.collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<AnnotationTarget> {
        vec![
            AnnotationTarget::new("1", "Invoices", TargetKind::Category).with_path(["Finance"]),
            AnnotationTarget::new("2", "Payroll run", TargetKind::Procedure)
                .with_path(["HR", "Payroll"]),
            AnnotationTarget::new("3", "Stock count", TargetKind::Procedure)
                .with_path(["Inventory"])
                .with_metadata(serde_json::json!({"description": "done"})),
        ]
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert_eq!(TargetFilter::default().apply(&catalog()).len(), 3);
    }

    #[test]
    fn filters_by_kind_and_missing() {
        let filter = TargetFilter {
            kind: Some(TargetKind::Procedure),
            only_missing: true,
            ..TargetFilter::default()
        };
        let matched = filter.apply(&catalog());
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, "2");
    }

    #[test]
    fn path_prefix_is_segment_based() {
        let filter = TargetFilter {
            path_prefix: Some("hr/".to_string()),
            ..TargetFilter::default()
        };
        let matched = filter.apply(&catalog());
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, "2");
    }

    #[test]
    fn limit_keeps_catalog_order() {
        let filter = TargetFilter {
            limit: Some(2),
            ..TargetFilter::default()
        };
        let ids: Vec<String> = filter.apply(&catalog()).into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn explicit_ids() {
        let matched = TargetFilter::ids(["3"]).apply(&catalog());
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].title, "Stock count");
    }
}
