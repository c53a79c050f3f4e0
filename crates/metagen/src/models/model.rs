//! Model descriptors and the capability vocabulary used for routing.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A kind of artifact a model can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    Meta,
    Rule,
    Schema,
    /// Wildcard: a model advertising this serves every capability.
    ComplexWildcard,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Meta => "meta",
            Self::Rule => "rule",
            Self::Schema => "schema",
            Self::ComplexWildcard => "complex-wildcard",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "meta" => Some(Self::Meta),
            "rule" | "rules" => Some(Self::Rule),
            "schema" | "form" => Some(Self::Schema),
            "complex-wildcard" | "complex" | "*" => Some(Self::ComplexWildcard),
            _ => None,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of capabilities a model advertises.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn new(capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self(capabilities.into_iter().collect())
    }

    /// Whether this set can serve `capability`, honoring the wildcard.
    pub fn supports(&self, capability: Capability) -> bool {
        self.0.contains(&capability) || self.0.contains(&Capability::ComplexWildcard)
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|c| c.as_str()).collect();
        f.write_str(&names.join(","))
    }
}

/// Relative response speed of a model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedClass {
    Fast,
    #[default]
    Medium,
    Slow,
}

impl SpeedClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Medium => "medium",
            Self::Slow => "slow",
        }
    }
}

/// Relative output quality of a model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccuracyClass {
    High,
    #[default]
    Medium,
    Low,
}

impl AccuracyClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// What the selector should favor when ranking candidates.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum PriorityMode {
    Speed,
    Accuracy,
    #[default]
    Balanced,
}

impl PriorityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Speed => "speed",
            Self::Accuracy => "accuracy",
            Self::Balanced => "balanced",
        }
    }
}

/// A registered model and how to reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Unique model name, passed verbatim to the provider.
    pub name: String,
    /// Id of the provider adapter that serves this model.
    pub provider: String,
    pub capabilities: CapabilitySet,
    #[serde(default)]
    pub speed: SpeedClass,
    #[serde(default)]
    pub accuracy: AccuracyClass,
    /// Lower is preferred.
    #[serde(default)]
    pub priority: u32,
    #[serde(default = "default_available")]
    pub available: bool,
    /// Provider id to probe for liveness; unprobed models are assumed healthy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_probe: Option<String>,
}

fn default_available() -> bool {
    true
}

impl ModelDescriptor {
    pub fn new(name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
            capabilities: CapabilitySet::default(),
            speed: SpeedClass::default(),
            accuracy: AccuracyClass::default(),
            priority: 1,
            available: true,
            health_probe: None,
        }
    }

    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities = CapabilitySet::new(capabilities);
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_speed(mut self, speed: SpeedClass) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_accuracy(mut self, accuracy: AccuracyClass) -> Self {
        self.accuracy = accuracy;
        self
    }

    pub fn with_health_probe(mut self) -> Self {
        self.health_probe = Some(self.provider.clone());
        self
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.supports(capability)
    }
}
