//! In-process provider with scripted behavior.
//!
//! Used for offline runs and for exercising the correction and fallback paths
//! without a real backend. Replies come from a queued script first, then from
//! the configured default behavior.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ProviderAdapter, TransportError};
use crate::config::ProviderConfig;
use crate::models::{ModelDescriptor, Operation};

/// Default reply shape when the script is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulatedBehavior {
    /// Well-formed JSON that passes default validation.
    #[default]
    Valid,
    /// Well-formed JSON that fails validation.
    Invalid,
    /// Text with no JSON object in it.
    Malformed,
    /// Every call and probe fails with a connection error.
    Unreachable,
}

/// One queued reply.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulatedReply {
    Text(String),
    Fail(String),
}

/// Counts concurrent calls and records the peak.
struct InFlight<'a> {
    current: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(current: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { current }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct SimulatedAdapter {
    id: String,
    behavior: SimulatedBehavior,
    latency: Duration,
    script: Mutex<VecDeque<SimulatedReply>>,
    prompts: Mutex<Vec<String>>,
    reachable: AtomicBool,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl SimulatedAdapter {
    pub fn new(id: impl Into<String>, behavior: SimulatedBehavior) -> Self {
        Self {
            id: id.into(),
            behavior,
            latency: Duration::ZERO,
            script: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            reachable: AtomicBool::new(behavior != SimulatedBehavior::Unreachable),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(config.id.clone(), config.behavior)
            .with_latency(Duration::from_millis(config.latency_ms))
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_script(self, replies: impl IntoIterator<Item = SimulatedReply>) -> Self {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(replies);
        self
    }

    pub fn push_reply(&self, reply: SimulatedReply) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
    }

    /// Simulate an outage or a recovery.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of concurrent `invoke` calls observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Every prompt received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn outage(&self) -> TransportError {
        TransportError::connection(&self.id, "simulated outage")
    }

    fn default_reply(&self, prompt: &str) -> Result<String, TransportError> {
        match self.behavior {
            SimulatedBehavior::Valid => Ok(valid_reply(prompt)),
            SimulatedBehavior::Invalid => Ok(json!({
                "title": "",
                "description": "TBD",
                "keywords": [],
                "category": "misc",
                "rules": [],
                "fields": [],
                "confidence": 0.9
            })
            .to_string()),
            SimulatedBehavior::Malformed => {
                Ok("I'm sorry, I can't produce structured output for that.".to_string())
            }
            SimulatedBehavior::Unreachable => Err(self.outage()),
        }
    }
}

#[async_trait]
impl ProviderAdapter for SimulatedAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    async fn invoke(&self, prompt: &str, _model: &ModelDescriptor) -> Result<String, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight::enter(&self.in_flight, &self.peak_in_flight);
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(self.outage());
        }

        let scripted = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match scripted {
            Some(SimulatedReply::Text(text)) => Ok(text),
            Some(SimulatedReply::Fail(message)) => {
                Err(TransportError::connection(&self.id, message))
            }
            None => self.default_reply(prompt),
        }
    }

    async fn probe(&self, _model: &ModelDescriptor) -> Result<(), TransportError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(self.outage())
        }
    }
}

fn prompt_operation(prompt: &str) -> Operation {
    if prompt.contains(Operation::GenerateForm.as_str()) {
        Operation::GenerateForm
    } else if prompt.contains(Operation::GenerateRules.as_str()) {
        Operation::GenerateRules
    } else {
        Operation::GenerateMeta
    }
}

fn prompt_title(prompt: &str) -> String {
    prompt
        .lines()
        .find_map(|line| line.trim().strip_prefix("Title:"))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Catalog entry".to_string())
}

fn valid_reply(prompt: &str) -> String {
    let title = prompt_title(prompt);
    let description = format!(
        "{} catalog entry with curated attributes, ownership and usage notes.",
        title
    );

    let body = match prompt_operation(prompt) {
        Operation::GenerateMeta => {
            let mut keywords: Vec<String> = title
                .split_whitespace()
                .map(|w| w.to_lowercase())
                .filter(|w| w.len() > 2)
                .collect();
            keywords.push("catalog".to_string());
            json!({
                "title": title,
                "description": description,
                "keywords": keywords,
                "category": "general",
                "tags": ["simulated"],
                "confidence": 0.85
            })
        }
        Operation::GenerateRules => json!({
            "description": description,
            "category": "operations",
            "rules": [{
                "name": "require-owner",
                "condition": "owner is empty",
                "action": "block publication",
                "severity": "error"
            }],
            "confidence": 0.8
        }),
        Operation::GenerateForm => json!({
            "title": title,
            "description": description,
            "fields": [
                {"name": "name", "label": "Name", "field_type": "text", "required": true},
                {"name": "notes", "label": "Notes", "field_type": "textarea", "required": false}
            ],
            "confidence": 0.8
        }),
    };
    body.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> ModelDescriptor {
        ModelDescriptor::new("sim-1", "sim")
    }

    #[tokio::test]
    async fn script_takes_precedence_over_behavior() {
        let adapter = SimulatedAdapter::new("sim", SimulatedBehavior::Valid).with_script([
            SimulatedReply::Text("first".to_string()),
            SimulatedReply::Fail("boom".to_string()),
        ]);

        assert_eq!(adapter.invoke("p", &model()).await.unwrap(), "first");
        assert!(adapter.invoke("p", &model()).await.is_err());
        let third = adapter.invoke("Title: Invoices", &model()).await.unwrap();
        assert!(third.contains("Invoices"));
        assert_eq!(adapter.calls(), 3);
        assert_eq!(adapter.prompts().len(), 3);
    }

    #[tokio::test]
    async fn valid_reply_follows_operation_marker() {
        let adapter = SimulatedAdapter::new("sim", SimulatedBehavior::Valid);
        let raw = adapter
            .invoke("Operation: generate_form\nTitle: Leave request", &model())
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["title"], "Leave request");
        assert!(value["fields"].is_array());
    }

    #[tokio::test]
    async fn unreachable_fails_calls_and_probes() {
        let adapter = SimulatedAdapter::new("sim", SimulatedBehavior::Unreachable);
        assert!(adapter.invoke("p", &model()).await.is_err());
        assert!(adapter.probe(&model()).await.is_err());

        adapter.set_reachable(true);
        assert!(adapter.probe(&model()).await.is_ok());
    }

    #[tokio::test]
    async fn peak_in_flight_is_tracked() {
        let adapter = std::sync::Arc::new(
            SimulatedAdapter::new("sim", SimulatedBehavior::Valid)
                .with_latency(Duration::from_millis(20)),
        );
        let calls = (0..3).map(|_| {
            let adapter = adapter.clone();
            async move { adapter.invoke("p", &model()).await }
        });
        futures::future::join_all(calls).await;
        assert_eq!(adapter.peak_in_flight(), 3);
    }
}
