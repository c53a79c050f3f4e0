//! Ollama provider adapter.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ProviderAdapter, TransportError};
use crate::config::ProviderConfig;
use crate::models::ModelDescriptor;

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'static str,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama API response format.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    #[allow(dead_code)]
    done: bool,
}

/// Adapter for a local or remote Ollama server.
pub struct OllamaAdapter {
    id: String,
    endpoint: String,
    temperature: f32,
    max_tokens: u32,
    client: Client,
}

impl OllamaAdapter {
    pub fn new(config: &ProviderConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| TransportError::connection(&config.id, e))?;

        Ok(Self {
            id: config.id.clone(),
            endpoint: config.endpoint().trim_end_matches('/').to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
        })
    }
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    async fn invoke(&self, prompt: &str, model: &ModelDescriptor) -> Result<String, TransportError> {
        let request = OllamaRequest {
            model: &model.name,
            prompt,
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        };

        let url = format!("{}/api/generate", self.endpoint);
        debug!("Ollama request to {} for model {}", url, model.name);

        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| TransportError::connection(&self.id, e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Api {
                provider: self.id.clone(),
                status,
                body,
            });
        }

        let ollama_resp: OllamaResponse = resp
            .json()
            .await
            .map_err(|e| TransportError::invalid(&self.id, e))?;

        Ok(ollama_resp.response)
    }

    async fn probe(&self, _model: &ModelDescriptor) -> Result<(), TransportError> {
        let url = format!("{}/api/tags", self.endpoint);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::connection(&self.id, e))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(TransportError::Api {
                provider: self.id.clone(),
                status: resp.status().as_u16(),
                body: String::new(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;

    #[test]
    fn request_serializes_like_ollama_expects() {
        let request = OllamaRequest {
            model: "llama3.2",
            prompt: "hello",
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: 0.2,
                num_predict: 512,
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "llama3.2");
        assert_eq!(value["stream"], false);
        assert_eq!(value["options"]["num_predict"], 512);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_connection_error() {
        let mut config = ProviderConfig::new("local", ProviderKind::Ollama);
        config.endpoint = Some("http://127.0.0.1:1".to_string());
        config.request_timeout_secs = 2;
        let adapter = OllamaAdapter::new(&config).unwrap();
        let model = ModelDescriptor::new("llama3.2", "local");

        let err = adapter.invoke("hi", &model).await.unwrap_err();
        assert!(matches!(err, TransportError::Connection { .. }));
        assert!(adapter.probe(&model).await.is_err());
    }
}
