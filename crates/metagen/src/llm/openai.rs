//! OpenAI-compatible chat completions adapter (OpenAI, Groq, Together, vLLM).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ProviderAdapter, TransportError};
use crate::config::ProviderConfig;
use crate::models::ModelDescriptor;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Adapter for any endpoint speaking the OpenAI chat completions protocol.
pub struct OpenAiAdapter {
    id: String,
    endpoint: String,
    api_key: Option<String>,
    api_key_env: String,
    temperature: f32,
    max_tokens: u32,
    client: Client,
}

impl OpenAiAdapter {
    pub fn new(config: &ProviderConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| TransportError::connection(&config.id, e))?;

        Ok(Self {
            id: config.id.clone(),
            endpoint: config.endpoint().trim_end_matches('/').to_string(),
            api_key: config.api_key(),
            api_key_env: config.api_key_env(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
        })
    }

    fn api_key(&self) -> Result<&str, TransportError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| TransportError::MissingApiKey {
                provider: self.id.clone(),
                env_var: self.api_key_env.clone(),
            })
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    async fn invoke(&self, prompt: &str, model: &ModelDescriptor) -> Result<String, TransportError> {
        let api_key = self.api_key()?;
        let request = ChatRequest {
            model: &model.name,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let url = format!("{}/chat/completions", self.endpoint);
        debug!("Chat completion request to {} for model {}", url, model.name);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
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

        let chat: ChatResponse = resp
            .json()
            .await
            .map_err(|e| TransportError::invalid(&self.id, e))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| TransportError::invalid(&self.id, "response contained no choices"))
    }

    async fn probe(&self, _model: &ModelDescriptor) -> Result<(), TransportError> {
        let api_key = self.api_key()?;
        let url = format!("{}/models", self.endpoint);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(api_key)
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
    fn response_content_is_extracted() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"{\"title\":\"x\"}"}}]}"#;
        let chat: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            chat.choices[0].message.content.as_deref(),
            Some("{\"title\":\"x\"}")
        );
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let mut config = ProviderConfig::new("remote", ProviderKind::OpenAi);
        config.api_key_env = Some("METAGEN_TEST_KEY_THAT_IS_NEVER_SET".to_string());
        let adapter = OpenAiAdapter::new(&config).unwrap();
        let model = ModelDescriptor::new("gpt-4o-mini", "remote");

        let err = adapter.invoke("hi", &model).await.unwrap_err();
        assert!(matches!(err, TransportError::MissingApiKey { .. }));
    }
}
