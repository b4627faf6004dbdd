//! OpenAI-compatible chat-completions client (OpenRouter by default)

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use super::{ProviderError, TextGenerator};

const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Configuration for an OpenAI-compatible provider endpoint
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL for the API (e.g. "https://openrouter.ai/api/v1")
    pub base_url: String,
    /// API key for authentication
    pub api_key: String,
    /// Model identifier sent with every request
    pub model: String,
    /// Extra headers to include in requests (e.g. X-Title, HTTP-Referer)
    pub extra_headers: Vec<(String, String)>,
}

impl ProviderConfig {
    /// OpenRouter endpoint with the given model
    pub fn openrouter(api_key: String, model: String) -> Self {
        Self {
            base_url: OPENROUTER_BASE_URL.to_string(),
            api_key,
            model,
            extra_headers: vec![
                ("HTTP-Referer".to_string(), "https://github.com/autodidact".to_string()),
                ("X-Title".to_string(), "Autodidact".to_string()),
            ],
        }
    }

    /// Any OpenAI-compatible endpoint
    pub fn custom(base_url: String, api_key: String, model: String) -> Self {
        Self {
            base_url,
            api_key,
            model,
            extra_headers: Vec::new(),
        }
    }
}

/// Chat-completions client
#[derive(Clone)]
pub struct OpenRouterClient {
    client: Arc<Client>,
    provider: ProviderConfig,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

impl OpenRouterClient {
    pub fn new(provider: ProviderConfig) -> Self {
        Self {
            client: Arc::new(Client::new()),
            provider,
        }
    }

    /// Create a client from the stored API key and configured model
    pub fn from_config(config: &crate::config::Config) -> anyhow::Result<Self> {
        let api_key = crate::secrets::get_api_key()?;
        Ok(Self::new(ProviderConfig::custom(
            config.provider.base_url.clone(),
            api_key,
            config.provider.model.clone(),
        )))
    }

    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    /// Send a chat completion request and extract the assistant text
    async fn complete(&self, messages: Vec<ChatMessage>, max_tokens: u32) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model: self.provider.model.clone(),
            messages,
            max_tokens: Some(max_tokens),
        };

        let mut req_builder = self
            .client
            .post(format!("{}/chat/completions", self.provider.base_url))
            .header("Authorization", format!("Bearer {}", self.provider.api_key));
        for (key, value) in &self.provider.extra_headers {
            req_builder = req_builder.header(key.as_str(), value.as_str());
        }

        let response = req_builder
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Unavailable(format!("{}: {}", status, body)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(format!("{}: {}", status, body)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        // Parse as raw Value; some providers return content as a string,
        // others as an array of content parts.
        let raw: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| ProviderError::Parse(format!("{} (body: {:.200})", e, body)))?;

        let content_value = raw
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|msg| msg.get("content"));

        let content = match content_value {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Array(parts)) => parts
                .iter()
                .filter_map(|part| {
                    if part.get("type").and_then(|t| t.as_str()) == Some("text") {
                        part.get("text").and_then(|t| t.as_str()).map(|s| s.to_string())
                    } else {
                        None
                    }
                })
                .collect::<Vec<_>>()
                .join(""),
            _ => {
                return Err(ProviderError::Parse("response carried no message content".to_string()));
            }
        };

        debug!(model = %self.provider.model, chars = content.len(), "chat completion received");
        Ok(content)
    }
}

#[async_trait]
impl TextGenerator for OpenRouterClient {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderError> {
        let messages = vec![
            ChatMessage::system(
                "You are a precise technical writing and coding assistant. \
                 Answer with exactly what was asked for, nothing else.",
            ),
            ChatMessage::user(prompt),
        ];
        self.complete(messages, max_tokens).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openrouter_config_defaults() {
        let cfg = ProviderConfig::openrouter("key".into(), "z-ai/glm-5".into());
        assert_eq!(cfg.base_url, OPENROUTER_BASE_URL);
        assert_eq!(cfg.model, "z-ai/glm-5");
        assert_eq!(cfg.extra_headers.len(), 2);
    }

    #[test]
    fn test_custom_config_has_no_extra_headers() {
        let cfg = ProviderConfig::custom("http://localhost:8080/v1".into(), "k".into(), "m".into());
        assert!(cfg.extra_headers.is_empty());
    }

    #[test]
    fn test_chat_request_serialization() {
        let req = ChatRequest {
            model: "m".into(),
            messages: vec![ChatMessage::system("s"), ChatMessage::user("u")],
            max_tokens: Some(256),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["model"], "m");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "u");
        assert_eq!(json["max_tokens"], 256);
    }
}
