use async_trait::async_trait;
use painscout_core::{CoreError, LlmConfig, LlmError};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A chat-style text completion backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, system: &str, prompt: &str) -> Result<String, CoreError>;
}

pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String, base_url: String) -> Result<Self, CoreError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn status_error(&self, status: StatusCode, retry_after: Option<u64>) -> LlmError {
        let provider = self.name().to_string();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::InvalidApiKey { provider },
            StatusCode::NOT_FOUND => LlmError::ModelNotAvailable {
                model: self.model.clone(),
            },
            StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimitExceeded {
                provider,
                retry_after: retry_after.unwrap_or(20),
            },
            StatusCode::BAD_REQUEST => LlmError::ContentFiltered {
                reason: "request rejected by provider".to_string(),
            },
            _ => LlmError::ServiceUnavailable { provider },
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "OpenAI"
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String, CoreError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.7,
        };

        debug!("Requesting completion from {} ({})", self.name(), self.model);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CoreError::Llm(LlmError::RequestTimeout {
                        provider: self.name().to_string(),
                    })
                } else {
                    CoreError::Network(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            warn!("{} returned HTTP {}", self.name(), status);
            return Err(self.status_error(status, retry_after).into());
        }

        let json: Value = response.json().await.map_err(|e| {
            error!("Failed to decode {} response: {}", self.name(), e);
            CoreError::Llm(LlmError::InvalidResponseFormat {
                provider: self.name().to_string(),
            })
        })?;
        message_content(&json).ok_or_else(|| {
            CoreError::Llm(LlmError::InvalidResponseFormat {
                provider: self.name().to_string(),
            })
        })
    }
}

/// `choices[0].message.content` of a chat completion.
pub fn message_content(json: &Value) -> Option<String> {
    json.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(str::to_string)
}

/// Stands in when no API key is configured; every call falls back.
pub struct UnconfiguredProvider;

#[async_trait]
impl LlmProvider for UnconfiguredProvider {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn complete(&self, _system: &str, _prompt: &str) -> Result<String, CoreError> {
        Err(LlmError::ServiceUnavailable {
            provider: self.name().to_string(),
        }
        .into())
    }
}

pub fn provider_from_config(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, CoreError> {
    match &config.openai_api_key {
        Some(key) if !key.is_empty() => Ok(Arc::new(OpenAiProvider::new(
            key.clone(),
            config.model.clone(),
            config.base_url.clone(),
        )?)),
        _ => {
            warn!("No OpenAI API key configured; generators will use heuristic fallbacks");
            Ok(Arc::new(UnconfiguredProvider))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_first_choice() {
        let body = json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "hello"}}]
        });
        assert_eq!(message_content(&body).as_deref(), Some("hello"));
        assert_eq!(message_content(&json!({"choices": []})), None);
        assert_eq!(message_content(&json!({"error": "x"})), None);
    }

    #[test]
    fn maps_http_status() {
        let provider = OpenAiProvider::new(
            "sk-test".to_string(),
            "gpt-4o-mini".to_string(),
            "https://api.openai.com/v1/".to_string(),
        )
        .unwrap();
        assert_eq!(provider.base_url, "https://api.openai.com/v1");

        assert!(matches!(
            provider.status_error(StatusCode::UNAUTHORIZED, None),
            LlmError::InvalidApiKey { .. }
        ));
        assert!(matches!(
            provider.status_error(StatusCode::TOO_MANY_REQUESTS, Some(7)),
            LlmError::RateLimitExceeded { retry_after: 7, .. }
        ));
        assert!(matches!(
            provider.status_error(StatusCode::NOT_FOUND, None),
            LlmError::ModelNotAvailable { .. }
        ));
        assert!(matches!(
            provider.status_error(StatusCode::BAD_GATEWAY, None),
            LlmError::ServiceUnavailable { .. }
        ));
    }

    #[tokio::test]
    async fn unconfigured_provider_always_fails() {
        let provider = provider_from_config(&LlmConfig::default()).unwrap();
        assert_eq!(provider.name(), "unconfigured");
        assert!(provider.complete("s", "p").await.is_err());
    }
}
