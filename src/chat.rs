//! Chat-completion provider abstraction and the OpenAI-backed client.
//!
//! [`ChatModel`] produces one assistant reply for a list of messages.
//! The [`OpenAiChat`] implementation calls `POST /v1/chat/completions`
//! with the configured model, temperature, and response token cap.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::ChatConfig;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("OPENAI_API_KEY environment variable not set")]
    MissingApiKey,
    #[error("chat completion failed with {status}: {message}")]
    Api { status: u16, message: String },
    #[error("chat completion failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected chat completion response: {0}")]
    BadResponse(String),
}

/// One message in a chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Hosted language model producing a single reply per call.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier, e.g. `"gpt-3.5-turbo"`.
    fn model_name(&self) -> &str;

    /// Generate the assistant reply for the given messages.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatError>;
}

/// OpenAI chat completions client. Requires `OPENAI_API_KEY` in the
/// environment.
pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiChat {
    pub fn new(config: &ChatConfig) -> Result<Self, ChatError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| ChatError::MissingApiKey)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ChatError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let json: serde_json::Value = response.json().await?;

        if let Some(total) = json
            .get("usage")
            .and_then(|u| u.get("total_tokens"))
            .and_then(|t| t.as_u64())
        {
            debug!(model = %self.model, total_tokens = total, "chat completion usage");
        }

        parse_completion(&json)
    }
}

fn parse_completion(json: &serde_json::Value) -> Result<String, ChatError> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| ChatError::BadResponse("missing choices[0].message.content".into()))
}
