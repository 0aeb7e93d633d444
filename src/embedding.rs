//! Embedding provider abstraction and the OpenAI-backed implementation.
//!
//! The [`Embedder`] trait turns batches of text into vectors. The concrete
//! [`OpenAiEmbedder`] calls `POST /v1/embeddings` with the configured
//! model. Calls are single-shot: the uploader decides what to retry, the
//! client only reports what happened.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::config::EmbeddingConfig;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("OPENAI_API_KEY environment variable not set")]
    MissingApiKey,
    #[error("embedding request failed with {status}: {message}")]
    Api { status: u16, message: String },
    #[error("embedding request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected embedding response: {0}")]
    BadResponse(String),
}

/// Batch text-to-vector interface.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier, e.g. `"text-embedding-3-small"`.
    fn model_name(&self) -> &str;

    /// Output vector dimensionality.
    fn dims(&self) -> usize;

    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::BadResponse("empty embedding response".into()))
    }
}

/// OpenAI embeddings client. Requires `OPENAI_API_KEY` in the environment.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dims: usize,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbedError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| EmbedError::MissingApiKey)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dims: config.dims,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmbedError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let json: serde_json::Value = response.json().await?;
        parse_embeddings(&json)
    }
}

/// Extract `data[].embedding` vectors, re-ordered by the `index` field so
/// the output always lines up with the input batch.
fn parse_embeddings(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, EmbedError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| EmbedError::BadResponse("missing data array".into()))?;

    let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| EmbedError::BadResponse("missing embedding".into()))?;

        let vector: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, vector));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, vector)| vector).collect())
}
