//! Vector store abstraction and the Pinecone-backed implementation.
//!
//! The [`VectorStore`] trait covers the three remote operations the
//! pipeline needs (upsert, similarity query, stats) plus enough metadata
//! to describe the index. [`PineconeStore`] talks to a Pinecone-style
//! HTTP API: the control plane resolves the index's data-plane host once
//! at connect time, after which all vector traffic goes to that host.
//!
//! Requests here are single-shot. Retry policy lives in the uploader,
//! not the client.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::IndexConfig;
use crate::models::DocMetadata;

/// Failures talking to the vector store, tagged by kind so callers can
/// tell a missing index from an auth problem or a network fault.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("PINECONE_API_KEY environment variable not set")]
    MissingApiKey,
    #[error("index '{0}' does not exist")]
    IndexNotFound(String),
    #[error("vector store request failed with {status}: {message}")]
    Api { status: u16, message: String },
    #[error("vector store request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected vector store response: {0}")]
    BadResponse(String),
}

/// A vector ready for upsert, with the chunk text carried in metadata so
/// queries can hand content back without a second lookup.
#[derive(Debug, Clone, Serialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: VectorMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct VectorMetadata {
    pub text: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_index: Option<usize>,
}

impl VectorMetadata {
    pub fn new(text: impl Into<String>, metadata: &DocMetadata) -> Self {
        Self {
            text: text.into(),
            doc_type: metadata.doc_type.clone(),
            source: metadata.source.clone(),
            row_index: metadata.row_index,
        }
    }
}

/// A similarity match returned from a query, highest score first.
#[derive(Debug, Clone)]
pub struct ScoredMatch {
    pub id: String,
    pub score: f32,
    pub content: String,
    pub metadata: DocMetadata,
}

/// Read-through snapshot of the index state. Field names match the wire
/// shape of the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub index_name: String,
    pub total_vector_count: u64,
    pub dimension: usize,
    pub namespaces: serde_json::Value,
    pub index_fullness: f64,
}

/// Remote vector index operations used by the uploader and the agent.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Name of the index this store writes to.
    fn index_name(&self) -> &str;

    /// Upsert a batch of vectors; returns the count the store accepted.
    async fn upsert(&self, vectors: &[VectorRecord]) -> Result<usize, StoreError>;

    /// Top-k similarity search over the stored vectors.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredMatch>, StoreError>;

    /// Current index statistics.
    async fn stats(&self) -> Result<IndexStats, StoreError>;

    /// Names of all indexes visible with the current credentials. Used
    /// for diagnostics when an upload pass fails outright.
    async fn available_indexes(&self) -> Result<Vec<String>, StoreError>;
}

/// Pinecone-style client, bound to one index.
pub struct PineconeStore {
    client: reqwest::Client,
    api_key: String,
    control_url: String,
    data_url: String,
    index_name: String,
}

impl PineconeStore {
    /// Resolve the index host via the control plane and build a client
    /// bound to it.
    ///
    /// Fails when `PINECONE_API_KEY` is unset, the index does not exist,
    /// or the control plane is unreachable.
    pub async fn connect(config: &IndexConfig) -> Result<Self, StoreError> {
        let api_key = std::env::var("PINECONE_API_KEY").map_err(|_| StoreError::MissingApiKey)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let url = format!(
            "{}/indexes/{}",
            config.control_url.trim_end_matches('/'),
            config.name
        );
        let response = client.get(&url).header("Api-Key", &api_key).send().await?;
        let status = response.status();

        if status.as_u16() == 404 {
            return Err(StoreError::IndexNotFound(config.name.clone()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: serde_json::Value = response.json().await?;
        let host = body
            .get("host")
            .and_then(|h| h.as_str())
            .ok_or_else(|| StoreError::BadResponse("index description missing host".into()))?;

        Ok(Self {
            client,
            api_key,
            control_url: config.control_url.trim_end_matches('/').to_string(),
            data_url: format!("https://{}", host),
            index_name: config.name.clone(),
        })
    }

    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, StoreError> {
        let response = self
            .client
            .post(format!("{}{}", self.data_url, path))
            .header("Api-Key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    fn index_name(&self) -> &str {
        &self.index_name
    }

    async fn upsert(&self, vectors: &[VectorRecord]) -> Result<usize, StoreError> {
        let body = serde_json::json!({ "vectors": vectors });
        let json = self.post_json("/vectors/upsert", &body).await?;

        let count = json
            .get("upsertedCount")
            .and_then(|c| c.as_u64())
            .unwrap_or(vectors.len() as u64);
        Ok(count as usize)
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredMatch>, StoreError> {
        let body = serde_json::json!({
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
        });
        let json = self.post_json("/query", &body).await?;
        parse_query_response(&json)
    }

    async fn stats(&self) -> Result<IndexStats, StoreError> {
        let json = self
            .post_json("/describe_index_stats", &serde_json::json!({}))
            .await?;
        Ok(parse_stats_response(&json, &self.index_name))
    }

    async fn available_indexes(&self) -> Result<Vec<String>, StoreError> {
        let response = self
            .client
            .get(format!("{}/indexes", self.control_url))
            .header("Api-Key", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let json: serde_json::Value = response.json().await?;
        let names = json
            .get("indexes")
            .and_then(|i| i.as_array())
            .map(|indexes| {
                indexes
                    .iter()
                    .filter_map(|idx| idx.get("name").and_then(|n| n.as_str()))
                    .map(|n| n.to_string())
                    .collect()
            })
            .unwrap_or_default();
        Ok(names)
    }
}

/// Extract scored matches from a query response, tolerating absent
/// metadata fields rather than failing the whole result set.
fn parse_query_response(json: &serde_json::Value) -> Result<Vec<ScoredMatch>, StoreError> {
    let matches = json
        .get("matches")
        .and_then(|m| m.as_array())
        .ok_or_else(|| StoreError::BadResponse("query response missing matches".into()))?;

    let mut results = Vec::with_capacity(matches.len());
    for item in matches {
        let id = item
            .get("id")
            .and_then(|i| i.as_str())
            .unwrap_or_default()
            .to_string();
        let score = item.get("score").and_then(|s| s.as_f64()).unwrap_or(0.0) as f32;

        let metadata = item.get("metadata").cloned().unwrap_or_default();
        let content = metadata
            .get("text")
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string();

        results.push(ScoredMatch {
            id,
            score,
            content,
            metadata: metadata_from_value(&metadata),
        });
    }

    Ok(results)
}

fn metadata_from_value(value: &serde_json::Value) -> DocMetadata {
    // Numeric metadata can come back as floats; accept either form.
    let row_index = value.get("row_index").and_then(|r| {
        r.as_u64()
            .or_else(|| r.as_f64().map(|f| f as u64))
            .map(|n| n as usize)
    });

    DocMetadata {
        doc_type: value
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or("unknown")
            .to_string(),
        source: value
            .get("source")
            .and_then(|s| s.as_str())
            .unwrap_or("unknown")
            .to_string(),
        row_index,
    }
}

fn parse_stats_response(json: &serde_json::Value, index_name: &str) -> IndexStats {
    IndexStats {
        index_name: index_name.to_string(),
        total_vector_count: json
            .get("totalVectorCount")
            .and_then(|c| c.as_u64())
            .unwrap_or(0),
        dimension: json.get("dimension").and_then(|d| d.as_u64()).unwrap_or(0) as usize,
        namespaces: json
            .get("namespaces")
            .cloned()
            .unwrap_or_else(|| serde_json::json!({})),
        index_fullness: json
            .get("indexFullness")
            .and_then(|f| f.as_f64())
            .unwrap_or(0.0),
    }
}
