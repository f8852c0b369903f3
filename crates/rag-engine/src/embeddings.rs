//! Gemini embedding API client.
//!
//! Talks to the `text-embedding-004` REST endpoint directly (v1beta; the
//! model is not on the v1 surface). Batches document embeddings through
//! `batchEmbedContents` and falls back to one-by-one `embedContent` calls
//! when the batch endpoint is unavailable.

use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{RagError, RagResult};

const DEFAULT_BASE: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/text-embedding-004";
const MODEL: &str = "models/text-embedding-004";

/// Task type hint for document-side embeddings.
const TASK_DOCUMENT: &str = "RETRIEVAL_DOCUMENT";
/// Task type hint for query-side embeddings.
const TASK_QUERY: &str = "RETRIEVAL_QUERY";

/// REST client for Gemini text embeddings.
#[derive(Debug, Clone)]
pub struct EmbeddingsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl EmbeddingsClient {
    pub fn new(api_key: impl Into<String>) -> RagResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE.to_string(),
            api_key: api_key.into(),
        })
    }

    /// Override the endpoint base URL (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Embed a batch of document chunks.
    pub async fn embed_documents(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        self.batch_embed(texts, TASK_DOCUMENT).await
    }

    /// Embed a single query string.
    pub async fn embed_query(&self, text: &str) -> RagResult<Vec<f32>> {
        let mut vecs = self.batch_embed(&[text.to_string()], TASK_QUERY).await?;
        vecs.pop()
            .ok_or_else(|| RagError::Malformed("empty embedding batch response".to_string()))
    }

    async fn batch_embed(&self, texts: &[String], task_type: &str) -> RagResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let requests: Vec<Value> = texts
            .iter()
            .map(|t| {
                json!({
                    "model": MODEL,
                    "content": { "parts": [{ "text": t }] },
                    "taskType": task_type,
                })
            })
            .collect();

        let response = self
            .client
            .post(format!("{}:batchEmbedContents", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({ "requests": requests }))
            .send()
            .await?;

        if response.status().as_u16() == 404 {
            // Batch endpoint not available: embed one by one
            warn!("batchEmbedContents unavailable, falling back to per-item embedding");
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                out.push(self.embed_one(text, task_type).await?);
            }
            return Ok(out);
        }

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RagError::EmbeddingApi {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response.json().await?;
        let embeddings = body
            .get("embeddings")
            .and_then(Value::as_array)
            .ok_or_else(|| RagError::Malformed("missing 'embeddings' array".to_string()))?;

        debug!(count = embeddings.len(), "Embedded batch");
        embeddings.iter().map(parse_values).collect()
    }

    async fn embed_one(&self, text: &str, task_type: &str) -> RagResult<Vec<f32>> {
        let response = self
            .client
            .post(format!("{}:embedContent", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({
                "model": MODEL,
                "content": { "parts": [{ "text": text }] },
                "taskType": task_type,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RagError::EmbeddingApi {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response.json().await?;
        let embedding = body
            .get("embedding")
            .ok_or_else(|| RagError::Malformed("missing 'embedding' object".to_string()))?;
        parse_values(embedding)
    }
}

/// Pull the float vector out of an `{"values": [...]}` embedding object.
fn parse_values(embedding: &Value) -> RagResult<Vec<f32>> {
    let values = embedding
        .get("values")
        .and_then(Value::as_array)
        .ok_or_else(|| RagError::Malformed("missing 'values' in embedding".to_string()))?;

    Ok(values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}
