//! Embedding model gateway.
//!
//! The model itself is an external collaborator behind the [`Embedder`]
//! trait. Queries and passages share one embedding space under an
//! asymmetric convention: query text is prefixed with an instructional
//! sentence before encoding (see [`transform_query`]); passage text is
//! embedded raw by the offline pipeline. Both sides must stick to this
//! convention or query vectors land in the wrong region of the space.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, RetrievalError};

/// Instructional prefix applied to query-side text only.
pub const QUERY_PREFIX: &str = "Represent this sentence for searching relevant passages: ";

/// Apply the query-side transformation.
pub fn transform_query(query: &str) -> String {
    format!("{QUERY_PREFIX}{query}")
}

/// A backend that maps text to a fixed-dimension f32 vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text. Implementations must fail rather than return
    /// an empty or wrongly-shaped vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch. The default calls [`embed`](Embedder::embed)
    /// sequentially; backends with native batching should override.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Output dimensionality of this backend.
    fn dimensions(&self) -> usize;
}

/// Embed a query with the asymmetric prefix applied, validating the shape.
pub async fn embed_query(embedder: &dyn Embedder, query: &str) -> Result<Vec<f32>> {
    let vector = embedder.embed(&transform_query(query)).await?;
    check_shape(embedder, &vector)?;
    Ok(vector)
}

/// Validate the returned vector against the backend's declared dimension.
/// A zero-length result is an error, never an implicit zero vector.
fn check_shape(embedder: &dyn Embedder, vector: &[f32]) -> Result<()> {
    if vector.is_empty() {
        return Err(RetrievalError::Embedding {
            provider: "embedder".into(),
            message: "backend returned an empty embedding".into(),
        });
    }
    if vector.len() != embedder.dimensions() {
        return Err(RetrievalError::Embedding {
            provider: "embedder".into(),
            message: format!(
                "backend returned {} dimensions, expected {}",
                vector.len(),
                embedder.dimensions()
            ),
        });
    }
    Ok(())
}

// ── HTTP backend (OpenAI-compatible /v1/embeddings) ────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

/// [`Embedder`] backed by an OpenAI-compatible embeddings endpoint.
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimensions: usize,
    api_key: Option<String>,
}

impl HttpEmbedder {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, dimensions: usize) -> Self {
        HttpEmbedder {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            dimensions,
            api_key: None,
        }
    }

    /// Attach a bearer token for authenticated endpoints.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    fn error(&self, message: impl Into<String>) -> RetrievalError {
        RetrievalError::Embedding {
            provider: self.model.clone(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut results = self.embed_batch(&[text]).await?;
        results
            .pop()
            .ok_or_else(|| self.error("backend returned no embedding"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        debug!(model = %self.model, batch = texts.len(), "embedding batch");

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts.to_vec(),
        };
        let mut call = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }

        let response = call
            .send()
            .await
            .map_err(|e| self.error(format!("request failed: {e}")))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(self.error(format!("backend returned {status}: {body}")));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| self.error(format!("malformed response: {e}")))?;
        if parsed.data.len() != texts.len() {
            return Err(self.error(format!(
                "backend returned {} embeddings for {} inputs",
                parsed.data.len(),
                texts.len()
            )));
        }

        let mut out = Vec::with_capacity(parsed.data.len());
        for row in parsed.data {
            if row.embedding.len() != self.dimensions {
                return Err(self.error(format!(
                    "backend returned {} dimensions, expected {}",
                    row.embedding.len(),
                    self.dimensions
                )));
            }
            out.push(row.embedding);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
