//! Reranking model gateway.
//!
//! Second-pass precision scoring of the ANN candidate set. The model is an
//! external collaborator behind the [`Reranker`] trait; rerankers never
//! truncate — ordering the full candidate set is their job, cutting it to
//! k is the orchestrator's.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, RetrievalError};

/// A candidate passage handed to the reranker.
#[derive(Debug, Clone)]
pub struct Passage {
    pub id: u32,
    pub text: String,
}

/// A passage with its relevance score after reranking.
#[derive(Debug, Clone)]
pub struct RankedPassage {
    pub id: u32,
    pub text: String,
    pub score: f32,
}

/// Scores (query, passage) pairs and returns the passages reordered by
/// descending relevance. Output length always equals input length.
/// Stateless per call.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(&self, query: &str, passages: Vec<Passage>) -> Result<Vec<RankedPassage>>;
}

fn empty_input_error(reranker: &str) -> RetrievalError {
    RetrievalError::Rerank {
        reranker: reranker.into(),
        message: "passage list is empty".into(),
    }
}

// ── Lexical fallback ───────────────────────────────────────────────

/// Deterministic term-overlap scorer used when no external reranking
/// model is configured. Scores a passage by how many distinct query terms
/// it contains, weighted by term frequency and normalized by passage
/// length. Far cruder than a cross-encoder, but stable and dependency-free.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalReranker;

impl LexicalReranker {
    /// Lowercased alphanumeric tokens, single chars dropped.
    fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| s.len() >= 2)
            .map(|s| s.to_string())
            .collect()
    }

    fn score(query_tokens: &[String], passage: &str) -> f32 {
        let passage_tokens = Self::tokenize(passage);
        if passage_tokens.is_empty() || query_tokens.is_empty() {
            return 0.0;
        }
        let mut hits = 0usize;
        for qt in query_tokens {
            hits += passage_tokens.iter().filter(|pt| *pt == qt).count();
        }
        hits as f32 / (passage_tokens.len() as f32).sqrt()
    }
}

#[async_trait]
impl Reranker for LexicalReranker {
    async fn rerank(&self, query: &str, passages: Vec<Passage>) -> Result<Vec<RankedPassage>> {
        if passages.is_empty() {
            return Err(empty_input_error("lexical"));
        }
        let query_tokens = Self::tokenize(query);
        let mut ranked: Vec<RankedPassage> = passages
            .into_iter()
            .map(|p| {
                let score = Self::score(&query_tokens, &p.text);
                RankedPassage { id: p.id, text: p.text, score }
            })
            .collect();
        // Stable sort keeps the incoming (ANN) order among equal scores.
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(ranked)
    }
}

// ── HTTP backend (Cohere/Jina-style rerank API) ────────────────────

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: Vec<&'a str>,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankRow>,
}

#[derive(Deserialize)]
struct RerankRow {
    index: usize,
    relevance_score: f32,
}

/// [`Reranker`] backed by an HTTP rerank endpoint returning
/// `{index, relevance_score}` rows.
pub struct HttpReranker {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpReranker {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        HttpReranker {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    fn error(&self, message: impl Into<String>) -> RetrievalError {
        RetrievalError::Rerank {
            reranker: self.model.clone(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn rerank(&self, query: &str, passages: Vec<Passage>) -> Result<Vec<RankedPassage>> {
        if passages.is_empty() {
            return Err(self.error("passage list is empty"));
        }
        debug!(model = %self.model, candidates = passages.len(), "reranking");

        let request = RerankRequest {
            model: &self.model,
            query,
            documents: passages.iter().map(|p| p.text.as_str()).collect(),
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

        let parsed: RerankResponse = response
            .json()
            .await
            .map_err(|e| self.error(format!("malformed response: {e}")))?;
        if parsed.results.len() != passages.len() {
            return Err(self.error(format!(
                "backend scored {} of {} passages",
                parsed.results.len(),
                passages.len()
            )));
        }

        let mut ranked = Vec::with_capacity(parsed.results.len());
        for row in parsed.results {
            let passage = passages
                .get(row.index)
                .ok_or_else(|| self.error(format!("backend returned invalid index {}", row.index)))?;
            ranked.push(RankedPassage {
                id: passage.id,
                text: passage.text.clone(),
                score: row.relevance_score,
            });
        }
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passages(texts: &[&str]) -> Vec<Passage> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Passage { id: i as u32, text: t.to_string() })
            .collect()
    }

    #[tokio::test]
    async fn test_lexical_orders_by_overlap() {
        let ranked = LexicalReranker
            .rerank(
                "saving energy at home",
                passages(&[
                    "a recipe for sourdough bread",
                    "energy saving starts at home: saving energy means lower bills",
                    "the energy market overview",
                ]),
            )
            .await
            .unwrap();

        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].id, 1);
        assert!(ranked[0].score > ranked[1].score);
        assert!(ranked.last().unwrap().score <= ranked[0].score);
    }

    #[tokio::test]
    async fn test_lexical_preserves_length() {
        let input = passages(&["one two", "three four", "five six", "seven eight"]);
        let ranked = LexicalReranker.rerank("nine", input).await.unwrap();
        assert_eq!(ranked.len(), 4);
    }

    #[tokio::test]
    async fn test_empty_passages_rejected() {
        let err = LexicalReranker.rerank("query", vec![]).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Rerank { .. }));
    }

    #[test]
    fn test_tokenize_drops_single_chars() {
        let tokens = LexicalReranker::tokenize("A big-cat, ran! x");
        assert_eq!(tokens, vec!["big", "cat", "ran"]);
    }
}
