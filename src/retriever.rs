//! Two-stage retrieval orchestration.
//!
//! Stage one is broad: ANN-search the vector index for an oversampled
//! candidate set, recovering recall the approximation or embedding noise
//! may have cost. Stage two is narrow: rerank that small set with the
//! expensive pairwise model and cut to k. Fast-but-approximate, then
//! slow-but-precise.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::RetrieverConfig;
use crate::embedder::{embed_query, Embedder};
use crate::error::{Result, RetrievalError};
use crate::index::VectorIndex;
use crate::reranker::{Passage, Reranker};
use crate::store::ChunkStore;

/// Shared read-only serving state, built once at startup.
///
/// Every request path only reads from this; no synchronization is needed
/// beyond the `Arc`. Index construction never runs in the serving process.
pub struct RetrieverContext {
    index: VectorIndex,
    chunks: ChunkStore,
    embedder: Arc<dyn Embedder>,
    reranker: Arc<dyn Reranker>,
    config: RetrieverConfig,
}

impl RetrieverContext {
    /// Assemble the context, checking the vector/chunk alignment
    /// invariant: position `i` in the chunk store must be index id `i`.
    pub fn new(
        index: VectorIndex,
        chunks: ChunkStore,
        embedder: Arc<dyn Embedder>,
        reranker: Arc<dyn Reranker>,
        config: RetrieverConfig,
    ) -> Result<Self> {
        if index.len() != chunks.len() {
            return Err(RetrievalError::Misaligned {
                vectors: index.len(),
                chunks: chunks.len(),
            });
        }
        config.validate()?;
        info!(
            corpus = chunks.len(),
            dimension = index.dimension(),
            oversample = config.oversample,
            "retriever context ready"
        );
        Ok(RetrieverContext { index, chunks, embedder, reranker, config })
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Embed a query with the query-side prefix applied.
    pub async fn embed(&self, query: &str) -> Result<Vec<f32>> {
        validate_query(query)?;
        embed_query(self.embedder.as_ref(), query).await
    }

    /// Return the top-k passage texts for `query`.
    ///
    /// Validates `k` against the admissible range before any model call,
    /// then runs embed → oversampled ANN search → chunk lookup → rerank →
    /// truncate. Scores and ids stay internal.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>> {
        validate_query(query)?;
        if k <= self.config.k_min {
            return Err(RetrievalError::InvalidParameter {
                name: "k",
                reason: format!("must be greater than {}", self.config.k_min),
            });
        }
        if k > self.config.k_max {
            return Err(RetrievalError::InvalidParameter {
                name: "k",
                reason: format!("must be at most {}", self.config.k_max),
            });
        }

        let query_vector = embed_query(self.embedder.as_ref(), query).await?;

        let candidates = self.index.search(&query_vector, self.config.oversample)?;
        if candidates.is_empty() {
            return Err(RetrievalError::NoResults);
        }
        debug!(candidates = candidates.len(), k, "ann stage complete");

        let passages = candidates
            .iter()
            .map(|&(id, _)| {
                Ok(Passage {
                    id,
                    text: self.chunks.text_at(id)?.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        // Rerank against the raw query text, not the prefixed form: the
        // pairwise model scores natural query/passage pairs.
        let ranked = self.reranker.rerank(query, passages).await?;
        debug!(reranked = ranked.len(), "rerank stage complete");

        Ok(ranked.into_iter().take(k).map(|r| r.text).collect())
    }
}

fn validate_query(query: &str) -> Result<()> {
    if query.trim().is_empty() {
        return Err(RetrievalError::InvalidInput(
            "query must not be empty or whitespace".into(),
        ));
    }
    Ok(())
}
