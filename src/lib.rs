//! ragcore: retrieval-augmented search backend.
//!
//! Given a natural-language query, returns the top-k most relevant
//! passages from a fixed, pre-indexed corpus via a two-stage pipeline:
//! broad approximate nearest-neighbor recall over a hand-rolled HNSW
//! index, then precise cross-encoder-style reranking of the small
//! candidate set.
//!
//! # Architecture
//! ```text
//! offline:  documents → chunker → chunks.json
//!                         ↓ embed (passage side, raw)
//!                       vectors.bin → HNSW build → index.hnsw
//!
//! serving:  query → embedder (prefixed) → HNSW search (oversampled)
//!                 → chunk lookup → reranker → top-k texts
//! ```
//!
//! The embedding and reranking models are external collaborators behind
//! the [`embedder::Embedder`] and [`reranker::Reranker`] traits. All
//! serving state is built once at startup into a read-only
//! [`retriever::RetrieverContext`] shared across requests.

pub mod chunker;
pub mod config;
pub mod embedder;
pub mod error;
pub mod hnsw;
pub mod index;
pub mod reranker;
pub mod retriever;
pub mod server;
pub mod store;

pub use chunker::{chunk_documents, Chunk, Document};
pub use config::RetrieverConfig;
pub use embedder::{transform_query, Embedder, HttpEmbedder};
pub use error::{Result, RetrievalError};
pub use index::VectorIndex;
pub use reranker::{HttpReranker, LexicalReranker, Passage, RankedPassage, Reranker};
pub use retriever::RetrieverContext;
pub use server::router;
pub use store::ChunkStore;
