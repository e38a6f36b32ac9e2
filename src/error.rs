//! Error taxonomy for the retrieval pipeline.
//!
//! Validation errors (`InvalidInput`, `InvalidParameter`, `DimensionMismatch`)
//! are raised before any model call. Runtime failures from external model or
//! index calls carry the failing stage so callers can diagnose without
//! internal knowledge. No failure path collapses into an empty result.

use thiserror::Error;

/// Errors produced by chunking, indexing, and retrieval.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Malformed or missing document fields, or a blank query.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An out-of-range request argument, rejected before any model call.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// Vector shape inconsistency between the index and a query or insert.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// A search was issued against an index holding zero vectors.
    #[error("index is empty: no vectors to search")]
    EmptyIndex,

    /// ANN search produced zero candidates for a non-degenerate request.
    #[error("no candidates returned from index search")]
    NoResults,

    /// The embedding backend failed or returned an unexpected shape.
    #[error("embedding error ({provider}): {message}")]
    Embedding { provider: String, message: String },

    /// The reranking backend failed or was given an empty passage list.
    #[error("rerank error ({reranker}): {message}")]
    Rerank { reranker: String, message: String },

    /// A persisted index or vector file could not be decoded.
    #[error("index format error: {0}")]
    IndexFormat(String),

    /// Chunk store and vector index disagree on corpus size.
    #[error("store misaligned: index holds {vectors} vectors, chunk store holds {chunks} chunks")]
    Misaligned { vectors: usize, chunks: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RetrievalError {
    /// Short kind tag used in service-layer diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            RetrievalError::InvalidInput(_) => "InvalidInput",
            RetrievalError::InvalidParameter { .. } => "InvalidParameter",
            RetrievalError::DimensionMismatch { .. } => "DimensionMismatch",
            RetrievalError::EmptyIndex => "EmptyIndexError",
            RetrievalError::NoResults => "NoResultsError",
            RetrievalError::Embedding { .. } => "EmbeddingError",
            RetrievalError::Rerank { .. } => "RerankError",
            RetrievalError::IndexFormat(_) => "IndexFormatError",
            RetrievalError::Misaligned { .. } => "MisalignedStoreError",
            RetrievalError::Io(_) => "IoError",
            RetrievalError::Json(_) => "JsonError",
        }
    }

    /// True for errors caused by the request rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RetrievalError::InvalidInput(_) | RetrievalError::InvalidParameter { .. }
        )
    }
}

/// Convenience result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;
