//! Retrieval pipeline configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::chunker::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::error::{Result, RetrievalError};
use crate::hnsw::HnswParams;

/// Every tunable of the retrieval core.
///
/// The HNSW knobs trade recall for latency and memory: raising
/// `connectivity` or either expansion widens the graph/beam and improves
/// recall, at the cost of build time (`expansion_add`), query latency
/// (`expansion_search`), and memory (`connectivity`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// Embedding dimensionality (model output size).
    pub dimension: usize,
    /// Max graph neighbors per node per layer (M).
    pub connectivity: usize,
    /// Beam width during index construction (efConstruction).
    pub expansion_add: usize,
    /// Beam width during search (efSearch).
    pub expansion_search: usize,
    /// Fixed ANN candidate count fetched before reranking. Deliberately
    /// independent of the requested k: broad recall first, precision after.
    pub oversample: usize,
    /// Admissible k range for retrieve: `k_min < k <= k_max`.
    pub k_min: usize,
    pub k_max: usize,
    /// Default k when the request does not specify one.
    pub default_k: usize,
    /// Chunker byte budget per raw span (soft bound). The prepended
    /// overlap tail sits on top of this, so a chunk's span text can reach
    /// `chunk_size + chunk_overlap` plus a few bytes of word-boundary
    /// slack.
    pub chunk_size: usize,
    /// Overlap carried between adjacent chunks of one document.
    pub chunk_overlap: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        RetrieverConfig {
            dimension: 1024,
            connectivity: 16,
            expansion_add: 128,
            expansion_search: 64,
            oversample: 30,
            k_min: 3,
            k_max: 10,
            default_k: 5,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl RetrieverConfig {
    /// Load from a TOML file; unset fields fall back to defaults.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: RetrieverConfig = toml::from_str(&raw)
            .map_err(|e| RetrievalError::InvalidInput(format!("bad config file: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(RetrievalError::InvalidParameter {
                name: "dimension",
                reason: "must be greater than zero".into(),
            });
        }
        if self.k_min >= self.k_max {
            return Err(RetrievalError::InvalidParameter {
                name: "k_min",
                reason: format!("must be below k_max ({})", self.k_max),
            });
        }
        if self.oversample < self.k_max {
            return Err(RetrievalError::InvalidParameter {
                name: "oversample",
                reason: format!("must be at least k_max ({})", self.k_max),
            });
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RetrievalError::InvalidParameter {
                name: "chunk_overlap",
                reason: format!("must be below chunk_size ({})", self.chunk_size),
            });
        }
        Ok(())
    }

    pub fn hnsw_params(&self) -> HnswParams {
        HnswParams {
            connectivity: self.connectivity,
            expansion_add: self.expansion_add,
            expansion_search: self.expansion_search,
        }
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn with_oversample(mut self, oversample: usize) -> Self {
        self.oversample = oversample;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_original_tuning() {
        let config = RetrieverConfig::default();
        assert_eq!(config.dimension, 1024);
        assert_eq!(config.connectivity, 16);
        assert_eq!(config.expansion_add, 128);
        assert_eq!(config.expansion_search, 64);
        assert_eq!(config.oversample, 30);
        assert_eq!(config.default_k, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: RetrieverConfig = toml::from_str("oversample = 50\ndimension = 384").unwrap();
        assert_eq!(config.oversample, 50);
        assert_eq!(config.dimension, 384);
        assert_eq!(config.k_max, 10);
    }

    #[test]
    fn test_validate_rejects_small_oversample() {
        let config = RetrieverConfig::default().with_oversample(5);
        assert!(matches!(
            config.validate(),
            Err(RetrievalError::InvalidParameter { name: "oversample", .. })
        ));
    }
}
