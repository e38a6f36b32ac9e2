//! Persisted ANN index over the chunk corpus.
//!
//! Ids are positional: vector `i` in build order is id `i`, and id `i`
//! joins to position `i` of the chunk store. Built once by the offline
//! pipeline, loaded read-only by the serving process.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{Result, RetrievalError};
use crate::hnsw::{Hnsw, HnswError, HnswParams, Metric};

/// HNSW-backed vector index with positional u32 ids.
#[derive(Debug)]
pub struct VectorIndex {
    dimension: usize,
    hnsw: Hnsw,
}

impl VectorIndex {
    /// Build the index over the full vector set in one pass.
    ///
    /// Fails with `DimensionMismatch` if any vector's length differs from
    /// `dimension`. An empty vector set builds an empty index; searching
    /// it fails with `EmptyIndex`.
    pub fn build(dimension: usize, vectors: Vec<Vec<f32>>, params: HnswParams) -> Result<Self> {
        if dimension == 0 {
            return Err(RetrievalError::InvalidInput(
                "index dimension must be greater than zero".into(),
            ));
        }

        let mut hnsw = Hnsw::new(params, Metric::Cosine);
        for (i, vector) in vectors.into_iter().enumerate() {
            if vector.len() != dimension {
                return Err(RetrievalError::DimensionMismatch {
                    expected: dimension,
                    got: vector.len(),
                });
            }
            hnsw.add_point(i as u32, vector).map_err(Self::from_hnsw)?;
        }

        info!(count = hnsw.len(), dimension, "vector index built");
        Ok(VectorIndex { dimension, hnsw })
    }

    /// Approximate k-nearest-neighbor search, descending cosine similarity.
    ///
    /// Returns fewer than `count` results only if the index holds fewer
    /// than `count` vectors. Fails with `EmptyIndex` on a zero-vector
    /// index rather than returning an empty list silently.
    pub fn search(&self, query: &[f32], count: usize) -> Result<Vec<(u32, f32)>> {
        if self.hnsw.is_empty() {
            return Err(RetrievalError::EmptyIndex);
        }
        if query.len() != self.dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimension,
                got: query.len(),
            });
        }
        let results = self.hnsw.search_knn(query, count);
        debug!(requested = count, returned = results.len(), "ann search");
        Ok(results)
    }

    pub fn len(&self) -> usize {
        self.hnsw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hnsw.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn params(&self) -> HnswParams {
        self.hnsw.params()
    }

    /// Persist to `path`. Writes a temp file in the same directory and
    /// renames it into place so readers never observe a partial index.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.hnsw.serialize();
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, path)?;
        info!(path = %path.display(), bytes = bytes.len(), "index saved");
        Ok(())
    }

    /// Load a previously saved index. The restored index returns identical
    /// search results to the one that was saved.
    pub fn restore(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let hnsw = Hnsw::deserialize(&bytes).map_err(Self::from_hnsw)?;
        let dimension = hnsw.dimension().ok_or_else(|| {
            RetrievalError::IndexFormat("restored index has no dimension".into())
        })?;
        info!(path = %path.display(), count = hnsw.len(), dimension, "index restored");
        Ok(VectorIndex { dimension, hnsw })
    }

    fn from_hnsw(e: HnswError) -> RetrievalError {
        match e {
            HnswError::DimensionMismatch { expected, got } => {
                RetrievalError::DimensionMismatch { expected, got }
            }
            other => RetrievalError::IndexFormat(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(dim: usize, axis: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[axis] = 1.0;
        v
    }

    #[test]
    fn test_build_and_search() {
        let index = VectorIndex::build(
            4,
            vec![unit(4, 0), unit(4, 1), unit(4, 2)],
            HnswParams::default(),
        )
        .unwrap();

        let results = index.search(&unit(4, 1), 1).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, 1);
        assert!((results[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_build_rejects_ragged_vectors() {
        let err = VectorIndex::build(
            3,
            vec![vec![1.0, 0.0, 0.0], vec![1.0, 0.0]],
            HnswParams::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::DimensionMismatch { expected: 3, got: 2 }
        ));
    }

    #[test]
    fn test_search_empty_index_fails() {
        let index = VectorIndex::build(3, vec![], HnswParams::default()).unwrap();
        let err = index.search(&[1.0, 0.0, 0.0], 5).unwrap_err();
        assert!(matches!(err, RetrievalError::EmptyIndex));
    }

    #[test]
    fn test_search_wrong_dimension() {
        let index = VectorIndex::build(4, vec![unit(4, 0)], HnswParams::default()).unwrap();
        let err = index.search(&[1.0, 0.0], 1).unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::DimensionMismatch { expected: 4, got: 2 }
        ));
    }

    #[test]
    fn test_ids_are_positional() {
        let n = 50;
        let vectors: Vec<Vec<f32>> = (0..n)
            .map(|i| {
                let mut seed = 1234u64.wrapping_add(i as u64 * 7919);
                (0..8)
                    .map(|_| {
                        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
                        (seed >> 33) as f32 / (u32::MAX as f32) - 0.5
                    })
                    .collect()
            })
            .collect();

        let index = VectorIndex::build(8, vectors.clone(), HnswParams::default()).unwrap();
        let results = index.search(&vectors[17], n).unwrap();

        // Every returned id must be a valid position.
        assert!(results.iter().all(|&(id, _)| (id as usize) < n));
        // The exact stored vector must come back as its own nearest match.
        assert_eq!(results[0].0, 17);
    }

    #[test]
    fn test_save_restore_identical_results() {
        let vectors: Vec<Vec<f32>> = (0..30)
            .map(|i| vec![(i as f32).sin(), (i as f32).cos(), (i as f32 * 0.3).sin()])
            .collect();
        let index = VectorIndex::build(3, vectors, HnswParams::default()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.hnsw");
        index.save(&path).unwrap();
        let restored = VectorIndex::restore(&path).unwrap();

        assert_eq!(index.len(), restored.len());
        assert_eq!(index.dimension(), restored.dimension());

        let query = vec![0.4, 0.7, -0.1];
        assert_eq!(
            index.search(&query, 10).unwrap(),
            restored.search(&query, 10).unwrap()
        );
    }
}
