//! Build-time artifacts: the chunk store and the vector array file.
//!
//! Both are produced by the offline pipeline and loaded read-only at
//! startup. Chunk store position `i` aligns 1:1 with vector row `i` and
//! with index id `i`; the two files must never be reordered independently.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::chunker::Chunk;
use crate::error::{Result, RetrievalError};

/// In-memory chunk store, position-aligned with the vector index.
pub struct ChunkStore {
    chunks: Vec<Chunk>,
}

impl ChunkStore {
    pub fn new(chunks: Vec<Chunk>) -> Self {
        ChunkStore { chunks }
    }

    /// Load the full chunk file (JSON array) into memory.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let chunks: Vec<Chunk> = serde_json::from_slice(&bytes)?;
        info!(path = %path.display(), count = chunks.len(), "chunk store loaded");
        Ok(ChunkStore { chunks })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec(&self.chunks)?;
        fs::write(path, bytes)?;
        info!(path = %path.display(), count = self.chunks.len(), "chunk store saved");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunk text at index position `id`.
    pub fn text_at(&self, id: u32) -> Result<&str> {
        self.chunks
            .get(id as usize)
            .map(|c| c.chunk_text.as_str())
            .ok_or_else(|| {
                RetrievalError::IndexFormat(format!(
                    "index returned id {id} outside chunk store of {} entries",
                    self.chunks.len()
                ))
            })
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }
}

/// Vector array file: magic, row count, dimension, then f32 LE rows.
const VEC_MAGIC: u32 = 0x5247_5645; // "RGVE"

/// Write all embedding rows. Fails with `DimensionMismatch` if rows are
/// ragged.
pub fn save_vectors(path: &Path, vectors: &[Vec<f32>]) -> Result<()> {
    let dimension = vectors.first().map(|v| v.len()).unwrap_or(0);
    for row in vectors {
        if row.len() != dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: dimension,
                got: row.len(),
            });
        }
    }

    let mut buf = Vec::with_capacity(12 + vectors.len() * dimension * 4);
    buf.extend_from_slice(&VEC_MAGIC.to_le_bytes());
    buf.extend_from_slice(&(vectors.len() as u32).to_le_bytes());
    buf.extend_from_slice(&(dimension as u32).to_le_bytes());
    for row in vectors {
        for &val in row {
            buf.extend_from_slice(&val.to_le_bytes());
        }
    }
    fs::write(path, &buf)?;
    info!(path = %path.display(), rows = vectors.len(), dimension, "vectors saved");
    Ok(())
}

/// Read the embedding rows back, returning `(dimension, rows)`.
pub fn load_vectors(path: &Path) -> Result<(usize, Vec<Vec<f32>>)> {
    let bytes = fs::read(path)?;
    if bytes.len() < 12 {
        return Err(RetrievalError::IndexFormat("vector file too short".into()));
    }
    let magic = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
    if magic != VEC_MAGIC {
        return Err(RetrievalError::IndexFormat("bad vector file magic".into()));
    }
    let count = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize;
    let dimension = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;

    let expected = 12 + count * dimension * 4;
    if bytes.len() != expected {
        return Err(RetrievalError::IndexFormat(format!(
            "vector file length {} does not match header ({count} x {dimension})",
            bytes.len()
        )));
    }

    let mut rows = Vec::with_capacity(count);
    let mut offset = 12;
    for _ in 0..count {
        let mut row = Vec::with_capacity(dimension);
        for _ in 0..dimension {
            row.push(f32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap()));
            offset += 4;
        }
        rows.push(row);
    }
    info!(path = %path.display(), rows = count, dimension, "vectors loaded");
    Ok((dimension, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn chunk(document_id: &str, text: &str) -> Chunk {
        Chunk {
            chunk_id: Uuid::new_v4(),
            document_id: document_id.to_string(),
            chunk_text: text.to_string(),
        }
    }

    #[test]
    fn test_chunk_store_roundtrip_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.json");

        let store = ChunkStore::new(vec![chunk("d1", "first"), chunk("d1", "second")]);
        store.save(&path).unwrap();

        let loaded = ChunkStore::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.text_at(0).unwrap(), "first");
        assert_eq!(loaded.text_at(1).unwrap(), "second");
        assert!(loaded.text_at(2).is_err());
    }

    #[test]
    fn test_vector_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.bin");

        let vectors = vec![vec![0.25, -1.5, 3.0], vec![0.0, 0.5, -0.5]];
        save_vectors(&path, &vectors).unwrap();

        let (dimension, rows) = load_vectors(&path).unwrap();
        assert_eq!(dimension, 3);
        assert_eq!(rows, vectors);
    }

    #[test]
    fn test_ragged_vectors_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.bin");

        let err = save_vectors(&path, &[vec![1.0, 2.0], vec![1.0]]).unwrap_err();
        assert!(matches!(err, RetrievalError::DimensionMismatch { expected: 2, got: 1 }));
    }

    #[test]
    fn test_truncated_vector_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.bin");

        save_vectors(&path, &[vec![1.0, 2.0, 3.0]]).unwrap();
        let mut bytes = fs::read(&path).unwrap();
        bytes.truncate(bytes.len() - 2);
        fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            load_vectors(&path),
            Err(RetrievalError::IndexFormat(_))
        ));
    }
}
