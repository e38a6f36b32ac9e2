//! Hand-rolled HNSW (Hierarchical Navigable Small World) graph.
//!
//! The performance-critical core of the retrieval pipeline: sub-linear
//! approximate nearest-neighbor search over high-dimensional embedding
//! vectors, with a reproducible binary on-disk format.

pub mod distance;
pub mod index;
pub mod node;
pub mod pqueue;

#[cfg(test)]
mod tests;

pub use index::{Hnsw, HnswError, HnswParams, Metric};
