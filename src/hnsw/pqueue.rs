//! Heap ordering for beam search.
//!
//! The layer search keeps two `BinaryHeap`s over the same entry type: a
//! max-heap frontier (explore the most similar candidate next) and a
//! `Reverse`-wrapped min-heap of results (evict the least similar once
//! the beam is full).

use std::cmp::Ordering;

/// Heap entry ordered by score only.
///
/// f32 has no total order; NaN compares Equal here, which is acceptable
/// because similarity scores are finite for finite vectors.
#[derive(Debug, Clone)]
pub struct ScoredItem<T> {
    pub score: f32,
    pub item: T,
}

impl<T> ScoredItem<T> {
    pub fn new(score: f32, item: T) -> Self {
        ScoredItem { score, item }
    }
}

impl<T> PartialEq for ScoredItem<T> {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score
    }
}

impl<T> Eq for ScoredItem<T> {}

impl<T> PartialOrd for ScoredItem<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for ScoredItem<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score.partial_cmp(&other.score).unwrap_or(Ordering::Equal)
    }
}
