//! HNSW (Hierarchical Navigable Small World) index.
//!
//! Multi-layer graph where higher layers hold exponentially fewer nodes.
//! Search greedily descends from the top layer, then runs a beam search at
//! layer 0. Insert is O(log N) average, search O(log N) average, memory
//! O(N * M).
//!
//! Level selection uses a seeded LCG and serialization writes nodes sorted
//! by id, so building the same vectors in the same order produces the same
//! graph and the same bytes.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use thiserror::Error;

use super::distance::{cosine_similarity, euclidean_distance_squared, magnitude};
use super::node::HnswNode;
use super::pqueue::ScoredItem;

/// File format magic ("RGHN") and version.
const MAGIC: u32 = 0x5247_484E;
const FORMAT_VERSION: u8 = 1;

/// Hard cap on graph layers.
const LEVEL_CAP: u8 = 16;

/// Distance metric for similarity computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Cosine,
    Euclidean,
}

impl Metric {
    fn to_byte(self) -> u8 {
        match self {
            Metric::Cosine => 0,
            Metric::Euclidean => 1,
        }
    }

    fn from_byte(b: u8) -> Result<Self, HnswError> {
        match b {
            0 => Ok(Metric::Cosine),
            1 => Ok(Metric::Euclidean),
            other => Err(HnswError::Format(format!("unknown metric byte {other}"))),
        }
    }
}

/// Graph construction and search parameters.
///
/// * `connectivity` (M): max neighbors per node per layer. Higher values
///   improve recall and graph robustness at the cost of memory and build
///   time. Layer 0 allows `2 * connectivity`.
/// * `expansion_add` (efConstruction): beam width while inserting. Higher
///   values produce a better-connected graph (better recall) but slow the
///   build.
/// * `expansion_search` (efSearch): beam width while querying. Higher
///   values improve recall at the cost of query latency. The effective
///   beam is `max(k, expansion_search)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HnswParams {
    pub connectivity: usize,
    pub expansion_add: usize,
    pub expansion_search: usize,
}

impl Default for HnswParams {
    fn default() -> Self {
        HnswParams {
            connectivity: 16,
            expansion_add: 128,
            expansion_search: 64,
        }
    }
}

/// Errors local to the graph layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HnswError {
    #[error("duplicate node id {0}")]
    DuplicateId(u32),
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("empty vector")]
    EmptyVector,
    #[error("index format error: {0}")]
    Format(String),
}

/// The graph itself.
#[derive(Debug)]
pub struct Hnsw {
    params: HnswParams,
    m_max0: usize,
    level_mult: f32,
    metric: Metric,

    nodes: HashMap<u32, HnswNode>,
    entry_point: Option<u32>,
    level_max: u8,
    dimension: Option<usize>,

    // LCG state for level selection; seeded so builds are reproducible.
    rng_state: u64,
}

impl Hnsw {
    pub fn new(params: HnswParams, metric: Metric) -> Self {
        let level_mult = 1.0 / (params.connectivity as f32).ln();
        Hnsw {
            m_max0: params.connectivity * 2,
            level_mult,
            params,
            metric,
            nodes: HashMap::new(),
            entry_point: None,
            level_max: 0,
            dimension: None,
            rng_state: 42,
        }
    }

    pub fn params(&self) -> HnswParams {
        self.params
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get_vector(&self, id: u32) -> Option<&[f32]> {
        self.nodes.get(&id).map(|n| n.vector.as_slice())
    }

    /// Insert a vector under `id`.
    pub fn add_point(&mut self, id: u32, vector: Vec<f32>) -> Result<(), HnswError> {
        if vector.is_empty() {
            return Err(HnswError::EmptyVector);
        }
        if self.nodes.contains_key(&id) {
            return Err(HnswError::DuplicateId(id));
        }
        match self.dimension {
            Some(dim) if vector.len() != dim => {
                return Err(HnswError::DimensionMismatch {
                    expected: dim,
                    got: vector.len(),
                });
            }
            Some(_) => {}
            None => self.dimension = Some(vector.len()),
        }

        let level = self.select_level();
        let target = vector.clone();
        let target_mag = magnitude(&target);
        self.nodes.insert(id, HnswNode::new(id, level, vector));

        let Some(mut ep_id) = self.entry_point else {
            self.entry_point = Some(id);
            self.level_max = level;
            return Ok(());
        };

        // Phase 1: greedy descent through layers above the node's level.
        let mut layer = self.level_max as i32;
        while layer > level as i32 {
            ep_id = self.greedy_step(ep_id, &target, target_mag, layer as u8);
            layer -= 1;
        }

        // Phase 2: beam search and bidirectional linking from the node's
        // level down to layer 0.
        for lc in (0..=level.min(self.level_max)).rev() {
            let found =
                self.search_layer(ep_id, &target, target_mag, self.params.expansion_add, lc);

            let m_limit = if lc == 0 { self.m_max0 } else { self.params.connectivity };
            let selected: Vec<u32> = found
                .iter()
                .take(m_limit)
                .map(|&(nid, _)| nid)
                .filter(|&nid| nid != id)
                .collect();

            for &neighbor_id in &selected {
                self.link(neighbor_id, id, lc);
                self.link(id, neighbor_id, lc);
            }
            for &neighbor_id in &selected {
                self.shrink_neighbors(neighbor_id, lc, m_limit);
            }

            if let Some(&(best, _)) = found.first() {
                ep_id = best;
            }
        }

        if level > self.level_max {
            self.entry_point = Some(id);
            self.level_max = level;
        }
        Ok(())
    }

    /// k nearest neighbors of `query`, sorted by descending similarity.
    ///
    /// Returns an empty vec on an empty graph; the caller decides whether
    /// that is an error.
    pub fn search_knn(&self, query: &[f32], k: usize) -> Vec<(u32, f32)> {
        let Some(mut ep_id) = self.entry_point else {
            return Vec::new();
        };
        let query_mag = magnitude(query);

        let mut layer = self.level_max as i32;
        while layer > 0 {
            ep_id = self.greedy_step(ep_id, query, query_mag, layer as u8);
            layer -= 1;
        }

        let ef = k.max(self.params.expansion_search);
        let mut found = self.search_layer(ep_id, query, query_mag, ef, 0);
        found.truncate(k);
        found
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// Serialize to a self-describing little-endian byte buffer.
    ///
    /// Nodes are written sorted by id; re-serializing a restored graph
    /// yields identical bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let dim = self.dimension.unwrap_or(0);
        let mut buf = Vec::with_capacity(32 + self.nodes.len() * (8 + dim * 4));

        buf.extend_from_slice(&MAGIC.to_le_bytes());
        buf.push(FORMAT_VERSION);
        buf.push(self.metric.to_byte());
        buf.extend_from_slice(&(dim as u32).to_le_bytes());
        buf.extend_from_slice(&(self.params.connectivity as u32).to_le_bytes());
        buf.extend_from_slice(&(self.params.expansion_add as u32).to_le_bytes());
        buf.extend_from_slice(&(self.params.expansion_search as u32).to_le_bytes());
        buf.extend_from_slice(&(self.nodes.len() as u32).to_le_bytes());
        buf.push(self.level_max);
        buf.extend_from_slice(&self.entry_point.unwrap_or(u32::MAX).to_le_bytes());
        buf.extend_from_slice(&self.rng_state.to_le_bytes());

        let mut ids: Vec<u32> = self.nodes.keys().copied().collect();
        ids.sort_unstable();

        for id in ids {
            let node = &self.nodes[&id];
            buf.extend_from_slice(&node.id.to_le_bytes());
            buf.push(node.neighbors.len() as u8); // level + 1
            for &val in &node.vector {
                buf.extend_from_slice(&val.to_le_bytes());
            }
            for layer in &node.neighbors {
                buf.extend_from_slice(&(layer.len() as u16).to_le_bytes());
                for &nid in layer {
                    buf.extend_from_slice(&nid.to_le_bytes());
                }
            }
        }
        buf
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, HnswError> {
        let mut r = Reader::new(bytes);

        if r.u32()? != MAGIC {
            return Err(HnswError::Format("bad magic".into()));
        }
        let version = r.u8()?;
        if version != FORMAT_VERSION {
            return Err(HnswError::Format(format!("unsupported format version {version}")));
        }
        let metric = Metric::from_byte(r.u8()?)?;
        let dimension = r.u32()? as usize;
        let params = HnswParams {
            connectivity: r.u32()? as usize,
            expansion_add: r.u32()? as usize,
            expansion_search: r.u32()? as usize,
        };
        let node_count = r.u32()? as usize;
        let level_max = r.u8()?;
        let ep_raw = r.u32()?;
        let rng_state = r.u64()?;

        let mut hnsw = Hnsw::new(params, metric);
        hnsw.dimension = if dimension > 0 { Some(dimension) } else { None };
        hnsw.level_max = level_max;
        hnsw.entry_point = if ep_raw == u32::MAX { None } else { Some(ep_raw) };
        hnsw.rng_state = rng_state;

        for _ in 0..node_count {
            let id = r.u32()?;
            let layer_count = r.u8()? as usize;
            if layer_count == 0 || layer_count > LEVEL_CAP as usize + 1 {
                return Err(HnswError::Format(format!(
                    "node {id} has invalid layer count {layer_count}"
                )));
            }
            let mut vector = Vec::with_capacity(dimension);
            for _ in 0..dimension {
                vector.push(r.f32()?);
            }
            let mut node = HnswNode::new(id, (layer_count - 1) as u8, vector);
            for layer in node.neighbors.iter_mut() {
                let n = r.u16()? as usize;
                layer.reserve(n);
                for _ in 0..n {
                    layer.push(r.u32()?);
                }
            }
            hnsw.nodes.insert(id, node);
        }
        Ok(hnsw)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Draw a layer for a new node: floor(-ln(u) / ln(M)), capped.
    fn select_level(&mut self) -> u8 {
        self.rng_state = self
            .rng_state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1);
        let u = ((self.rng_state >> 33) as f32 / (u32::MAX as f32)).max(1e-7);
        let level = (-u.ln() * self.level_mult).floor() as u8;
        level.min(LEVEL_CAP)
    }

    /// One layer of greedy descent: move to the best neighbor until no
    /// neighbor improves on the current node.
    fn greedy_step(&self, entry_id: u32, query: &[f32], query_mag: f32, layer: u8) -> u32 {
        let mut current = entry_id;
        let mut current_sim = self.similarity(current, query, query_mag);
        loop {
            let mut improved = false;
            if let Some(node) = self.nodes.get(&current) {
                if let Some(neighbors) = node.neighbors.get(layer as usize) {
                    for &nid in neighbors {
                        let sim = self.similarity(nid, query, query_mag);
                        if sim > current_sim {
                            current = nid;
                            current_sim = sim;
                            improved = true;
                        }
                    }
                }
            }
            if !improved {
                return current;
            }
        }
    }

    /// Beam search at one layer; returns up to `ef` ids sorted by
    /// descending similarity.
    fn search_layer(
        &self,
        entry_id: u32,
        query: &[f32],
        query_mag: f32,
        ef: usize,
        layer: u8,
    ) -> Vec<(u32, f32)> {
        let mut visited: HashSet<u32> = HashSet::new();
        // Frontier: max-heap, explore the most similar candidate first.
        let mut frontier: BinaryHeap<ScoredItem<u32>> = BinaryHeap::new();
        // Best-so-far: min-heap so the worst kept result is on top.
        let mut best: BinaryHeap<Reverse<ScoredItem<u32>>> = BinaryHeap::new();

        let entry_sim = self.similarity(entry_id, query, query_mag);
        visited.insert(entry_id);
        frontier.push(ScoredItem::new(entry_sim, entry_id));
        best.push(Reverse(ScoredItem::new(entry_sim, entry_id)));

        while let Some(ScoredItem { score: c_sim, item: c_id }) = frontier.pop() {
            let worst = best.peek().map(|r| r.0.score).unwrap_or(f32::NEG_INFINITY);
            if c_sim < worst && best.len() >= ef {
                break;
            }
            if let Some(node) = self.nodes.get(&c_id) {
                if let Some(neighbors) = node.neighbors.get(layer as usize) {
                    for &nid in neighbors {
                        if !visited.insert(nid) {
                            continue;
                        }
                        let sim = self.similarity(nid, query, query_mag);
                        let worst = best.peek().map(|r| r.0.score).unwrap_or(f32::NEG_INFINITY);
                        if sim > worst || best.len() < ef {
                            frontier.push(ScoredItem::new(sim, nid));
                            best.push(Reverse(ScoredItem::new(sim, nid)));
                            if best.len() > ef {
                                best.pop();
                            }
                        }
                    }
                }
            }
        }

        let mut out: Vec<(u32, f32)> = best.into_iter().map(|r| (r.0.item, r.0.score)).collect();
        out.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        out
    }

    fn link(&mut self, from: u32, to: u32, layer: u8) {
        if let Some(node) = self.nodes.get_mut(&from) {
            while node.neighbors.len() <= layer as usize {
                node.neighbors.push(Vec::new());
            }
            let list = &mut node.neighbors[layer as usize];
            if !list.contains(&to) {
                list.push(to);
            }
        }
    }

    /// Drop the least-similar connections once a node exceeds its limit.
    fn shrink_neighbors(&mut self, id: u32, layer: u8, max_neighbors: usize) {
        let (vec, mag) = {
            let Some(node) = self.nodes.get(&id) else { return };
            match node.neighbors.get(layer as usize) {
                Some(list) if list.len() > max_neighbors => {}
                _ => return,
            }
            (node.vector.clone(), node.magnitude())
        };

        let list = self.nodes[&id].neighbors[layer as usize].clone();
        let mut scored: Vec<(u32, f32)> = list
            .into_iter()
            .map(|nid| (nid, self.similarity(nid, &vec, mag)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(max_neighbors);

        if let Some(node) = self.nodes.get_mut(&id) {
            node.neighbors[layer as usize] = scored.into_iter().map(|(nid, _)| nid).collect();
        }
    }

    /// Similarity of a stored node to `query`; higher is better for both
    /// metrics (Euclidean is negated).
    fn similarity(&self, id: u32, query: &[f32], query_mag: f32) -> f32 {
        let Some(node) = self.nodes.get(&id) else {
            return f32::NEG_INFINITY;
        };
        match self.metric {
            Metric::Cosine => cosine_similarity(
                &node.vector,
                query,
                Some(node.magnitude()),
                Some(query_mag),
            ),
            Metric::Euclidean => -euclidean_distance_squared(&node.vector, query).sqrt(),
        }
    }
}

impl Default for Hnsw {
    fn default() -> Self {
        Self::new(HnswParams::default(), Metric::Cosine)
    }
}

/// Bounds-checked little-endian reader over a byte slice.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], HnswError> {
        let end = self.pos.checked_add(n).ok_or_else(|| HnswError::Format("overflow".into()))?;
        if end > self.bytes.len() {
            return Err(HnswError::Format(format!(
                "unexpected EOF at offset {} (wanted {n} bytes)",
                self.pos
            )));
        }
        let s = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(s)
    }

    fn u8(&mut self) -> Result<u8, HnswError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, HnswError> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Result<u32, HnswError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64, HnswError> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn f32(&mut self) -> Result<f32, HnswError> {
        Ok(f32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }
}
