use super::distance::magnitude;

/// A single graph node: the stored vector plus per-layer adjacency lists.
///
/// `neighbors[l]` holds the node ids connected at layer `l`; the list count
/// is always `level + 1`. The magnitude is computed once at insertion (the
/// vector never mutates afterwards), keeping the node free of interior
/// mutability so the whole graph can be read concurrently.
#[derive(Debug)]
pub struct HnswNode {
    pub id: u32,
    pub level: u8,
    pub vector: Vec<f32>,
    pub neighbors: Vec<Vec<u32>>,
    magnitude: f32,
}

impl HnswNode {
    pub fn new(id: u32, level: u8, vector: Vec<f32>) -> Self {
        let magnitude = magnitude(&vector);
        HnswNode {
            id,
            level,
            vector,
            neighbors: vec![Vec::new(); level as usize + 1],
            magnitude,
        }
    }

    pub fn magnitude(&self) -> f32 {
        self.magnitude
    }
}
