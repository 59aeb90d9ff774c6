//! Vector index implementation using HNSW
//!
//! Thin wrapper around hnsw_rs with cosine distance. Points are keyed by
//! the caller's chunk position.

use super::{RagError, RagResult};
use hnsw_rs::prelude::*;

/// Cosine distance implementation for hnsw_rs
#[derive(Clone, Copy, Debug, Default)]
pub struct CosineDistance;

impl Distance<f32> for CosineDistance {
    fn eval(&self, va: &[f32], vb: &[f32]) -> f32 {
        let mut dot = 0.0;
        let mut norm_a = 0.0;
        let mut norm_b = 0.0;

        for (a, b) in va.iter().zip(vb.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        if norm_a <= 0.0 || norm_b <= 0.0 {
            return 1.0;
        }

        // Cosine distance = 1.0 - cosine similarity
        1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
    }
}

/// Approximate nearest-neighbour index over chunk embeddings
pub struct VectorIndex {
    dimensions: usize,
    len: usize,
    hnsw: Hnsw<'static, f32, CosineDistance>,
}

// Hnsw does not implement Debug
impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("dimensions", &self.dimensions)
            .field("len", &self.len)
            .finish()
    }
}

impl VectorIndex {
    pub fn new(dimensions: usize) -> Self {
        // HNSW parameters
        let max_elements = 100_000;
        let m = 16;
        let ef_construction = 200;

        let hnsw = Hnsw::new(m, max_elements, 16, ef_construction, CosineDistance);

        Self {
            dimensions,
            len: 0,
            hnsw,
        }
    }

    /// Add a vector under `id`
    pub fn add(&mut self, id: usize, vector: &[f32]) -> RagResult<()> {
        if vector.len() != self.dimensions {
            return Err(RagError::DimensionMismatch {
                expected: self.dimensions,
                got: vector.len(),
            });
        }

        self.hnsw.insert_slice((vector, id));
        self.len += 1;
        Ok(())
    }

    /// Nearest neighbours as `(id, distance)`, closest first
    pub fn search(&self, query: &[f32], k: usize) -> RagResult<Vec<(usize, f32)>> {
        if query.len() != self.dimensions {
            return Err(RagError::DimensionMismatch {
                expected: self.dimensions,
                got: query.len(),
            });
        }
        if self.len == 0 || k == 0 {
            return Ok(Vec::new());
        }

        // hnsw_rs sizes its buffers from k
        let k = k.min(self.len);
        let ef_search = k.saturating_mul(2).max(16);
        let mut neighbours: Vec<(usize, f32)> = self
            .hnsw
            .search(query, k, ef_search)
            .into_iter()
            .map(|n| (n.d_id, n.distance))
            .collect();
        neighbours.sort_by(|a, b| a.1.total_cmp(&b.1));
        Ok(neighbours)
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
