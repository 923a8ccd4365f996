//! In-memory vector index
//!
//! Brute-force nearest-neighbour search over the corpus embeddings. The
//! corpus is a few thousand vectors at most, so an exact linear scan beats
//! the operational cost of an external vector store. Entries live for the
//! process lifetime; there is no persistence and no deletion.

use crate::RagError;

/// Distance function used for ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceMetric {
    /// Squared euclidean distance
    #[default]
    SquaredL2,
    /// Cosine distance (1 - cosine similarity)
    Cosine,
}

/// Index configuration
#[derive(Debug, Clone)]
pub struct VectorIndexConfig {
    /// Expected embedding dimension; every insert is checked against it
    pub dim: usize,
    pub metric: DistanceMetric,
}

/// One search hit, before any score transformation
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub id: String,
    pub distance: f32,
}

/// Exact nearest-neighbour index over owned embeddings
pub struct VectorIndex {
    config: VectorIndexConfig,
    ids: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    pub fn new(config: VectorIndexConfig) -> Self {
        Self {
            config,
            ids: Vec::new(),
            vectors: Vec::new(),
        }
    }

    /// Number of indexed vectors
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Insert a vector under the given id
    pub fn add(&mut self, id: impl Into<String>, vector: Vec<f32>) -> Result<(), RagError> {
        if vector.len() != self.config.dim {
            return Err(RagError::Index(format!(
                "Dimension mismatch: expected {}, got {}",
                self.config.dim,
                vector.len()
            )));
        }
        self.ids.push(id.into());
        self.vectors.push(vector);
        Ok(())
    }

    /// Return the `k` nearest entries, sorted by ascending distance.
    ///
    /// Fewer than `k` hits come back when the index holds fewer entries;
    /// that is not an error.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<IndexHit>, RagError> {
        if query.len() != self.config.dim {
            return Err(RagError::Index(format!(
                "Query dimension mismatch: expected {}, got {}",
                self.config.dim,
                query.len()
            )));
        }
        if k == 0 || self.ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<IndexHit> = self
            .ids
            .iter()
            .zip(&self.vectors)
            .map(|(id, vector)| IndexHit {
                id: id.clone(),
                distance: self.distance(query, vector),
            })
            .collect();

        // total_cmp keeps the sort well-defined even if a NaN sneaks in
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }

    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self.config.metric {
            DistanceMetric::SquaredL2 => a
                .iter()
                .zip(b)
                .map(|(x, y)| {
                    let d = x - y;
                    d * d
                })
                .sum(),
            DistanceMetric::Cosine => {
                let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 1.0;
                }
                1.0 - dot / (norm_a * norm_b)
            }
        }
    }
}
