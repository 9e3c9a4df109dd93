use std::sync::Arc;

use anyhow::{Result, anyhow};
use embeddings::QueryEncoder;

use crate::fusion::{Candidate, SourceKind};

/// Exact nearest-neighbour index over one embedding space.
///
/// Vectors are stored row-major and positionally aligned with the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatL2Index {
    dimension: usize,
    data: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IndexBuildError {
    #[error("row {row}: vector has dimension {found}, expected {expected}")]
    DimensionMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("row {row}: vector contains a non-finite value")]
    NonFinite { row: usize },
    #[error("embedding vectors must have at least one dimension")]
    ZeroDimension,
}

impl FlatL2Index {
    pub fn from_vectors(vectors: &[Vec<f32>]) -> Result<Self, IndexBuildError> {
        let Some(first) = vectors.first() else {
            return Ok(Self {
                dimension: 0,
                data: Vec::new(),
            });
        };
        let dimension = first.len();
        if dimension == 0 {
            return Err(IndexBuildError::ZeroDimension);
        }
        let mut data = Vec::with_capacity(dimension * vectors.len());
        for (row, vector) in vectors.iter().enumerate() {
            if vector.len() != dimension {
                return Err(IndexBuildError::DimensionMismatch {
                    row,
                    expected: dimension,
                    found: vector.len(),
                });
            }
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(IndexBuildError::NonFinite { row });
            }
            data.extend_from_slice(vector);
        }
        Ok(Self { dimension, data })
    }

    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `k` closest rows under squared Euclidean distance, nearest first.
    /// Equal distances are ordered by position.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(anyhow!(
                "query vector has dimension {}, index expects {}",
                query.len(),
                self.dimension
            ));
        }
        let mut neighbors = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, row)| Neighbor {
                position,
                distance: squared_l2(query, row),
            })
            .collect::<Vec<_>>();
        let by_distance = |a: &Neighbor, b: &Neighbor| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.position.cmp(&b.position))
        };
        if neighbors.len() > k {
            neighbors.select_nth_unstable_by(k - 1, by_distance);
            neighbors.truncate(k);
        }
        neighbors.sort_by(by_distance);
        Ok(neighbors)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Query-side view of one embedding space: encoder, neighbour count and
/// the space's ordinal, which doubles as its source priority.
#[derive(Clone)]
pub struct VectorRetriever {
    name: String,
    ordinal: usize,
    k: usize,
    encoder: Arc<dyn QueryEncoder>,
}

impl VectorRetriever {
    pub fn new(name: impl Into<String>, ordinal: usize, k: usize, encoder: Arc<dyn QueryEncoder>) -> Self {
        Self {
            name: name.into(),
            ordinal,
            k,
            encoder,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub const fn k(&self) -> usize {
        self.k
    }

    pub fn encode(&self, query: &str) -> Result<Vec<f32>> {
        self.encoder.encode(query)
    }

    /// Neighbours within `max_distance`, as fusion candidates.
    pub fn candidates(&self, index: &FlatL2Index, query: &str, max_distance: f32) -> Result<Vec<Candidate>> {
        let vector = self.encode(query)?;
        let neighbors = index.search(&vector, self.k)?;
        Ok(neighbors
            .into_iter()
            .filter(|n| n.distance <= max_distance)
            .map(|n| Candidate {
                position: n.position,
                source: SourceKind::Vector(self.ordinal),
                raw_score: f64::from(n.distance),
            })
            .collect())
    }
}

impl std::fmt::Debug for VectorRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorRetriever")
            .field("name", &self.name)
            .field("ordinal", &self.ordinal)
            .field("k", &self.k)
            .finish_non_exhaustive()
    }
}
