//! Exact k-nearest-neighbour vector index over squared Euclidean distance.
//!
//! Rows are stored contiguously in insertion order; row `i` is the `i`-th
//! vector added. Searches always return exactly `k` neighbours: when `k`
//! exceeds the number of rows the tail is padded with [`NO_MATCH`] entries,
//! which callers are expected to discard.

use crate::error::IndexError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Row id reported for padding entries when fewer than `k` rows exist.
pub const NO_MATCH: i64 = -1;

/// One search hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    /// Row in the index, or [`NO_MATCH`].
    pub row: i64,
    /// Squared L2 distance to the query (`f32::INFINITY` for padding).
    pub distance: f32,
}

impl Neighbor {
    fn padding() -> Self {
        Self {
            row: NO_MATCH,
            distance: f32::INFINITY,
        }
    }

    pub fn is_match(&self) -> bool {
        self.row >= 0
    }
}

/// Brute-force L2 index.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimensions: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            data: Vec::new(),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        if self.dimensions == 0 {
            0
        } else {
            self.data.len() / self.dimensions
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append a vector as the next row.
    pub fn add(&mut self, vector: &[f32]) -> Result<(), IndexError> {
        self.check_dimensions(vector)?;
        self.data.extend_from_slice(vector);
        Ok(())
    }

    pub fn row(&self, row: usize) -> Option<&[f32]> {
        let start = row.checked_mul(self.dimensions)?;
        self.data.get(start..start + self.dimensions)
    }

    /// Return the `k` rows closest to `query`, nearest first.
    ///
    /// Equal distances are ordered by row, so repeated searches against an
    /// unchanged index return identical sequences.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        self.check_dimensions(query)?;

        let mut scored: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimensions.max(1))
            .enumerate()
            .map(|(row, vector)| Neighbor {
                row: row as i64,
                distance: squared_l2(query, vector),
            })
            .collect();

        scored.sort_by(|a, b| match a.distance.total_cmp(&b.distance) {
            Ordering::Equal => a.row.cmp(&b.row),
            other => other,
        });
        scored.truncate(k);
        scored.resize(k, Neighbor::padding());
        Ok(scored)
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<(), IndexError> {
        if vector.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

/// Squared Euclidean distance. Callers guarantee equal lengths.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}
