use std::collections::HashSet;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{GspError, GspResult};

/// A vertex whose value is known up front.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Seed {
    pub index: usize,
    pub value: f64,
}

/// Non-empty set of seeds with distinct indices, kept in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Seed>", into = "Vec<Seed>")]
pub struct SeedSet {
    seeds: Vec<Seed>,
}

impl SeedSet {
    pub fn new(seeds: impl IntoIterator<Item = Seed>) -> GspResult<Self> {
        let seeds: Vec<Seed> = seeds.into_iter().collect();
        if seeds.is_empty() {
            return Err(GspError::invalid("at least one seed is required"));
        }
        let mut seen = HashSet::with_capacity(seeds.len());
        for seed in &seeds {
            if !seen.insert(seed.index) {
                return Err(GspError::invalid(format!(
                    "seed index {} appears more than once",
                    seed.index
                )));
            }
            if !seed.value.is_finite() {
                return Err(GspError::invalid(format!(
                    "seed value at index {} is not finite",
                    seed.index
                )));
            }
        }
        Ok(Self { seeds })
    }

    pub fn single(index: usize, value: f64) -> GspResult<Self> {
        Self::new([Seed { index, value }])
    }

    /// The fixed convention: one seed anchored at position 0.
    pub fn first(value: f64) -> GspResult<Self> {
        Self::single(0, value)
    }

    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Seed> {
        self.seeds.iter()
    }

    pub fn indices(&self) -> Vec<usize> {
        self.seeds.iter().map(|s| s.index).collect()
    }

    pub fn values(&self) -> DVector<f64> {
        DVector::from_iterator(self.seeds.len(), self.seeds.iter().map(|s| s.value))
    }

    /// Check that every seed addresses a vertex of an `n`-vertex graph and that
    /// at least one vertex is left unknown.
    pub fn validate_for(&self, n: usize) -> GspResult<()> {
        if let Some(seed) = self.seeds.iter().find(|s| s.index >= n) {
            return Err(GspError::invalid(format!(
                "seed index {} out of range for {} vertices",
                seed.index, n
            )));
        }
        if self.seeds.len() >= n {
            return Err(GspError::invalid(format!(
                "all {} vertices are seeded, nothing left to estimate",
                n
            )));
        }
        Ok(())
    }
}

impl TryFrom<Vec<Seed>> for SeedSet {
    type Error = GspError;

    fn try_from(seeds: Vec<Seed>) -> GspResult<Self> {
        Self::new(seeds)
    }
}

impl From<SeedSet> for Vec<Seed> {
    fn from(set: SeedSet) -> Self {
        set.seeds
    }
}

/// Laplacian split into the known index set K and the unknown index set U.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionedLaplacian {
    known: Vec<usize>,
    unknown: Vec<usize>,
    unknown_block: DMatrix<f64>,
    known_to_unknown: DMatrix<f64>,
}

impl PartitionedLaplacian {
    pub(crate) fn extract(laplacian: &DMatrix<f64>, seeds: &SeedSet) -> Self {
        let n = laplacian.nrows();
        let known = seeds.indices();
        let seeded: HashSet<usize> = known.iter().copied().collect();
        let unknown: Vec<usize> = (0..n).filter(|i| !seeded.contains(i)).collect();

        let unknown_block = laplacian.select_rows(&unknown).select_columns(&unknown);
        let known_to_unknown = laplacian.select_rows(&known).select_columns(&unknown);

        Self {
            known,
            unknown,
            unknown_block,
            known_to_unknown,
        }
    }

    /// Seed indices, in seed order.
    pub fn known(&self) -> &[usize] {
        &self.known
    }

    /// Indices of the vertices to estimate, ascending.
    pub fn unknown(&self) -> &[usize] {
        &self.unknown
    }

    /// `L_uu`: the sub-Laplacian over unknown vertices.
    pub fn unknown_block(&self) -> &DMatrix<f64> {
        &self.unknown_block
    }

    /// `L_ku` (|K|×|U|): coupling rows from seeds to unknown vertices.
    pub fn known_to_unknown(&self) -> &DMatrix<f64> {
        &self.known_to_unknown
    }

    /// `L_0u` for the first seed as a 1×|U| row.
    pub fn seed_row(&self) -> DMatrix<f64> {
        self.known_to_unknown.rows(0, 1).into_owned()
    }
}
