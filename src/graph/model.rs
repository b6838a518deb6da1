use nalgebra::{DMatrix, DVector};

/// Dense symmetric similarity graph over the positions of a reference sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityGraph {
    adjacency: DMatrix<f64>,
    sigma: f64,
}

impl SimilarityGraph {
    pub(crate) fn new(adjacency: DMatrix<f64>, sigma: f64) -> Self {
        Self { adjacency, sigma }
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.nrows()
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn adjacency(&self) -> &DMatrix<f64> {
        &self.adjacency
    }

    pub fn into_adjacency(self) -> DMatrix<f64> {
        self.adjacency
    }

    pub fn weight(&self, i: usize, j: usize) -> f64 {
        self.adjacency[(i, j)]
    }

    /// Column sums of the adjacency matrix (total incident weight per vertex).
    pub fn degrees(&self) -> DVector<f64> {
        column_sums(&self.adjacency)
    }
}

pub(crate) fn column_sums(matrix: &DMatrix<f64>) -> DVector<f64> {
    DVector::from_iterator(
        matrix.ncols(),
        matrix.column_iter().map(|column| column.sum()),
    )
}
