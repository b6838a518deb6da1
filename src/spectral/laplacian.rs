use log::{debug, trace};
use nalgebra::{DMatrix, DVector};

use crate::error::{GspError, GspResult};
use crate::graph::model::column_sums;
use crate::spectral::partition::{PartitionedLaplacian, SeedSet};

/// Combinatorial Laplacian `L = D - A` together with its degree vector.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphLaplacian {
    matrix: DMatrix<f64>,
    degrees: DVector<f64>,
}

impl GraphLaplacian {
    pub fn node_count(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    pub fn degrees(&self) -> &DVector<f64> {
        &self.degrees
    }

    pub fn degree_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_diagonal(&self.degrees)
    }

    pub fn row_sums(&self) -> DVector<f64> {
        DVector::from_iterator(self.matrix.nrows(), self.matrix.row_iter().map(|r| r.sum()))
    }
}

/// Derives the Laplacian from an adjacency matrix and splits it into known and
/// unknown blocks.
#[derive(Debug, Default)]
pub struct LaplacianPartitioner;

impl LaplacianPartitioner {
    /// `D[i][i] = sum_k A[k][i]`, `L = D - A`.
    pub fn laplacian(adjacency: &DMatrix<f64>) -> GspResult<GraphLaplacian> {
        if !adjacency.is_square() {
            return Err(GspError::invalid(format!(
                "adjacency must be square, got {}x{}",
                adjacency.nrows(),
                adjacency.ncols()
            )));
        }
        if adjacency.is_empty() {
            return Err(GspError::invalid("adjacency matrix is empty"));
        }

        let degrees = column_sums(adjacency);
        let mut matrix = -adjacency.clone();
        for (i, degree) in degrees.iter().enumerate() {
            matrix[(i, i)] += degree;
        }
        trace!(
            "Laplacian built for {} vertices, max degree {:.6}",
            degrees.len(),
            degrees.max()
        );
        Ok(GraphLaplacian { matrix, degrees })
    }

    /// Partition with vertex 0 as the single known vertex.
    ///
    /// The seed value does not enter the blocks, so a unit seed stands in.
    pub fn partition(adjacency: &DMatrix<f64>) -> GspResult<PartitionedLaplacian> {
        let laplacian = Self::laplacian(adjacency)?;
        Self::partition_with(&laplacian, &SeedSet::first(1.0)?)
    }

    /// Split `L` into `L_uu` over the unknown vertices and `L_ku` coupling the
    /// seeds to them.
    pub fn partition_with(
        laplacian: &GraphLaplacian,
        seeds: &SeedSet,
    ) -> GspResult<PartitionedLaplacian> {
        let n = laplacian.node_count();
        if n < 2 {
            return Err(GspError::invalid(format!(
                "a {}-vertex graph has no unknown block to solve",
                n
            )));
        }
        seeds.validate_for(n)?;

        let partition = PartitionedLaplacian::extract(&laplacian.matrix, seeds);
        debug!(
            "Partitioned Laplacian: {} known, {} unknown vertices",
            partition.known().len(),
            partition.unknown().len()
        );
        Ok(partition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SimilarityGraphBuilder;
    use crate::spectral::partition::Seed;
    use approx::assert_abs_diff_eq;

    fn sample_laplacian() -> GraphLaplacian {
        let reference = [
            100.0, 105.0, 103.0, 107.0, 102.0, 108.0, 104.0, 106.0, 101.0, 109.0, 110.0,
        ];
        let graph = SimilarityGraphBuilder::build(&reference, 20.0).expect("graph");
        LaplacianPartitioner::laplacian(graph.adjacency()).expect("laplacian")
    }

    #[test]
    fn laplacian_rows_sum_to_zero_and_is_symmetric() {
        let laplacian = sample_laplacian();
        for sum in laplacian.row_sums().iter() {
            assert_abs_diff_eq!(*sum, 0.0, epsilon = 1e-12);
        }
        let m = laplacian.matrix();
        for i in 0..m.nrows() {
            for j in 0..m.ncols() {
                assert_abs_diff_eq!(m[(i, j)], m[(j, i)], epsilon = 1e-15);
                if i != j {
                    assert!(m[(i, j)] < 0.0);
                }
            }
        }
    }

    #[test]
    fn laplacian_entries_follow_degree_minus_adjacency() {
        let reference = [
            100.0, 105.0, 103.0, 107.0, 102.0, 108.0, 104.0, 106.0, 101.0, 109.0, 110.0,
        ];
        let graph = SimilarityGraphBuilder::build(&reference, 20.0).expect("graph");
        let laplacian = LaplacianPartitioner::laplacian(graph.adjacency()).expect("laplacian");
        let column0: f64 = graph.adjacency().column(0).sum();
        assert_abs_diff_eq!(laplacian.degrees()[0], column0, epsilon = 1e-12);
        assert_abs_diff_eq!(laplacian.matrix()[(0, 0)], column0 - 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(
            laplacian.matrix()[(0, 1)],
            -graph.weight(0, 1),
            epsilon = 1e-15
        );
        let d = laplacian.degree_matrix();
        assert_eq!(d[(3, 3)], laplacian.degrees()[3]);
        assert_eq!(d[(3, 4)], 0.0);
    }

    #[test]
    fn default_partition_isolates_vertex_zero() {
        let laplacian = sample_laplacian();
        let partition =
            LaplacianPartitioner::partition_with(&laplacian, &SeedSet::first(1.0).unwrap())
                .expect("partition");
        assert_eq!(partition.known(), &[0]);
        assert_eq!(partition.unknown(), &(1..11).collect::<Vec<_>>()[..]);
        assert_eq!(partition.unknown_block().shape(), (10, 10));
        assert_eq!(partition.seed_row().shape(), (1, 10));
        for j in 0..10 {
            assert_eq!(partition.seed_row()[(0, j)], laplacian.matrix()[(0, j + 1)]);
            for i in 0..10 {
                assert_eq!(
                    partition.unknown_block()[(i, j)],
                    laplacian.matrix()[(i + 1, j + 1)]
                );
            }
        }
    }

    #[test]
    fn partition_accepts_arbitrary_seed_indices() {
        let laplacian = sample_laplacian();
        let seeds = SeedSet::new([
            Seed { index: 7, value: 2.0 },
            Seed { index: 2, value: -1.0 },
        ])
        .unwrap();
        let partition = LaplacianPartitioner::partition_with(&laplacian, &seeds).expect("partition");
        assert_eq!(partition.known(), &[7, 2]);
        assert_eq!(partition.unknown().len(), 9);
        assert!(!partition.unknown().contains(&7));
        assert_eq!(partition.known_to_unknown().shape(), (2, 9));
        assert_eq!(
            partition.known_to_unknown()[(1, 0)],
            laplacian.matrix()[(2, 0)]
        );
    }

    #[test]
    fn partition_rejects_degenerate_inputs() {
        let single = DMatrix::from_element(1, 1, 1.0);
        assert!(LaplacianPartitioner::partition(&single)
            .unwrap_err()
            .is_invalid_input());

        let rect = DMatrix::from_element(2, 3, 1.0);
        assert!(LaplacianPartitioner::laplacian(&rect)
            .unwrap_err()
            .is_invalid_input());

        let laplacian = sample_laplacian();
        let out_of_range = SeedSet::single(11, 1.0).unwrap();
        assert!(LaplacianPartitioner::partition_with(&laplacian, &out_of_range)
            .unwrap_err()
            .is_invalid_input());

        let two = LaplacianPartitioner::laplacian(&DMatrix::from_element(2, 2, 1.0)).unwrap();
        let all = SeedSet::new([
            Seed { index: 0, value: 1.0 },
            Seed { index: 1, value: 1.0 },
        ])
        .unwrap();
        assert!(LaplacianPartitioner::partition_with(&two, &all)
            .unwrap_err()
            .is_invalid_input());
    }

    #[test]
    fn seed_set_rejects_duplicates_and_non_finite_values() {
        assert!(SeedSet::new(Vec::new()).unwrap_err().is_invalid_input());
        assert!(SeedSet::new([
            Seed { index: 1, value: 1.0 },
            Seed { index: 1, value: 2.0 },
        ])
        .unwrap_err()
        .is_invalid_input());
        assert!(SeedSet::first(f64::NAN).unwrap_err().is_invalid_input());
    }
}
