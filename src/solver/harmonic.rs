use log::{debug, warn};
use nalgebra::{DMatrix, DVector};

use crate::error::{GspError, GspResult};
use crate::solver::pinv::{pseudo_inverse, PinvTolerance};
use crate::spectral::partition::{PartitionedLaplacian, SeedSet};

/// Values assigned to the unknown vertices, with the rank the pseudoinverse kept.
#[derive(Debug, Clone, PartialEq)]
pub struct HarmonicSolution {
    pub values: DVector<f64>,
    pub rank: usize,
    pub cutoff: f64,
}

impl HarmonicSolution {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when the unknown block was singular at the chosen cutoff.
    pub fn is_rank_deficient(&self) -> bool {
        self.rank < self.values.len()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }
}

/// Minimum-energy extension of seed values over the unknown vertices:
/// `x = pinv(L_uu) * b` with `b = -L_uk * s`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HarmonicSolver {
    tolerance: PinvTolerance,
    max_svd_iterations: usize,
}

impl HarmonicSolver {
    pub fn new(tolerance: PinvTolerance) -> Self {
        Self {
            tolerance,
            max_svd_iterations: 0,
        }
    }

    pub fn with_max_svd_iterations(mut self, max_svd_iterations: usize) -> Self {
        self.max_svd_iterations = max_svd_iterations;
        self
    }

    pub fn tolerance(&self) -> PinvTolerance {
        self.tolerance
    }

    /// Single-seed solve from `L_uu`, the 1×|U| row `L_0u` and the seed value.
    pub fn solve(
        &self,
        unknown_block: &DMatrix<f64>,
        seed_row: &DMatrix<f64>,
        seed_value: f64,
    ) -> GspResult<HarmonicSolution> {
        if seed_row.nrows() != 1 {
            return Err(GspError::invalid(format!(
                "seed coupling must be a single row, got {} rows",
                seed_row.nrows()
            )));
        }
        self.solve_block(
            unknown_block,
            seed_row,
            &DVector::from_element(1, seed_value),
        )
    }

    pub fn solve_with(
        &self,
        partition: &PartitionedLaplacian,
        seeds: &SeedSet,
    ) -> GspResult<HarmonicSolution> {
        if partition.known() != seeds.indices().as_slice() {
            return Err(GspError::invalid(
                "seed set does not match the partition's known vertices",
            ));
        }
        self.solve_block(
            partition.unknown_block(),
            partition.known_to_unknown(),
            &seeds.values(),
        )
    }

    fn solve_block(
        &self,
        unknown_block: &DMatrix<f64>,
        known_to_unknown: &DMatrix<f64>,
        seed_values: &DVector<f64>,
    ) -> GspResult<HarmonicSolution> {
        let size = unknown_block.nrows();
        if size == 0 || !unknown_block.is_square() {
            return Err(GspError::invalid(format!(
                "unknown block must be a non-empty square matrix, got {}x{}",
                unknown_block.nrows(),
                unknown_block.ncols()
            )));
        }
        if known_to_unknown.ncols() != size || known_to_unknown.nrows() != seed_values.len() {
            return Err(GspError::invalid(format!(
                "coupling block is {}x{}, expected {}x{}",
                known_to_unknown.nrows(),
                known_to_unknown.ncols(),
                seed_values.len(),
                size
            )));
        }
        if seed_values.iter().any(|v| !v.is_finite()) {
            return Err(GspError::invalid("seed values must be finite"));
        }
        if known_to_unknown.iter().any(|v| !v.is_finite()) {
            return Err(GspError::numerical("coupling block has non-finite entries"));
        }

        let rhs = -(known_to_unknown.transpose() * seed_values);
        let pinv = pseudo_inverse(unknown_block, self.tolerance, self.max_svd_iterations)?;
        let values = &pinv.matrix * rhs;
        if values.iter().any(|v| !v.is_finite()) {
            return Err(GspError::numerical("harmonic solution has non-finite entries"));
        }

        if pinv.rank == 0 {
            warn!(
                "Unknown block of size {} has rank 0 at cutoff {:.3e}; vertices are disconnected from the seeds",
                size, pinv.cutoff
            );
        } else if pinv.rank < size {
            debug!(
                "Unknown block rank-deficient: rank {} of {} (cutoff {:.3e})",
                pinv.rank, size, pinv.cutoff
            );
        }

        Ok(HarmonicSolution {
            values,
            rank: pinv.rank,
            cutoff: pinv.cutoff,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SimilarityGraphBuilder;
    use crate::spectral::{LaplacianPartitioner, Seed};
    use approx::assert_abs_diff_eq;

    fn partition_for(reference: &[f64], sigma: f64) -> PartitionedLaplacian {
        let graph = SimilarityGraphBuilder::build(reference, sigma).expect("graph");
        LaplacianPartitioner::partition(graph.adjacency()).expect("partition")
    }

    #[test]
    fn sample_sequence_solves_the_partitioned_system() {
        let reference = [
            100.0, 105.0, 103.0, 107.0, 102.0, 108.0, 104.0, 106.0, 101.0, 109.0, 110.0,
        ];
        let partition = partition_for(&reference, 20.0);
        let solution = HarmonicSolver::default()
            .solve(partition.unknown_block(), &partition.seed_row(), 1.0)
            .expect("solve");
        assert_eq!(solution.len(), 10);
        assert_eq!(solution.rank, 10);

        let rhs: DVector<f64> = -partition.seed_row().row(0).transpose();
        let residual = partition.unknown_block() * &solution.values - rhs;
        assert!(residual.norm() < 1e-9, "residual {}", residual.norm());
        // A single connected seed extends to a constant signal.
        for value in solution.values.iter() {
            assert_abs_diff_eq!(*value, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn identical_references_copy_the_seed_value() {
        let partition = partition_for(&[3.0; 6], 0.5);
        let expected = {
            let n = 5;
            let mut m = DMatrix::from_element(n, n, -1.0);
            for i in 0..n {
                m[(i, i)] = 5.0;
            }
            m
        };
        assert_abs_diff_eq!(*partition.unknown_block(), expected, epsilon = 1e-12);
        let solution = HarmonicSolver::default()
            .solve(partition.unknown_block(), &partition.seed_row(), 42.5)
            .expect("solve");
        for value in solution.values.iter() {
            assert_abs_diff_eq!(*value, 42.5, epsilon = 1e-9);
        }
    }

    #[test]
    fn two_seeds_interpolate_between_their_values() {
        let graph = SimilarityGraphBuilder::build(&[0.0, 1.0, 2.0, 3.0, 4.0], 1.0).expect("graph");
        let laplacian = LaplacianPartitioner::laplacian(graph.adjacency()).expect("laplacian");
        let seeds = SeedSet::new([
            Seed { index: 0, value: 0.0 },
            Seed { index: 4, value: 1.0 },
        ])
        .unwrap();
        let partition = LaplacianPartitioner::partition_with(&laplacian, &seeds).expect("partition");
        let solution = HarmonicSolver::default()
            .solve_with(&partition, &seeds)
            .expect("solve");
        let x = solution.to_vec();
        assert_eq!(x.len(), 3);
        assert!(x[0] > 0.0 && x[0] < x[1] && x[1] < x[2] && x[2] < 1.0);
        assert_abs_diff_eq!(x[1], 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(x[0] + x[2], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn disconnected_graph_yields_zero_minimum_norm_solution() {
        let partition = partition_for(&[0.0, 1.0, 2.0], 1e-3);
        assert!(partition.unknown_block().iter().all(|v| *v == 0.0));
        let solution = HarmonicSolver::default()
            .solve(partition.unknown_block(), &partition.seed_row(), 1.0)
            .expect("solve");
        assert_eq!(solution.rank, 0);
        assert!(solution.is_rank_deficient());
        assert!(solution.values.iter().all(|v| v.abs() < 1e-300));
    }

    #[test]
    fn non_finite_blocks_are_numerical_errors() {
        let block = DMatrix::from_row_slice(2, 2, &[1.0, f64::NAN, f64::NAN, 1.0]);
        let row = DMatrix::from_row_slice(1, 2, &[-0.5, -0.5]);
        let err = HarmonicSolver::default().solve(&block, &row, 1.0).unwrap_err();
        assert!(err.is_numerical());
    }

    #[test]
    fn mismatched_shapes_are_rejected() {
        let block = DMatrix::<f64>::identity(3, 3);
        let row = DMatrix::from_row_slice(1, 2, &[-0.5, -0.5]);
        assert!(HarmonicSolver::default()
            .solve(&block, &row, 1.0)
            .unwrap_err()
            .is_invalid_input());

        let partition = partition_for(&[1.0, 2.0, 3.0], 1.0);
        let wrong_seeds = SeedSet::single(1, 1.0).unwrap();
        assert!(HarmonicSolver::default()
            .solve_with(&partition, &wrong_seeds)
            .unwrap_err()
            .is_invalid_input());
    }

    #[test]
    fn repeated_solves_are_bit_identical() {
        let partition = partition_for(&[2.0, 7.0, 1.0, 8.0, 2.5], 3.0);
        let solver = HarmonicSolver::new(PinvTolerance::Default);
        let first = solver
            .solve(partition.unknown_block(), &partition.seed_row(), 0.7)
            .expect("solve");
        let second = solver
            .solve(partition.unknown_block(), &partition.seed_row(), 0.7)
            .expect("solve");
        assert_eq!(first, second);
    }
}
