use log::debug;
use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::error::{GspError, GspResult};
use crate::graph::model::SimilarityGraph;

/// Gaussian similarity between two reference values: `exp(-((a - b) / sigma)^2)`.
pub fn gaussian_weight(a: f64, b: f64, sigma: f64) -> f64 {
    let z = (a - b) / sigma;
    (-(z * z)).exp()
}

/// Turns a reference sequence into a dense Gaussian-kernel adjacency matrix.
#[derive(Debug, Default)]
pub struct SimilarityGraphBuilder;

impl SimilarityGraphBuilder {
    /// Build the N×N adjacency `A[i][j] = exp(-((r[i] - r[j]) / sigma)^2)`.
    ///
    /// Requires at least two positions, finite reference values and a finite
    /// `sigma > 0`. The result is symmetric with a unit diagonal. Entries for
    /// very distant values may underflow to exactly zero.
    pub fn build(reference: &[f64], sigma: f64) -> GspResult<SimilarityGraph> {
        validate_reference(reference)?;
        validate_sigma(sigma)?;

        let n = reference.len();
        debug!("Building {}x{} similarity graph with sigma={}", n, n, sigma);

        let mut data = vec![0.0f64; n * n];
        data.par_chunks_mut(n).enumerate().for_each(|(i, row)| {
            let ri = reference[i];
            for (j, slot) in row.iter_mut().enumerate() {
                *slot = if i == j {
                    1.0
                } else {
                    gaussian_weight(ri, reference[j], sigma)
                };
            }
        });

        let adjacency = DMatrix::from_row_slice(n, n, &data);
        Ok(SimilarityGraph::new(adjacency, sigma))
    }
}

pub(crate) fn validate_reference(reference: &[f64]) -> GspResult<()> {
    if reference.len() < 2 {
        return Err(GspError::invalid(format!(
            "reference sequence needs at least 2 values, got {}",
            reference.len()
        )));
    }
    if let Some(position) = reference.iter().position(|v| !v.is_finite()) {
        return Err(GspError::invalid(format!(
            "reference value at position {} is not finite",
            position
        )));
    }
    Ok(())
}

pub(crate) fn validate_sigma(sigma: f64) -> GspResult<()> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(GspError::invalid(format!(
            "kernel bandwidth must be finite and strictly positive, got {}",
            sigma
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample_reference() -> Vec<f64> {
        vec![
            100.0, 105.0, 103.0, 107.0, 102.0, 108.0, 104.0, 106.0, 101.0, 109.0, 110.0,
        ]
    }

    #[test]
    fn adjacency_is_symmetric_with_unit_diagonal() {
        let graph = SimilarityGraphBuilder::build(&sample_reference(), 20.0).expect("graph");
        let a = graph.adjacency();
        assert_eq!(a.shape(), (11, 11));
        for i in 0..11 {
            assert_eq!(a[(i, i)], 1.0);
            for j in 0..11 {
                assert_eq!(a[(i, j)], a[(j, i)]);
                assert!(a[(i, j)] > 0.0 && a[(i, j)] <= 1.0);
            }
        }
    }

    #[test]
    fn first_edge_matches_gaussian_kernel() {
        let graph = SimilarityGraphBuilder::build(&sample_reference(), 20.0).expect("graph");
        assert_abs_diff_eq!(graph.weight(0, 1), (-(0.25f64 * 0.25)).exp(), epsilon = 1e-15);
        assert_abs_diff_eq!(graph.weight(0, 1), 0.9394, epsilon = 1e-4);
    }

    #[test]
    fn degrees_are_column_sums() {
        let graph = SimilarityGraphBuilder::build(&[1.0, 2.0, 4.0], 1.5).expect("graph");
        let degrees = graph.degrees();
        for j in 0..3 {
            let expected: f64 = (0..3).map(|i| graph.weight(i, j)).sum();
            assert_abs_diff_eq!(degrees[j], expected, epsilon = 1e-15);
            assert!(degrees[j] >= 1.0);
        }
    }

    #[test]
    fn rejects_short_sequences_and_bad_bandwidth() {
        assert!(SimilarityGraphBuilder::build(&[1.0], 1.0)
            .unwrap_err()
            .is_invalid_input());
        assert!(SimilarityGraphBuilder::build(&[], 1.0)
            .unwrap_err()
            .is_invalid_input());
        for sigma in [0.0, -3.0, f64::NAN, f64::INFINITY] {
            assert!(SimilarityGraphBuilder::build(&[1.0, 2.0], sigma)
                .unwrap_err()
                .is_invalid_input());
        }
        assert!(SimilarityGraphBuilder::build(&[1.0, f64::NAN], 1.0)
            .unwrap_err()
            .is_invalid_input());
    }

    #[test]
    fn wide_bandwidth_approaches_uniform_graph() {
        let graph = SimilarityGraphBuilder::build(&sample_reference(), 1e6).expect("graph");
        for value in graph.adjacency().iter() {
            assert_abs_diff_eq!(*value, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn narrow_bandwidth_disconnects_distinct_values() {
        let graph = SimilarityGraphBuilder::build(&[0.0, 1.0, 2.0], 1e-3).expect("graph");
        assert_eq!(graph.weight(0, 1), 0.0);
        assert_eq!(graph.weight(1, 2), 0.0);
        assert_eq!(graph.weight(1, 1), 1.0);
    }
}
