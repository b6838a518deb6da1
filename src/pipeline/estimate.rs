use log::debug;

use crate::config::EstimatorConfig;
use crate::error::GspResult;
use crate::graph::construction::validate_reference;
use crate::graph::{SimilarityGraph, SimilarityGraphBuilder};
use crate::solver::{HarmonicSolution, HarmonicSolver};
use crate::spectral::{GraphLaplacian, LaplacianPartitioner, PartitionedLaplacian, SeedSet};

/// Estimates for vertices `1..N` from a seed anchored at position 0.
///
/// Fails with `InvalidInput` for sequences shorter than two values or a
/// non-positive `sigma`, and with `Numerical` when the SVD breaks down.
pub fn estimate(reference: &[f64], sigma: f64, seed_value: f64) -> GspResult<Vec<f64>> {
    Estimator::new(EstimatorConfig::with_sigma(sigma))?.estimate(reference, seed_value)
}

/// Full length-N signal: seeds keep their values, every other position is estimated.
pub fn estimate_with_seeds(reference: &[f64], sigma: f64, seeds: &SeedSet) -> GspResult<Vec<f64>> {
    let estimation = Estimator::new(EstimatorConfig::with_sigma(sigma))?.run(reference, seeds)?;
    Ok(estimation.signal(seeds))
}

/// Every intermediate of one estimation, kept for inspection.
#[derive(Debug, Clone)]
pub struct Estimation {
    pub graph: SimilarityGraph,
    pub laplacian: GraphLaplacian,
    pub partition: PartitionedLaplacian,
    pub solution: HarmonicSolution,
}

impl Estimation {
    /// Scatter seeds and solved values back into sequence order.
    pub fn signal(&self, seeds: &SeedSet) -> Vec<f64> {
        let mut signal = vec![0.0; self.graph.node_count()];
        for seed in seeds.iter() {
            signal[seed.index] = seed.value;
        }
        for (slot, value) in self
            .partition
            .unknown()
            .iter()
            .zip(self.solution.values.iter())
        {
            signal[*slot] = *value;
        }
        signal
    }
}

#[derive(Debug, Clone)]
pub struct Estimator {
    config: EstimatorConfig,
    solver: HarmonicSolver,
}

impl Estimator {
    pub fn new(config: EstimatorConfig) -> GspResult<Self> {
        config.validate()?;
        let solver =
            HarmonicSolver::new(config.tolerance).with_max_svd_iterations(config.max_svd_iterations);
        Ok(Self { config, solver })
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    pub fn estimate(&self, reference: &[f64], seed_value: f64) -> GspResult<Vec<f64>> {
        let seeds = SeedSet::first(seed_value)?;
        Ok(self.run(reference, &seeds)?.solution.to_vec())
    }

    /// Graph construction, partitioning and solve over an arbitrary seed set.
    pub fn run(&self, reference: &[f64], seeds: &SeedSet) -> GspResult<Estimation> {
        validate_reference(reference)?;
        seeds.validate_for(reference.len())?;

        debug!(
            "Estimating {} positions from {} seeds (sigma={})",
            reference.len() - seeds.len(),
            seeds.len(),
            self.config.sigma
        );
        let graph = SimilarityGraphBuilder::build(reference, self.config.sigma)?;
        let laplacian = LaplacianPartitioner::laplacian(graph.adjacency())?;
        let partition = LaplacianPartitioner::partition_with(&laplacian, seeds)?;
        let solution = self.solver.solve_with(&partition, seeds)?;
        debug!(
            "Estimated {} positions (rank {} of {})",
            solution.len(),
            solution.rank,
            partition.unknown().len()
        );

        Ok(Estimation {
            graph,
            laplacian,
            partition,
            solution,
        })
    }
}
