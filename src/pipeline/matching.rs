use log::{debug, warn};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::config::ClusteringConfig;
use crate::error::GspResult;
use crate::graph::SimilarityGraphBuilder;
use crate::pipeline::clustering::cluster_values;
use crate::pipeline::pairing::ClusterPairing;
use crate::solver::{pseudo_inverse, PinvTolerance};
use crate::spectral::LaplacianPartitioner;

/// One ON edge and the OFF edge that ends it, as delta indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activation {
    pub on: usize,
    pub off: usize,
}

impl Activation {
    /// Samples the appliance stays on for.
    pub fn duration(&self) -> usize {
        self.off - self.on
    }
}

/// Matches every ON edge of an appliance with one of the OFF edges that follow it.
///
/// When several OFF edges are candidates, each is scored by propagating the
/// mean residual magnitude and the median duration over Gaussian graphs of the
/// candidates, and the lowest `alpha * magnitude + beta * duration` score wins.
#[derive(Debug, Clone, Copy)]
pub struct EdgeMatcher {
    alpha: f64,
    beta: f64,
    sigma: f64,
    tolerance: PinvTolerance,
}

impl EdgeMatcher {
    pub fn new(config: &ClusteringConfig) -> GspResult<Self> {
        config.validate()?;
        Ok(Self {
            alpha: config.alpha,
            beta: config.beta,
            sigma: config.matching_sigma,
            tolerance: config.tolerance,
        })
    }

    /// Activations for every ON/OFF pair, in pair order.
    pub fn match_pairs(
        &self,
        pairing: &ClusterPairing,
        deltas: &[f64],
    ) -> GspResult<Vec<Vec<Activation>>> {
        pairing
            .pairs
            .iter()
            .map(|pair| {
                self.match_clusters(
                    &pairing.clusters[pair.on],
                    &pairing.clusters[pair.off],
                    deltas,
                )
            })
            .collect()
    }

    /// Each ON edge looks for OFF edges before the next ON edge; the last ON
    /// edge takes any later OFF edge. ON edges in consecutive samples are skipped.
    pub fn match_clusters(
        &self,
        on_cluster: &[usize],
        off_cluster: &[usize],
        deltas: &[f64],
    ) -> GspResult<Vec<Activation>> {
        cluster_values(on_cluster, deltas)?;
        cluster_values(off_cluster, deltas)?;

        let mut ons = on_cluster.to_vec();
        ons.sort_unstable();
        let mut offs = off_cluster.to_vec();
        offs.sort_unstable();

        let mut activations = Vec::new();
        for (j, &on) in ons.iter().enumerate() {
            let candidates: Vec<usize> = match ons.get(j + 1) {
                Some(&next) if next - on == 1 => continue,
                Some(&next) => offs.iter().copied().filter(|&h| h > on && h < next).collect(),
                None => offs.iter().copied().filter(|&h| h > on).collect(),
            };
            let off = match candidates.as_slice() {
                [] => continue,
                [only] => *only,
                _ => self.choose_off(on, &candidates, deltas)?,
            };
            activations.push(Activation { on, off });
        }
        debug!(
            "Matched {} of {} ON edges",
            activations.len(),
            ons.len()
        );
        Ok(activations)
    }

    fn choose_off(&self, on: usize, candidates: &[usize], deltas: &[f64]) -> GspResult<usize> {
        let residuals: Vec<f64> = candidates.iter().map(|&h| deltas[h] + deltas[on]).collect();
        let durations: Vec<f64> = candidates.iter().map(|&h| (h - on) as f64).collect();

        let magnitude = self.propagate(&residuals, mean(&residuals))?;
        let duration = self.propagate(&durations, median(&durations))?;

        let mut best = 0;
        let mut best_score = f64::INFINITY;
        for k in 0..candidates.len() {
            let score = self.alpha * magnitude[k] + self.beta * duration[k];
            if score < best_score {
                best = k;
                best_score = score;
            }
        }
        Ok(candidates[best])
    }

    /// `pinv(L) * (-seed * L_0)` over the full Laplacian of `reference`, so the
    /// seed position is scored along with the rest.
    fn propagate(&self, reference: &[f64], seed_value: f64) -> GspResult<DVector<f64>> {
        let graph = SimilarityGraphBuilder::build(reference, self.sigma)?;
        let laplacian = LaplacianPartitioner::laplacian(graph.adjacency())?;
        let matrix = laplacian.matrix();
        let rhs = -(matrix.row(0).transpose() * seed_value);

        match pseudo_inverse(matrix, self.tolerance, 0) {
            Ok(pinv) => Ok(&pinv.matrix * rhs),
            Err(err) if err.is_numerical() => {
                warn!("Edge matching propagation failed, scoring as zero: {}", err);
                Ok(DVector::zeros(reference.len()))
            }
            Err(err) => Err(err),
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
