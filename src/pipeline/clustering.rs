use indexmap::IndexSet;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::ClusteringConfig;
use crate::error::{GspError, GspResult};
use crate::pipeline::estimate::Estimator;

/// Count, mean, unbiased standard deviation and coefficient of variation of a
/// cluster's delta values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterStats {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub cv: f64,
}

impl ClusterStats {
    pub fn from_values(values: &[f64]) -> Self {
        let count = values.len();
        if count == 0 {
            return Self {
                count,
                mean: 0.0,
                std: 0.0,
                cv: f64::INFINITY,
            };
        }
        let mean = values.iter().sum::<f64>() / count as f64;
        let std = if count > 1 {
            let ss = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
            (ss / (count - 1) as f64).sqrt()
        } else {
            0.0
        };
        let cv = if std == 0.0 {
            0.0
        } else if mean == 0.0 {
            f64::INFINITY
        } else {
            (std / mean).abs()
        };
        Self {
            count,
            mean,
            std,
            cv,
        }
    }

    /// Statistics of the deltas a cluster points at.
    pub fn of(cluster: &[usize], deltas: &[f64]) -> GspResult<Self> {
        let values = cluster_values(cluster, deltas)?;
        Ok(Self::from_values(&values))
    }
}

/// Event clusters, each a sorted list of indices into the delta series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Clustering {
    pub clusters: Vec<Vec<usize>>,
}

impl Clustering {
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn stats(&self, deltas: &[f64]) -> GspResult<Vec<ClusterStats>> {
        self.clusters
            .iter()
            .map(|cluster| ClusterStats::of(cluster, deltas))
            .collect()
    }
}

/// Delta values of a cluster, rejecting indices past the end of `deltas`.
pub(crate) fn cluster_values(cluster: &[usize], deltas: &[f64]) -> GspResult<Vec<f64>> {
    cluster
        .iter()
        .map(|&i| {
            deltas.get(i).copied().ok_or_else(|| {
                GspError::invalid(format!(
                    "cluster index {} out of range for {} deltas",
                    i,
                    deltas.len()
                ))
            })
        })
        .collect()
}

/// Groups power events by propagating a unit seed from the first event over
/// a similarity graph of delta magnitudes.
#[derive(Debug, Clone)]
pub struct GspClusterer {
    config: ClusteringConfig,
}

impl GspClusterer {
    pub fn new(config: ClusteringConfig) -> GspResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    /// Events that join the first event's cluster at bandwidth `sigma`.
    ///
    /// Events are processed in windows of `window_len`; each window's graph is
    /// the anchor delta `deltas[events[0]]` followed by the window's deltas.
    /// A window whose solve fails is logged and contributes no members.
    pub fn cluster_once(
        &self,
        events: &[usize],
        deltas: &[f64],
        sigma: f64,
    ) -> GspResult<Vec<usize>> {
        let Some(&anchor_event) = events.first() else {
            return Ok(Vec::new());
        };
        if let Some(bad) = events.iter().find(|&&e| e >= deltas.len()) {
            return Err(GspError::invalid(format!(
                "event index {} out of range for {} deltas",
                bad,
                deltas.len()
            )));
        }

        let estimator = Estimator::new(self.config.estimator_config(sigma))?;
        let anchor = deltas[anchor_event];
        let threshold = self.config.membership_threshold;

        let members: Vec<Vec<usize>> = events
            .par_chunks(self.config.window_len)
            .enumerate()
            .map(|(window, chunk)| {
                let mut reference = Vec::with_capacity(chunk.len() + 1);
                reference.push(anchor);
                reference.extend(chunk.iter().map(|&e| deltas[e]));

                match estimator.estimate(&reference, 1.0) {
                    Ok(values) => chunk
                        .iter()
                        .zip(values)
                        .filter(|(_, value)| *value > threshold)
                        .map(|(event, _)| *event)
                        .collect(),
                    Err(err) => {
                        warn!(
                            "GSP clustering: window {} ({} events) failed at sigma={}: {}",
                            window + 1,
                            chunk.len(),
                            sigma,
                            err
                        );
                        Vec::new()
                    }
                }
            })
            .collect();

        Ok(members.into_iter().flatten().collect())
    }

    /// Multi-scale clustering over `sigma / divisor` for every scale divisor.
    ///
    /// At intermediate scales a cluster is accepted when its coefficient of
    /// variation is within `cv_threshold`; members of rejected clusters and
    /// events no cluster claimed go back into the pool for the next scale. At
    /// the last scale every cluster is accepted. Events still pooled at the end
    /// form one final cluster.
    pub fn refine(&self, events: &[usize], deltas: &[f64]) -> GspResult<Clustering> {
        let mut pool: Vec<usize> = events.to_vec();
        pool.sort_unstable();
        pool.dedup();

        let scales = self.config.scales();
        info!(
            "Starting multi-scale GSP clustering with {} events over {} scales",
            pool.len(),
            scales.len()
        );

        let mut accepted: Vec<Vec<usize>> = Vec::new();
        for (k, &sigma) in scales.iter().enumerate() {
            let last = k + 1 == scales.len();
            debug!(
                "Scale {}/{} (sigma={:.2}): {} events remaining",
                k + 1,
                scales.len(),
                sigma,
                pool.len()
            );

            let (clusters, leftover) = self.extract_all(&pool, deltas, sigma)?;
            debug!("Scale {}: {} clusters", k + 1, clusters.len());

            if last {
                accepted.extend(clusters);
                pool = leftover;
                continue;
            }

            let mut next = leftover;
            for cluster in clusters {
                let stats = ClusterStats::of(&cluster, deltas)?;
                if stats.cv <= self.config.cv_threshold {
                    accepted.push(cluster);
                } else {
                    next.extend(cluster);
                }
            }
            next.sort_unstable();
            pool = next;
        }

        if !pool.is_empty() {
            accepted.push(pool);
        }
        info!("Formed {} clusters", accepted.len());
        Ok(Clustering { clusters: accepted })
    }

    /// Peel clusters off `pool` until it is empty or an extraction finds nothing.
    fn extract_all(
        &self,
        pool: &[usize],
        deltas: &[f64],
        sigma: f64,
    ) -> GspResult<(Vec<Vec<usize>>, Vec<usize>)> {
        let mut remaining: IndexSet<usize> = pool.iter().copied().collect();
        let mut clusters = Vec::new();

        while !remaining.is_empty() {
            let current: Vec<usize> = remaining.iter().copied().collect();
            let cluster = self.cluster_once(&current, deltas, sigma)?;
            if cluster.is_empty() {
                break;
            }
            for event in &cluster {
                remaining.shift_remove(event);
            }
            clusters.push(cluster);
        }

        Ok((clusters, remaining.into_iter().collect()))
    }
}
