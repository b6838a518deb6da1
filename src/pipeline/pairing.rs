use std::collections::BTreeMap;
use std::f64::consts::PI;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{GspError, GspResult};
use crate::pipeline::clustering::{ClusterStats, Clustering};

const MAX_BALANCE_ROUNDS: usize = 100;

/// An ON cluster and the OFF cluster of the same appliance, as indices into
/// [`ClusterPairing::clusters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterPair {
    pub on: usize,
    pub off: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterPairing {
    /// Clusters after folding small ones in and balancing signs.
    pub clusters: Vec<Vec<usize>>,
    /// Ascending by OFF cluster.
    pub pairs: Vec<ClusterPair>,
}

impl ClusterPairing {
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }
}

/// Density of `N(mean, std^2)` at `x`. A zero spread is a point mass.
pub fn normal_pdf(x: f64, mean: f64, std: f64) -> f64 {
    if std == 0.0 {
        return if x == mean { f64::INFINITY } else { 0.0 };
    }
    let variance = std * std;
    (-(x - mean).powi(2) / (2.0 * variance)).exp() / (2.0 * PI * variance).sqrt()
}

/// Turns event clusters into appliance candidates: one positive (ON) cluster
/// matched with one negative (OFF) cluster each.
#[derive(Debug, Clone, Copy)]
pub struct ClusterPairer {
    instance_limit: usize,
}

impl ClusterPairer {
    pub fn new(instance_limit: usize) -> Self {
        Self { instance_limit }
    }

    pub fn instance_limit(&self) -> usize {
        self.instance_limit
    }

    /// Clusters are ordered by decreasing mean. Those below `instance_limit`
    /// members are dissolved into the kept cluster with the highest Gaussian
    /// density at each event. The closest same-sign clusters are then merged
    /// until positive and negative counts agree, and every positive cluster is
    /// paired with the later negative cluster whose mean best cancels it.
    pub fn pair(&self, clustering: &Clustering, deltas: &[f64]) -> GspResult<ClusterPairing> {
        if let Some(position) = clustering.clusters.iter().position(|c| c.is_empty()) {
            return Err(GspError::invalid(format!("cluster {} is empty", position)));
        }
        let stats = clustering.stats(deltas)?;

        let mut order: Vec<usize> = (0..stats.len()).collect();
        order.sort_by(|&a, &b| stats[b].mean.total_cmp(&stats[a].mean));

        let (kept, small): (Vec<usize>, Vec<usize>) = order
            .iter()
            .partition(|&&i| stats[i].count >= self.instance_limit);
        if kept.is_empty() {
            info!(
                "No cluster reaches {} instances, nothing to pair",
                self.instance_limit
            );
            return Ok(ClusterPairing {
                clusters: order.iter().map(|&i| clustering.clusters[i].clone()).collect(),
                pairs: Vec::new(),
            });
        }

        let kept_stats: Vec<ClusterStats> = kept.iter().map(|&i| stats[i]).collect();
        let mut clusters: Vec<Vec<usize>> =
            kept.iter().map(|&i| clustering.clusters[i].clone()).collect();
        for &i in &small {
            for &event in &clustering.clusters[i] {
                let target = nearest_cluster(deltas[event], &kept_stats);
                clusters[target].push(event);
            }
        }
        debug!(
            "Kept {} clusters, folded {} small ones",
            clusters.len(),
            small.len()
        );

        let clusters = balance(clusters, deltas)?;
        let pairs = pair_on_off(&clusters, deltas)?;
        info!("Paired {} ON/OFF cluster sets", pairs.len());
        Ok(ClusterPairing { clusters, pairs })
    }
}

/// Kept cluster an event from a dissolved cluster joins.
fn nearest_cluster(delta: f64, stats: &[ClusterStats]) -> usize {
    let densities: Vec<f64> = stats
        .iter()
        .map(|s| normal_pdf(delta, s.mean, s.std))
        .collect();
    let best = densities.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let winners: Vec<usize> = densities
        .iter()
        .enumerate()
        .filter(|(_, d)| **d == best)
        .map(|(i, _)| i)
        .collect();
    if winners.len() == 1 {
        return winners[0];
    }

    // Ties: the largest cluster below a rising edge, or the smallest above a falling one.
    if delta > 0.0 {
        stats.iter().position(|s| s.mean < delta).unwrap_or(0)
    } else {
        stats
            .iter()
            .rposition(|s| s.mean > delta)
            .unwrap_or(stats.len() - 1)
    }
}

fn cluster_means(clusters: &[Vec<usize>], deltas: &[f64]) -> GspResult<Vec<f64>> {
    clusters
        .iter()
        .map(|cluster| ClusterStats::of(cluster, deltas).map(|s| s.mean))
        .collect()
}

fn balance(mut clusters: Vec<Vec<usize>>, deltas: &[f64]) -> GspResult<Vec<Vec<usize>>> {
    for round in 0..MAX_BALANCE_ROUNDS {
        let means = cluster_means(&clusters, deltas)?;
        let positive_count = means.iter().filter(|m| **m > 0.0).count();
        if positive_count * 2 == means.len() {
            break;
        }

        let mut positive = (Vec::new(), Vec::new());
        let mut negative = (Vec::new(), Vec::new());
        for (cluster, mean) in clusters.into_iter().zip(means) {
            let side = if mean > 0.0 { &mut positive } else { &mut negative };
            side.0.push(cluster);
            side.1.push(mean);
        }

        let larger = if positive.0.len() > negative.0.len() {
            &mut positive
        } else {
            &mut negative
        };
        let stuck = larger.0.len() <= 1;
        if !stuck {
            let group = std::mem::take(&mut larger.0);
            larger.0 = merge_closest(group, &larger.1);
        }
        clusters = positive.0.into_iter().chain(negative.0).collect();
        if stuck {
            break;
        }
        debug!("Balance round {}: {} clusters", round + 1, clusters.len());
    }
    Ok(clusters)
}

/// Merge the two clusters with the closest means; the merged one goes first.
fn merge_closest(group: Vec<Vec<usize>>, means: &[f64]) -> Vec<Vec<usize>> {
    let mut best: Option<(usize, usize, f64)> = None;
    for i in 0..means.len() {
        for j in (i + 1)..means.len() {
            let distance = (means[i] - means[j]).abs();
            if best.map_or(true, |(_, _, d)| distance < d) {
                best = Some((i, j, distance));
            }
        }
    }
    let Some((a, b, _)) = best else {
        return group;
    };

    let mut merged = Vec::new();
    let mut rest = Vec::with_capacity(group.len().saturating_sub(2));
    for (k, cluster) in group.into_iter().enumerate() {
        if k == a || k == b {
            merged.extend(cluster);
        } else {
            rest.push(cluster);
        }
    }
    let mut out = Vec::with_capacity(rest.len() + 1);
    out.push(merged);
    out.extend(rest);
    out
}

fn pair_on_off(clusters: &[Vec<usize>], deltas: &[f64]) -> GspResult<Vec<ClusterPair>> {
    let means = cluster_means(clusters, deltas)?;
    if !means.iter().any(|m| *m > 0.0) || !means.iter().any(|m| *m < 0.0) {
        info!("Clusters are all one sign, no ON/OFF pairs");
        return Ok(Vec::new());
    }

    let mut by_off: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (on, &on_mean) in means.iter().enumerate().filter(|(_, m)| **m > 0.0) {
        let mut best: Option<(usize, f64)> = None;
        for (off, &off_mean) in means.iter().enumerate().skip(on + 1) {
            if off_mean >= 0.0 {
                continue;
            }
            let gap = (on_mean + off_mean).abs();
            if best.map_or(true, |(_, g)| gap < g) {
                best = Some((off, gap));
            }
        }
        if let Some((off, _)) = best {
            by_off.entry(off).or_default().push(on);
        }
    }

    let mut pairs = Vec::with_capacity(by_off.len());
    for (off, ons) in by_off {
        let mut chosen = ons[0];
        let mut chosen_gap = (means[chosen] + means[off]).abs();
        for &on in &ons[1..] {
            let gap = (means[on] + means[off]).abs();
            if gap < chosen_gap {
                chosen = on;
                chosen_gap = gap;
            }
        }
        pairs.push(ClusterPair { on: chosen, off });
    }
    Ok(pairs)
}
