use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::config::{ClusteringConfig, EstimatorConfig};
use crate::error::{GspError, GspResult};
use crate::pipeline::{
    detect_events, ClusterPair, ClusterStats, Disaggregation, Disaggregator, Estimator,
    GspClusterer,
};
use crate::solver::PinvTolerance;
use crate::spectral::{Seed, SeedSet};

const DEFAULT_ROOT: &str = ".";

/// A JSON job for the `gsprop` binary, tagged by `"mode"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Request {
    Estimate(EstimateRequest),
    Cluster(ClusterRequest),
    Disaggregate(DisaggregateRequest),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateRequest {
    pub reference: Vec<f64>,
    pub sigma: f64,
    /// Value seeded at position 0. Defaults to 1 when neither this nor `seeds` is set.
    #[serde(default)]
    pub seed_value: Option<f64>,
    #[serde(default)]
    pub seeds: Option<Vec<Seed>>,
    #[serde(default)]
    pub tolerance: PinvTolerance,
    #[serde(default)]
    pub max_svd_iterations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRequest {
    pub power: Vec<f64>,
    #[serde(default)]
    pub config: ClusteringConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisaggregateRequest {
    pub power: Vec<f64>,
    /// One label per power sample, echoed back on the appliance series.
    #[serde(default)]
    pub timestamps: Option<Vec<String>>,
    #[serde(default)]
    pub config: ClusteringConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Response {
    Estimate(EstimateResponse),
    Cluster(ClusterResponse),
    Disaggregate(DisaggregateResponse),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateResponse {
    /// Estimates for the unknown positions, ascending by position.
    pub values: Vec<f64>,
    /// Full sequence with seeds in place.
    pub signal: Vec<f64>,
    pub rank: usize,
    pub cutoff: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterResponse {
    pub deltas: Vec<f64>,
    pub events: Vec<usize>,
    pub clusters: Vec<Vec<usize>>,
    pub stats: Vec<ClusterStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisaggregateResponse {
    pub num_appliances: usize,
    pub appliances: Vec<ApplianceReport>,
    pub clusters: Vec<Vec<usize>>,
    pub pairs: Vec<ClusterPair>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplianceReport {
    pub id: String,
    pub name: String,
    pub avg_power: f64,
    pub max_power: f64,
    pub activations: usize,
    pub timeseries: Vec<PowerPoint>,
}

/// One sample of an appliance series; `index` is the delta position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerPoint {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub power: f64,
}

impl EstimateRequest {
    pub fn seed_set(&self) -> GspResult<SeedSet> {
        match (&self.seeds, self.seed_value) {
            (Some(_), Some(_)) => Err(GspError::invalid(
                "request sets both seed_value and seeds",
            )),
            (Some(seeds), None) => SeedSet::new(seeds.iter().copied()),
            (None, value) => SeedSet::first(value.unwrap_or(1.0)),
        }
    }

    pub fn execute(&self) -> GspResult<EstimateResponse> {
        let seeds = self.seed_set()?;
        let estimator = Estimator::new(EstimatorConfig {
            sigma: self.sigma,
            tolerance: self.tolerance,
            max_svd_iterations: self.max_svd_iterations,
        })?;
        let estimation = estimator.run(&self.reference, &seeds)?;
        Ok(EstimateResponse {
            signal: estimation.signal(&seeds),
            values: estimation.solution.to_vec(),
            rank: estimation.solution.rank,
            cutoff: estimation.solution.cutoff,
        })
    }
}

impl ClusterRequest {
    pub fn execute(&self) -> GspResult<ClusterResponse> {
        let clusterer = GspClusterer::new(self.config.clone())?;
        let events = detect_events(&self.power, &self.config)?;
        let clustering = clusterer.refine(&events.events, &events.deltas)?;
        let stats = clustering.stats(&events.deltas)?;
        Ok(ClusterResponse {
            deltas: events.deltas,
            events: events.events,
            clusters: clustering.clusters,
            stats,
        })
    }
}

impl DisaggregateRequest {
    pub fn execute(&self) -> GspResult<DisaggregateResponse> {
        if let Some(timestamps) = &self.timestamps {
            if timestamps.len() != self.power.len() {
                return Err(GspError::invalid(format!(
                    "{} timestamps for {} power samples",
                    timestamps.len(),
                    self.power.len()
                )));
            }
        }
        let disaggregation = Disaggregator::new(self.config.clone())?.run(&self.power)?;
        Ok(self.report(disaggregation))
    }

    fn report(&self, disaggregation: Disaggregation) -> DisaggregateResponse {
        let timestamp = |i: usize| {
            self.timestamps
                .as_ref()
                .and_then(|labels| labels.get(i).cloned())
        };
        let appliances: Vec<ApplianceReport> = disaggregation
            .appliances
            .into_iter()
            .map(|appliance| ApplianceReport {
                timeseries: appliance
                    .series
                    .index
                    .iter()
                    .zip(&appliance.series.power)
                    .map(|(&index, &power)| PowerPoint {
                        index,
                        timestamp: timestamp(index),
                        power,
                    })
                    .collect(),
                id: appliance.id,
                name: appliance.name,
                avg_power: appliance.avg_power,
                max_power: appliance.max_power,
                activations: appliance.activations.len(),
            })
            .collect();
        DisaggregateResponse {
            num_appliances: appliances.len(),
            appliances,
            clusters: disaggregation.pairing.clusters,
            pairs: disaggregation.pairing.pairs,
            message: disaggregation.message,
        }
    }
}

impl Request {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("parse request JSON")
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Request::Estimate(_) => "estimate",
            Request::Cluster(_) => "cluster",
            Request::Disaggregate(_) => "disaggregate",
        }
    }

    pub fn execute(&self) -> GspResult<Response> {
        match self {
            Request::Estimate(request) => request.execute().map(Response::Estimate),
            Request::Cluster(request) => request.execute().map(Response::Cluster),
            Request::Disaggregate(request) => request.execute().map(Response::Disaggregate),
        }
    }
}

/// Reads request files relative to a root directory.
#[derive(Debug, Clone)]
pub struct RequestLoader {
    root: PathBuf,
}

impl RequestLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn default() -> Self {
        Self::new(DEFAULT_ROOT)
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn load(&self, relative: impl AsRef<Path>) -> Result<Request> {
        let path = self.root.join(relative);
        let json =
            fs::read_to_string(&path).with_context(|| format!("read request from {:?}", path))?;
        let request =
            Request::from_json_str(&json).with_context(|| format!("load request from {:?}", path))?;
        info!("Loaded {} request from {:?}", request.mode(), path);
        Ok(request)
    }
}
