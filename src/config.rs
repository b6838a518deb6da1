use serde::{Deserialize, Serialize};

use crate::error::{GspError, GspResult};
use crate::graph::construction::validate_sigma;
use crate::solver::PinvTolerance;

/// Parameters of one harmonic estimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Gaussian kernel bandwidth.
    pub sigma: f64,
    pub tolerance: PinvTolerance,
    /// SVD iteration cap; 0 iterates until convergence.
    pub max_svd_iterations: usize,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            sigma: 20.0,
            tolerance: PinvTolerance::Default,
            max_svd_iterations: 0,
        }
    }
}

impl EstimatorConfig {
    pub fn with_sigma(sigma: f64) -> Self {
        Self {
            sigma,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> GspResult<()> {
        validate_sigma(self.sigma)?;
        self.tolerance.validate()
    }
}

/// Parameters for event detection and multi-scale GSP clustering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Base kernel bandwidth; each scale divides it by one of `scale_divisors`.
    pub sigma: f64,
    /// Largest coefficient of variation accepted at intermediate scales.
    pub cv_threshold: f64,
    /// Events per propagation window.
    pub window_len: usize,
    /// Propagated value an event must exceed to join the cluster.
    pub membership_threshold: f64,
    pub scale_divisors: Vec<f64>,
    /// Deltas above this count as positive events (watts).
    pub positive_threshold: f64,
    /// Deltas below this count as negative events (watts).
    pub negative_threshold: f64,
    pub tolerance: PinvTolerance,
    /// Clusters with fewer members are folded into larger ones before pairing.
    pub instance_limit: usize,
    /// Weight of the magnitude score when matching ON and OFF edges.
    pub alpha: f64,
    /// Weight of the duration score when matching ON and OFF edges.
    pub beta: f64,
    /// Kernel bandwidth of the edge-matching graphs.
    pub matching_sigma: f64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            sigma: 20.0,
            cv_threshold: 0.15,
            window_len: 1000,
            membership_threshold: 0.98,
            scale_divisors: vec![1.0, 2.0, 4.0, 8.0, 14.0, 32.0, 64.0],
            positive_threshold: 20.0,
            negative_threshold: -20.0,
            tolerance: PinvTolerance::Default,
            instance_limit: 3,
            alpha: 0.5,
            beta: 0.5,
            matching_sigma: 1.0,
        }
    }
}

impl ClusteringConfig {
    pub fn validate(&self) -> GspResult<()> {
        validate_sigma(self.sigma)?;
        self.tolerance.validate()?;
        if !self.cv_threshold.is_finite() || self.cv_threshold < 0.0 {
            return Err(GspError::invalid(format!(
                "cv_threshold must be finite and non-negative, got {}",
                self.cv_threshold
            )));
        }
        if self.window_len == 0 {
            return Err(GspError::invalid("window_len must be at least 1"));
        }
        if !self.membership_threshold.is_finite() {
            return Err(GspError::invalid("membership_threshold must be finite"));
        }
        if self.scale_divisors.is_empty() {
            return Err(GspError::invalid("at least one scale divisor is required"));
        }
        if let Some(bad) = self
            .scale_divisors
            .iter()
            .find(|d| !d.is_finite() || **d <= 0.0)
        {
            return Err(GspError::invalid(format!(
                "scale divisors must be finite and positive, got {}",
                bad
            )));
        }
        if !self.positive_threshold.is_finite() || !self.negative_threshold.is_finite() {
            return Err(GspError::invalid("event thresholds must be finite"));
        }
        if self.negative_threshold > self.positive_threshold {
            return Err(GspError::invalid(format!(
                "negative_threshold {} exceeds positive_threshold {}",
                self.negative_threshold, self.positive_threshold
            )));
        }
        if !self.alpha.is_finite() || !self.beta.is_finite() {
            return Err(GspError::invalid("matching weights must be finite"));
        }
        validate_sigma(self.matching_sigma)?;
        Ok(())
    }

    /// Kernel bandwidth at each scale, widest first.
    pub fn scales(&self) -> Vec<f64> {
        self.scale_divisors.iter().map(|d| self.sigma / d).collect()
    }

    pub fn estimator_config(&self, sigma: f64) -> EstimatorConfig {
        EstimatorConfig {
            sigma,
            tolerance: self.tolerance,
            max_svd_iterations: 0,
        }
    }
}
