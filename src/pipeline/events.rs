use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::ClusteringConfig;
use crate::error::{GspError, GspResult};

/// Step changes found in a power series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSet {
    /// `deltas[i] = round2(power[i + 1] - power[i])`.
    pub deltas: Vec<f64>,
    /// Indices into `deltas` crossing either threshold, ascending.
    pub events: Vec<usize>,
    pub positive: Vec<usize>,
    pub negative: Vec<usize>,
}

impl EventSet {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

/// Consecutive differences rounded to two decimals.
pub fn power_deltas(power: &[f64]) -> GspResult<Vec<f64>> {
    if power.len() < 2 {
        return Err(GspError::invalid(format!(
            "power series needs at least 2 samples, got {}",
            power.len()
        )));
    }
    if let Some(position) = power.iter().position(|v| !v.is_finite()) {
        return Err(GspError::invalid(format!(
            "power sample at position {} is not finite",
            position
        )));
    }
    Ok(power
        .windows(2)
        .map(|pair| round2(pair[1] - pair[0]))
        .collect())
}

pub fn detect_events(power: &[f64], config: &ClusteringConfig) -> GspResult<EventSet> {
    config.validate()?;
    let deltas = power_deltas(power)?;

    let mut events = Vec::new();
    let mut positive = Vec::new();
    let mut negative = Vec::new();
    for (i, delta) in deltas.iter().enumerate() {
        if *delta > config.positive_threshold {
            events.push(i);
            positive.push(i);
        } else if *delta < config.negative_threshold {
            events.push(i);
            negative.push(i);
        }
    }

    debug!(
        "Event thresholds: +{} / {}",
        config.positive_threshold, config.negative_threshold
    );
    info!(
        "Detected {} power change events ({} positive, {} negative)",
        events.len(),
        positive.len(),
        negative.len()
    );

    Ok(EventSet {
        deltas,
        events,
        positive,
        negative,
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
