use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::ClusteringConfig;
use crate::error::GspResult;
use crate::pipeline::clustering::{Clustering, GspClusterer};
use crate::pipeline::events::{detect_events, EventSet};
use crate::pipeline::matching::{Activation, EdgeMatcher};
use crate::pipeline::pairing::{ClusterPairer, ClusterPairing};
use crate::pipeline::series::ApplianceSeries;

pub const NO_EVENTS_MESSAGE: &str = "No significant power events detected in the data";
pub const NO_APPLIANCES_MESSAGE: &str = "Could not identify distinct appliances in the data";

/// One appliance recovered from the aggregate signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appliance {
    pub id: String,
    pub name: String,
    /// Mean of the positive series samples, to one decimal.
    pub avg_power: f64,
    pub max_power: f64,
    pub activations: Vec<Activation>,
    pub series: ApplianceSeries,
}

impl Appliance {
    fn new(number: usize, activations: Vec<Activation>, series: ApplianceSeries) -> Self {
        Self {
            id: format!("appliance_{}", number),
            name: format!("Appliance {}", number),
            avg_power: round1(series.average_power()),
            max_power: round1(series.max_power()),
            activations,
            series,
        }
    }
}

/// Every intermediate of one disaggregation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disaggregation {
    pub events: EventSet,
    pub clustering: Clustering,
    pub pairing: ClusterPairing,
    pub appliances: Vec<Appliance>,
    /// Why no appliances came out, when none did.
    pub message: Option<String>,
}

/// Events, multi-scale clustering, ON/OFF pairing, edge matching and per-appliance
/// power series, in that order.
#[derive(Debug, Clone)]
pub struct Disaggregator {
    clusterer: GspClusterer,
    pairer: ClusterPairer,
    matcher: EdgeMatcher,
}

impl Disaggregator {
    pub fn new(config: ClusteringConfig) -> GspResult<Self> {
        let matcher = EdgeMatcher::new(&config)?;
        let pairer = ClusterPairer::new(config.instance_limit);
        let clusterer = GspClusterer::new(config)?;
        Ok(Self {
            clusterer,
            pairer,
            matcher,
        })
    }

    pub fn config(&self) -> &ClusteringConfig {
        self.clusterer.config()
    }

    pub fn run(&self, power: &[f64]) -> GspResult<Disaggregation> {
        let events = detect_events(power, self.config())?;
        if events.is_empty() {
            info!("{}", NO_EVENTS_MESSAGE);
            return Ok(Disaggregation {
                events,
                clustering: Clustering::default(),
                pairing: ClusterPairing::default(),
                appliances: Vec::new(),
                message: Some(NO_EVENTS_MESSAGE.to_string()),
            });
        }

        let clustering = self.clusterer.refine(&events.events, &events.deltas)?;
        let pairing = self.pairer.pair(&clustering, &events.deltas)?;
        if pairing.is_empty() {
            info!("{}", NO_APPLIANCES_MESSAGE);
            return Ok(Disaggregation {
                events,
                clustering,
                pairing,
                appliances: Vec::new(),
                message: Some(NO_APPLIANCES_MESSAGE.to_string()),
            });
        }

        let matched = self.matcher.match_pairs(&pairing, &events.deltas)?;
        let mut appliances = Vec::with_capacity(matched.len());
        for (pair, activations) in pairing.pairs.iter().zip(matched) {
            let series = ApplianceSeries::from_activations(&activations, &events.deltas)?;
            if series.is_empty() {
                debug!(
                    "Pair {}/{} produced no activations, skipping",
                    pair.on, pair.off
                );
                continue;
            }
            appliances.push(Appliance::new(appliances.len() + 1, activations, series));
        }

        let message = appliances
            .is_empty()
            .then(|| NO_APPLIANCES_MESSAGE.to_string());
        info!(
            "Disaggregated {} appliances from {} events",
            appliances.len(),
            events.len()
        );
        Ok(Disaggregation {
            events,
            clustering,
            pairing,
            appliances,
            message,
        })
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::PinvTolerance;

    fn disaggregator() -> Disaggregator {
        Disaggregator::new(ClusteringConfig {
            tolerance: PinvTolerance::Relative { rtol: 1e-10 },
            ..ClusteringConfig::default()
        })
        .expect("disaggregator")
    }

    #[test]
    fn repeated_cycles_form_one_appliance() {
        let power = [
            100.0, 1600.0, 1600.0, 100.0, 100.0, 1600.0, 1600.0, 100.0, 100.0, 1600.0, 1600.0,
            100.0,
        ];
        let result = disaggregator().run(&power).expect("run");
        assert!(result.message.is_none());
        assert_eq!(result.appliances.len(), 1);

        let appliance = &result.appliances[0];
        assert_eq!(appliance.id, "appliance_1");
        assert_eq!(appliance.name, "Appliance 1");
        assert_eq!(
            appliance.activations,
            vec![
                Activation { on: 0, off: 2 },
                Activation { on: 4, off: 6 },
                Activation { on: 8, off: 10 },
            ]
        );
        assert_eq!(appliance.series.len(), 9);
        assert_eq!(appliance.avg_power, 1500.0);
        assert_eq!(appliance.max_power, 1500.0);
    }

    #[test]
    fn flat_signal_reports_no_events() {
        let result = disaggregator().run(&[50.0, 55.0, 52.0, 50.0]).expect("run");
        assert!(result.events.is_empty());
        assert!(result.appliances.is_empty());
        assert_eq!(result.message.as_deref(), Some(NO_EVENTS_MESSAGE));
    }

    #[test]
    fn rising_only_signal_reports_no_appliances() {
        let power = [0.0, 500.0, 1000.0, 1500.0, 2000.0];
        let result = disaggregator().run(&power).expect("run");
        assert_eq!(result.events.len(), 4);
        assert!(result.pairing.is_empty());
        assert_eq!(result.message.as_deref(), Some(NO_APPLIANCES_MESSAGE));
    }

    #[test]
    fn average_power_is_rounded_to_tenths() {
        assert_eq!(round1(1234.56), 1234.6);
        assert_eq!(round1(2.25), 2.3);
    }
}
