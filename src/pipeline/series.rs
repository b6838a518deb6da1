use serde::{Deserialize, Serialize};

use crate::error::{GspError, GspResult};
use crate::pipeline::matching::Activation;

/// Power drawn by one appliance, sampled at the delta indices it was on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplianceSeries {
    pub index: Vec<usize>,
    pub power: Vec<f64>,
}

impl ApplianceSeries {
    /// Each activation contributes `on..=off`: the ON step, a linear ramp, then
    /// the magnitude of the OFF step, rounded to whole watts.
    pub fn from_activations(activations: &[Activation], deltas: &[f64]) -> GspResult<Self> {
        let mut series = Self::default();
        for activation in activations {
            if activation.off <= activation.on || activation.off >= deltas.len() {
                return Err(GspError::invalid(format!(
                    "activation {}..{} does not fit {} deltas",
                    activation.on,
                    activation.off,
                    deltas.len()
                )));
            }
            let mut samples = vec![None; activation.duration() + 1];
            samples[0] = Some(deltas[activation.on]);
            samples[activation.duration()] = Some(deltas[activation.off].abs());

            series.index.extend(activation.on..=activation.off);
            series
                .power
                .extend(interpolate_gaps(&samples).into_iter().map(|v| v.unwrap_or(f64::NAN)));
        }
        Ok(series)
    }

    pub fn len(&self) -> usize {
        self.power.len()
    }

    pub fn is_empty(&self) -> bool {
        self.power.is_empty()
    }

    /// Mean of the positive samples, 0 when there are none.
    pub fn average_power(&self) -> f64 {
        let positive: Vec<f64> = self.power.iter().copied().filter(|p| *p > 0.0).collect();
        if positive.is_empty() {
            0.0
        } else {
            positive.iter().sum::<f64>() / positive.len() as f64
        }
    }

    pub fn max_power(&self) -> f64 {
        self.power
            .iter()
            .copied()
            .reduce(f64::max)
            .unwrap_or(0.0)
    }
}

/// Fill interior gaps linearly between known samples and round to integers.
///
/// Gaps before the first or after the last known sample stay empty. With fewer
/// than two known samples the input comes back unchanged.
pub fn interpolate_gaps(samples: &[Option<f64>]) -> Vec<Option<f64>> {
    let known: Vec<(usize, f64)> = samples
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.filter(|x| x.is_finite()).map(|x| (i, x)))
        .collect();
    if known.len() < 2 {
        return samples.to_vec();
    }

    let mut filled: Vec<Option<f64>> = samples
        .iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect();
    for pair in known.windows(2) {
        let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
        let slope = (y1 - y0) / (x1 - x0) as f64;
        for (offset, slot) in filled[x0 + 1..x1].iter_mut().enumerate() {
            *slot = Some(y0 + slope * (offset + 1) as f64);
        }
    }
    filled.into_iter().map(|v| v.map(f64::round)).collect()
}
