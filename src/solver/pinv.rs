use log::trace;
use nalgebra::{DMatrix, SVD};
use serde::{Deserialize, Serialize};

use crate::error::{GspError, GspResult};

/// Singular-value cutoff used when forming the pseudoinverse.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PinvTolerance {
    /// `max(rows, cols) * f64::EPSILON * sigma_max`.
    #[default]
    Default,
    /// `rtol * sigma_max`.
    Relative { rtol: f64 },
    /// A fixed cutoff.
    Absolute { cutoff: f64 },
}

impl PinvTolerance {
    pub fn validate(&self) -> GspResult<()> {
        let value = match *self {
            PinvTolerance::Default => return Ok(()),
            PinvTolerance::Relative { rtol } => rtol,
            PinvTolerance::Absolute { cutoff } => cutoff,
        };
        if !value.is_finite() || value < 0.0 {
            return Err(GspError::invalid(format!(
                "pseudoinverse tolerance must be finite and non-negative, got {}",
                value
            )));
        }
        Ok(())
    }

    pub fn cutoff(&self, rows: usize, cols: usize, max_singular: f64) -> f64 {
        match *self {
            PinvTolerance::Default => rows.max(cols) as f64 * f64::EPSILON * max_singular,
            PinvTolerance::Relative { rtol } => rtol * max_singular,
            PinvTolerance::Absolute { cutoff } => cutoff,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PseudoInverse {
    pub matrix: DMatrix<f64>,
    /// Singular values kept above the cutoff.
    pub rank: usize,
    pub cutoff: f64,
}

/// Moore–Penrose pseudoinverse through a full SVD.
///
/// `max_iterations == 0` lets the SVD iterate until convergence.
pub fn pseudo_inverse(
    matrix: &DMatrix<f64>,
    tolerance: PinvTolerance,
    max_iterations: usize,
) -> GspResult<PseudoInverse> {
    tolerance.validate()?;
    if matrix.is_empty() {
        return Err(GspError::invalid("cannot invert an empty matrix"));
    }
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(GspError::numerical(
            "matrix contains non-finite entries, SVD not attempted",
        ));
    }

    let (rows, cols) = matrix.shape();
    let svd = SVD::try_new(matrix.clone(), true, true, f64::EPSILON, max_iterations)
        .ok_or_else(|| {
            GspError::numerical(format!("SVD of {}x{} matrix did not converge", rows, cols))
        })?;

    let max_singular = svd.singular_values.max();
    let cutoff = tolerance.cutoff(rows, cols, max_singular);
    let rank = svd.singular_values.iter().filter(|s| **s > cutoff).count();
    trace!(
        "SVD {}x{}: sigma_max={:.6e}, cutoff={:.6e}, rank={}",
        rows,
        cols,
        max_singular,
        cutoff,
        rank
    );

    let inverse = svd.pseudo_inverse(cutoff).map_err(GspError::numerical)?;
    if inverse.iter().any(|v| !v.is_finite()) {
        return Err(GspError::numerical("pseudoinverse has non-finite entries"));
    }

    Ok(PseudoInverse {
        matrix: inverse,
        rank,
        cutoff,
    })
}
