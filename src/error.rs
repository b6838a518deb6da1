use thiserror::Error;

/// Failures surfaced by the propagation pipeline.
///
/// Both kinds are terminal: the computation is deterministic, so retrying with
/// identical input reproduces the same failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GspError {
    /// Rejected before any matrix work (bad lengths, bandwidth, seeds, config).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// SVD did not converge or a matrix carried non-finite values.
    #[error("numerical error: {0}")]
    Numerical(String),
}

impl GspError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn numerical(message: impl Into<String>) -> Self {
        Self::Numerical(message.into())
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }

    pub fn is_numerical(&self) -> bool {
        matches!(self, Self::Numerical(_))
    }
}

pub type GspResult<T> = Result<T, GspError>;
