//! Error type shared by the sampler, the target density and the configuration.

use thiserror::Error;

/// Errors raised before a run starts.
///
/// A proposal covariance that fails to factorize during a run is not an error: the
/// sampler carries the previous state forward for that iteration and continues.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SamplerError {
    /// Shapes, counts or configuration values that violate a precondition.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The target covariance has no lower Cholesky factor.
    #[error("numerical error: {0}")]
    NumericalError(String),
}

impl SamplerError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        SamplerError::InvalidArgument(msg.into())
    }
}
