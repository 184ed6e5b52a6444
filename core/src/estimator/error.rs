//! Error types for estimator backends

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while obtaining an estimate from a backend
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimationError {
    /// No backend is reachable and no deterministic substitute was supplied
    #[error("sampler unavailable: {0}")]
    SamplerUnavailable(String),

    /// Requested precision is outside what the format or backend supports
    #[error("precision {precision} outside supported range 1..={max}")]
    PrecisionOutOfRange { precision: u32, max: u32 },

    /// Aggregated estimate fell outside `[-M, M)`
    #[error("estimate {estimate} diverged outside [-{magnitude_bound}, {magnitude_bound})")]
    EstimationDivergence { estimate: f64, magnitude_bound: f64 },

    /// Backend returned a different number of samples than shots requested
    #[error("backend returned {returned} samples for {requested} shots")]
    ShotCountMismatch { requested: usize, returned: usize },

    /// Request fields that no backend could serve
    #[error("invalid estimation request: {0}")]
    InvalidRequest(String),

    /// Communication failure that may succeed on retry
    #[error("transient backend failure: {0}")]
    Transient(String),
}

/// Serializable classification of a per-point failure, kept in result tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    SamplerUnavailable,
    PrecisionOutOfRange,
    EstimationDivergence,
    ShotCountMismatch,
    InvalidRequest,
    Transient,
}

impl EstimationError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::SamplerUnavailable(_) => FailureKind::SamplerUnavailable,
            Self::PrecisionOutOfRange { .. } => FailureKind::PrecisionOutOfRange,
            Self::EstimationDivergence { .. } => FailureKind::EstimationDivergence,
            Self::ShotCountMismatch { .. } => FailureKind::ShotCountMismatch,
            Self::InvalidRequest(_) => FailureKind::InvalidRequest,
            Self::Transient(_) => FailureKind::Transient,
        }
    }
}
