//! Precision-bounded estimator contract.
//!
//! A backend turns an oracle value into `n` sampled fixed-point codes. This
//! module owns everything around that single sampling call: request
//! validation, bounded retry of transient failures, mode aggregation, decoding
//! and the `[-M, M)` range check. Backends only produce codes.

mod error;
mod retry;
mod scripted;
mod simulated;

pub use error::{EstimationError, FailureKind};
pub use retry::RetryPolicy;
pub use scripted::{QuantizingBackend, ScriptedBackend};
pub use simulated::{SimulatedPhaseBackend, SIMULATED_MAX_PRECISION};

use crate::fixed_point::{FixedPointFormat, MAX_PRECISION};

/// Result type for estimator operations
pub type Result<T> = std::result::Result<T, EstimationError>;

/// One estimation job. Constructed per (point, precision) pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EstimationRequest {
    oracle_value: f64,
    format: FixedPointFormat,
    shots: usize,
}

impl EstimationRequest {
    pub fn new(
        oracle_value: f64,
        precision: u32,
        magnitude_bound: f64,
        shots: usize,
    ) -> Result<Self> {
        if precision == 0 || precision > MAX_PRECISION {
            return Err(EstimationError::PrecisionOutOfRange {
                precision,
                max: MAX_PRECISION,
            });
        }
        if !(magnitude_bound.is_finite() && magnitude_bound > 0.0) {
            return Err(EstimationError::InvalidRequest(format!(
                "magnitude bound must be positive and finite, got {magnitude_bound}"
            )));
        }
        if shots == 0 {
            return Err(EstimationError::InvalidRequest(
                "at least one shot is required".to_string(),
            ));
        }
        if !oracle_value.is_finite() {
            return Err(EstimationError::InvalidRequest(format!(
                "oracle value must be finite, got {oracle_value}"
            )));
        }

        Ok(Self {
            oracle_value,
            format: FixedPointFormat::new(precision, magnitude_bound),
            shots,
        })
    }

    pub fn oracle_value(&self) -> f64 {
        self.oracle_value
    }

    pub fn precision(&self) -> u32 {
        self.format.precision()
    }

    pub fn magnitude_bound(&self) -> f64 {
        self.format.magnitude_bound()
    }

    pub fn shots(&self) -> usize {
        self.shots
    }

    pub fn format(&self) -> &FixedPointFormat {
        &self.format
    }
}

/// Aggregated outcome of one request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EstimationResult {
    /// Decoded value of the winning code, in `[-M, M)`.
    pub estimate: f64,
    /// Most frequent sampled code.
    pub code: i64,
    /// Number of shots that produced `code`.
    pub votes: usize,
}

/// A source of sampled fixed-point codes.
///
/// `sample` takes `&mut self`: a backend handle carries session state and only
/// one request may be in flight against it at a time.
pub trait EstimatorBackend {
    fn name(&self) -> &str;

    /// Draw `request.shots()` codes for `request.oracle_value()`.
    fn sample(&mut self, request: &EstimationRequest) -> Result<Vec<i64>>;
}

impl<B: EstimatorBackend + ?Sized> EstimatorBackend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn sample(&mut self, request: &EstimationRequest) -> Result<Vec<i64>> {
        (**self).sample(request)
    }
}

/// Stand-in used when no backend has been configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnconfiguredBackend;

impl EstimatorBackend for UnconfiguredBackend {
    fn name(&self) -> &str {
        "unconfigured"
    }

    fn sample(&mut self, _request: &EstimationRequest) -> Result<Vec<i64>> {
        Err(EstimationError::SamplerUnavailable(
            "no estimator backend configured".to_string(),
        ))
    }
}

/// Run one request against `backend` and aggregate the sampled codes.
pub fn estimate<B: EstimatorBackend + ?Sized>(
    backend: &mut B,
    request: &EstimationRequest,
    retry: &RetryPolicy,
) -> Result<EstimationResult> {
    let name = backend.name().to_string();
    let samples = retry.run(&name, |_| backend.sample(request))?;

    if samples.len() != request.shots() {
        return Err(EstimationError::ShotCountMismatch {
            requested: request.shots(),
            returned: samples.len(),
        });
    }

    let (code, votes) = mode(&samples).ok_or(EstimationError::ShotCountMismatch {
        requested: request.shots(),
        returned: 0,
    })?;

    let format = request.format();
    let estimate = format.decode(code);
    let bound = format.magnitude_bound();
    if !format.contains_code(code) || !(-bound..bound).contains(&estimate) {
        return Err(EstimationError::EstimationDivergence {
            estimate,
            magnitude_bound: bound,
        });
    }

    Ok(EstimationResult {
        estimate,
        code,
        votes,
    })
}

/// Most frequent code and its count. Among equally frequent codes the one
/// observed first wins.
pub fn mode(samples: &[i64]) -> Option<(i64, usize)> {
    // (code, count) in first-observed order
    let mut tally: Vec<(i64, usize)> = Vec::new();
    for &code in samples {
        match tally.iter_mut().find(|(seen, _)| *seen == code) {
            Some((_, count)) => *count += 1,
            None => tally.push((code, 1)),
        }
    }

    let mut best: Option<(i64, usize)> = None;
    for (code, count) in tally {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((code, count));
        }
    }
    best
}
