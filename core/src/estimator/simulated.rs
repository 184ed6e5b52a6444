//! Seeded phase-estimation sampler.
//!
//! The oracle value is mapped onto a phase `f / 2M` modulo one and each shot is
//! drawn from the textbook phase-estimation readout distribution over a
//! `p + 1` bit register:
//!
//! `P(k) = sin^2(pi N d) / (N^2 sin^2(pi d))`, `d = phase - k / N`, `N = 2^(p+1)`.
//!
//! When the phase is exactly representable the readout is deterministic;
//! otherwise the two neighbouring codes share most of the mass and the mode
//! recovers the nearest one. Values outside `[-M, M)` wrap around, like a
//! physical phase register would.

use std::f64::consts::PI;

use rand::{rngs::StdRng, Rng, SeedableRng};

use super::{EstimationError, EstimationRequest, EstimatorBackend, Result};
use crate::fixed_point::FixedPointFormat;

/// Widest register the sampler will tabulate (2^17 outcomes).
pub const SIMULATED_MAX_PRECISION: u32 = 16;

pub struct SimulatedPhaseBackend {
    seed: u64,
    rng: StdRng,
}

impl SimulatedPhaseBackend {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl EstimatorBackend for SimulatedPhaseBackend {
    fn name(&self) -> &str {
        "simulated-phase"
    }

    fn sample(&mut self, request: &EstimationRequest) -> Result<Vec<i64>> {
        let format = request.format();
        if format.precision() > SIMULATED_MAX_PRECISION {
            return Err(EstimationError::PrecisionOutOfRange {
                precision: format.precision(),
                max: SIMULATED_MAX_PRECISION,
            });
        }

        let mut cumulative = outcome_distribution(format, request.oracle_value());
        let mut total = 0.0;
        for p in cumulative.iter_mut() {
            total += *p;
            *p = total;
        }

        let last = cumulative.len() - 1;
        let mut codes = Vec::with_capacity(request.shots());
        for _ in 0..request.shots() {
            let draw = self.rng.gen::<f64>() * total;
            let register = cumulative.partition_point(|&c| c <= draw).min(last);
            codes.push(format.signed_from_register(register as u64));
        }
        Ok(codes)
    }
}

/// Readout probabilities indexed by unsigned register value.
pub fn outcome_distribution(format: &FixedPointFormat, oracle_value: f64) -> Vec<f64> {
    let n = format.code_count() as f64;
    let phase = (oracle_value / (2.0 * format.magnitude_bound())).rem_euclid(1.0);

    (0..format.code_count())
        .map(|k| {
            let offset = phase - k as f64 / n;
            let denom = (PI * offset).sin();
            if denom.abs() < 1e-12 {
                1.0
            } else {
                let ratio = (PI * n * offset).sin() / (n * denom);
                ratio * ratio
            }
        })
        .collect()
}
