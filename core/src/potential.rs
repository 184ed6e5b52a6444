use serde::{Deserialize, Serialize};

/// Shape of the barrier well: a quadratic bowl on `[0, 1)` walled off by a
/// constant barrier on either side.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PotentialParameters {
    pub spring_constant: f64,
    pub barrier_value: f64,
    pub domain_shift: f64,
}

/// Piecewise potential `V(x)` with its closed-form derivative.
///
/// The barrier makes `V` discontinuous at `x = 0` and `x = 1`. Finite
/// differences taken across either edge pick up the jump; callers that probe
/// near the walls see barrier-dominated values.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PotentialModel {
    params: PotentialParameters,
}

impl PotentialModel {
    pub fn new(params: PotentialParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &PotentialParameters {
        &self.params
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        if outside_domain(x) {
            self.params.barrier_value
        } else {
            let offset = x - self.params.domain_shift;
            0.5 * self.params.spring_constant * offset * offset
        }
    }

    /// Ground-truth derivative, used only to score estimates.
    pub fn analytic_gradient(&self, x: f64) -> f64 {
        if x < 0.0 {
            -self.params.barrier_value
        } else if x >= 1.0 {
            self.params.barrier_value
        } else {
            self.params.spring_constant * (x - self.params.domain_shift)
        }
    }

    /// Order-of-magnitude ceiling `10^floor(log10 k)` on the interior gradient.
    pub fn magnitude_bound(&self) -> f64 {
        10f64.powf(self.params.spring_constant.log10().floor())
    }
}

fn outside_domain(x: f64) -> bool {
    !(0.0..1.0).contains(&x)
}
