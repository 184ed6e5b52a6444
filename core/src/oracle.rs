use crate::{error::OracleError, potential::PotentialModel};

/// Central-difference probe of a [`PotentialModel`].
///
/// For points at least `h` away from both walls the result tracks the analytic
/// gradient with `O(h^2)` truncation error. Closer to a wall one of the two
/// probes lands on the barrier and the value is dominated by the jump; that is
/// the expected behavior of the linearization, not something to correct here.
#[derive(Clone, Copy, Debug)]
pub struct FiniteDifferenceOracle {
    model: PotentialModel,
}

impl FiniteDifferenceOracle {
    pub fn new(model: PotentialModel) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &PotentialModel {
        &self.model
    }

    /// `(V(x + h) - V(x - h)) / 2h`
    pub fn evaluate_perturbation(&self, x: f64, h: f64) -> Result<f64, OracleError> {
        if !(h.is_finite() && h > 0.0) {
            return Err(OracleError::InvalidPerturbation(h));
        }
        let forward = self.model.evaluate(x + h);
        let backward = self.model.evaluate(x - h);
        Ok((forward - backward) / (2.0 * h))
    }
}
