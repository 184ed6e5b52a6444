//! Deterministic backends: a scripted test double and a nearest-code quantizer.

use std::collections::VecDeque;

use super::{EstimationError, EstimationRequest, EstimatorBackend, Result};

enum Script {
    /// Every shot of every call returns this code.
    Fixed(i64),
    /// One response per call, in order.
    Queue(VecDeque<Result<Vec<i64>>>),
}

/// Test double that replays pre-scripted codes instead of sampling.
pub struct ScriptedBackend {
    script: Script,
    calls: usize,
}

impl ScriptedBackend {
    pub fn fixed_code(code: i64) -> Self {
        Self {
            script: Script::Fixed(code),
            calls: 0,
        }
    }

    /// Responses are handed out one per call, in call order; the request
    /// contents do not select the response. Once exhausted the backend reports
    /// itself unavailable.
    pub fn from_responses<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = Result<Vec<i64>>>,
    {
        Self {
            script: Script::Queue(responses.into_iter().collect()),
            calls: 0,
        }
    }

    /// Number of `sample` calls received so far.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl EstimatorBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn sample(&mut self, request: &EstimationRequest) -> Result<Vec<i64>> {
        self.calls += 1;
        match &mut self.script {
            Script::Fixed(code) => Ok(vec![*code; request.shots()]),
            Script::Queue(queue) => queue.pop_front().unwrap_or_else(|| {
                Err(EstimationError::SamplerUnavailable(
                    "scripted responses exhausted".to_string(),
                ))
            }),
        }
    }
}

/// Noise-free substitute: every shot is the nearest code to the oracle value.
#[derive(Clone, Copy, Debug, Default)]
pub struct QuantizingBackend;

impl EstimatorBackend for QuantizingBackend {
    fn name(&self) -> &str {
        "quantizing"
    }

    fn sample(&mut self, request: &EstimationRequest) -> Result<Vec<i64>> {
        let code = request.format().encode(request.oracle_value());
        Ok(vec![code; request.shots()])
    }
}
