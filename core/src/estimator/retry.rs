use tracing::warn;

use super::{EstimationError, Result};
use crate::error::ConfigError;

/// Bounded retry of transient backend failures. No backoff.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> std::result::Result<Self, ConfigError> {
        if max_attempts == 0 {
            return Err(ConfigError::invalid(
                "retry_attempts",
                "at least one attempt is required",
            ));
        }
        Ok(Self { max_attempts })
    }

    pub fn no_retry() -> Self {
        Self { max_attempts: 1 }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Call `op` with the 1-based attempt number until it succeeds, fails with
    /// a non-transient error, or the attempt budget is spent. A spent budget
    /// escalates to [`EstimationError::SamplerUnavailable`].
    pub fn run<T, F>(&self, backend: &str, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Result<T>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Err(err) if err.is_transient() => {
                    if !self.should_retry(attempt) {
                        return Err(EstimationError::SamplerUnavailable(format!(
                            "{backend} still failing after {attempt} attempt(s): {err}"
                        )));
                    }
                    warn!(backend, attempt, error = %err, "retrying estimator call");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_attempts_is_a_config_error() {
        assert_eq!(RetryPolicy::new(0).unwrap_err().field(), "retry_attempts");
    }

    #[test]
    fn transient_failures_are_retried_until_success() {
        let policy = RetryPolicy::new(3).unwrap();
        let mut calls = 0;
        let value = policy
            .run("flaky", |attempt| {
                calls += 1;
                if attempt < 3 {
                    Err(EstimationError::Transient("dropped".into()))
                } else {
                    Ok(attempt)
                }
            })
            .unwrap();
        assert_eq!(value, 3);
        assert_eq!(calls, 3);
    }

    #[test]
    fn exhausted_retries_escalate() {
        let policy = RetryPolicy::new(2).unwrap();
        let mut calls = 0;
        let err = policy
            .run::<(), _>("flaky", |_| {
                calls += 1;
                Err(EstimationError::Transient("dropped".into()))
            })
            .unwrap_err();
        assert_eq!(calls, 2);
        match err {
            EstimationError::SamplerUnavailable(msg) => {
                assert!(msg.contains("2 attempt(s)"));
                assert!(msg.contains("dropped"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn contract_violations_are_not_retried() {
        let policy = RetryPolicy::new(5).unwrap();
        let mut calls = 0;
        let err = policy
            .run::<(), _>("strict", |_| {
                calls += 1;
                Err(EstimationError::EstimationDivergence {
                    estimate: 1.0,
                    magnitude_bound: 0.5,
                })
            })
            .unwrap_err();
        assert_eq!(calls, 1);
        assert!(matches!(err, EstimationError::EstimationDivergence { .. }));
    }
}
