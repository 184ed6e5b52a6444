use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::info;

use crate::{
    error::ConfigError,
    estimator::{
        EstimatorBackend, QuantizingBackend, RetryPolicy, SimulatedPhaseBackend,
        UnconfiguredBackend,
    },
    fixed_point::MAX_PRECISION,
    potential::{PotentialModel, PotentialParameters},
    rng::sample_domain_points,
};

/// Load a JSON configuration from disk, creating it with the provided initializer if missing.
pub fn load_or_init<T, F>(path: &Path, initializer: F) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> T,
{
    if path.exists() {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse config from {}", path.display()))
    } else {
        let value = initializer();
        save_json(path, &value)?;
        info!(path = %path.display(), "wrote initial configuration");
        Ok(value)
    }
}

/// Pretty-print `value` as JSON at `path`, creating parent directories.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let serialized = serde_json::to_string_pretty(value)?;
    fs::write(path, serialized)
        .with_context(|| format!("failed to write {}", path.display()))
}

/// What to do when a single (precision, point) estimate fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Stop the sweep at the first failure.
    Abort,
    /// Record the failure in the result table and move on.
    Continue,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainPoints {
    Literal(Vec<f64>),
    Seeded { seed: u64, count: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendChoice {
    Simulated { seed: u64 },
    Quantizing,
    Unconfigured,
}

impl BackendChoice {
    pub fn build(&self) -> Box<dyn EstimatorBackend> {
        match *self {
            Self::Simulated { seed } => Box::new(SimulatedPhaseBackend::new(seed)),
            Self::Quantizing => Box::new(QuantizingBackend),
            Self::Unconfigured => Box::new(UnconfiguredBackend),
        }
    }
}

/// On-disk sweep configuration. Every field is required.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepConfig {
    pub potential: PotentialParameters,
    pub perturbation_magnitude: f64,
    pub measurement_count: usize,
    pub precision_levels: Vec<u32>,
    pub domain_points: DomainPoints,
    pub error_policy: ErrorPolicy,
    pub retry_attempts: u32,
    pub backend: BackendChoice,
}

/// A validated sweep with domain points resolved.
///
/// Only [`SweepConfig::validate`] builds one, so a plan in hand always has a
/// positive perturbation, non-empty precision levels and in-domain points.
#[derive(Clone, Debug, PartialEq)]
pub struct SweepPlan {
    model: PotentialModel,
    perturbation: f64,
    shots: usize,
    precisions: Vec<u32>,
    points: Vec<f64>,
    policy: ErrorPolicy,
    retry: RetryPolicy,
}

impl SweepPlan {
    pub fn model(&self) -> &PotentialModel {
        &self.model
    }

    pub fn perturbation(&self) -> f64 {
        self.perturbation
    }

    pub fn shots(&self) -> usize {
        self.shots
    }

    pub fn precisions(&self) -> &[u32] {
        &self.precisions
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Keep only the first `limit` domain points. A limit of zero leaves an
    /// empty plan.
    pub fn truncate_points(&mut self, limit: usize) {
        self.points.truncate(limit);
    }

    pub fn len(&self) -> usize {
        self.precisions.len() * self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SweepConfig {
    /// Check every field and resolve domain points. Nothing is sampled if this
    /// fails.
    pub fn validate(&self) -> Result<SweepPlan, ConfigError> {
        let p = &self.potential;
        require_positive("spring_constant", p.spring_constant)?;
        require_positive("barrier_value", p.barrier_value)?;
        if !(p.domain_shift > 0.0 && p.domain_shift < 1.0) {
            return Err(ConfigError::invalid(
                "domain_shift",
                format!("must lie in (0, 1), got {}", p.domain_shift),
            ));
        }
        require_positive("perturbation_magnitude", self.perturbation_magnitude)?;
        if self.measurement_count == 0 {
            return Err(ConfigError::invalid(
                "measurement_count",
                "at least one shot is required",
            ));
        }

        if self.precision_levels.is_empty() {
            return Err(ConfigError::Empty {
                field: "precision_levels",
            });
        }
        if let Some(&bad) = self
            .precision_levels
            .iter()
            .find(|&&level| level == 0 || level > MAX_PRECISION)
        {
            return Err(ConfigError::invalid(
                "precision_levels",
                format!("{bad} outside 1..={MAX_PRECISION}"),
            ));
        }

        let points = self.resolve_points()?;
        let retry = RetryPolicy::new(self.retry_attempts)?;

        Ok(SweepPlan {
            model: PotentialModel::new(self.potential),
            perturbation: self.perturbation_magnitude,
            shots: self.measurement_count,
            precisions: self.precision_levels.clone(),
            points,
            policy: self.error_policy,
            retry,
        })
    }

    fn resolve_points(&self) -> Result<Vec<f64>, ConfigError> {
        let points = match &self.domain_points {
            DomainPoints::Literal(values) => values.clone(),
            DomainPoints::Seeded { seed, count } => sample_domain_points(*seed, *count),
        };
        if points.is_empty() {
            return Err(ConfigError::Empty {
                field: "domain_points",
            });
        }
        if let Some(&bad) = points.iter().find(|x| !(0.0..1.0).contains(*x)) {
            return Err(ConfigError::invalid(
                "domain_points",
                format!("{bad} outside [0, 1)"),
            ));
        }
        Ok(points)
    }
}

fn require_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            format!("must be positive and finite, got {value}"),
        ))
    }
}
