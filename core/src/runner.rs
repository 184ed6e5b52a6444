//! Sweep orchestration.
//!
//! For each precision level (outer loop) and each domain point (inner loop)
//! the runner queries the finite-difference oracle, asks the backend for an
//! estimate, scores it against the analytic gradient, and appends one row to
//! its result table. Calls are strictly sequential and rows appear in exactly
//! that order.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::{
    config::{ErrorPolicy, SweepConfig, SweepPlan},
    error::ConfigError,
    estimator::{self, EstimationError, EstimationRequest, EstimatorBackend, FailureKind},
    oracle::FiniteDifferenceOracle,
};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradientEstimateRecord {
    pub point: f64,
    pub precision: u32,
    pub estimate: f64,
    pub analytic_gradient: f64,
    pub absolute_error: f64,
}

/// A point whose estimate could not be produced. Carries no numeric estimate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FailedEstimate {
    pub point: f64,
    pub precision: u32,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SweepRow {
    Estimated(GradientEstimateRecord),
    Failed(FailedEstimate),
}

impl SweepRow {
    pub fn point(&self) -> f64 {
        match self {
            Self::Estimated(record) => record.point,
            Self::Failed(failure) => failure.point,
        }
    }

    pub fn precision(&self) -> u32 {
        match self {
            Self::Estimated(record) => record.precision,
            Self::Failed(failure) => failure.precision,
        }
    }

    pub fn absolute_error(&self) -> Option<f64> {
        match self {
            Self::Estimated(record) => Some(record.absolute_error),
            Self::Failed(_) => None,
        }
    }
}

/// `(x, absolute_error)` pairs of one precision level, in sweep order.
/// Failed points have no error value.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PrecisionBlock {
    pub precision: u32,
    pub entries: Vec<(f64, Option<f64>)>,
}

/// Append-only, ordered table of sweep rows. Only the runner appends.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultTable {
    rows: Vec<SweepRow>,
}

impl ResultTable {
    fn push(&mut self, row: SweepRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[SweepRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &GradientEstimateRecord> {
        self.rows.iter().filter_map(|row| match row {
            SweepRow::Estimated(record) => Some(record),
            SweepRow::Failed(_) => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &FailedEstimate> {
        self.rows.iter().filter_map(|row| match row {
            SweepRow::Failed(failure) => Some(failure),
            SweepRow::Estimated(_) => None,
        })
    }

    /// Rows grouped by precision, blocks in first-seen order.
    pub fn precision_blocks(&self) -> Vec<PrecisionBlock> {
        let mut blocks: Vec<PrecisionBlock> = Vec::new();
        for row in &self.rows {
            let entry = (row.point(), row.absolute_error());
            match blocks.iter_mut().find(|b| b.precision == row.precision()) {
                Some(block) => block.entries.push(entry),
                None => blocks.push(PrecisionBlock {
                    precision: row.precision(),
                    entries: vec![entry],
                }),
            }
        }
        blocks
    }
}

/// Shared flag checked between points. Cloning shares the flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Termination {
    Completed,
    /// Stopped between points; `remaining` evaluations never started.
    Cancelled { remaining: usize },
    /// Stopped by the abort policy at the failing evaluation.
    Aborted {
        precision: u32,
        point: f64,
        error: EstimationError,
    },
}

#[derive(Clone, Debug)]
pub struct SweepOutcome {
    pub table: ResultTable,
    pub termination: Termination,
}

impl SweepOutcome {
    pub fn is_complete(&self) -> bool {
        self.termination == Termination::Completed
    }
}

pub struct ExperimentRunner {
    plan: SweepPlan,
    oracle: FiniteDifferenceOracle,
    magnitude_bound: f64,
    cancel: CancelToken,
}

impl ExperimentRunner {
    pub fn new(plan: SweepPlan) -> Self {
        let model = *plan.model();
        Self {
            oracle: FiniteDifferenceOracle::new(model),
            magnitude_bound: model.magnitude_bound(),
            plan,
            cancel: CancelToken::new(),
        }
    }

    /// Validate `config` before any sampling happens.
    pub fn from_config(config: &SweepConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.validate()?))
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn plan(&self) -> &SweepPlan {
        &self.plan
    }

    pub fn magnitude_bound(&self) -> f64 {
        self.magnitude_bound
    }

    /// Run the whole sweep against `backend`.
    pub fn run<B: EstimatorBackend + ?Sized>(self, backend: &mut B) -> SweepOutcome {
        let total = self.plan.len();
        info!(
            backend = backend.name(),
            precisions = ?self.plan.precisions(),
            points = self.plan.points().len(),
            shots = self.plan.shots(),
            policy = ?self.plan.policy(),
            "starting gradient sweep"
        );

        let mut table = ResultTable::default();
        for &precision in self.plan.precisions() {
            for &point in self.plan.points() {
                if self.cancel.is_cancelled() {
                    let remaining = total - table.len();
                    warn!(remaining, "sweep cancelled");
                    return SweepOutcome {
                        table,
                        termination: Termination::Cancelled { remaining },
                    };
                }

                match self.evaluate(backend, precision, point) {
                    Ok(record) => {
                        debug!(
                            precision,
                            point,
                            estimate = record.estimate,
                            error = record.absolute_error,
                            "estimated gradient"
                        );
                        table.push(SweepRow::Estimated(record));
                    }
                    Err(err) => match self.plan.policy() {
                        ErrorPolicy::Abort => {
                            error!(precision, point, error = %err, "aborting sweep");
                            return SweepOutcome {
                                table,
                                termination: Termination::Aborted {
                                    precision,
                                    point,
                                    error: err,
                                },
                            };
                        }
                        ErrorPolicy::Continue => {
                            warn!(precision, point, error = %err, "estimate failed, continuing");
                            table.push(SweepRow::Failed(FailedEstimate {
                                point,
                                precision,
                                kind: err.kind(),
                                message: err.to_string(),
                            }));
                        }
                    },
                }
            }
        }

        info!(
            rows = table.len(),
            failures = table.failures().count(),
            "gradient sweep complete"
        );
        SweepOutcome {
            table,
            termination: Termination::Completed,
        }
    }

    /// Estimate the gradient at one point for one precision level.
    pub fn evaluate<B: EstimatorBackend + ?Sized>(
        &self,
        backend: &mut B,
        precision: u32,
        point: f64,
    ) -> Result<GradientEstimateRecord, EstimationError> {
        // The plan was validated, so h > 0 and this cannot fail for a valid plan.
        let oracle_value = self
            .oracle
            .evaluate_perturbation(point, self.plan.perturbation())
            .map_err(|err| EstimationError::InvalidRequest(err.to_string()))?;
        let request = EstimationRequest::new(
            oracle_value,
            precision,
            self.magnitude_bound,
            self.plan.shots(),
        )?;
        let result = estimator::estimate(backend, &request, self.plan.retry())?;

        let analytic_gradient = self.oracle.model().analytic_gradient(point);
        Ok(GradientEstimateRecord {
            point,
            precision,
            estimate: result.estimate,
            analytic_gradient,
            absolute_error: (result.estimate - analytic_gradient).abs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{BackendChoice, DomainPoints},
        estimator::{QuantizingBackend, ScriptedBackend},
        potential::PotentialParameters,
    };
    use approx::assert_abs_diff_eq;

    fn config(points: Vec<f64>, precisions: Vec<u32>, policy: ErrorPolicy) -> SweepConfig {
        SweepConfig {
            potential: PotentialParameters {
                spring_constant: 100.0,
                barrier_value: 1000.0,
                domain_shift: 0.5,
            },
            perturbation_magnitude: 0.001,
            measurement_count: 5,
            precision_levels: precisions,
            domain_points: DomainPoints::Literal(points),
            error_policy: policy,
            retry_attempts: 1,
            backend: BackendChoice::Quantizing,
        }
    }

    /// Delegates to an inner backend and trips a cancel token after `limit` calls.
    struct CancelAfter<B> {
        inner: B,
        limit: usize,
        calls: usize,
        token: CancelToken,
    }

    impl<B: EstimatorBackend> EstimatorBackend for CancelAfter<B> {
        fn name(&self) -> &str {
            "cancel-after"
        }

        fn sample(&mut self, request: &EstimationRequest) -> estimator::Result<Vec<i64>> {
            self.calls += 1;
            if self.calls == self.limit {
                self.token.cancel();
            }
            self.inner.sample(request)
        }
    }

    #[test]
    fn invalid_config_is_rejected_before_sampling() {
        let mut bad = config(vec![0.2], vec![4], ErrorPolicy::Abort);
        bad.potential.spring_constant = -5.0;
        let err = ExperimentRunner::from_config(&bad).err().unwrap();
        assert_eq!(err.field(), "spring_constant");
    }

    #[test]
    fn zero_perturbation_never_reaches_the_backend() {
        let mut bad = config(vec![0.2, 0.4], vec![4], ErrorPolicy::Continue);
        bad.perturbation_magnitude = 0.0;
        let err = ExperimentRunner::from_config(&bad).err().unwrap();
        assert_eq!(err.field(), "perturbation_magnitude");

        let err = bad.validate().unwrap_err();
        assert_eq!(err.field(), "perturbation_magnitude");
    }

    #[test]
    fn rows_follow_precision_then_point_order() {
        let points = vec![0.1, 0.3, 0.6, 0.9];
        let runner =
            ExperimentRunner::from_config(&config(points.clone(), vec![4, 10], ErrorPolicy::Abort))
                .unwrap();
        let outcome = runner.run(&mut QuantizingBackend);
        assert!(outcome.is_complete());

        let order: Vec<(u32, f64)> = outcome
            .table
            .rows()
            .iter()
            .map(|row| (row.precision(), row.point()))
            .collect();
        let expected: Vec<(u32, f64)> = [4, 10]
            .iter()
            .flat_map(|&p| points.iter().map(move |&x| (p, x)))
            .collect();
        assert_eq!(order, expected);
    }

    #[test]
    fn record_scores_against_analytic_gradient() {
        let runner =
            ExperimentRunner::from_config(&config(vec![0.7], vec![4], ErrorPolicy::Abort)).unwrap();
        let record = runner.evaluate(&mut QuantizingBackend, 4, 0.7).unwrap();
        // 20 / 6.25 = 3.2 -> code 3 -> 18.75
        assert_abs_diff_eq!(record.estimate, 18.75);
        assert_abs_diff_eq!(record.analytic_gradient, 20.0, epsilon = 1e-9);
        assert_abs_diff_eq!(record.absolute_error, 1.25, epsilon = 1e-9);
    }

    #[test]
    fn abort_policy_stops_at_first_failure() {
        let runner =
            ExperimentRunner::from_config(&config(vec![0.2, 0.4, 0.6], vec![4], ErrorPolicy::Abort))
                .unwrap();
        let mut backend = ScriptedBackend::from_responses([
            Ok(vec![1; 5]),
            Err(EstimationError::SamplerUnavailable("link down".into())),
            Ok(vec![1; 5]),
        ]);
        let outcome = runner.run(&mut backend);

        assert_eq!(outcome.table.len(), 1);
        match outcome.termination {
            Termination::Aborted {
                precision,
                point,
                error,
            } => {
                assert_eq!(precision, 4);
                assert_abs_diff_eq!(point, 0.4);
                assert_eq!(error.kind(), FailureKind::SamplerUnavailable);
            }
            other => panic!("unexpected termination {other:?}"),
        }
        assert_eq!(backend.calls(), 2);
    }

    #[test]
    fn continue_policy_records_failures_without_values() {
        let runner = ExperimentRunner::from_config(&config(
            vec![0.2, 0.4, 0.6],
            vec![4],
            ErrorPolicy::Continue,
        ))
        .unwrap();
        let mut backend = ScriptedBackend::from_responses([
            Ok(vec![1; 5]),
            Ok(vec![99; 5]),
            Ok(vec![-2; 5]),
        ]);
        let outcome = runner.run(&mut backend);

        assert!(outcome.is_complete());
        assert_eq!(outcome.table.len(), 3);
        assert_eq!(outcome.table.records().count(), 2);

        let failure = outcome.table.failures().next().unwrap();
        assert_abs_diff_eq!(failure.point, 0.4);
        assert_eq!(failure.kind, FailureKind::EstimationDivergence);
        assert_eq!(outcome.table.rows()[1].absolute_error(), None);
    }

    #[test]
    fn cancellation_leaves_only_complete_rows() {
        let runner =
            ExperimentRunner::from_config(&config(vec![0.2, 0.4, 0.6], vec![4, 8], ErrorPolicy::Abort))
                .unwrap();
        let token = runner.cancel_token();
        let mut backend = CancelAfter {
            inner: QuantizingBackend,
            limit: 2,
            calls: 0,
            token,
        };
        let outcome = runner.run(&mut backend);

        assert_eq!(outcome.table.len(), 2);
        assert!(outcome
            .table
            .rows()
            .iter()
            .all(|row| matches!(row, SweepRow::Estimated(_))));
        assert_eq!(outcome.termination, Termination::Cancelled { remaining: 4 });
    }

    #[test]
    fn unconfigured_backend_fails_every_point_under_continue() {
        let config = SweepConfig {
            backend: BackendChoice::Unconfigured,
            ..config(vec![0.2, 0.4], vec![4], ErrorPolicy::Continue)
        };
        let runner = ExperimentRunner::from_config(&config).unwrap();
        let mut backend = config.backend.build();
        let outcome = runner.run(&mut backend);

        assert_eq!(outcome.table.failures().count(), 2);
        assert!(outcome
            .table
            .failures()
            .all(|f| f.kind == FailureKind::SamplerUnavailable));
    }

    #[test]
    fn precision_blocks_group_in_sweep_order() {
        let runner = ExperimentRunner::from_config(&config(
            vec![0.25, 0.75],
            vec![10, 4],
            ErrorPolicy::Abort,
        ))
        .unwrap();
        let outcome = runner.run(&mut QuantizingBackend);
        let blocks = outcome.table.precision_blocks();

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].precision, 10);
        assert_eq!(blocks[1].precision, 4);
        assert_eq!(blocks[1].entries.len(), 2);
        assert_abs_diff_eq!(blocks[1].entries[0].0, 0.25);
    }

    #[test]
    fn table_serializes_with_status_tags() {
        let mut table = ResultTable::default();
        table.push(SweepRow::Failed(FailedEstimate {
            point: 0.5,
            precision: 4,
            kind: FailureKind::SamplerUnavailable,
            message: "offline".into(),
        }));
        let json = serde_json::to_string(&table).unwrap();
        assert!(json.starts_with('['));
        assert!(json.contains("\"status\":\"failed\""));
        assert!(json.contains("\"sampler_unavailable\""));
        assert!(!json.contains("estimate\""));
    }
}
