use serde::{Deserialize, Serialize};

use crate::runner::ResultTable;

/// Error statistics of one precision level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrecisionSummary {
    pub precision: u32,
    /// Fixed-point resolution `M / 2^p` at this precision.
    pub resolution: f64,
    pub points: usize,
    pub failures: usize,
    pub mean_absolute_error: Option<f64>,
    pub max_absolute_error: Option<f64>,
}

/// Summaries per precision level, in sweep order.
pub fn summarize(table: &ResultTable, magnitude_bound: f64) -> Vec<PrecisionSummary> {
    table
        .precision_blocks()
        .into_iter()
        .map(|block| {
            let errors: Vec<f64> = block.entries.iter().filter_map(|(_, e)| *e).collect();
            let mean = if errors.is_empty() {
                None
            } else {
                Some(errors.iter().sum::<f64>() / errors.len() as f64)
            };
            let max = errors.iter().copied().fold(None, |acc: Option<f64>, e| {
                Some(acc.map_or(e, |m| m.max(e)))
            });

            PrecisionSummary {
                precision: block.precision,
                resolution: magnitude_bound / 2f64.powi(block.precision as i32),
                points: block.entries.len(),
                failures: block.entries.len() - errors.len(),
                mean_absolute_error: mean,
                max_absolute_error: max,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{BackendChoice, DomainPoints, ErrorPolicy, SweepConfig},
        estimator::QuantizingBackend,
        potential::PotentialParameters,
        runner::ExperimentRunner,
    };
    use approx::assert_abs_diff_eq;

    #[test]
    fn error_shrinks_with_precision() {
        let config = SweepConfig {
            potential: PotentialParameters {
                spring_constant: 100.0,
                barrier_value: 1000.0,
                domain_shift: 0.5,
            },
            perturbation_magnitude: 0.001,
            measurement_count: 1,
            precision_levels: vec![2, 4, 8],
            domain_points: DomainPoints::Literal(vec![
                0.05, 0.12, 0.21, 0.28, 0.37, 0.44, 0.53, 0.61, 0.68, 0.77, 0.86, 0.93,
            ]),
            error_policy: ErrorPolicy::Abort,
            retry_attempts: 1,
            backend: BackendChoice::Quantizing,
        };
        let runner = ExperimentRunner::from_config(&config).unwrap();
        let bound = runner.magnitude_bound();
        let outcome = runner.run(&mut QuantizingBackend);
        let summary = summarize(&outcome.table, bound);

        assert_eq!(summary.len(), 3);
        assert_abs_diff_eq!(summary[1].resolution, 6.25);
        for level in &summary {
            assert_eq!(level.points, 12);
            assert_eq!(level.failures, 0);
        }
        for pair in summary.windows(2) {
            let (coarse, fine) = (&pair[0], &pair[1]);
            assert!(fine.max_absolute_error.unwrap() <= coarse.resolution / 2.0 + 1e-9);
            assert!(fine.mean_absolute_error.unwrap() <= coarse.mean_absolute_error.unwrap());
        }
    }

    #[test]
    fn all_failed_level_has_no_error_statistics() {
        let config = SweepConfig {
            potential: PotentialParameters {
                spring_constant: 100.0,
                barrier_value: 1000.0,
                domain_shift: 0.5,
            },
            perturbation_magnitude: 0.001,
            measurement_count: 1,
            precision_levels: vec![4],
            domain_points: DomainPoints::Literal(vec![0.3, 0.6]),
            error_policy: ErrorPolicy::Continue,
            retry_attempts: 1,
            backend: BackendChoice::Unconfigured,
        };
        let runner = ExperimentRunner::from_config(&config).unwrap();
        let bound = runner.magnitude_bound();
        let outcome = runner.run(&mut config.backend.build());
        let summary = summarize(&outcome.table, bound);

        assert_eq!(summary[0].failures, 2);
        assert_eq!(summary[0].mean_absolute_error, None);
        assert_eq!(summary[0].max_absolute_error, None);
    }
}
