pub mod config;
pub mod error;
pub mod estimator;
pub mod experiment;
pub mod fixed_point;
pub mod metrics;
pub mod oracle;
pub mod potential;
pub mod report;
pub mod rng;
pub mod runner;

pub use config::{
    load_or_init, save_json, BackendChoice, DomainPoints, ErrorPolicy, SweepConfig, SweepPlan,
};
pub use error::{ConfigError, OracleError};
pub use estimator::{
    estimate, EstimationError, EstimationRequest, EstimationResult, EstimatorBackend, FailureKind,
    QuantizingBackend, RetryPolicy, ScriptedBackend, SimulatedPhaseBackend, UnconfiguredBackend,
};
pub use experiment::{ExperimentArgs, ExperimentMode, TEST_POINT_LIMIT};
pub use fixed_point::FixedPointFormat;
pub use metrics::{summarize, PrecisionSummary};
pub use oracle::FiniteDifferenceOracle;
pub use potential::{PotentialModel, PotentialParameters};
pub use report::{Notebook, ReportSection, DEFAULT_REPORT_TEMPLATE};
pub use rng::{sample_domain_points, seeded_rng};
pub use runner::{
    CancelToken, ExperimentRunner, FailedEstimate, GradientEstimateRecord, ResultTable,
    SweepOutcome, SweepRow, Termination,
};
