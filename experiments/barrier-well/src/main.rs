use std::{
    fmt::Write,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use phasegrad_core::{
    load_or_init, report, save_json, summarize, BackendChoice, DomainPoints, ErrorPolicy,
    ExperimentArgs, ExperimentRunner, Notebook, PotentialParameters, PrecisionSummary,
    ReportSection, SweepConfig, SweepOutcome, SweepPlan, Termination, DEFAULT_REPORT_TEMPLATE,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

const BENCHMARK_TOLERANCE: f64 = 1e-9;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct BenchmarkSnapshot {
    rows: usize,
    summaries: Vec<PrecisionSummary>,
}

struct ExperimentPaths {
    config: PathBuf,
    report: PathBuf,
    results: PathBuf,
    benchmark: PathBuf,
}

fn main() -> Result<()> {
    init_tracing();

    let args = ExperimentArgs::parse_from_env()?;
    if args.help_requested() {
        print_usage();
        return Ok(());
    }
    let mode = args.mode();
    let paths = initialize_paths(args.config().cloned())?;

    let config: SweepConfig = load_or_init(&paths.config, worked_example)?;
    let mut plan = config
        .validate()
        .with_context(|| format!("invalid configuration in {}", paths.config.display()))?;
    plan.truncate_points(mode.point_limit(plan.points().len()));

    let notebook = Notebook::open_or_create(&paths.report, DEFAULT_REPORT_TEMPLATE)?;
    let benchmark = load_benchmark(&paths.benchmark)?;

    info!(mode = mode.label(), evaluations = plan.len(), "running barrier-well sweep");

    let runner = ExperimentRunner::new(plan.clone());
    let magnitude_bound = runner.magnitude_bound();
    let mut backend = config.backend.build();
    let outcome = runner.run(&mut backend);

    save_json(&paths.results, &outcome.table)?;
    let summaries = summarize(&outcome.table, magnitude_bound);
    write_report(&notebook, &config, &plan, magnitude_bound, &outcome, &summaries)?;

    match &outcome.termination {
        Termination::Completed => {}
        Termination::Cancelled { remaining } => {
            bail!("sweep cancelled with {remaining} evaluations outstanding");
        }
        Termination::Aborted {
            precision,
            point,
            error,
        } => {
            return Err(anyhow::Error::new(error.clone())
                .context(format!("sweep aborted at precision {precision}, x = {point:.6}")));
        }
    }

    if mode.checks_benchmark() {
        let snapshot = BenchmarkSnapshot {
            rows: outcome.table.len(),
            summaries,
        };
        if let Some(reference) = benchmark {
            validate_benchmark(&snapshot, &reference)?;
            println!("benchmark check passed (tolerance {:.1e})", BENCHMARK_TOLERANCE);
        } else {
            save_json(&paths.benchmark, &snapshot)?;
            println!("saved new benchmark snapshot to {}", paths.benchmark.display());
        }
    } else {
        print!("{}", render_summary_lines(&summaries));
        if benchmark.is_none() {
            println!("no benchmark snapshot recorded yet; run with --mode test to capture one.");
        }
    }

    println!("results written to {}", paths.results.display());
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn print_usage() {
    println!(
        "Usage: cargo run -p phasegrad-experiment-barrier-well -- [--mode full|test] [--config <path>]"
    );
}

/// Parameters of the worked example: k = 100, B = 1000, c = 0.5, h = 0.001, 50 shots.
fn worked_example() -> SweepConfig {
    SweepConfig {
        potential: PotentialParameters {
            spring_constant: 100.0,
            barrier_value: 1000.0,
            domain_shift: 0.5,
        },
        perturbation_magnitude: 0.001,
        measurement_count: 50,
        precision_levels: vec![4, 10],
        domain_points: DomainPoints::Seeded {
            seed: 1337,
            count: 8,
        },
        error_policy: ErrorPolicy::Abort,
        retry_attempts: 3,
        backend: BackendChoice::Simulated { seed: 1337 },
    }
}

fn initialize_paths(config_override: Option<PathBuf>) -> Result<ExperimentPaths> {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("runs/barrier_well");
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create experiment directory {}", dir.display()))?;

    Ok(ExperimentPaths {
        config: config_override.unwrap_or_else(|| dir.join("config.json")),
        report: dir.join("report.md"),
        results: dir.join("results.json"),
        benchmark: dir.join("benchmark.json"),
    })
}

fn write_report(
    notebook: &Notebook,
    config: &SweepConfig,
    plan: &SweepPlan,
    magnitude_bound: f64,
    outcome: &SweepOutcome,
    summaries: &[PrecisionSummary],
) -> Result<()> {
    let sections = [
        ReportSection::new(
            "configuration",
            render_configuration_section(config, plan, magnitude_bound),
        ),
        ReportSection::new("error-scaling", report::render_error_scaling(summaries)),
        ReportSection::new(
            "precision-blocks",
            report::render_precision_blocks(&outcome.table.precision_blocks()),
        ),
        ReportSection::new("failures", report::render_failures(&outcome.table)),
    ];

    notebook.update(&sections)
}

fn render_configuration_section(
    config: &SweepConfig,
    plan: &SweepPlan,
    magnitude_bound: f64,
) -> String {
    let p = &config.potential;
    let mut output = String::new();
    let _ = writeln!(
        &mut output,
        "- Spring constant k: {}\n- Barrier value B: {}\n- Domain shift c: {}",
        p.spring_constant, p.barrier_value, p.domain_shift
    );
    let _ = writeln!(
        &mut output,
        "- Perturbation h: {}\n- Shots per estimate: {}\n- Magnitude bound M: {}",
        plan.perturbation(),
        plan.shots(),
        magnitude_bound
    );
    let _ = writeln!(
        &mut output,
        "- Precision levels: {:?}\n- Domain points: {}\n- Error policy: {:?}\n- Retry attempts: {}\n- Backend: {:?}",
        plan.precisions(),
        plan.points().len(),
        plan.policy(),
        plan.retry().max_attempts(),
        config.backend
    );
    output
}

fn render_summary_lines(summaries: &[PrecisionSummary]) -> String {
    let mut output = String::new();
    for summary in summaries {
        let _ = writeln!(
            &mut output,
            "precision {:>2}: resolution {:.6}, mean abs error {}, max abs error {}, failures {}",
            summary.precision,
            summary.resolution,
            summary
                .mean_absolute_error
                .map_or_else(|| "n/a".to_string(), |v| format!("{v:.6}")),
            summary
                .max_absolute_error
                .map_or_else(|| "n/a".to_string(), |v| format!("{v:.6}")),
            summary.failures
        );
    }
    output
}

fn load_benchmark(path: &Path) -> Result<Option<BenchmarkSnapshot>> {
    if path.exists() {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read benchmark from {}", path.display()))?;
        let snapshot = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse benchmark at {}", path.display()))?;
        Ok(Some(snapshot))
    } else {
        Ok(None)
    }
}

fn validate_benchmark(actual: &BenchmarkSnapshot, reference: &BenchmarkSnapshot) -> Result<()> {
    if actual.rows != reference.rows {
        bail!(
            "row count changed (actual {} vs expected {}); update benchmark if this is intentional",
            actual.rows,
            reference.rows
        );
    }
    if actual.summaries.len() != reference.summaries.len() {
        bail!("precision levels changed between runs; update benchmark if this is intentional");
    }

    for (actual, reference) in actual.summaries.iter().zip(&reference.summaries) {
        if actual.precision != reference.precision || actual.failures != reference.failures {
            return Err(anyhow!(
                "precision {} summary shape deviated from benchmark (precision {}, failures {} vs {})",
                actual.precision,
                reference.precision,
                actual.failures,
                reference.failures
            ));
        }
        let label = format!("precision {}", actual.precision);
        ensure_close(
            actual.mean_absolute_error,
            reference.mean_absolute_error,
            &format!("{label} mean abs error"),
        )?;
        ensure_close(
            actual.max_absolute_error,
            reference.max_absolute_error,
            &format!("{label} max abs error"),
        )?;
    }

    Ok(())
}

fn ensure_close(actual: Option<f64>, expected: Option<f64>, label: &str) -> Result<()> {
    match (actual, expected) {
        (Some(actual), Some(expected)) if (actual - expected).abs() <= BENCHMARK_TOLERANCE => Ok(()),
        (None, None) => Ok(()),
        (actual, expected) => Err(anyhow!(
            "{} deviated from benchmark (actual {:?} vs expected {:?}, tol {:.1e})",
            label,
            actual,
            expected,
            BENCHMARK_TOLERANCE
        )),
    }
}
