use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};

use crate::{
    metrics::PrecisionSummary,
    runner::{PrecisionBlock, ResultTable},
};

pub const DEFAULT_REPORT_TEMPLATE: &str = r"# Gradient Estimation Notebook

<!-- SECTION:overview start -->
<!-- Describe the potential and what this sweep is meant to show. -->
<!-- SECTION:overview end -->

## Hypotheses

<!-- SECTION:hypotheses start -->
<!-- Expected error scaling with precision, and which points should see barrier contamination. -->
<!-- SECTION:hypotheses end -->

## Configuration

<!-- SECTION:configuration start -->
<!-- Populated automatically with the parameters from the latest run. -->
<!-- SECTION:configuration end -->

## Error Scaling

<!-- SECTION:error-scaling start -->
<!-- Populated automatically with per-precision error summaries. -->
<!-- SECTION:error-scaling end -->

## Per-Precision Errors

<!-- SECTION:precision-blocks start -->
<!-- Populated automatically with (x, absolute error) pairs per precision level. -->
<!-- SECTION:precision-blocks end -->

## Failures

<!-- SECTION:failures start -->
<!-- Populated automatically when the continue policy recorded failed points. -->
<!-- SECTION:failures end -->

> Keep the `<!-- SECTION:name start/end -->` markers around any region that should be rewritten
> by the experiment binary; everything outside them is left alone.
";

#[derive(Clone, Debug)]
pub struct ReportSection {
    id: String,
    content: String,
}

impl ReportSection {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
        }
    }

    fn start_marker(&self) -> String {
        format!("<!-- SECTION:{} start -->", self.id)
    }

    fn end_marker(&self) -> String {
        format!("<!-- SECTION:{} end -->", self.id)
    }

    /// Replace the body between this section's markers in `content`.
    fn splice_into(&self, content: &str) -> Result<String> {
        let start_marker = self.start_marker();
        let end_marker = self.end_marker();

        let start_idx = content
            .find(&start_marker)
            .ok_or_else(|| anyhow!("missing start marker: {}", start_marker))?;
        let body_start = start_idx + start_marker.len();
        let end_idx = content[body_start..]
            .find(&end_marker)
            .map(|offset| body_start + offset)
            .ok_or_else(|| anyhow!("missing end marker: {}", end_marker))?;

        let body = self.content.trim_matches('\n');
        let mut updated = String::with_capacity(content.len() + body.len());
        updated.push_str(&content[..body_start]);
        updated.push('\n');
        if !body.is_empty() {
            updated.push_str(body);
            updated.push('\n');
        }
        updated.push_str(&content[end_idx..]);
        Ok(updated)
    }
}

/// A Markdown notebook whose marked sections are rewritten on every run.
#[derive(Clone, Debug)]
pub struct Notebook {
    path: PathBuf,
}

impl Notebook {
    /// Open the notebook at `path`, writing `template` first if it does not exist.
    pub fn open_or_create(path: &Path, template: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        if !path.exists() {
            fs::write(path, template).with_context(|| {
                format!("failed to write report template to {}", path.display())
            })?;
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn update(&self, sections: &[ReportSection]) -> Result<()> {
        let mut content = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read report at {}", self.path.display()))?;
        for section in sections {
            content = section.splice_into(&content)?;
        }
        fs::write(&self.path, content).with_context(|| {
            format!("failed to write updated report to {}", self.path.display())
        })
    }
}

/// Markdown table of per-precision error statistics.
pub fn render_error_scaling(summaries: &[PrecisionSummary]) -> String {
    let mut output = String::new();
    let _ = writeln!(
        &mut output,
        "| Precision | Resolution | Points | Failures | Mean abs. error | Max abs. error |"
    );
    let _ = writeln!(&mut output, "| --- | --- | --- | --- | --- | --- |");
    for summary in summaries {
        let _ = writeln!(
            &mut output,
            "| {} | {:.6} | {} | {} | {} | {} |",
            summary.precision,
            summary.resolution,
            summary.points,
            summary.failures,
            format_optional(summary.mean_absolute_error),
            format_optional(summary.max_absolute_error),
        );
    }
    output
}

/// One block of `(x, absolute error)` pairs per precision level.
pub fn render_precision_blocks(blocks: &[PrecisionBlock]) -> String {
    if blocks.is_empty() {
        return "No estimates were produced.".to_string();
    }

    let mut output = String::new();
    for block in blocks {
        let _ = writeln!(&mut output, "### Precision {}\n", block.precision);
        let _ = writeln!(&mut output, "| x | Absolute error |");
        let _ = writeln!(&mut output, "| --- | --- |");
        for (point, error) in &block.entries {
            let _ = writeln!(&mut output, "| {:.6} | {} |", point, format_optional(*error));
        }
        output.push('\n');
    }
    output
}

pub fn render_failures(table: &ResultTable) -> String {
    let mut failures = table.failures().peekable();
    if failures.peek().is_none() {
        return "No failed estimates.".to_string();
    }

    let mut output = String::new();
    for failure in failures {
        let _ = writeln!(
            &mut output,
            "- p={} x={:.6}: {:?} ({})",
            failure.precision, failure.point, failure.kind, failure.message
        );
    }
    output
}

fn format_optional(value: Option<f64>) -> String {
    value.map_or_else(|| "failed".to_string(), |v| format!("{v:.6}"))
}
