//! Before/after pairing and the per-metric loop.
//!
//! Every configured metric goes through the same sequence: extract both
//! captures, summarize, print the comparison, render charts. A failing metric
//! is logged and reported at the end without stopping the others.

use crate::config::{CompareConfig, ExtractOptions, MetricSpec};
use crate::extract::{self, ExtractError, Series};
use crate::plot::{self, PlotError};
use crate::report;
use crate::stats::{MetricKind, StatsError, Summary};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Which capture a value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Before,
    After,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Before => write!(f, "before"),
            Side::After => write!(f, "after"),
        }
    }
}

/// Everything computed for one metric.
#[derive(Debug, Clone)]
pub struct MetricAnalysis {
    pub metric: MetricSpec,
    pub before: Series,
    pub after: Series,
    pub before_stats: Summary,
    pub after_stats: Summary,
}

/// One line of the before/after table.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub name: &'static str,
    pub before: Option<f64>,
    pub after: Option<f64>,
    /// Ratio rows (CV, time at saturation) always print with two decimals.
    pub ratio: bool,
}

impl ComparisonRow {
    fn value(name: &'static str, before: f64, after: f64) -> Self {
        Self {
            name,
            before: Some(before),
            after: Some(after),
            ratio: false,
        }
    }

    pub fn diff(&self) -> Option<f64> {
        Some(self.after? - self.before?)
    }
}

/// Whether the change moved the metric in the wanted direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Improvement,
    Degradation,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Improvement => write!(f, "Improvement"),
            Verdict::Degradation => write!(f, "Degradation"),
        }
    }
}

/// One metric's line in the cross-metric summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub metric: String,
    pub label: String,
    pub percentage: bool,
    pub mean_before: f64,
    pub mean_after: f64,
    pub mean_diff: f64,
    pub std_before: f64,
    pub std_after: f64,
    pub std_diff: f64,
    pub verdict: Verdict,
}

impl MetricAnalysis {
    /// Rows of the comparison table, in display order.
    pub fn comparison(&self) -> Vec<ComparisonRow> {
        compare(&self.before_stats, &self.after_stats)
    }

    pub fn summary_row(&self) -> SummaryRow {
        let (b, a) = (&self.before_stats, &self.after_stats);
        // Percentages should rise; measurements should get steadier.
        let improved = if self.metric.percentage {
            a.mean > b.mean
        } else {
            a.std_dev < b.std_dev
        };
        SummaryRow {
            metric: self.metric.title.clone(),
            label: self.metric.label().to_string(),
            percentage: self.metric.percentage,
            mean_before: b.mean,
            mean_after: a.mean,
            mean_diff: a.mean - b.mean,
            std_before: b.std_dev,
            std_after: a.std_dev,
            std_diff: a.std_dev - b.std_dev,
            verdict: if improved {
                Verdict::Improvement
            } else {
                Verdict::Degradation
            },
        }
    }
}

fn metric_kind(metric: &MetricSpec) -> MetricKind {
    if metric.percentage {
        MetricKind::Percentage {
            saturation: metric.saturation,
        }
    } else {
        MetricKind::Measurement
    }
}

/// Pair two summaries into table rows.
pub fn compare(before: &Summary, after: &Summary) -> Vec<ComparisonRow> {
    let mut rows = vec![
        ComparisonRow::value("Mean", before.mean, after.mean),
        ComparisonRow::value("Median", before.median, after.median),
        ComparisonRow::value("Std dev", before.std_dev, after.std_dev),
        ComparisonRow::value("Min", before.min, after.min),
        ComparisonRow::value("Max", before.max, after.max),
        ComparisonRow::value("Range", before.range, after.range),
    ];
    if before.saturation_pct.is_some() || after.saturation_pct.is_some() {
        rows.push(ComparisonRow {
            name: "At saturation (%)",
            before: before.saturation_pct,
            after: after.saturation_pct,
            ratio: true,
        });
    } else {
        rows.push(ComparisonRow {
            name: "CV (%)",
            before: before.cv_pct,
            after: after.cv_pct,
            ratio: true,
        });
    }
    rows
}

/// Extract and summarize one metric from both captures.
pub fn analyze_metric(
    before: &Path,
    after: &Path,
    options: &ExtractOptions,
    metric: &MetricSpec,
) -> Result<MetricAnalysis, AnalysisError> {
    let kind = metric_kind(metric);

    let before_series = extract::extract_series(before, options, metric)?;
    let after_series = extract::extract_series(after, options, metric)?;

    let before_stats = Summary::compute(&before_series.values, kind).map_err(|e| {
        AnalysisError::Stats {
            side: Side::Before,
            source: e,
        }
    })?;
    let after_stats =
        Summary::compute(&after_series.values, kind).map_err(|e| AnalysisError::Stats {
            side: Side::After,
            source: e,
        })?;

    tracing::info!(
        metric = %metric.title,
        before_points = before_series.len(),
        after_points = after_series.len(),
        "metric extracted"
    );

    Ok(MetricAnalysis {
        metric: metric.clone(),
        before: before_series,
        after: after_series,
        before_stats,
        after_stats,
    })
}

/// Keep metrics whose title contains any of `filters` (case-insensitive).
/// No filters keeps everything.
pub fn select_metrics(metrics: &[MetricSpec], filters: &[String]) -> Vec<MetricSpec> {
    if filters.is_empty() {
        return metrics.to_vec();
    }
    let needles: Vec<String> = filters.iter().map(|f| f.to_lowercase()).collect();
    metrics
        .iter()
        .filter(|m| {
            let title = m.title.to_lowercase();
            needles.iter().any(|n| title.contains(n.as_str()))
        })
        .cloned()
        .collect()
}

/// A metric that could not be analyzed.
#[derive(Debug)]
pub struct MetricFailure {
    pub title: String,
    pub error: AnalysisError,
}

/// Results of a full run over all configured metrics.
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub analyses: Vec<MetricAnalysis>,
    pub summary: Vec<SummaryRow>,
    pub charts: Vec<PathBuf>,
    pub failures: Vec<MetricFailure>,
}

/// Run every configured metric against the two captures.
pub fn run(config: &CompareConfig, before: &Path, after: &Path) -> Result<RunOutcome, AnalysisError> {
    let plots = config.output.plots;
    let out_dir = &config.output.dir;
    if plots {
        std::fs::create_dir_all(out_dir).map_err(|e| AnalysisError::OutputDir {
            path: out_dir.clone(),
            source: e,
        })?;
    }

    let total = config.metrics.len();
    let mut outcome = RunOutcome::default();

    for (i, metric) in config.metrics.iter().enumerate() {
        println!();
        println!("ANALYSIS {}/{}: {}", i + 1, total, metric.title);
        println!("{}", "=".repeat(80));

        let analysis = match analyze_metric(before, after, &config.extract, metric) {
            Ok(a) => a,
            Err(e) => {
                tracing::error!(metric = %metric.title, error = %e, "metric analysis failed");
                outcome.failures.push(MetricFailure {
                    title: metric.title.clone(),
                    error: e,
                });
                continue;
            }
        };

        println!("{}", report::format_loaded("Before", &analysis.before));
        println!("{}", report::format_loaded("After", &analysis.after));
        println!(
            "{}",
            report::format_comparison(&metric.title, &analysis.comparison(), metric.percentage)
        );

        if plots {
            let path = out_dir.join(format!("{}.svg", plot::slug(&metric.title)));
            match plot::render_comparison(&path, &analysis) {
                Ok(()) => {
                    tracing::info!(file = %path.display(), "comparison chart written");
                    outcome.charts.push(path);
                }
                Err(e) => {
                    tracing::error!(metric = %metric.title, error = %e, "chart rendering failed");
                    outcome.failures.push(MetricFailure {
                        title: metric.title.clone(),
                        error: AnalysisError::Plot(e),
                    });
                    continue;
                }
            }
        }

        outcome.summary.push(analysis.summary_row());
        outcome.analyses.push(analysis);
    }

    if !outcome.summary.is_empty() {
        println!();
        println!("{}", report::format_summary(&outcome.summary));

        if plots {
            let path = out_dir.join("summary.svg");
            match plot::render_summary(&path, &outcome.summary) {
                Ok(()) => {
                    tracing::info!(file = %path.display(), "summary chart written");
                    outcome.charts.push(path);
                }
                Err(e) => tracing::warn!(error = %e, "summary chart rendering failed"),
            }
        }
    }

    Ok(outcome)
}

/// Errors from analyzing a metric or preparing the run.
#[derive(Debug)]
pub enum AnalysisError {
    Extract(ExtractError),
    Stats { side: Side, source: StatsError },
    Plot(PlotError),
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<ExtractError> for AnalysisError {
    fn from(e: ExtractError) -> Self {
        AnalysisError::Extract(e)
    }
}

impl std::fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisError::Extract(e) => write!(f, "{e}"),
            AnalysisError::Stats { side, source } => {
                write!(f, "{side} capture: {source}")
            }
            AnalysisError::Plot(e) => write!(f, "{e}"),
            AnalysisError::OutputDir { path, source } => {
                write!(
                    f,
                    "failed to create output directory {}: {source}",
                    path.display()
                )
            }
        }
    }
}

impl std::error::Error for AnalysisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AnalysisError::Extract(e) => Some(e),
            AnalysisError::Stats { source, .. } => Some(source),
            AnalysisError::Plot(e) => Some(e),
            AnalysisError::OutputDir { source, .. } => Some(source),
        }
    }
}
