//! Console tables for a single metric and for the cross-metric summary.

use crate::analysis::{ComparisonRow, SummaryRow};
use crate::extract::Series;

fn fmt_value(value: Option<f64>, precision: usize, signed: bool) -> String {
    match value {
        Some(v) if signed => format!("{v:+.precision$}"),
        Some(v) => format!("{v:.precision$}"),
        None => "n/a".to_string(),
    }
}

/// `Before: 812 points over 135.2 min`
pub fn format_loaded(label: &str, series: &Series) -> String {
    match series.time_span() {
        Some(span) => format!("{label}: {} points over {span:.1} min", series.len()),
        None => format!("{label}: no points"),
    }
}

/// Before/after/difference table for one metric.
pub fn format_comparison(title: &str, rows: &[ComparisonRow], percentage: bool) -> String {
    let width = 60usize.max(title.chars().count() + 20);
    let mut lines = Vec::with_capacity(rows.len() + 4);

    lines.push(format!("STATISTICS {title}"));
    lines.push("=".repeat(width));
    lines.push(format!(
        "{:<20} {:<12} {:<12} {:<12}",
        "Metric", "Before", "After", "Diff"
    ));
    lines.push("-".repeat(width));

    for row in rows {
        let precision = if row.ratio {
            2
        } else if percentage {
            1
        } else {
            3
        };
        lines.push(format!(
            "{:<20} {:<12} {:<12} {:<12}",
            row.name,
            fmt_value(row.before, precision, false),
            fmt_value(row.after, precision, false),
            fmt_value(row.diff(), precision, true),
        ));
    }

    lines.join("\n")
}

/// Cross-metric table of mean shifts and verdicts.
pub fn format_summary(rows: &[SummaryRow]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 4);

    lines.push("SUMMARY OF ALL METRICS".to_string());
    lines.push("=".repeat(80));
    lines.push(format!(
        "{:<35} {:<12} {:<12} {:<12} {:<12}",
        "Metric", "Mean before", "Mean after", "Mean diff", "Trend"
    ));
    lines.push("-".repeat(80));

    for row in rows {
        lines.push(format!(
            "{:<35} {:<12} {:<12} {:<12} {:<12}",
            row.metric,
            fmt_value(Some(row.mean_before), 2, false),
            fmt_value(Some(row.mean_after), 2, false),
            fmt_value(Some(row.mean_diff), 2, true),
            row.verdict.to_string(),
        ));
    }

    lines.join("\n")
}
