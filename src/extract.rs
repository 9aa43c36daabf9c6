//! Column extraction from CSV captures.
//!
//! A capture starts with an optional preamble of comment lines (`%` by default),
//! followed by delimited rows whose first field is a timestamp in seconds.
//! Empty fields are dropped before indexing, so column indices count
//! non-empty fields only.

use crate::config::{ExtractOptions, MetricSpec};
use std::path::{Path, PathBuf};

/// Aligned time/value samples pulled from one capture.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    /// Time of each sample, already divided by `time_divisor` (minutes by default).
    pub times: Vec<f64>,
    pub values: Vec<f64>,
    /// Data rows dropped for being short, unparsable, non-finite, or out of range.
    pub skipped_rows: usize,
}

impl Series {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Largest timestamp, the capture's duration when it starts at zero.
    pub fn time_span(&self) -> Option<f64> {
        self.times.iter().copied().reduce(f64::max)
    }
}

/// Resolve a signed column index against a row of `len` fields.
fn resolve_index(column: i64, len: usize) -> Option<usize> {
    if column >= 0 {
        let idx = column as usize;
        (idx < len).then_some(idx)
    } else {
        let back = column.unsigned_abs() as usize;
        len.checked_sub(back)
    }
}

/// Parse capture text into a series for one metric.
pub fn parse_series(text: &str, options: &ExtractOptions, metric: &MetricSpec) -> Series {
    let delimiter = options.delimiter_char();
    let prefix = options.comment_prefix.as_str();
    let mut series = Series::default();

    let rows = text
        .lines()
        .skip_while(|line| line.trim().is_empty() || (!prefix.is_empty() && line.starts_with(prefix)))
        .filter(|line| !line.trim().is_empty());

    for line in rows {
        let fields: Vec<&str> = line
            .split(delimiter)
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .collect();

        if fields.len() < metric.min_columns {
            series.skipped_rows += 1;
            continue;
        }

        let (Some(t_idx), Some(v_idx)) = (
            (options.time_column < fields.len()).then_some(options.time_column),
            resolve_index(metric.column, fields.len()),
        ) else {
            series.skipped_rows += 1;
            continue;
        };

        let sample = fields[t_idx]
            .parse::<f64>()
            .ok()
            .zip(fields[v_idx].parse::<f64>().ok())
            .map(|(t, v)| (t / options.time_divisor, v * metric.scale));

        // `inf`, `nan` and overflowing literals parse, but are not samples.
        match sample {
            Some((t, v)) if t.is_finite() && v.is_finite() => {
                series.times.push(t);
                series.values.push(v);
            }
            _ => series.skipped_rows += 1,
        }
    }

    series
}

/// Read a capture file and extract one metric from it.
pub fn extract_series(
    path: &Path,
    options: &ExtractOptions,
    metric: &MetricSpec,
) -> Result<Series, ExtractError> {
    let text = std::fs::read_to_string(path).map_err(|e| ExtractError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    let series = parse_series(&text, options, metric);
    if series.is_empty() {
        tracing::warn!(
            file = %path.display(),
            column = metric.column,
            min_columns = metric.min_columns,
            "no usable rows for column"
        );
    }
    tracing::debug!(
        file = %path.display(),
        column = metric.column,
        samples = series.len(),
        skipped = series.skipped_rows,
        "extracted column"
    );
    Ok(series)
}

/// Errors from reading capture files.
#[derive(Debug)]
pub enum ExtractError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Read { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ExtractError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExtractError::Read { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn metric(column: i64, min_columns: usize) -> MetricSpec {
        MetricSpec {
            column,
            min_columns,
            title: "m".into(),
            ylabel: "y".into(),
            percentage: false,
            scale: 1.0,
            saturation: 100.0,
            critical: 75.0,
            short_label: None,
        }
    }

    const CAPTURE: &str = "\
% Model: line 4
% Date: 2025-08-13

0, 1.5, x, 2.5, y, 3.5
60, 1.6, x, 2.6, y, 3.6
120, 1.7, x, 2.7, y, 3.7
";

    #[test]
    fn preamble_skipped_and_minutes_computed() {
        let s = parse_series(CAPTURE, &ExtractOptions::default(), &metric(1, 2));
        assert_eq!(s.times, vec![0.0, 1.0, 2.0]);
        assert_eq!(s.values, vec![1.5, 1.6, 1.7]);
        assert_eq!(s.skipped_rows, 0);
        assert_eq!(s.time_span(), Some(2.0));
    }

    #[test]
    fn negative_index_selects_last_field() {
        let s = parse_series(CAPTURE, &ExtractOptions::default(), &metric(-1, 6));
        assert_eq!(s.values, vec![3.5, 3.6, 3.7]);
    }

    #[test]
    fn empty_fields_do_not_count_as_columns() {
        let text = "0,,5,,7\n60,,6,,8\n";
        let s = parse_series(text, &ExtractOptions::default(), &metric(1, 2));
        assert_eq!(s.values, vec![5.0, 6.0]);
        let s = parse_series(text, &ExtractOptions::default(), &metric(-1, 3));
        assert_eq!(s.values, vec![7.0, 8.0]);
    }

    #[test]
    fn short_rows_are_skipped() {
        let text = "0,1,2,3\n60,1\n120,4,5,6\n";
        let s = parse_series(text, &ExtractOptions::default(), &metric(3, 4));
        assert_eq!(s.values, vec![3.0, 6.0]);
        assert_eq!(s.skipped_rows, 1);
    }

    #[test]
    fn unparsable_rows_are_skipped() {
        let text = "time,value\n0,1.0\n60,oops\n120,3.0\n";
        let s = parse_series(text, &ExtractOptions::default(), &metric(1, 2));
        assert_eq!(s.values, vec![1.0, 3.0]);
        assert_eq!(s.times, vec![0.0, 2.0]);
        assert_eq!(s.skipped_rows, 2);
    }

    #[test]
    fn non_finite_samples_are_skipped() {
        let text = "0,1.0\n60,inf\n120,2.0\n180,-inf\n240,1e999\n300,NaN\ninf,3.0\n360,4.0\n";
        let s = parse_series(text, &ExtractOptions::default(), &metric(1, 2));
        assert_eq!(s.values, vec![1.0, 2.0, 4.0]);
        assert_eq!(s.times, vec![0.0, 2.0, 6.0]);
        assert_eq!(s.skipped_rows, 5);

        let mut m = metric(1, 2);
        m.scale = 1e10;
        let s = parse_series("0,1e300\n60,2.0\n", &ExtractOptions::default(), &m);
        assert_eq!(s.values, vec![2e10]);
        assert_eq!(s.skipped_rows, 1);
    }

    #[test]
    fn out_of_range_index_skips_row() {
        let text = "0,1,2\n60,3,4\n";
        let s = parse_series(text, &ExtractOptions::default(), &metric(5, 1));
        assert!(s.is_empty());
        assert_eq!(s.skipped_rows, 2);
        let s = parse_series(text, &ExtractOptions::default(), &metric(-4, 1));
        assert!(s.is_empty());
    }

    #[test]
    fn comment_lines_after_data_are_skipped_as_unparsable() {
        let text = "0,1\n% marker\n60,2\n";
        let s = parse_series(text, &ExtractOptions::default(), &metric(1, 2));
        assert_eq!(s.values, vec![1.0, 2.0]);
        assert_eq!(s.skipped_rows, 1);
    }

    #[test]
    fn scale_and_custom_delimiter_applied() {
        let options = ExtractOptions {
            delimiter: ";".into(),
            time_divisor: 1.0,
            ..ExtractOptions::default()
        };
        let mut m = metric(-1, 2);
        m.scale = 100.0;
        let s = parse_series("5;0.25\n6;1.0\n", &options, &m);
        assert_eq!(s.times, vec![5.0, 6.0]);
        assert_eq!(s.values, vec![25.0, 100.0]);
    }

    #[test]
    fn empty_input_yields_empty_series() {
        let s = parse_series("% only\n% comments\n", &ExtractOptions::default(), &metric(1, 2));
        assert!(s.is_empty());
        assert_eq!(s.time_span(), None);
    }

    #[test]
    fn extract_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("before.csv");
        std::fs::write(&path, CAPTURE).unwrap();
        let s = extract_series(&path, &ExtractOptions::default(), &metric(3, 4)).unwrap();
        assert_eq!(s.values, vec![2.5, 2.6, 2.7]);
    }

    #[test]
    fn extract_missing_file_errors() {
        let dir = tempdir().unwrap();
        let err = extract_series(
            &dir.path().join("nope.csv"),
            &ExtractOptions::default(),
            &metric(1, 2),
        )
        .unwrap_err();
        assert!(err.to_string().contains("nope.csv"));
    }
}
