/// Summary export: writes the cross-metric summary as JSON.
///
/// Uses atomic write pattern: write to temp file then rename.
use crate::analysis::SummaryRow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// The JSON payload written to the summary file.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryReport<'a> {
    pub generated_at: DateTime<Utc>,
    pub before: &'a Path,
    pub after: &'a Path,
    pub metrics: &'a [SummaryRow],
    pub failed: Vec<String>,
}

impl<'a> SummaryReport<'a> {
    pub fn new(before: &'a Path, after: &'a Path, metrics: &'a [SummaryRow], failed: Vec<String>) -> Self {
        Self {
            generated_at: Utc::now(),
            before,
            after,
            metrics,
            failed,
        }
    }
}

/// Atomically write the report to `path`.
///
/// Writes to a temporary file in the same directory, then renames
/// so readers never see a partial write.
pub fn write_summary(path: &Path, report: &SummaryReport<'_>) -> Result<(), ExportError> {
    let json =
        serde_json::to_string_pretty(report).map_err(|e| ExportError::Serialize { source: e })?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp_path = dir.join(format!(".column-compare.tmp.{}", std::process::id()));

    std::fs::write(&tmp_path, json.as_bytes()).map_err(|e| ExportError::Write {
        path: tmp_path.clone(),
        source: e,
    })?;

    std::fs::rename(&tmp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp_path);
        ExportError::Rename {
            from: tmp_path.clone(),
            to: path.to_path_buf(),
            source: e,
        }
    })?;

    tracing::info!(file = %path.display(), metrics = report.metrics.len(), "summary written");
    Ok(())
}

/// Errors from summary export.
#[derive(Debug)]
pub enum ExportError {
    Serialize {
        source: serde_json::Error,
    },
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::Serialize { source } => write!(f, "failed to serialize summary: {source}"),
            ExportError::Write { path, source } => {
                write!(
                    f,
                    "failed to write temp summary file {}: {source}",
                    path.display()
                )
            }
            ExportError::Rename { from, to, source } => {
                write!(
                    f,
                    "failed to rename {} -> {}: {source}",
                    from.display(),
                    to.display()
                )
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Serialize { source } => Some(source),
            ExportError::Write { source, .. } => Some(source),
            ExportError::Rename { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Verdict;
    use tempfile::tempdir;

    fn rows() -> Vec<SummaryRow> {
        vec![SummaryRow {
            metric: "TRSF_ThicknessBottlePerc".to_string(),
            label: "Bottles read".to_string(),
            percentage: true,
            mean_before: 91.5,
            mean_after: 97.0,
            mean_diff: 5.5,
            std_before: 6.0,
            std_after: 2.5,
            std_diff: -3.5,
            verdict: Verdict::Improvement,
        }]
    }

    #[test]
    fn test_summary_atomic_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("summary.json");
        let rows = rows();
        let report = SummaryReport::new(
            Path::new("before.csv"),
            Path::new("after.csv"),
            &rows,
            vec!["Sensor 2".to_string()],
        );

        write_summary(&path, &report).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed["before"], "before.csv");
        assert_eq!(parsed["after"], "after.csv");
        assert_eq!(parsed["metrics"][0]["metric"], "TRSF_ThicknessBottlePerc");
        assert_eq!(parsed["metrics"][0]["mean_diff"], 5.5);
        assert_eq!(parsed["metrics"][0]["verdict"], "improvement");
        assert_eq!(parsed["failed"][0], "Sensor 2");
        assert!(parsed["generated_at"].is_string());

        let tmp_path = dir
            .path()
            .join(format!(".column-compare.tmp.{}", std::process::id()));
        assert!(
            !tmp_path.exists(),
            "temp file should be cleaned up by rename"
        );
    }

    #[test]
    fn test_summary_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("summary.json");
        std::fs::write(&path, "stale").unwrap();
        let rows = rows();
        let report = SummaryReport::new(Path::new("b"), Path::new("a"), &rows, Vec::new());
        write_summary(&path, &report).unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["failed"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_summary_write_to_nonexistent_dir_fails() {
        let rows = rows();
        let report = SummaryReport::new(Path::new("b"), Path::new("a"), &rows, Vec::new());
        let err = write_summary(Path::new("/nonexistent/dir/summary.json"), &report).unwrap_err();
        assert!(err.to_string().contains("failed to write temp summary file"));
    }
}
