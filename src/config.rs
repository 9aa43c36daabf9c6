use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from compare.toml.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
#[derive(Default)]
pub struct CompareConfig {
    pub inputs: InputsConfig,
    pub output: OutputConfig,
    pub extract: ExtractOptions,
    pub metrics: Vec<MetricSpec>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
#[derive(Default)]
pub struct InputsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub plots: bool,
    /// Relative paths resolve against `dir`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_json: Option<PathBuf>,
}

/// How data rows are located and split inside a capture file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractOptions {
    pub comment_prefix: String,
    pub delimiter: String,
    pub time_column: usize,
    pub time_divisor: f64,
}

/// One column to compare between the two captures.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricSpec {
    /// Field index; negative values count from the end (`-1` is the last field).
    pub column: i64,
    pub min_columns: usize,
    pub title: String,
    pub ylabel: String,
    #[serde(default)]
    pub percentage: bool,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default = "default_saturation")]
    pub saturation: f64,
    #[serde(default = "default_critical")]
    pub critical: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_label: Option<String>,
}

fn default_scale() -> f64 {
    1.0
}
fn default_saturation() -> f64 {
    100.0
}
fn default_critical() -> f64 {
    75.0
}

impl MetricSpec {
    /// Label used on the summary charts.
    pub fn label(&self) -> &str {
        self.short_label.as_deref().unwrap_or(&self.title)
    }

    fn sensor(column: i64, index: u32) -> Self {
        Self {
            column,
            min_columns: column as usize + 1,
            title: format!("TRSF_ThicknessBottles[{index}] (Sensor {index})"),
            ylabel: format!("TRSF_ThicknessBottles[{index}]"),
            percentage: false,
            scale: default_scale(),
            saturation: default_saturation(),
            critical: default_critical(),
            short_label: Some(format!("Sensor {index}")),
        }
    }
}

// --- Default implementations ---

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("compare-out"),
            plots: true,
            summary_json: None,
        }
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            comment_prefix: "%".to_string(),
            delimiter: ",".to_string(),
            time_column: 0,
            time_divisor: 60.0,
        }
    }
}

impl ExtractOptions {
    /// The delimiter as a single char. Only meaningful after `validate`.
    pub fn delimiter_char(&self) -> char {
        self.delimiter.chars().next().unwrap_or(',')
    }
}

/// The four thickness-line metrics the tool was first written for.
pub fn default_metrics() -> Vec<MetricSpec> {
    vec![
        MetricSpec {
            column: -1,
            min_columns: 12,
            title: "TRSF_ThicknessBottlePerc".to_string(),
            ylabel: "Bottles read (%)".to_string(),
            percentage: true,
            scale: default_scale(),
            saturation: default_saturation(),
            critical: default_critical(),
            short_label: Some("Bottles read".to_string()),
        },
        MetricSpec::sensor(1, 1),
        MetricSpec::sensor(3, 2),
        MetricSpec::sensor(5, 3),
    ]
}

impl CompareConfig {
    /// Load config from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "config file not found, using defaults");
                return Ok(Self::with_default_metrics());
            }
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        Self::from_toml(&contents).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse config text. An absent `[[metrics]]` table means the default metrics.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let mut cfg: CompareConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            source: e,
        })?;
        if cfg.metrics.is_empty() {
            cfg.metrics = default_metrics();
        }
        Ok(cfg)
    }

    pub fn with_default_metrics() -> Self {
        Self {
            metrics: default_metrics(),
            ..Self::default()
        }
    }

    /// Check the resolved configuration before any file is read.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.metrics.is_empty() {
            return Err(ConfigError::Invalid("no metrics configured".to_string()));
        }
        if self.extract.delimiter.chars().count() != 1 {
            return Err(ConfigError::Invalid(format!(
                "delimiter must be a single character, got {:?}",
                self.extract.delimiter
            )));
        }
        if !self.extract.time_divisor.is_finite() || self.extract.time_divisor == 0.0 {
            return Err(ConfigError::Invalid(
                "time_divisor must be finite and non-zero".to_string(),
            ));
        }
        for m in &self.metrics {
            if m.title.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "metric on column {} has an empty title",
                    m.column
                )));
            }
            if m.min_columns == 0 {
                return Err(ConfigError::Invalid(format!(
                    "metric '{}': min_columns must be at least 1",
                    m.title
                )));
            }
            if !m.scale.is_finite() || m.scale == 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "metric '{}': scale must be finite and non-zero",
                    m.title
                )));
            }
            if m.percentage && m.saturation <= m.critical {
                return Err(ConfigError::Invalid(format!(
                    "metric '{}': saturation ({}) must be above critical ({})",
                    m.title, m.saturation, m.critical
                )));
            }
        }
        Ok(())
    }

    /// Resolved location of the JSON summary, if one was requested.
    pub fn summary_json_path(&self) -> Option<PathBuf> {
        self.output.summary_json.as_ref().map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                self.output.dir.join(p)
            }
        })
    }
}

/// Errors from loading or validating the configuration.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config {}: {source}", path.display())
            }
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Invalid(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let cfg = CompareConfig::load(&dir.path().join("compare.toml")).unwrap();
        assert_eq!(cfg.metrics.len(), 4);
        assert_eq!(cfg.output.dir, PathBuf::from("compare-out"));
        assert!(cfg.output.plots);
        assert_eq!(cfg.extract.comment_prefix, "%");
        assert_eq!(cfg.extract.time_divisor, 60.0);
        cfg.validate().unwrap();
    }

    #[test]
    fn test_default_metrics_match_thickness_layout() {
        let metrics = default_metrics();
        let cols: Vec<(i64, usize, bool)> = metrics
            .iter()
            .map(|m| (m.column, m.min_columns, m.percentage))
            .collect();
        assert_eq!(
            cols,
            vec![(-1, 12, true), (1, 2, false), (3, 4, false), (5, 6, false)]
        );
        assert_eq!(metrics[2].label(), "Sensor 2");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[inputs]
before = "before.csv"
after = "after.csv"

[output]
dir = "out"
plots = false
summary_json = "summary.json"

[extract]
delimiter = ";"
time_divisor = 1.0

[[metrics]]
column = 2
min_columns = 3
title = "Pressure"
ylabel = "bar"

[[metrics]]
column = -1
min_columns = 4
title = "Fill"
ylabel = "%"
percentage = true
scale = 100.0
"#;
        let cfg = CompareConfig::from_toml(toml).unwrap();
        assert_eq!(cfg.inputs.before, Some(PathBuf::from("before.csv")));
        assert!(!cfg.output.plots);
        assert_eq!(cfg.extract.delimiter_char(), ';');
        assert_eq!(cfg.extract.comment_prefix, "%");
        assert_eq!(cfg.metrics.len(), 2);
        assert_eq!(cfg.metrics[0].scale, 1.0);
        assert_eq!(cfg.metrics[0].label(), "Pressure");
        assert_eq!(cfg.metrics[1].scale, 100.0);
        assert_eq!(cfg.metrics[1].saturation, 100.0);
        assert_eq!(
            cfg.summary_json_path(),
            Some(PathBuf::from("out").join("summary.json"))
        );
        cfg.validate().unwrap();
    }

    #[test]
    fn test_parse_error_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("compare.toml");
        std::fs::write(&path, "[[metrics]]\ncolumn = \"x\"\n").unwrap();
        let err = CompareConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("compare.toml"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut cfg = CompareConfig::with_default_metrics();
        cfg.extract.delimiter = ",;".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = CompareConfig::with_default_metrics();
        cfg.extract.time_divisor = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = CompareConfig::with_default_metrics();
        cfg.metrics[1].min_columns = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = CompareConfig::with_default_metrics();
        cfg.metrics[0].critical = 100.0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("saturation"));

        let mut cfg = CompareConfig::with_default_metrics();
        cfg.metrics.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_blank_title_and_zero_scale() {
        let mut cfg = CompareConfig::with_default_metrics();
        cfg.metrics[2].title = "   ".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("empty title"));

        let mut cfg = CompareConfig::with_default_metrics();
        cfg.metrics[2].title = String::new();
        assert!(cfg.validate().is_err());

        let mut cfg = CompareConfig::with_default_metrics();
        cfg.metrics[1].scale = 0.0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("scale"));
    }

    #[test]
    fn test_validate_rejects_nan_from_toml() {
        let cfg = CompareConfig::from_toml("[extract]\ntime_divisor = nan\n").unwrap();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("time_divisor"));

        let cfg = CompareConfig::from_toml(
            "[[metrics]]\ncolumn = 1\nmin_columns = 2\ntitle = \"Level\"\nylabel = \"mm\"\nscale = nan\n",
        )
        .unwrap();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("scale"));
    }

    #[test]
    fn test_absolute_summary_path_kept() {
        let mut cfg = CompareConfig::with_default_metrics();
        cfg.output.summary_json = Some(PathBuf::from("/tmp/summary.json"));
        assert_eq!(
            cfg.summary_json_path(),
            Some(PathBuf::from("/tmp/summary.json"))
        );
    }
}
