//! Descriptive statistics over one extracted series.
//!
//! Standard deviation is the population form (ddof = 0) and percentiles use
//! linear interpolation between closest ranks.

/// What kind of extra figure a summary carries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricKind {
    /// Percentage data; reports the share of samples sitting at `saturation`.
    Percentage { saturation: f64 },
    /// Plain measurements; reports the coefficient of variation.
    Measurement,
}

/// Descriptive statistics for one series.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    /// Percent of samples exactly at the saturation value (percentage metrics only).
    pub saturation_pct: Option<f64>,
    /// Coefficient of variation in percent; `None` for percentage metrics or a zero mean.
    pub cv_pct: Option<f64>,
}

impl Summary {
    pub fn compute(values: &[f64], kind: MetricKind) -> Result<Self, StatsError> {
        if values.is_empty() {
            return Err(StatsError::Empty);
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std_dev = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
        let sorted = sorted(values);
        let min = sorted[0];
        let max = sorted[sorted.len() - 1];

        let (saturation_pct, cv_pct) = match kind {
            MetricKind::Percentage { saturation } => {
                let at = values.iter().filter(|&&v| v == saturation).count();
                (Some(at as f64 / n * 100.0), None)
            }
            MetricKind::Measurement => {
                let cv = (mean != 0.0).then(|| std_dev / mean * 100.0);
                (None, cv)
            }
        };

        Ok(Self {
            count: values.len(),
            mean,
            median: percentile(&sorted, 50.0),
            std_dev,
            min,
            max,
            range: max - min,
            saturation_pct,
            cv_pct,
        })
    }
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    v
}

/// Percentile `q` (0..=100) of already-sorted data.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        len => {
            let rank = (q / 100.0).clamp(0.0, 1.0) * (len - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

/// Box-and-whisker figures with 1.5 IQR whiskers clamped to the data.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub whisker_lo: f64,
    pub whisker_hi: f64,
    pub mean: f64,
    pub outliers: Vec<f64>,
}

impl BoxStats {
    pub fn compute(values: &[f64]) -> Result<Self, StatsError> {
        if values.is_empty() {
            return Err(StatsError::Empty);
        }
        let sorted = sorted(values);
        let q1 = percentile(&sorted, 25.0);
        let q3 = percentile(&sorted, 75.0);
        let iqr = q3 - q1;
        let lo_fence = q1 - 1.5 * iqr;
        let hi_fence = q3 + 1.5 * iqr;

        let (inside, outliers): (Vec<f64>, Vec<f64>) = sorted
            .iter()
            .partition(|v| **v >= lo_fence && **v <= hi_fence);
        let whisker_lo = inside.first().copied().unwrap_or(q1);
        let whisker_hi = inside.last().copied().unwrap_or(q3);

        Ok(Self {
            q1,
            median: percentile(&sorted, 50.0),
            q3,
            whisker_lo,
            whisker_hi,
            mean: values.iter().sum::<f64>() / values.len() as f64,
            outliers,
        })
    }
}

/// One histogram bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bin {
    pub lo: f64,
    pub hi: f64,
    /// Count normalized so that the bar areas sum to 1.
    pub density: f64,
}

/// Equal-width histogram over `[lo, hi]`. Values outside the range are ignored;
/// the last bin includes `hi`.
pub fn histogram(values: &[f64], lo: f64, hi: f64, bins: usize) -> Vec<Bin> {
    if bins == 0 || lo.is_nan() || hi.is_nan() || hi <= lo {
        return Vec::new();
    }
    let width = (hi - lo) / bins as f64;
    let mut counts = vec![0usize; bins];
    for &v in values {
        if v < lo || v > hi {
            continue;
        }
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    let total: usize = counts.iter().sum();
    counts
        .into_iter()
        .enumerate()
        .map(|(i, c)| Bin {
            lo: lo + i as f64 * width,
            hi: lo + (i + 1) as f64 * width,
            density: if total == 0 {
                0.0
            } else {
                c as f64 / (total as f64 * width)
            },
        })
        .collect()
}

/// Moving average over full windows only; empty when `values` is shorter than `window`.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || values.len() < window {
        return Vec::new();
    }
    let w = window as f64;
    let mut sum: f64 = values[..window].iter().sum();
    let mut out = Vec::with_capacity(values.len() - window + 1);
    out.push(sum / w);
    for i in window..values.len() {
        sum += values[i] - values[i - window];
        out.push(sum / w);
    }
    out
}

/// Rolling window for the "before" series: a tenth of its length, capped at 100.
pub fn rolling_window(before_len: usize) -> usize {
    (before_len / 10).min(100)
}

/// Pearson correlation of two equal-length series.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mx = xs.iter().sum::<f64>() / n;
    let my = ys.iter().sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let (dx, dy) = (x - mx, y - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some(sxy / (sxx * syy).sqrt())
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatsError {
    Empty,
}

impl std::fmt::Display for StatsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatsError::Empty => write!(f, "no samples to summarize"),
        }
    }
}

impl std::error::Error for StatsError {}
