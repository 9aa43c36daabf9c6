//! SVG chart rendering.
//!
//! One 2x2 comparison figure per metric (time series, histograms, box plots,
//! correlation or rolling mean) and one summary figure with grouped bars of
//! means and standard deviations.

use crate::analysis::{MetricAnalysis, SummaryRow};
use crate::stats::{self, BoxStats, StatsError};
use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use std::path::Path;

const BEFORE_COLOR: RGBColor = RGBColor(214, 39, 40);
const AFTER_COLOR: RGBColor = RGBColor(44, 160, 44);

type Area<'a> = DrawingArea<SVGBackend<'a>, Shift>;

/// File-name form of a metric title: lowercase alphanumerics joined by `-`.
pub fn slug(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        out.push_str("metric");
    }
    out
}

fn bounds<'a>(values: impl IntoIterator<Item = &'a f64>) -> (f64, f64) {
    values
        .into_iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

/// Widen a range by 5% on each side; degenerate ranges get a unit margin.
fn padded((lo, hi): (f64, f64)) -> (f64, f64) {
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    if hi - lo <= f64::EPSILON {
        return (lo - 1.0, hi + 1.0);
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad, hi + pad)
}

fn legend_line(color: RGBColor) -> impl Fn((i32, i32)) -> PathElement<(i32, i32)> {
    move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color)
}

fn legend_box(color: RGBColor) -> impl Fn((i32, i32)) -> Rectangle<(i32, i32)> {
    move |(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], color.mix(0.6).filled())
}

/// Render the four-panel comparison figure for one metric.
pub fn render_comparison(path: &Path, analysis: &MetricAnalysis) -> Result<(), PlotError> {
    let root = SVGBackend::new(path, (1600, 1000)).into_drawing_area();
    root.fill(&WHITE)?;
    let titled = root.titled(
        &format!("COMPARATIVE ANALYSIS - {}", analysis.metric.title),
        ("sans-serif", 26),
    )?;
    let panels = titled.split_evenly((2, 2));

    draw_timeline(&panels[0], analysis)?;
    draw_histograms(&panels[1], analysis)?;
    draw_boxplots(&panels[2], analysis)?;
    draw_relation(&panels[3], analysis)?;

    root.present()?;
    Ok(())
}

fn draw_timeline(area: &Area, a: &MetricAnalysis) -> Result<(), PlotError> {
    let m = &a.metric;
    let (t_lo, t_hi) = padded(bounds(a.before.times.iter().chain(&a.after.times)));
    let (y_lo, y_hi) = if m.percentage {
        (0.0, m.saturation * 1.05)
    } else {
        padded(bounds(a.before.values.iter().chain(&a.after.values)))
    };

    let mut chart = ChartBuilder::on(area)
        .caption(format!("Evolution {}", m.title), ("sans-serif", 18))
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(55)
        .build_cartesian_2d(t_lo..t_hi, y_lo..y_hi)?;

    chart
        .configure_mesh()
        .x_desc("Time (minutes)")
        .y_desc(m.ylabel.as_str())
        .draw()?;

    for (series, color, label) in [
        (&a.before, BEFORE_COLOR, "Before"),
        (&a.after, AFTER_COLOR, "After"),
    ] {
        chart
            .draw_series(LineSeries::new(
                series.times.iter().copied().zip(series.values.iter().copied()),
                color.stroke_width(1),
            ))?
            .label(label)
            .legend(legend_line(color));
    }

    if m.percentage {
        for (level, color, label) in [
            (m.saturation, BLUE, format!("Optimal ({}%)", m.saturation)),
            (m.critical, RED, format!("Critical ({}%)", m.critical)),
        ] {
            chart
                .draw_series(LineSeries::new(
                    vec![(t_lo, level), (t_hi, level)],
                    color.mix(0.6).stroke_width(1),
                ))?
                .label(label)
                .legend(legend_line(color));
        }
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

/// Histogram range and bin count shared by both captures: 20 bins over
/// `0..saturation` for percentages, otherwise 30 bins over the combined range.
fn histogram_spec(a: &MetricAnalysis) -> (f64, f64, usize) {
    if a.metric.percentage {
        return (0.0, a.metric.saturation, 20);
    }
    let (lo, hi) = bounds(a.before.values.iter().chain(&a.after.values));
    if !lo.is_finite() || !hi.is_finite() {
        (0.0, 1.0, 30)
    } else if hi > lo {
        (lo, hi, 30)
    } else {
        (lo - 0.5, hi + 0.5, 30)
    }
}

fn draw_histograms(area: &Area, a: &MetricAnalysis) -> Result<(), PlotError> {
    let m = &a.metric;
    let (lo, hi, bins) = histogram_spec(a);

    let before = stats::histogram(&a.before.values, lo, hi, bins);
    let after = stats::histogram(&a.after.values, lo, hi, bins);
    let peak = before
        .iter()
        .chain(&after)
        .map(|b| b.density)
        .fold(0.0, f64::max);
    let y_hi = if peak > 0.0 { peak * 1.1 } else { 1.0 };

    let mut chart = ChartBuilder::on(area)
        .caption(format!("Distribution {}", m.title), ("sans-serif", 18))
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(55)
        .build_cartesian_2d(lo..hi, 0.0..y_hi)?;

    chart
        .configure_mesh()
        .x_desc(m.ylabel.as_str())
        .y_desc("Density")
        .draw()?;

    for (hist, mean, color, label) in [
        (&before, a.before_stats.mean, BEFORE_COLOR, "Before"),
        (&after, a.after_stats.mean, AFTER_COLOR, "After"),
    ] {
        chart
            .draw_series(hist.iter().map(|b| {
                Rectangle::new([(b.lo, 0.0), (b.hi, b.density)], color.mix(0.6).filled())
            }))?
            .label(label)
            .legend(legend_box(color));
        chart.draw_series(LineSeries::new(
            vec![(mean, 0.0), (mean, y_hi)],
            color.stroke_width(2),
        ))?;
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

fn draw_boxplots(area: &Area, a: &MetricAnalysis) -> Result<(), PlotError> {
    let m = &a.metric;
    let (y_lo, y_hi) = padded(bounds(a.before.values.iter().chain(&a.after.values)));

    let mut chart = ChartBuilder::on(area)
        .caption(format!("Box Plot {}", m.title), ("sans-serif", 18))
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(55)
        .build_cartesian_2d(0.0..2.0, y_lo..y_hi)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_label_formatter(&|_| String::new())
        .y_desc(m.ylabel.as_str())
        .draw()?;

    let half = 0.2;
    for (i, (values, color, label)) in [
        (&a.before.values, BEFORE_COLOR, "Before"),
        (&a.after.values, AFTER_COLOR, "After"),
    ]
    .into_iter()
    .enumerate()
    {
        let b = BoxStats::compute(values)?;
        let x = i as f64 + 0.5;

        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(x - half, b.q1), (x + half, b.q3)],
                color.mix(0.7).filled(),
            )))?
            .label(label)
            .legend(legend_box(color));
        chart.draw_series(std::iter::once(Rectangle::new(
            [(x - half, b.q1), (x + half, b.q3)],
            BLACK.stroke_width(1),
        )))?;
        chart.draw_series(vec![
            PathElement::new(vec![(x - half, b.median), (x + half, b.median)], BLACK.stroke_width(2)),
            PathElement::new(vec![(x, b.q3), (x, b.whisker_hi)], BLACK.stroke_width(1)),
            PathElement::new(vec![(x, b.q1), (x, b.whisker_lo)], BLACK.stroke_width(1)),
            PathElement::new(
                vec![(x - half / 2.0, b.whisker_hi), (x + half / 2.0, b.whisker_hi)],
                BLACK.stroke_width(1),
            ),
            PathElement::new(
                vec![(x - half / 2.0, b.whisker_lo), (x + half / 2.0, b.whisker_lo)],
                BLACK.stroke_width(1),
            ),
        ])?;
        chart.draw_series(
            b.outliers
                .iter()
                .map(|&v| Circle::new((x, v), 3, BLACK.stroke_width(1))),
        )?;
        chart.draw_series(std::iter::once(TriangleMarker::new(
            (x, b.mean),
            6,
            BLUE.filled(),
        )))?;
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

/// Scatter of paired samples when both captures have the same length,
/// rolling means otherwise.
fn draw_relation(area: &Area, a: &MetricAnalysis) -> Result<(), PlotError> {
    if a.before.len() == a.after.len() {
        draw_scatter(area, a)
    } else {
        draw_rolling(area, a)
    }
}

fn draw_scatter(area: &Area, a: &MetricAnalysis) -> Result<(), PlotError> {
    let (lo, hi) = bounds(a.before.values.iter().chain(&a.after.values));
    let (p_lo, p_hi) = padded((lo, hi));
    let caption = match stats::pearson(&a.before.values, &a.after.values) {
        Some(r) => format!("Correlation Before vs After (r = {r:.3})"),
        None => "Correlation Before vs After".to_string(),
    };

    let mut chart = ChartBuilder::on(area)
        .caption(caption, ("sans-serif", 18))
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(55)
        .build_cartesian_2d(p_lo..p_hi, p_lo..p_hi)?;

    chart
        .configure_mesh()
        .x_desc("Before")
        .y_desc("After")
        .draw()?;

    chart.draw_series(
        a.before
            .values
            .iter()
            .zip(&a.after.values)
            .map(|(&x, &y)| Circle::new((x, y), 2, BLUE.mix(0.6).filled())),
    )?;
    chart
        .draw_series(LineSeries::new(vec![(lo, lo), (hi, hi)], RED.stroke_width(1)))?
        .label("y = x")
        .legend(legend_line(RED));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

fn draw_rolling(area: &Area, a: &MetricAnalysis) -> Result<(), PlotError> {
    let window = stats::rolling_window(a.before.len());
    let (before, after) = if window > 1 {
        (
            stats::rolling_mean(&a.before.values, window),
            stats::rolling_mean(&a.after.values, window),
        )
    } else {
        (Vec::new(), Vec::new())
    };

    let n = a.before.len().max(a.after.len()).max(1) as f64;
    let (y_lo, y_hi) = if before.is_empty() && after.is_empty() {
        padded(bounds([a.before_stats.mean, a.after_stats.mean].iter()))
    } else {
        padded(bounds(before.iter().chain(&after)))
    };

    let mut chart = ChartBuilder::on(area)
        .caption("Rolling means", ("sans-serif", 18))
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(55)
        .build_cartesian_2d(0.0..n, y_lo..y_hi)?;

    chart
        .configure_mesh()
        .x_desc("Index")
        .y_desc(a.metric.ylabel.as_str())
        .draw()?;

    if before.is_empty() && after.is_empty() {
        for (mean, color, label) in [
            (a.before_stats.mean, BEFORE_COLOR, "Mean before"),
            (a.after_stats.mean, AFTER_COLOR, "Mean after"),
        ] {
            chart
                .draw_series(LineSeries::new(vec![(0.0, mean), (n, mean)], color.stroke_width(2)))?
                .label(label)
                .legend(legend_line(color));
        }
    } else {
        for (values, color, label) in [
            (&before, BEFORE_COLOR, "Before"),
            (&after, AFTER_COLOR, "After"),
        ] {
            chart
                .draw_series(LineSeries::new(
                    values.iter().enumerate().map(|(i, &v)| (i as f64, v)),
                    color.stroke_width(1),
                ))?
                .label(format!("Rolling mean {label} (window={window})"))
                .legend(legend_line(color));
        }
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

/// Render grouped bars of means and standard deviations across metrics.
pub fn render_summary(path: &Path, rows: &[SummaryRow]) -> Result<(), PlotError> {
    let root = SVGBackend::new(path, (1600, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((1, 2));

    draw_grouped_bars(
        &panels[0],
        rows,
        "Mean per metric",
        "Mean value",
        |r| (r.mean_before, r.mean_after),
    )?;
    draw_grouped_bars(
        &panels[1],
        rows,
        "Variability per metric",
        "Standard deviation",
        |r| (r.std_before, r.std_after),
    )?;

    root.present()?;
    Ok(())
}

fn draw_grouped_bars(
    area: &Area,
    rows: &[SummaryRow],
    caption: &str,
    y_desc: &str,
    pick: impl Fn(&SummaryRow) -> (f64, f64),
) -> Result<(), PlotError> {
    let pairs: Vec<(f64, f64)> = rows.iter().map(pick).collect();
    let lo = pairs.iter().flat_map(|&(b, a)| [b, a]).fold(0.0, f64::min);
    let hi = pairs.iter().flat_map(|&(b, a)| [b, a]).fold(0.0, f64::max);
    let (lo, hi) = if hi - lo > 0.0 {
        (lo * 1.15, hi * 1.15)
    } else {
        (lo, lo + 1.0)
    };
    let n = rows.len().max(1) as f64;

    let mut chart = ChartBuilder::on(area)
        .caption(caption, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(20)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..n, lo..hi)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_label_formatter(&|_| String::new())
        .y_desc(y_desc)
        .draw()?;

    chart
        .draw_series(pairs.iter().enumerate().map(|(i, &(b, _))| {
            let x = i as f64;
            Rectangle::new([(x + 0.15, 0.0), (x + 0.5, b)], BEFORE_COLOR.mix(0.7).filled())
        }))?
        .label("Before")
        .legend(legend_box(BEFORE_COLOR));
    chart
        .draw_series(pairs.iter().enumerate().map(|(i, &(_, a))| {
            let x = i as f64;
            Rectangle::new([(x + 0.5, 0.0), (x + 0.85, a)], AFTER_COLOR.mix(0.7).filled())
        }))?
        .label("After")
        .legend(legend_box(AFTER_COLOR));
    chart.draw_series(
        rows.iter()
            .enumerate()
            .map(|(i, r)| Text::new(r.label.clone(), (i as f64 + 0.15, hi), ("sans-serif", 13).into_font())),
    )?;

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

/// Errors from chart rendering.
#[derive(Debug)]
pub enum PlotError {
    Draw(String),
    Stats(StatsError),
}

impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for PlotError {
    fn from(e: DrawingAreaErrorKind<E>) -> Self {
        PlotError::Draw(e.to_string())
    }
}

impl From<StatsError> for PlotError {
    fn from(e: StatsError) -> Self {
        PlotError::Stats(e)
    }
}

impl std::fmt::Display for PlotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlotError::Draw(msg) => write!(f, "failed to draw chart: {msg}"),
            PlotError::Stats(e) => write!(f, "cannot chart series: {e}"),
        }
    }
}

impl std::error::Error for PlotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlotError::Draw(_) => None,
            PlotError::Stats(e) => Some(e),
        }
    }
}
