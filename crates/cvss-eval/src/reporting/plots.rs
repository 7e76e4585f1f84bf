//! SVG charts for the scorer and analyst.
//!
//! Rendering problems are reported as [`EvalError::Plot`] so callers can
//! record them and keep going.

use crate::error::{EvalError, Result};
use plotters::prelude::*;
use std::path::Path;

const CHART_SIZE: (u32, u32) = (1000, 700);
const HEATMAP_SIZE: (u32, u32) = (1100, 900);
const FONT: &str = "sans-serif";

fn plot_error(path: &Path, error: impl std::fmt::Display) -> EvalError {
    EvalError::Plot(format!("{}: {}", path.display(), error))
}

// ============================================================================
// Bar chart
// ============================================================================

/// Bar chart of category counts, each bar labelled with its share.
pub fn bar_chart(
    path: &Path,
    title: &str,
    x_desc: &str,
    categories: &[&str],
    counts: &[usize],
) -> Result<()> {
    draw_bar_chart(path, title, x_desc, categories, counts).map_err(|e| plot_error(path, e))
}

fn draw_bar_chart(
    path: &Path,
    title: &str,
    x_desc: &str,
    categories: &[&str],
    counts: &[usize],
) -> anyhow::Result<()> {
    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let total: usize = counts.iter().sum();
    let max = counts.iter().copied().max().unwrap_or(0);
    let y_max = ((max as f64) * 1.15).ceil().max(1.0) as u32;
    let segments = categories.len().max(1) as u32;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 28))
        .margin(15)
        .x_label_area_size(60)
        .y_label_area_size(70)
        .build_cartesian_2d((0u32..segments).into_segmented(), 0u32..y_max)?;

    let label_for = |value: &SegmentValue<u32>| match value {
        SegmentValue::CenterOf(idx) | SegmentValue::Exact(idx) => categories
            .get(*idx as usize)
            .map(|c| c.to_string())
            .unwrap_or_default(),
        SegmentValue::Last => String::new(),
    };

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(x_desc)
        .y_desc("Count")
        .x_label_formatter(&label_for)
        .draw()?;

    chart.draw_series(
        Histogram::vertical(&chart)
            .style(BLUE.mix(0.6).filled())
            .margin(10)
            .data(
                counts
                    .iter()
                    .enumerate()
                    .map(|(idx, count)| (idx as u32, *count as u32)),
            ),
    )?;

    if total > 0 {
        chart.draw_series(counts.iter().enumerate().filter(|(_, c)| **c > 0).map(
            |(idx, count)| {
                let share = *count as f64 / total as f64 * 100.0;
                Text::new(
                    format!("{share:.1}% ({count})"),
                    (SegmentValue::CenterOf(idx as u32), *count as u32),
                    (FONT, 14),
                )
            },
        ))?;
    }

    root.present()?;
    Ok(())
}

// ============================================================================
// Histogram
// ============================================================================

/// Split `values` into `bins` equal-width bins over their range.
///
/// Returns `(lower edge, width, counts)`; an empty input yields no bins.
pub fn bin_values(values: &[f64], bins: usize) -> Option<(f64, f64, Vec<usize>)> {
    if values.is_empty() || bins == 0 {
        return None;
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = if max > min { max - min } else { 1.0 };
    let width = span / bins as f64;

    let mut counts = vec![0usize; bins];
    for value in values {
        let idx = (((value - min) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    Some((min, width, counts))
}

/// Histogram with a dashed marker at the mean.
pub fn histogram_with_mean(
    path: &Path,
    title: &str,
    x_desc: &str,
    values: &[f64],
    bins: usize,
) -> Result<()> {
    draw_histogram(path, title, x_desc, values, bins).map_err(|e| plot_error(path, e))
}

fn draw_histogram(
    path: &Path,
    title: &str,
    x_desc: &str,
    values: &[f64],
    bins: usize,
) -> anyhow::Result<()> {
    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let Some((lower, width, counts)) = bin_values(values, bins) else {
        anyhow::bail!("no values to plot");
    };
    let upper = lower + width * counts.len() as f64;
    let y_max = (counts.iter().copied().max().unwrap_or(0) as f64 * 1.1).max(1.0);
    let mean = values.iter().sum::<f64>() / values.len() as f64;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 28))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(lower..upper, 0f64..y_max)?;

    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc("Frequency")
        .light_line_style(BLACK.mix(0.05))
        .draw()?;

    chart.draw_series(counts.iter().enumerate().map(|(idx, count)| {
        let x0 = lower + width * idx as f64;
        Rectangle::new(
            [(x0, 0.0), (x0 + width, *count as f64)],
            GREEN.mix(0.5).filled(),
        )
    }))?;

    chart
        .draw_series(DashedLineSeries::new(
            vec![(mean, 0.0), (mean, y_max)],
            8,
            4,
            RED.stroke_width(2),
        ))?
        .label(format!("Mean: {mean:.0} chars"))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED.stroke_width(2)));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

// ============================================================================
// Heatmap
// ============================================================================

/// Color scale of a heatmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeatmapScale {
    /// White to blue, scaled to the largest cell.
    Counts,
    /// Blue through white to red over `[0, 1]`.
    Unit,
}

/// Annotated grid. `cells[row][col]`; NaN cells are drawn grey.
pub fn heatmap(
    path: &Path,
    title: &str,
    row_labels: &[&str],
    col_labels: &[&str],
    cells: &[Vec<f64>],
    scale: HeatmapScale,
) -> Result<()> {
    draw_heatmap(path, title, row_labels, col_labels, cells, scale)
        .map_err(|e| plot_error(path, e))
}

fn heat_color(value: f64, max: f64, scale: HeatmapScale) -> RGBColor {
    if value.is_nan() {
        return RGBColor(200, 200, 200);
    }
    let lerp = |a: u8, b: u8, t: f64| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    match scale {
        HeatmapScale::Counts => {
            let t = if max > 0.0 { (value / max).clamp(0.0, 1.0) } else { 0.0 };
            RGBColor(lerp(247, 8, t), lerp(251, 48, t), lerp(255, 107, t))
        }
        HeatmapScale::Unit => {
            let t = value.clamp(0.0, 1.0);
            if t < 0.5 {
                let u = t / 0.5;
                RGBColor(lerp(59, 221, u), lerp(76, 221, u), lerp(192, 221, u))
            } else {
                let u = (t - 0.5) / 0.5;
                RGBColor(lerp(221, 180, u), lerp(221, 4, u), lerp(221, 38, u))
            }
        }
    }
}

fn draw_heatmap(
    path: &Path,
    title: &str,
    row_labels: &[&str],
    col_labels: &[&str],
    cells: &[Vec<f64>],
    scale: HeatmapScale,
) -> anyhow::Result<()> {
    let root = SVGBackend::new(path, HEATMAP_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let rows = row_labels.len().max(1) as u32;
    let cols = col_labels.len().max(1) as u32;
    let max = cells
        .iter()
        .flatten()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(0.0, f64::max);

    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 24))
        .margin(20)
        .x_label_area_size(80)
        .y_label_area_size(180)
        .build_cartesian_2d((0u32..cols).into_segmented(), (0u32..rows).into_segmented())?;

    // Row 0 is drawn at the top.
    let x_label = |value: &SegmentValue<u32>| match value {
        SegmentValue::CenterOf(idx) => col_labels
            .get(*idx as usize)
            .map(|c| c.to_string())
            .unwrap_or_default(),
        _ => String::new(),
    };
    let y_label = |value: &SegmentValue<u32>| match value {
        SegmentValue::CenterOf(idx) => rows
            .checked_sub(1 + *idx)
            .and_then(|flipped| row_labels.get(flipped as usize))
            .map(|c| c.to_string())
            .unwrap_or_default(),
        _ => String::new(),
    };

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("Predicted / Column")
        .x_label_formatter(&x_label)
        .y_label_formatter(&y_label)
        .draw()?;

    for (r, row) in cells.iter().enumerate() {
        let y = rows - 1 - r as u32;
        for (c, value) in row.iter().enumerate() {
            let x = c as u32;
            chart.draw_series(std::iter::once(Rectangle::new(
                [
                    (SegmentValue::Exact(x), SegmentValue::Exact(y)),
                    (SegmentValue::Exact(x + 1), SegmentValue::Exact(y + 1)),
                ],
                heat_color(*value, max, scale).filled(),
            )))?;

            let text = match scale {
                _ if value.is_nan() => "NaN".to_string(),
                HeatmapScale::Counts => format!("{}", *value as u64),
                HeatmapScale::Unit => format!("{value:.2}"),
            };
            chart.draw_series(std::iter::once(Text::new(
                text,
                (SegmentValue::CenterOf(x), SegmentValue::CenterOf(y)),
                (FONT, 16),
            )))?;
        }
    }

    root.present()?;
    Ok(())
}

// ============================================================================
// ROC curves
// ============================================================================

/// One labelled curve of `(false positive rate, true positive rate)` points.
#[derive(Debug, Clone)]
pub struct RocCurve {
    pub label: String,
    pub points: Vec<(f64, f64)>,
}

/// ROC curves plus the chance diagonal.
pub fn roc_chart(path: &Path, title: &str, curves: &[RocCurve]) -> Result<()> {
    draw_roc_chart(path, title, curves).map_err(|e| plot_error(path, e))
}

fn draw_roc_chart(path: &Path, title: &str, curves: &[RocCurve]) -> anyhow::Result<()> {
    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 24))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..1f64, 0f64..1.05f64)?;

    chart
        .configure_mesh()
        .x_desc("False Positive Rate")
        .y_desc("True Positive Rate")
        .draw()?;

    for (idx, curve) in curves.iter().enumerate() {
        let color = Palette99::pick(idx).to_rgba();
        chart
            .draw_series(LineSeries::new(curve.points.clone(), color.stroke_width(2)))?
            .label(curve.label.clone())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .draw_series(DashedLineSeries::new(
            vec![(0.0, 0.0), (1.0, 1.0)],
            6,
            4,
            BLACK.stroke_width(1),
        ))?
        .label("Chance")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_bin_values_covers_range() {
        let (lower, width, counts) = bin_values(&[0.0, 5.0, 10.0], 2).unwrap();
        assert_eq!(lower, 0.0);
        assert_eq!(width, 5.0);
        assert_eq!(counts, vec![1, 2]);
    }

    #[test]
    fn test_bin_values_constant_input() {
        let (_, _, counts) = bin_values(&[3.0, 3.0, 3.0], 50).unwrap();
        assert_eq!(counts.len(), 50);
        assert_eq!(counts[0], 3);
        assert_eq!(counts.iter().sum::<usize>(), 3);
    }

    #[test]
    fn test_bin_values_empty() {
        assert!(bin_values(&[], 50).is_none());
    }

    #[test]
    fn test_heat_color_nan_is_grey() {
        assert_eq!(
            heat_color(f64::NAN, 1.0, HeatmapScale::Unit),
            RGBColor(200, 200, 200)
        );
        assert_eq!(heat_color(0.0, 10.0, HeatmapScale::Counts), RGBColor(247, 251, 255));
    }

    #[test]
    fn test_bar_chart_writes_svg() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scope.svg");
        bar_chart(&path, "Scope Distribution", "Scope", &["UNCHANGED", "CHANGED"], &[3, 1])
            .unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn test_histogram_without_values_is_plot_error() {
        let dir = TempDir::new().unwrap();
        let err = histogram_with_mean(&dir.path().join("len.svg"), "t", "x", &[], 50).unwrap_err();
        assert_eq!(err.error_code(), "PLOT_ERROR");
    }
}
