//! Static SVG rendering with plotters: panels stacked evenly, one chart each.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use itertools::Itertools;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::FontFamily;

use super::RenderBackend;
use crate::error::{Result, backend_error};
use crate::figure::{AxisKind, AxisPoint, Figure, Fill, Mark, Panel, RangeMode, Symbol, TickFormat, Trace, XValues};
use crate::model::days_since_epoch;
use crate::theme::{Rgba, Theme};

const CHART_MARGIN: u32 = 8;
const X_LABEL_AREA: u32 = 34;
const Y_LABEL_AREA: u32 = 56;
const VALUE_PADDING: f64 = 0.05;
const DEFAULT_BAR_FILL: f64 = 0.8;
const DATE_LABEL_FORMAT: &str = "%Y-%m-%d";

#[derive(Clone, Copy, Debug, Default)]
pub struct SvgBackend;

/// Rendered SVG document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaticFigure {
    pub svg: String,
    pub width: u32,
    pub height: u32,
}

impl StaticFigure {
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, &self.svg)?;
        Ok(())
    }
}

impl RenderBackend for SvgBackend {
    type Output = StaticFigure;

    fn render(&self, figure: &Figure) -> Result<StaticFigure> {
        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, (figure.width, figure.height)).into_drawing_area();
            root.fill(&WHITE).map_err(backend_error)?;
            let areas = root.split_evenly((figure.panels.len().max(1), 1));
            for (panel, area) in figure.panels.iter().zip(&areas) {
                draw_panel(area, panel, &figure.theme)?;
            }
            root.present().map_err(backend_error)?;
        }
        Ok(StaticFigure {
            svg,
            width: figure.width,
            height: figure.height,
        })
    }
}

fn color(color: Rgba, opacity: f64) -> RGBAColor {
    RGBAColor(color.r, color.g, color.b, color.a * opacity)
}

/// Position of every x value on a numeric axis: days for dates, indices for categories.
fn x_positions(x: &XValues) -> Vec<f64> {
    match x {
        XValues::Dates(dates) => dates.iter().map(|date| days_since_epoch(*date)).collect(),
        XValues::Numbers(values) => values.clone(),
        XValues::Categories(names) => (0..names.len()).map(|idx| idx as f64).collect(),
    }
}

fn axis_position(point: AxisPoint) -> f64 {
    match point {
        AxisPoint::Date(date) => days_since_epoch(date),
        AxisPoint::Number(value) => value,
    }
}

fn date_at(days: f64) -> NaiveDateTime {
    DateTime::<Utc>::UNIX_EPOCH.naive_utc() + Duration::milliseconds((days * 86_400_000.0).round() as i64)
}

/// Bounds widened when empty or degenerate.
fn widen(bounds: Option<(f64, f64)>, padding: f64) -> (f64, f64) {
    match bounds {
        None => (0.0, 1.0),
        Some((lower, upper)) if (upper - lower).abs() < f64::EPSILON => (lower - 1.0, upper + 1.0),
        Some((lower, upper)) => {
            let margin = (upper - lower) * padding;
            (lower - margin, upper + margin)
        }
    }
}

fn default_bar_width(positions: &[f64]) -> f64 {
    positions
        .iter()
        .tuple_windows()
        .map(|(a, b)| (b - a).abs())
        .filter(|gap| *gap > 0.0)
        .min_by(f64::total_cmp)
        .map_or(DEFAULT_BAR_FILL, |gap| gap * DEFAULT_BAR_FILL)
}

fn x_label(panel: &Panel, categories: &[String], value: f64) -> String {
    match panel.x.kind {
        AxisKind::Date => {
            let format = match &panel.x.tick_format {
                TickFormat::Time(format) => format.as_str(),
                _ => DATE_LABEL_FORMAT,
            };
            date_at(value).format(format).to_string()
        }
        AxisKind::Category => {
            let rounded = value.round();
            if (value - rounded).abs() < 1e-6 && rounded >= 0.0 {
                categories.get(rounded as usize).cloned().unwrap_or_default()
            } else {
                String::new()
            }
        }
        AxisKind::Linear => panel
            .x
            .ticks
            .iter()
            .find(|tick| matches!(tick.at, AxisPoint::Number(at) if (at - value).abs() < 1e-6))
            .map_or_else(|| format!("{value:.2}"), |tick| tick.label.clone()),
    }
}

fn y_label(panel: &Panel, value: f64) -> String {
    match panel.y.tick_format {
        TickFormat::Percent => format!("{:.1}%", value * 100.0),
        _ => format!("{value:.2}"),
    }
}

fn draw_panel<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, panel: &Panel, theme: &Theme) -> Result<()> {
    let categories = panel
        .traces
        .iter()
        .find_map(|trace| match &trace.x {
            XValues::Categories(names) => Some(names.clone()),
            _ => None,
        })
        .unwrap_or_default();

    let x_bounds = panel
        .x
        .range
        .map(|(lower, upper)| (axis_position(lower), axis_position(upper)))
        .or_else(|| {
            panel
                .traces
                .iter()
                .flat_map(|trace| x_positions(&trace.x))
                .minmax()
                .into_option()
        });
    let (x_min, x_max) = match (panel.x.kind, x_bounds) {
        (AxisKind::Category, Some((lower, upper))) => (lower - 0.5, upper + 0.5),
        (_, Some(bounds)) if panel.x.range.is_some() => bounds,
        (_, bounds) => widen(bounds, VALUE_PADDING),
    };

    let include_zero = panel.y.range_mode == RangeMode::ToZero
        || panel
            .traces
            .iter()
            .any(|trace| matches!(trace.mark, Mark::Bar { .. } | Mark::Line { fill: Some(Fill::ToZero), .. }));
    let y_bounds = panel
        .traces
        .iter()
        .flat_map(Trace::finite_values)
        .chain(include_zero.then_some(0.0))
        .minmax()
        .into_option();
    let (y_min, y_max) = widen(y_bounds, VALUE_PADDING);

    let font = theme.font_size as f64;
    let mut chart = ChartBuilder::on(area)
        .margin(CHART_MARGIN)
        .x_label_area_size(X_LABEL_AREA)
        .y_label_area_size(Y_LABEL_AREA)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(backend_error)?;

    let x_formatter = |value: &f64| x_label(panel, &categories, *value);
    let y_formatter = |value: &f64| y_label(panel, *value);
    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc(panel.x.title.as_str())
        .y_desc(panel.y.title.as_str())
        .x_label_formatter(&x_formatter)
        .y_label_formatter(&y_formatter)
        .axis_style(color(theme.actual, 1.0).stroke_width(theme.axis_line_width.round() as u32))
        .label_style((FontFamily::SansSerif, font))
        .axis_desc_style((FontFamily::SansSerif, theme.title_font_size as f64))
        .draw()
        .map_err(backend_error)?;

    let mut previous: Option<Vec<(f64, f64)>> = None;
    for trace in &panel.traces {
        let positions = x_positions(&trace.x);
        let points = positions
            .iter()
            .zip(&trace.y)
            .filter_map(|(x, y)| y.filter(|value| value.is_finite()).map(|value| (*x, value)))
            .collect_vec();
        let stroke = color(trace.color, trace.opacity);

        match trace.mark {
            Mark::Line { width, fill, .. } => {
                let fill_color = color(trace.fill_color.unwrap_or(trace.color), trace.opacity);
                match (fill, &previous) {
                    (Some(Fill::ToZero), _) => {
                        chart
                            .draw_series(
                                AreaSeries::new(points.iter().copied(), 0.0, fill_color.filled())
                                    .border_style(stroke.stroke_width(width.round() as u32)),
                            )
                            .map_err(backend_error)?;
                    }
                    (Some(Fill::ToPrevious), Some(lower)) => {
                        let polygon = points.iter().copied().chain(lower.iter().rev().copied()).collect_vec();
                        chart
                            .draw_series(std::iter::once(Polygon::new(polygon, fill_color.filled())))
                            .map_err(backend_error)?;
                    }
                    _ => {}
                }
                // Gaps split the line instead of bridging missing values.
                let segments = positions
                    .iter()
                    .zip(&trace.y)
                    .chunk_by(|(_, y)| y.is_some_and(f64::is_finite));
                for (present, segment) in &segments {
                    if !present {
                        continue;
                    }
                    let segment = segment.filter_map(|(x, y)| y.map(|value| (*x, value))).collect_vec();
                    chart
                        .draw_series(LineSeries::new(segment, stroke.stroke_width(width.round().max(1.0) as u32)))
                        .map_err(backend_error)?;
                }
            }
            Mark::Bar { width } => {
                let bar_width = width.unwrap_or_else(|| default_bar_width(&positions));
                let half = bar_width / 2.0;
                chart
                    .draw_series(points.iter().map(|(x, y)| {
                        Rectangle::new([(x - half, 0.0_f64.min(*y)), (x + half, 0.0_f64.max(*y))], stroke.filled())
                    }))
                    .map_err(backend_error)?;
            }
            Mark::Markers { symbol, size } => {
                let size = size.round().max(1.0) as i32;
                match symbol {
                    Symbol::Circle => chart
                        .draw_series(points.iter().map(|point| Circle::new(*point, size, stroke.filled())))
                        .map_err(backend_error)?,
                    Symbol::Cross => chart
                        .draw_series(points.iter().map(|point| Cross::new(*point, size, stroke.stroke_width(1))))
                        .map_err(backend_error)?,
                };
            }
        }
        previous = Some(points);
    }
    Ok(())
}
