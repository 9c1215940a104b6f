//! Arranges prepared panels into figures.

use tracing::{debug, info};

use crate::constants::{COLUMN_Y, PREFIX_ORIGIN, PREFIX_YHAT};
use crate::error::{PlotError, Result};
use crate::figure::{AxisKind, AxisSpec, Figure, FigureKind, Fill, Mark, Panel, Symbol, TickFormat, Trace, XValues};
use crate::table::{ForecastTable, horizon_column, quantile_column, yhat_column};
use crate::theme::Theme;

/// One row per distinct panel name, in first-seen order.
///
/// Panels sharing a name are merged into one. Multiplicative panels get percent ticks
/// once the grid is assembled.
pub fn compose_grid(kind: FigureKind, panels: Vec<Panel>, theme: &Theme) -> Result<Figure> {
    if panels.is_empty() {
        return Err(PlotError::EmptyData("no panels to lay out".to_string()));
    }
    let mut merged: Vec<Panel> = Vec::with_capacity(panels.len());
    for panel in panels {
        match merged
            .iter_mut()
            .find(|existing| existing.name.to_lowercase() == panel.name.to_lowercase())
        {
            Some(existing) => {
                debug!(panel = %panel.name, "Merging into existing panel");
                existing.multiplicative |= panel.multiplicative;
                existing.traces.extend(panel.traces);
            }
            None => merged.push(panel),
        }
    }

    for panel in merged.iter_mut().filter(|panel| panel.multiplicative) {
        panel.y.tick_format = TickFormat::Percent;
    }

    let rows = u32::try_from(merged.len()).unwrap_or(u32::MAX);
    let show_legend = merged
        .iter()
        .flat_map(|panel| &panel.traces)
        .any(|trace| trace.show_legend);
    let figure = Figure {
        kind,
        width: theme.width,
        height: theme.panel_height.saturating_mul(rows),
        panels: merged,
        show_legend,
        theme: theme.clone(),
    };
    info!(
        kind = ?figure.kind,
        panels = figure.panels.len(),
        traces = figure.trace_count(),
        "Composed figure"
    );
    Ok(figure)
}

/// Options of the main forecast chart.
#[derive(Clone, Debug)]
pub struct ForecastOptions {
    pub xlabel: String,
    pub ylabel: String,
    /// Forecast step whose predictions get cross markers.
    pub highlight: Option<usize>,
    /// Draw one line per forecast origin (`origin-k` columns) instead of per step.
    pub line_per_origin: bool,
}

impl Default for ForecastOptions {
    fn default() -> Self {
        Self {
            xlabel: "ds".to_string(),
            ylabel: "y".to_string(),
            highlight: None,
            line_per_origin: false,
        }
    }
}

/// Number of prediction columns `{stem}{k}` with consecutive `k` from `first`.
fn prediction_columns(table: &ForecastTable, stem: &str, first: usize) -> usize {
    (first..)
        .take_while(|step| table.has_column(&horizon_column(stem, *step)))
        .count()
}

/// Actuals, predictions and quantile bands in a single chart.
pub fn compose_forecast(
    table: &ForecastTable,
    quantiles: &[f64],
    options: &ForecastOptions,
    theme: &Theme,
) -> Result<Figure> {
    if table.is_empty() {
        return Err(PlotError::EmptyData("forecast table has no rows".to_string()));
    }
    let (stem, first_step) = if options.line_per_origin {
        (PREFIX_ORIGIN, 0)
    } else {
        (PREFIX_YHAT, 1)
    };
    let columns = prediction_columns(table, stem, first_step);
    debug!(stem, columns, "Prediction columns");

    let dates = XValues::Dates(table.ds().to_vec());
    let mut traces = Vec::new();

    if options.highlight.is_none() || options.line_per_origin {
        for index in 0..columns {
            let column = horizon_column(stem, index + first_step);
            traces.push(
                Trace::new(
                    &column,
                    dates.clone(),
                    table.require(&column)?.to_vec(),
                    Mark::Line {
                        width: theme.line_width,
                        smooth: false,
                        fill: None,
                    },
                    theme.prediction,
                )
                .opacity(Theme::forecast_line_alpha(index))
                .legend(true),
            );
        }
    }

    let band_step = options.highlight.unwrap_or(first_step);
    for (position, quantile) in quantiles.iter().skip(1).enumerate() {
        let column = quantile_column(stem, band_step, *quantile);
        let fill = (position > 0).then_some(Fill::ToPrevious);
        traces.push(
            Trace::new(
                &column,
                dates.clone(),
                table.require(&column)?.to_vec(),
                Mark::Line {
                    width: theme.band_line_width,
                    smooth: false,
                    fill,
                },
                theme.band,
            )
            .fill_color(theme.band)
            .legend(true),
        );
    }

    let cross = Mark::Markers {
        symbol: Symbol::Cross,
        size: theme.marker_size,
    };
    if let Some(step) = options.highlight {
        if options.line_per_origin {
            traces.extend(origin_markers(table, step, columns, cross, theme)?);
        } else {
            let column = yhat_column(step);
            let values = table.require(&column)?.to_vec();
            traces.push(
                Trace::new(
                    "Predicted",
                    dates.clone(),
                    values.clone(),
                    Mark::Line {
                        width: theme.line_width,
                        smooth: false,
                        fill: None,
                    },
                    theme.prediction,
                )
                .legend(true),
            );
            traces.push(Trace::new("Predicted", dates.clone(), values, cross, theme.highlight).legend(true));
        }
    }

    traces.push(
        Trace::new(
            "Actual",
            dates,
            table.require(COLUMN_Y)?.to_vec(),
            Mark::Markers {
                symbol: Symbol::Circle,
                size: theme.marker_size,
            },
            theme.actual,
        )
        .legend(true),
    );

    let mut panel = Panel::new(
        "Forecast",
        AxisSpec::titled(&options.xlabel).kind(AxisKind::Date),
        AxisSpec::titled(&options.ylabel),
    );
    panel.traces = traces;
    Ok(Figure {
        kind: FigureKind::Forecast,
        width: theme.width,
        height: theme.panel_height,
        panels: vec![panel],
        show_legend: true,
        theme: theme.clone(),
    })
}

/// One cross per origin at the row where that origin predicted `step` ahead.
fn origin_markers(
    table: &ForecastTable,
    step: usize,
    origins: usize,
    mark: Mark,
    theme: &Theme,
) -> Result<Vec<Trace>> {
    let forecast_steps = table.count(&horizon_column(PREFIX_ORIGIN, 0));
    let Some(steps_from_last) = forecast_steps.checked_sub(step) else {
        return Err(PlotError::EmptyData(format!(
            "forecast step {step} exceeds the {forecast_steps} available steps"
        )));
    };
    (0..origins)
        .filter_map(|origin| {
            let back = 1 + origin + steps_from_last;
            let row = table.len().checked_sub(back)?;
            Some((origin, row))
        })
        .map(|(origin, row)| {
            let column = horizon_column(PREFIX_ORIGIN, origin);
            let value = table.require(&column)?[row];
            Ok(Trace::new(
                column,
                XValues::Dates(vec![table.ds()[row]]),
                vec![value],
                mark,
                theme.highlight,
            )
            .legend(true))
        })
        .collect()
}
