//! Per-component panels of the forecast-component view.

use chrono::NaiveDateTime;
use itertools::Itertools;

use crate::components::LaggedInput;
use crate::constants::COLUMN_TREND;
use crate::error::{PlotError, Result};
use crate::figure::{AxisKind, AxisPoint, AxisSpec, Fill, Mark, Panel, RangeMode, TickFormat, Trace, XValues};
use crate::model::ForecastModel;
use crate::normalization::SeriesSelection;
use crate::season::{self, QueryPath};
use crate::table::{ForecastTable, yhat_column};
use crate::theme::{Rgba, Theme};

const X_TITLE: &str = "ds";

/// Rolling mean centred on each point, clipped at the edges.
///
/// The window spans `window / 2` points before and `(window - 1) / 2` after each index;
/// points with fewer than `min_periods` values in reach yield `None`.
pub fn centered_rolling_mean(values: &[f64], window: usize, min_periods: usize) -> Vec<Option<f64>> {
    if window == 0 || values.is_empty() {
        return vec![None; values.len()];
    }
    let before = window / 2;
    let after = (window - 1) / 2;

    values
        .iter()
        .enumerate()
        .map(|(idx, _)| {
            let start = idx.saturating_sub(before);
            let end = (idx + after).min(values.len() - 1);
            let count = end - start + 1;
            if count < min_periods {
                None
            } else {
                let sum: f64 = values[start..=end].iter().copied().sum();
                Some(sum / count as f64)
            }
        })
        .collect()
}

/// Date range widened by `padding` of its span on both sides.
pub fn padded_date_range(ds: &[NaiveDateTime], padding: f64) -> Option<(AxisPoint, AxisPoint)> {
    let (first, last) = ds.iter().minmax().into_option()?;
    let span_ms = (*last - *first).num_milliseconds() as f64;
    let margin = chrono::Duration::milliseconds((span_ms * padding).round() as i64);
    Some((AxisPoint::Date(*first - margin), AxisPoint::Date(*last + margin)))
}

pub fn date_axis(title: &str, ds: &[NaiveDateTime], theme: &Theme) -> AxisSpec {
    let axis = AxisSpec::titled(title).kind(AxisKind::Date);
    match padded_date_range(ds, theme.axis_padding) {
        Some((lower, upper)) => axis.range(lower, upper),
        None => axis,
    }
}

/// How a single column is drawn.
#[derive(Clone, Debug)]
pub struct SeriesStyle {
    pub title: String,
    pub trace_name: String,
    pub bar: bool,
    /// Band around the point forecast, filled down to zero.
    pub fill: bool,
    pub residual: bool,
    pub range_mode: RangeMode,
    pub multiplicative: bool,
    pub rolling: Option<usize>,
    /// Line colour; the theme's prediction colour when unset.
    pub color: Option<Rgba>,
}

impl SeriesStyle {
    pub fn line(title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            trace_name: title.clone(),
            title,
            bar: false,
            fill: false,
            residual: false,
            range_mode: RangeMode::ToZero,
            multiplicative: false,
            rolling: None,
            color: None,
        }
    }
}

/// Panel of one column: absent rows dropped, optional rolling underlay.
///
/// The underlay smooths the raw values; only the main trace sees a residual's zeroed tail.
pub fn series_panel(
    ds: &[NaiveDateTime],
    values: &[Option<f64>],
    style: &SeriesStyle,
    theme: &Theme,
) -> Panel {
    let (dates, mut y): (Vec<NaiveDateTime>, Vec<f64>) = ds
        .iter()
        .zip(values)
        .filter_map(|(date, value)| value.map(|value| (*date, value)))
        .unzip();
    let smoothed = style.rolling.map(|window| centered_rolling_mean(&y, window, 1));
    if style.residual
        && let Some(last) = y.last_mut()
    {
        *last = 0.0;
    }
    let color = style.color.unwrap_or(theme.prediction);

    let x_axis = date_axis(X_TITLE, &dates, theme);
    let y_axis = AxisSpec::titled(&style.title).range_mode(style.range_mode);
    let mut panel = Panel::new(&style.title, x_axis, y_axis);
    panel.multiplicative = style.multiplicative;

    let mark = if style.bar {
        Mark::Bar { width: None }
    } else {
        Mark::Line {
            width: theme.line_width,
            smooth: false,
            fill: None,
        }
    };

    if let Some(smoothed) = smoothed {
        panel.traces.push(
            Trace::new(&style.title, XValues::Dates(dates.clone()), smoothed, mark, color)
                .opacity(theme.rolling_opacity),
        );
    }

    let y = y.into_iter().map(Some).collect_vec();
    let trace = if style.fill {
        Trace::new(
            &style.trace_name,
            XValues::Dates(dates),
            y,
            Mark::Line {
                width: theme.band_line_width,
                smooth: false,
                fill: Some(Fill::ToZero),
            },
            theme.band,
        )
        .fill_color(theme.band)
        .legend(true)
    } else {
        Trace::new(&style.trace_name, XValues::Dates(dates), y, mark, color)
    };
    panel.traces.push(trace);
    panel
}

/// Trend panel; recomputed from the model when the table carries no `trend` column.
pub fn trend_panel(
    table: &ForecastTable,
    model: &dyn ForecastModel,
    series: &SeriesSelection,
    quantile_index: usize,
    rolling: Option<usize>,
    theme: &Theme,
) -> Result<Panel> {
    let values = match table.column(COLUMN_TREND) {
        Some(values) => values.to_vec(),
        None => model
            .predict_trend(table.ds(), series, quantile_index)?
            .into_iter()
            .map(Some)
            .collect(),
    };
    let mut style = SeriesStyle::line("Trend");
    style.range_mode = RangeMode::Auto;
    style.rolling = rolling;
    style.color = Some(theme.trend);
    Ok(series_panel(table.ds(), &values, &style, theme))
}

/// Quantile prediction minus the point prediction of the same horizon, as a band from zero.
pub fn uncertainty_panel(
    table: &ForecastTable,
    column: &str,
    horizon: usize,
    title: &str,
    theme: &Theme,
) -> Result<Panel> {
    let quantile = table.require(column)?;
    let point = table.require(&yhat_column(horizon))?;
    let distance = uncertainty_distance(quantile, point);
    let mut style = SeriesStyle::line(title);
    style.trace_name = column.to_string();
    style.fill = true;
    Ok(series_panel(table.ds(), &distance, &style, theme))
}

/// Element-wise `quantile - point`. Rows without a quantile value stay absent; rows with
/// a quantile but no point prediction are absent too.
pub fn uncertainty_distance(quantile: &[Option<f64>], point: &[Option<f64>]) -> Vec<Option<f64>> {
    quantile
        .iter()
        .zip(point)
        .map(|(quantile, point)| Some((*quantile)? - (*point)?))
        .collect()
}

/// Horizons of a lagged input overplotted with fading opacity, deepest horizon first.
///
/// With `count == None`, or a `focus` beyond the first step, the column of the focused
/// step is drawn on top.
pub fn overlay_panel(
    table: &ForecastTable,
    input: &LaggedInput,
    count: Option<usize>,
    focus: usize,
    title: &str,
    bar: bool,
    theme: &Theme,
) -> Result<Panel> {
    let focus_column = input.column(focus);
    let rows = match count {
        Some(count) => {
            let first = table.require(&input.column(1))?;
            let last = table.require(&input.column(count))?;
            (0..table.len())
                .filter(|&idx| first[idx].is_some() || last[idx].is_some())
                .collect_vec()
        }
        None => {
            let focused = table.require(&focus_column)?;
            (0..table.len()).filter(|&idx| focused[idx].is_some()).collect_vec()
        }
    };
    if rows.is_empty() {
        return Err(PlotError::EmptyData(title.to_string()));
    }
    let dates = rows.iter().map(|&idx| table.ds()[idx]).collect_vec();

    let mark = if bar {
        Mark::Bar { width: None }
    } else {
        Mark::Line {
            width: theme.line_width,
            smooth: false,
            fill: None,
        }
    };
    let mut panel = Panel::new(
        title,
        date_axis(X_TITLE, &dates, theme),
        AxisSpec::titled(title).range_mode(RangeMode::ToZero),
    );

    if let Some(count) = count {
        for index in (0..count).rev() {
            let column = table.require(&input.column(index + 1))?;
            let mut y = rows.iter().map(|&idx| column[idx]).collect_vec();
            if input.is_residual()
                && let Some(last) = y.last_mut()
            {
                *last = Some(0.0);
            }
            panel.traces.push(
                Trace::new(title, XValues::Dates(dates.clone()), y, mark, theme.prediction)
                    .opacity(theme.overlay_alpha(index)),
            );
        }
    }

    if count.is_none() || focus > 1 {
        let column = table.require(&focus_column)?;
        let (x, mut y): (Vec<NaiveDateTime>, Vec<Option<f64>>) = rows
            .iter()
            .map(|&idx| (table.ds()[idx], column[idx]))
            .filter(|(_, value)| input.is_residual() || value.is_some())
            .unzip();
        if input.is_residual()
            && let Some(last) = y.last_mut()
        {
            *last = Some(0.0);
        }
        panel
            .traces
            .push(Trace::new(title, XValues::Dates(x), y, mark, theme.prediction));
    }
    Ok(panel)
}

/// One canonical period of a seasonality, drawn as a smooth line.
#[allow(clippy::too_many_arguments)]
pub fn seasonality_panel(
    model: &dyn ForecastModel,
    table: &ForecastTable,
    name: &str,
    title: &str,
    series: &SeriesSelection,
    quantile_index: usize,
    path: QueryPath,
    theme: &Theme,
) -> Result<Panel> {
    let period = model.config().seasonality(name)?.period;
    let cycle = season::season_cycle(model, table.ds(), name, series, quantile_index, path)?;
    let y_title = format!("Seasonality: {name}");
    let x_axis = date_axis(&season::cycle_axis_title(name), &cycle.dates, theme)
        .tick_format(TickFormat::Time(season::tick_format(period).to_string()));
    let mut panel = Panel::new(title, x_axis, AxisSpec::titled(&y_title));
    panel.multiplicative = model.config().seasonality_mode() == crate::model::Mode::Multiplicative;
    panel.traces.push(Trace::new(
        y_title,
        XValues::Dates(cycle.dates),
        cycle.values.into_iter().map(Some).collect(),
        Mark::Line {
            width: theme.line_width,
            smooth: true,
            fill: None,
        },
        theme.prediction,
    ));
    Ok(panel)
}
