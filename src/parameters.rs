//! Panels of the parameter view: what the model learned, not what it predicted.

use chrono::{Duration, NaiveDateTime};
use itertools::Itertools;
use tracing::debug;

use crate::components::{AggregateGroup, Component, LaggedInput};
use crate::error::{PlotError, Result};
use crate::figure::{AxisKind, AxisSpec, Mark, Panel, TickFormat, Trace, XValues};
use crate::model::{ForecastModel, Mode};
use crate::normalization::SeriesSelection;
use crate::panels::date_axis;
use crate::season::{self, CycleShape, QueryPath};
use crate::theme::Theme;

/// Divisor turning the training span into a changepoint bar width.
const TREND_CHANGE_WIDTH_DIVISOR: f64 = 175_000.0;
const WEIGHT_BAR_WIDTH: f64 = 0.8;
const RELEVANCE_BAR_WIDTH: f64 = 1.0;
const LONG_LABELS: usize = 100;
const LABEL_ANGLE: f64 = 20.0;

/// Everything a parameter panel needs, resolved once per plotting call.
#[derive(Clone, Copy)]
pub struct ParameterContext<'a> {
    pub model: &'a dyn ForecastModel,
    pub series: &'a SeriesSelection,
    pub quantile_index: usize,
    pub focus: Option<usize>,
    /// Days to rotate the weekly cycle by.
    pub weekly_start: i64,
    /// Days to rotate the yearly cycle by.
    pub yearly_start: i64,
    pub theme: &'a Theme,
}

impl ParameterContext<'_> {
    pub fn panel(&self, component: &Component) -> Result<Panel> {
        match component {
            Component::Trend => self.trend(),
            Component::TrendRateChange => self.trend_change(),
            Component::Seasonality { name, mode } => self.seasonality(name, *mode, &component.title()),
            Component::LaggedWeights { input, focus } => self.lagged_weights(input, *focus),
            Component::Aggregate { group, mode } => self.scalar_weights(*group, *mode, &component.title()),
            other => Err(PlotError::UnknownComponent(other.title())),
        }
    }

    fn line(&self) -> Mark {
        Mark::Line {
            width: self.theme.line_width,
            smooth: false,
            fill: None,
        }
    }

    /// Trend over the training window; two points suffice without changepoints.
    pub fn trend(&self) -> Result<Panel> {
        let config = self.model.config();
        let data = config.normalization.data_params(self.series)?;
        let (start, end) = (data.ds.start(), data.ds.end());
        let dates = if config.trend.n_changepoints() == 0 {
            vec![start, end]
        } else {
            date_range(start, end, config.data_freq_seconds)
        };
        let values = self.model.predict_trend(&dates, self.series, self.quantile_index)?;

        let mut panel = Panel::new("Trend", date_axis("ds", &dates, self.theme), AxisSpec::titled("Trend"));
        panel.traces.push(Trace::new(
            "Trend",
            XValues::Dates(dates),
            values.into_iter().map(Some).collect(),
            self.line(),
            self.theme.parameter,
        ));
        Ok(panel)
    }

    /// Slope change at every changepoint, closed by a zero bar at the end of training.
    pub fn trend_change(&self) -> Result<Panel> {
        let config = self.model.config();
        let data = config.normalization.data_params(self.series)?;
        let series_index = config.trend_series_index(self.series)?;
        let deltas = self.model.trend_deltas(self.quantile_index, series_index)?;
        let changepoints = &config.trend.changepoints;
        if deltas.len() != changepoints.len() {
            return Err(PlotError::WeightShape(format!(
                "trend: {} deltas for {} changepoints",
                deltas.len(),
                changepoints.len()
            )));
        }

        let dates = changepoints
            .iter()
            .map(|cp| data.ds.at(*cp))
            .chain(std::iter::once(data.ds.end()))
            .collect_vec();
        let values = deltas.into_iter().chain(std::iter::once(0.0)).map(Some).collect();
        let width_days = data.ds.scale_seconds / TREND_CHANGE_WIDTH_DIVISOR / changepoints.len().max(1) as f64;
        debug!(changepoints = changepoints.len(), width_days, "Trend rate change bars");

        let title = "Trend Rate Change";
        let mut panel = Panel::new(title, date_axis("Trend Segment", &dates, self.theme), AxisSpec::titled(title));
        panel.traces.push(Trace::new(
            title,
            XValues::Dates(dates),
            values,
            Mark::Bar {
                width: Some(width_days),
            },
            self.theme.parameter,
        ));
        Ok(panel)
    }

    /// One period of a seasonality on a fixed axis layout.
    pub fn seasonality(&self, name: &str, mode: Mode, title: &str) -> Result<Panel> {
        let config = self.model.config().seasonality(name)?;
        let shape = CycleShape::classify(name, config.period);
        let evaluate = |dates: &[NaiveDateTime]| {
            season::evaluate(self.model, name, dates, self.series, self.quantile_index, QueryPath::Quick)
        };

        let (x, values, x_axis) = match shape {
            CycleShape::Weekly => {
                let samples = season::weekly_samples(self.weekly_start)?;
                let values = evaluate(&samples.dates)?;
                let axis = AxisSpec::titled("Day of week").ticks(samples.ticks);
                (XValues::Numbers(index_positions(values.len())), values, axis)
            }
            CycleShape::Yearly => {
                let samples = season::yearly_samples(self.yearly_start)?;
                let values = evaluate(&samples.dates)?;
                let axis = AxisSpec::titled("Day of year")
                    .kind(AxisKind::Date)
                    .tick_format(TickFormat::Time("%B %-d".to_string()))
                    .ticks(samples.ticks);
                (XValues::Dates(samples.dates), values, axis)
            }
            CycleShape::Daily => {
                let samples = season::daily_samples()?;
                let values = evaluate(&samples.dates)?;
                let axis = AxisSpec::titled("Hour of day").ticks(samples.ticks);
                (XValues::Numbers(index_positions(values.len())), values, axis)
            }
            CycleShape::Custom => {
                let positions = season::custom_positions();
                let t_days = positions.iter().map(|position| position * config.period).collect_vec();
                let raw = self
                    .model
                    .predict_season_at(&t_days, name, self.series, self.quantile_index)?;
                let values = season::rescale(self.model, raw, self.series)?;
                let axis = AxisSpec::titled(format!("One period: {name}"));
                (XValues::Numbers(positions), values, axis)
            }
        };

        let y_title = format!("Seasonality: {name}");
        let mut panel = Panel::new(title, x_axis, AxisSpec::titled(&y_title));
        panel.multiplicative = mode == Mode::Multiplicative;
        panel.traces.push(Trace::new(
            y_title,
            x,
            values.into_iter().map(Some).collect(),
            self.line(),
            self.theme.parameter,
        ));
        Ok(panel)
    }

    /// Weight per lag: one forecast step when focused, otherwise relevance summed over steps.
    pub fn lagged_weights(&self, input: &LaggedInput, focus: Option<usize>) -> Result<Panel> {
        let weights = match input {
            LaggedInput::Ar => self.model.ar_weights()?,
            LaggedInput::Regressor(name) => self.model.covariate_weights(name)?,
            LaggedInput::Residual => return Err(PlotError::UnknownComponent(input.label())),
        };
        let label = input.label();
        let n_lags = weights.first().map_or(0, Vec::len);
        if n_lags == 0 {
            return Err(PlotError::EmptyData(label));
        }
        if weights.iter().any(|row| row.len() != n_lags) {
            return Err(PlotError::WeightShape(format!("{label}: ragged weight rows")));
        }
        let lags = (1..=n_lags).rev().map(|lag| lag as f64).collect_vec();

        let (values, width, y_title, percent) = match focus {
            None => (relevance(&weights), RELEVANCE_BAR_WIDTH, format!("{label} relevance"), true),
            Some(ahead) => {
                let row = ahead
                    .checked_sub(1)
                    .and_then(|idx| weights.get(idx))
                    .ok_or_else(|| PlotError::WeightShape(format!("{label}: no forecast step {ahead}")))?;
                (row.clone(), WEIGHT_BAR_WIDTH, format!("{label} weight ({ahead})-ahead"), false)
            }
        };

        let mut panel = Panel::new(
            &label,
            AxisSpec::titled(format!("{label} lag number")),
            AxisSpec::titled(y_title),
        );
        panel.multiplicative = percent;
        panel.traces.push(Trace::new(
            &label,
            XValues::Numbers(lags),
            values.into_iter().map(Some).collect(),
            Mark::Bar { width: Some(width) },
            self.theme.parameter,
        ));
        Ok(panel)
    }

    /// One bar per event, holiday or regressor of a group.
    pub fn scalar_weights(&self, group: AggregateGroup, mode: Option<Mode>, title: &str) -> Result<Panel> {
        let weights = self.collect_scalar_weights(group, mode)?;
        if weights.is_empty() {
            return Err(PlotError::EmptyData(title.to_string()));
        }
        let (names, values): (Vec<String>, Vec<f64>) = weights.into_iter().unzip();

        let mut x_axis = AxisSpec::titled(format!("{title} name")).kind(AxisKind::Category);
        if names.join("_").len() > LONG_LABELS {
            x_axis.tick_angle = Some(LABEL_ANGLE);
        }
        let y_title = match (group, self.focus) {
            (AggregateGroup::LaggedScalarRegressors, None) => format!("{title} weight (avg)"),
            (AggregateGroup::LaggedScalarRegressors, Some(ahead)) => format!("{title} weight ({ahead})-ahead"),
            _ => format!("{title} weight"),
        };

        let mut panel = Panel::new(title, x_axis, AxisSpec::titled(y_title));
        panel.multiplicative = mode == Some(Mode::Multiplicative);
        panel.traces.push(Trace::new(
            title,
            XValues::Categories(names),
            values.into_iter().map(Some).collect(),
            Mark::Bar {
                width: Some(WEIGHT_BAR_WIDTH),
            },
            self.theme.parameter,
        ));
        Ok(panel)
    }

    fn collect_scalar_weights(&self, group: AggregateGroup, mode: Option<Mode>) -> Result<Vec<(String, f64)>> {
        let config = self.model.config();
        let mut weights = Vec::new();
        match group {
            AggregateGroup::LaggedScalarRegressors => {
                for regressor in config.lagged_regressors.iter().filter(|lagged| lagged.as_scalar) {
                    let vector = squeeze(&regressor.name, self.model.covariate_weights(&regressor.name)?)?;
                    weights.push((regressor.name.clone(), reduce(&regressor.name, &vector, self.focus)?));
                }
            }
            AggregateGroup::Events => {
                let scale = match mode {
                    Some(Mode::Additive) => config.normalization.data_params(self.series)?.y.scale,
                    _ => 1.0,
                };
                let holidays = config
                    .country_holidays
                    .iter()
                    .filter(|holidays| Some(holidays.mode) == mode)
                    .flat_map(|holidays| holidays.holiday_names.iter());
                let events = config
                    .events
                    .iter()
                    .filter(|event| Some(event.mode) == mode)
                    .map(|event| &event.name);
                for name in events.chain(holidays) {
                    for (window, vector) in self.model.event_weights(name, self.quantile_index)? {
                        let weight = reduce(&window, &vector, self.focus)? * scale;
                        weights.push((window, weight));
                    }
                }
            }
            AggregateGroup::FutureRegressors => {
                for regressor in config.regressors.iter().filter(|regressor| Some(regressor.mode) == mode) {
                    let vector = self.model.regressor_weights(&regressor.name, self.quantile_index)?;
                    weights.push((regressor.name.clone(), reduce(&regressor.name, &vector, self.focus)?));
                }
            }
        }
        Ok(weights)
    }
}

/// Timestamps from `start` to `end` inclusive, `step_seconds` apart.
pub fn date_range(start: NaiveDateTime, end: NaiveDateTime, step_seconds: i64) -> Vec<NaiveDateTime> {
    if step_seconds <= 0 || end < start {
        return vec![start];
    }
    let step = Duration::seconds(step_seconds);
    std::iter::successors(Some(start), |current| Some(*current + step))
        .take_while(|current| *current <= end)
        .collect()
}

/// Share of each lag in the summed absolute weights of all forecast steps.
pub fn relevance(weights: &[Vec<f64>]) -> Vec<f64> {
    let n_lags = weights.first().map_or(0, Vec::len);
    let sums = (0..n_lags)
        .map(|lag| weights.iter().map(|row| row[lag].abs()).sum::<f64>())
        .collect_vec();
    let total: f64 = sums.iter().sum();
    if total == 0.0 {
        return sums;
    }
    sums.into_iter().map(|sum| sum / total).collect()
}

/// Collapses a `[step][lag]` matrix with at most one non-trivial dimension to a vector.
fn squeeze(name: &str, rows: Vec<Vec<f64>>) -> Result<Vec<f64>> {
    let width = rows.first().map_or(0, Vec::len);
    if rows.len() > 1 && width > 1 {
        return Err(PlotError::NotScalar(name.to_string()));
    }
    Ok(rows.into_iter().flatten().collect())
}

/// A single weight: the focused step, or the mean over steps.
fn reduce(name: &str, values: &[f64], focus: Option<usize>) -> Result<f64> {
    match (values, focus) {
        ([], _) => Err(PlotError::WeightShape(format!("{name}: no weights"))),
        ([single], _) => Ok(*single),
        (values, Some(ahead)) => ahead
            .checked_sub(1)
            .and_then(|idx| values.get(idx))
            .copied()
            .ok_or_else(|| PlotError::WeightShape(format!("{name}: no forecast step {ahead}"))),
        (values, None) => Ok(values.iter().sum::<f64>() / values.len() as f64),
    }
}

fn index_positions(count: usize) -> Vec<f64> {
    (0..count).map(|idx| idx as f64).collect()
}
