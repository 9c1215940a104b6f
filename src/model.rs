//! The fitted forecasting model as seen by the plotting code.
//!
//! Plotting never fits anything: it reads the structural configuration and learned
//! parameters through [`ForecastModel`] and asks it for trend and seasonal values at
//! synthesized timestamps. [`ModelSnapshot`] is a JSON export of a fitted model that
//! implements the trait.

use std::collections::BTreeMap;
use std::f64::consts::TAU;
use std::fs;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use itertools::Itertools;
use serde::Deserialize;

use crate::error::{PlotError, Result};
use crate::normalization::{NormalizationConfig, SeriesSelection};

const QUANTILE_TOLERANCE: f64 = 1e-9;
const SECONDS_PER_DAY: f64 = 86_400.0;
const DEFAULT_DATA_FREQ_SECONDS: i64 = 86_400;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Additive,
    Multiplicative,
}

impl Mode {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Additive => "Additive",
            Self::Multiplicative => "Multiplicative",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Growth {
    Off,
    #[default]
    Linear,
}

/// Whether trend parameters are shared by all series or learned per series.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendScope {
    #[default]
    Global,
    Local,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TrendConfig {
    #[serde(default)]
    pub growth: Growth,
    /// Changepoint positions in normalized time, ascending.
    #[serde(default)]
    pub changepoints: Vec<f64>,
    #[serde(default)]
    pub scope: TrendScope,
}

impl TrendConfig {
    pub fn n_changepoints(&self) -> usize {
        self.changepoints.len()
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SeasonalityConfig {
    pub name: String,
    /// Period length in days.
    pub period: f64,
    /// Fourier order.
    pub resolution: usize,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SeasonalityGroup {
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub periods: Vec<SeasonalityConfig>,
}

impl SeasonalityGroup {
    pub fn get(&self, name: &str) -> Option<&SeasonalityConfig> {
        self.periods.iter().find(|season| season.name == name)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct LaggedRegressorConfig {
    pub name: String,
    /// Scalar regressors collapse into one weight bar instead of a per-lag panel.
    #[serde(default)]
    pub as_scalar: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RegressorConfig {
    pub name: String,
    #[serde(default)]
    pub mode: Mode,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EventConfig {
    pub name: String,
    #[serde(default)]
    pub mode: Mode,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CountryHolidaysConfig {
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub holiday_names: Vec<String>,
}

/// Structural configuration of a fitted model.
#[derive(Clone, Debug, Deserialize)]
pub struct ModelConfig {
    /// First entry is the point forecast; the rest are uncertainty levels.
    #[serde(default = "default_quantiles")]
    pub quantiles: Vec<f64>,
    #[serde(default = "default_n_forecasts")]
    pub n_forecasts: usize,
    #[serde(default)]
    pub n_lags: usize,
    #[serde(default = "default_data_freq_seconds")]
    pub data_freq_seconds: i64,
    #[serde(default)]
    pub trend: TrendConfig,
    #[serde(default)]
    pub seasonality: Option<SeasonalityGroup>,
    #[serde(default)]
    pub lagged_regressors: Vec<LaggedRegressorConfig>,
    #[serde(default)]
    pub regressors: Vec<RegressorConfig>,
    #[serde(default)]
    pub events: Vec<EventConfig>,
    #[serde(default)]
    pub country_holidays: Option<CountryHolidaysConfig>,
    /// Series identifiers in the order their local parameters are stored.
    #[serde(default)]
    pub series_ids: Vec<String>,
    pub normalization: NormalizationConfig,
}

fn default_quantiles() -> Vec<f64> {
    vec![0.5]
}

const fn default_n_forecasts() -> usize {
    1
}

const fn default_data_freq_seconds() -> i64 {
    DEFAULT_DATA_FREQ_SECONDS
}

impl ModelConfig {
    /// Position of a quantile level in the configured set.
    pub fn quantile_index(&self, quantile: f64) -> Result<usize> {
        self.quantiles
            .iter()
            .position(|level| (level - quantile).abs() < QUANTILE_TOLERANCE)
            .ok_or(PlotError::QuantileNotConfigured(quantile))
    }

    pub const fn has_uncertainty(&self) -> bool {
        self.quantiles.len() > 1
    }

    pub fn seasonalities(&self) -> &[SeasonalityConfig] {
        self.seasonality
            .as_ref()
            .map_or(&[], |group| group.periods.as_slice())
    }

    pub fn seasonality_mode(&self) -> Mode {
        self.seasonality
            .as_ref()
            .map_or(Mode::Additive, |group| group.mode)
    }

    pub fn seasonality(&self, name: &str) -> Result<&SeasonalityConfig> {
        self.seasonality
            .as_ref()
            .and_then(|group| group.get(name))
            .ok_or_else(|| PlotError::UnknownComponent(name.to_string()))
    }

    /// Index into per-series trend parameters. Global trends always read slot 0.
    pub fn trend_series_index(&self, series: &SeriesSelection) -> Result<usize> {
        if self.trend.scope == TrendScope::Global {
            return Ok(0);
        }
        self.series_ids
            .iter()
            .position(|id| *id == series.name)
            .ok_or_else(|| PlotError::UnknownSeries(series.name.clone()))
    }
}

/// Read-only view of a fitted model.
///
/// Weight accessors return values in normalized units, indexed `[quantile]` or
/// `[forecast step][lag]`. Prediction queries return values in original units unless
/// noted otherwise.
pub trait ForecastModel {
    fn config(&self) -> &ModelConfig;

    fn bias(&self, quantile_index: usize) -> Result<f64>;

    /// Initial trend slope.
    fn trend_k0(&self, quantile_index: usize, series_index: usize) -> Result<f64>;

    /// Slope changes at each configured changepoint.
    fn trend_deltas(&self, quantile_index: usize, series_index: usize) -> Result<Vec<f64>>;

    /// Autoregression weights, `[forecast step][lag]`.
    fn ar_weights(&self) -> Result<Vec<Vec<f64>>>;

    /// Lagged-regressor weights, `[forecast step][lag]`.
    fn covariate_weights(&self, name: &str) -> Result<Vec<Vec<f64>>>;

    /// Future-regressor weights for one quantile.
    fn regressor_weights(&self, name: &str, quantile_index: usize) -> Result<Vec<f64>>;

    /// Weights of one event (or country holiday), keyed by the event window column.
    fn event_weights(&self, name: &str, quantile_index: usize) -> Result<Vec<(String, Vec<f64>)>>;

    /// Trend at the given timestamps.
    fn predict_trend(
        &self,
        dates: &[NaiveDateTime],
        series: &SeriesSelection,
        quantile_index: usize,
    ) -> Result<Vec<f64>>;

    /// Raw seasonal contribution in model units, before any target rescaling.
    fn predict_season_from_dates(
        &self,
        dates: &[NaiveDateTime],
        name: &str,
        series: &SeriesSelection,
        quantile_index: usize,
    ) -> Result<Vec<f64>>;

    /// Raw seasonal contribution at points `t` of one period, with `t` in days.
    fn predict_season_at(
        &self,
        t_days: &[f64],
        name: &str,
        series: &SeriesSelection,
        quantile_index: usize,
    ) -> Result<Vec<f64>>;

    /// Every configured seasonality at the given timestamps, in original units.
    fn predict_seasonal_components(
        &self,
        dates: &[NaiveDateTime],
        series: &SeriesSelection,
        quantile_index: usize,
    ) -> Result<BTreeMap<String, Vec<f64>>>;
}

/// Learned parameters of a [`ModelSnapshot`].
#[derive(Clone, Debug, Default, Deserialize)]
pub struct LearnedParams {
    /// `[quantile]`
    pub bias: Vec<f64>,
    /// `[quantile][series]`
    #[serde(default)]
    pub trend_k0: Vec<Vec<f64>>,
    /// `[quantile][series][changepoint]`
    #[serde(default)]
    pub trend_deltas: Vec<Vec<Vec<f64>>>,
    /// Seasonality name → `[quantile][2 * resolution]`, sine terms first.
    #[serde(default)]
    pub seasonality: BTreeMap<String, Vec<Vec<f64>>>,
    #[serde(default)]
    pub ar_weights: Vec<Vec<f64>>,
    #[serde(default)]
    pub covariate_weights: BTreeMap<String, Vec<Vec<f64>>>,
    /// Regressor name → `[quantile][dims]`.
    #[serde(default)]
    pub regressor_weights: BTreeMap<String, Vec<Vec<f64>>>,
    /// Event name → window column → `[quantile][dims]`.
    #[serde(default)]
    pub event_weights: BTreeMap<String, BTreeMap<String, Vec<Vec<f64>>>>,
}

/// JSON export of a fitted model: configuration, normalization and learned parameters.
#[derive(Clone, Debug, Deserialize)]
pub struct ModelSnapshot {
    pub config: ModelConfig,
    pub params: LearnedParams,
}

impl ModelSnapshot {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    fn season_weights(&self, name: &str, quantile_index: usize) -> Result<&[f64]> {
        let config = self.config.seasonality(name)?;
        let weights = self
            .params
            .seasonality
            .get(name)
            .ok_or_else(|| PlotError::UnknownComponent(name.to_string()))?;
        let row = pick(weights, quantile_index, name)?;
        if row.len() != 2 * config.resolution {
            return Err(PlotError::WeightShape(format!(
                "{name}: expected {} Fourier weights, found {}",
                2 * config.resolution,
                row.len()
            )));
        }
        Ok(row)
    }
}

fn pick<'a, T>(rows: &'a [T], index: usize, what: &str) -> Result<&'a T> {
    rows.get(index)
        .ok_or_else(|| PlotError::WeightShape(format!("{what}: no entry at index {index}")))
}

impl ForecastModel for ModelSnapshot {
    fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn bias(&self, quantile_index: usize) -> Result<f64> {
        pick(&self.params.bias, quantile_index, "bias").copied()
    }

    fn trend_k0(&self, quantile_index: usize, series_index: usize) -> Result<f64> {
        let per_series = pick(&self.params.trend_k0, quantile_index, "trend_k0")?;
        pick(per_series, series_index, "trend_k0").copied()
    }

    fn trend_deltas(&self, quantile_index: usize, series_index: usize) -> Result<Vec<f64>> {
        if self.config.trend.n_changepoints() == 0 {
            return Ok(Vec::new());
        }
        let per_series = pick(&self.params.trend_deltas, quantile_index, "trend_deltas")?;
        let deltas = pick(per_series, series_index, "trend_deltas")?;
        if deltas.len() != self.config.trend.n_changepoints() {
            return Err(PlotError::WeightShape(format!(
                "trend_deltas: expected {} values, found {}",
                self.config.trend.n_changepoints(),
                deltas.len()
            )));
        }
        Ok(deltas.clone())
    }

    fn ar_weights(&self) -> Result<Vec<Vec<f64>>> {
        if self.params.ar_weights.is_empty() {
            return Err(PlotError::UnknownComponent("ar".to_string()));
        }
        Ok(self.params.ar_weights.clone())
    }

    fn covariate_weights(&self, name: &str) -> Result<Vec<Vec<f64>>> {
        self.params
            .covariate_weights
            .get(name)
            .cloned()
            .ok_or_else(|| PlotError::UnknownComponent(name.to_string()))
    }

    fn regressor_weights(&self, name: &str, quantile_index: usize) -> Result<Vec<f64>> {
        let weights = self
            .params
            .regressor_weights
            .get(name)
            .ok_or_else(|| PlotError::UnknownComponent(name.to_string()))?;
        pick(weights, quantile_index, name).cloned()
    }

    fn event_weights(&self, name: &str, quantile_index: usize) -> Result<Vec<(String, Vec<f64>)>> {
        let windows = self
            .params
            .event_weights
            .get(name)
            .ok_or_else(|| PlotError::UnknownComponent(name.to_string()))?;
        windows
            .iter()
            .map(|(key, weights)| Ok((key.clone(), pick(weights, quantile_index, key)?.clone())))
            .collect()
    }

    fn predict_trend(
        &self,
        dates: &[NaiveDateTime],
        series: &SeriesSelection,
        quantile_index: usize,
    ) -> Result<Vec<f64>> {
        let data = self.config.normalization.data_params(series)?;
        let bias = self.bias(quantile_index)?;
        if self.config.trend.growth == Growth::Off {
            return Ok(vec![data.y.denormalize(bias); dates.len()]);
        }
        let series_index = self.config.trend_series_index(series)?;
        let k0 = self.trend_k0(quantile_index, series_index)?;
        let deltas = self.trend_deltas(quantile_index, series_index)?;
        let changepoints = &self.config.trend.changepoints;
        Ok(dates
            .iter()
            .map(|date| {
                let t = data.ds.normalize(*date);
                let bends: f64 = changepoints
                    .iter()
                    .zip(&deltas)
                    .map(|(cp, delta)| delta * (t - cp).max(0.0))
                    .sum();
                data.y.denormalize(k0.mul_add(t, bias) + bends)
            })
            .collect())
    }

    fn predict_season_from_dates(
        &self,
        dates: &[NaiveDateTime],
        name: &str,
        series: &SeriesSelection,
        quantile_index: usize,
    ) -> Result<Vec<f64>> {
        let t_days = dates.iter().map(|date| days_since_epoch(*date)).collect_vec();
        self.predict_season_at(&t_days, name, series, quantile_index)
    }

    fn predict_season_at(
        &self,
        t_days: &[f64],
        name: &str,
        _series: &SeriesSelection,
        quantile_index: usize,
    ) -> Result<Vec<f64>> {
        let config = self.config.seasonality(name)?;
        let weights = self.season_weights(name, quantile_index)?;
        Ok(fourier_features(t_days, config.period, config.resolution)
            .iter()
            .map(|features| features.iter().zip(weights).map(|(f, w)| f * w).sum())
            .collect())
    }

    fn predict_seasonal_components(
        &self,
        dates: &[NaiveDateTime],
        series: &SeriesSelection,
        quantile_index: usize,
    ) -> Result<BTreeMap<String, Vec<f64>>> {
        let scale = match self.config.seasonality_mode() {
            Mode::Additive => self.config.normalization.data_params(series)?.y.scale,
            Mode::Multiplicative => 1.0,
        };
        self.config
            .seasonalities()
            .iter()
            .map(|season| {
                let raw = self.predict_season_from_dates(dates, &season.name, series, quantile_index)?;
                Ok((
                    season.name.clone(),
                    raw.into_iter().map(|value| value * scale).collect(),
                ))
            })
            .collect()
    }
}

/// Fractional days since the Unix epoch.
pub fn days_since_epoch(date: NaiveDateTime) -> f64 {
    (date - DateTime::<Utc>::UNIX_EPOCH.naive_utc()).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY
}

/// Fourier basis for each time point: `order` sine terms followed by `order` cosine terms.
pub fn fourier_features(t_days: &[f64], period: f64, order: usize) -> Vec<Vec<f64>> {
    t_days
        .iter()
        .map(|t| {
            let angles = (1..=order)
                .map(|k| TAU * k as f64 * t / period)
                .collect_vec();
            angles
                .iter()
                .map(|angle| angle.sin())
                .chain(angles.iter().map(|angle| angle.cos()))
                .collect()
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    pub(crate) fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, 0, 0))
            .expect("valid date")
    }

    /// Small model used across the crate's tests: weekly + yearly additive seasonality,
    /// two changepoints, AR with three lags, one lagged and one future regressor, one event.
    pub(crate) fn sample_snapshot() -> ModelSnapshot {
        let raw = json!({
            "config": {
                "quantiles": [0.5, 0.1, 0.9],
                "n_forecasts": 3,
                "n_lags": 3,
                "trend": { "growth": "linear", "changepoints": [0.25, 0.5] },
                "seasonality": {
                    "mode": "additive",
                    "periods": [
                        { "name": "yearly", "period": 365.25, "resolution": 2 },
                        { "name": "weekly", "period": 7.0, "resolution": 1 }
                    ]
                },
                "lagged_regressors": [
                    { "name": "temp" },
                    { "name": "rain", "as_scalar": true }
                ],
                "regressors": [ { "name": "price", "mode": "multiplicative" } ],
                "events": [ { "name": "xmas" } ],
                "normalization": {
                    "global_params": {
                        "ds": { "shift": "2022-01-01T00:00:00", "scale_seconds": 8640000.0 },
                        "y": { "shift": 10.0, "scale": 2.0 }
                    }
                }
            },
            "params": {
                "bias": [0.1, 0.0, 0.2],
                "trend_k0": [[1.0], [0.9], [1.1]],
                "trend_deltas": [[[0.5, -1.0]], [[0.4, -0.9]], [[0.6, -1.1]]],
                "seasonality": {
                    "yearly": [[0.1, 0.2, 0.3, 0.4], [0.0, 0.0, 0.0, 0.0], [0.0, 0.0, 0.0, 0.0]],
                    "weekly": [[0.5, -0.5], [0.0, 0.0], [0.0, 0.0]]
                },
                "ar_weights": [[0.3, -0.2, 0.1], [0.2, 0.1, 0.0], [0.1, 0.0, -0.1]],
                "covariate_weights": {
                    "temp": [[0.2, 0.4, -0.4], [0.1, 0.1, 0.1], [0.0, 0.3, 0.3]],
                    "rain": [[0.7], [0.5], [0.3]]
                },
                "regressor_weights": { "price": [[0.25], [0.2], [0.3]] },
                "event_weights": {
                    "xmas": { "event_xmas": [[1.5], [1.0], [2.0]] }
                }
            }
        });
        serde_json::from_value(raw).expect("valid snapshot")
    }

    #[test]
    fn snapshot_defaults_fill_optional_fields() {
        let snapshot = ModelSnapshot::from_json_str(
            r#"{"config": {"normalization": {"global_params": {
                "ds": {"shift": "2022-01-01T00:00:00", "scale_seconds": 86400.0},
                "y": {"shift": 0.0, "scale": 1.0}}}},
               "params": {"bias": [0.0]}}"#,
        )
        .expect("parsed");
        assert_eq!(snapshot.config.quantiles, vec![0.5]);
        assert_eq!(snapshot.config.n_forecasts, 1);
        assert!(snapshot.config.normalization.global_normalization);
        assert!(snapshot.config.seasonalities().is_empty());
    }

    #[test]
    fn quantile_lookup_rejects_unknown_levels() {
        let snapshot = sample_snapshot();
        assert_eq!(snapshot.config.quantile_index(0.9).expect("configured"), 2);
        assert!(matches!(
            snapshot.config.quantile_index(0.3),
            Err(PlotError::QuantileNotConfigured(_))
        ));
    }

    #[test]
    fn trend_bends_at_changepoints() {
        let snapshot = sample_snapshot();
        let series = SeriesSelection::global();
        // Normalized time 0, 0.5 and 1.0 of a 100-day span.
        let dates = [at(2022, 1, 1, 0), at(2022, 2, 20, 0), at(2022, 4, 11, 0)];
        let trend = snapshot.predict_trend(&dates, &series, 0).expect("trend");
        let expected = [0.1, 0.1 + 0.5 + 0.5 * 0.25, 0.1 + 1.0 + 0.5 * 0.75 - 0.5];
        for (value, norm) in trend.iter().zip(expected) {
            assert!((value - (norm * 2.0 + 10.0)).abs() < 1e-9);
        }
    }

    #[test]
    fn fourier_features_put_sines_before_cosines() {
        let features = fourier_features(&[1.75], 7.0, 2);
        assert_eq!(features[0].len(), 4);
        assert!((features[0][0] - 1.0).abs() < 1e-12);
        assert!(features[0][2].abs() < 1e-12);
        assert!((features[0][3] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn seasonal_components_scale_additive_output() {
        let snapshot = sample_snapshot();
        let series = SeriesSelection::global();
        let dates = [at(2017, 1, 1, 0), at(2017, 1, 2, 6)];
        let raw = snapshot
            .predict_season_from_dates(&dates, "weekly", &series, 0)
            .expect("raw");
        let full = snapshot
            .predict_seasonal_components(&dates, &series, 0)
            .expect("components");
        for (scaled, raw) in full["weekly"].iter().zip(raw) {
            assert!((scaled - raw * 2.0).abs() < 1e-12);
        }
    }

    #[test]
    fn mismatched_fourier_weights_are_rejected() {
        let mut snapshot = sample_snapshot();
        snapshot
            .params
            .seasonality
            .insert("weekly".to_string(), vec![vec![0.1]]);
        let err = snapshot
            .predict_season_from_dates(&[at(2017, 1, 1, 0)], "weekly", &SeriesSelection::global(), 0)
            .unwrap_err();
        assert!(matches!(err, PlotError::WeightShape(_)));
    }
}
