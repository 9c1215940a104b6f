//! Synthesizes one canonical period of a seasonality and asks the model for its shape.
//!
//! The cycle always starts at the same reference date so plots of different models line
//! up. Start offsets only move the sampled window; the model is queried with the actual
//! shifted timestamps.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, TimeDelta, Timelike};
use itertools::Itertools;
use tracing::debug;

use crate::constants::SEASON_REFERENCE_DATE;
use crate::error::{PlotError, Result};
use crate::figure::{AxisPoint, Tick};
use crate::model::{ForecastModel, Mode};
use crate::normalization::SeriesSelection;

const HOURS_PER_DAY: f64 = 24.0;
const WEEK_SAMPLES: usize = 7 * 24;
const YEAR_SAMPLES: usize = 365;
const DAY_SAMPLES: usize = 24 * 12;
const DAY_SAMPLE_MINUTES: i64 = 5;
const CUSTOM_STEPS: usize = 300;
const WEEKLY_PERIOD: f64 = 7.0;
const YEARLY_PERIOD: f64 = 365.25;
const DAILY_PERIOD: f64 = 1.0;

/// Finest timestamp component that varies in a forecast table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimePrecision {
    Day,
    Hour,
    Minute,
}

impl TimePrecision {
    pub fn detect(ds: &[NaiveDateTime]) -> Self {
        if ds.iter().all(|stamp| stamp.hour() == 0) {
            Self::Day
        } else if ds.iter().all(|stamp| stamp.minute() == 0) {
            Self::Hour
        } else {
            Self::Minute
        }
    }

    const fn points_per_day(self) -> f64 {
        match self {
            Self::Day => HOURS_PER_DAY,
            Self::Hour => HOURS_PER_DAY * 24.0,
            Self::Minute => HOURS_PER_DAY * 60.0,
        }
    }
}

/// How the model is asked for seasonal values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum QueryPath {
    /// Evaluate one seasonality directly.
    #[default]
    Quick,
    /// Evaluate every seasonality as a full prediction would, then pick one.
    Full,
}

pub fn reference_start() -> Result<NaiveDateTime> {
    let (year, month, day) = SEASON_REFERENCE_DATE;
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| PlotError::Time(format!("{year}-{month}-{day}")))
}

/// Reference start moved by `days`, with room for a cycle of `span_days` after it.
fn shifted_start(days: i64, span_days: i64) -> Result<NaiveDateTime> {
    let reference = reference_start()?;
    TimeDelta::try_days(days)
        .and_then(|offset| reference.checked_add_signed(offset))
        .filter(|start| {
            TimeDelta::try_days(span_days)
                .and_then(|span| start.checked_add_signed(span))
                .is_some()
        })
        .ok_or_else(|| PlotError::Time(format!("{reference} shifted by {days} days")))
}

/// Number of samples covering one period at the given precision.
pub fn plot_points(period_days: f64, precision: TimePrecision) -> usize {
    (period_days * precision.points_per_day()).floor().max(0.0) as usize
}

/// `count` evenly spaced timestamps over one period, end excluded.
pub fn canonical_dates(start: NaiveDateTime, period_days: f64, count: usize) -> Vec<NaiveDateTime> {
    if count == 0 {
        return Vec::new();
    }
    let span_ms = period_days * HOURS_PER_DAY * 3_600_000.0;
    let step = span_ms / count as f64;
    (0..count)
        .map(|idx| start + Duration::milliseconds((step * idx as f64).round() as i64))
        .collect()
}

/// Seasonal values in original units: additive output is rescaled by the target scale,
/// multiplicative output is already a ratio.
pub fn evaluate(
    model: &dyn ForecastModel,
    name: &str,
    dates: &[NaiveDateTime],
    series: &SeriesSelection,
    quantile_index: usize,
    path: QueryPath,
) -> Result<Vec<f64>> {
    match path {
        QueryPath::Quick => {
            let raw = model.predict_season_from_dates(dates, name, series, quantile_index)?;
            rescale(model, raw, series)
        }
        QueryPath::Full => model
            .predict_seasonal_components(dates, series, quantile_index)?
            .remove(name)
            .ok_or_else(|| PlotError::UnknownComponent(name.to_string())),
    }
}

pub(crate) fn rescale(model: &dyn ForecastModel, raw: Vec<f64>, series: &SeriesSelection) -> Result<Vec<f64>> {
    let config = model.config();
    match config.seasonality_mode() {
        Mode::Multiplicative => Ok(raw),
        Mode::Additive => {
            let scale = config.normalization.data_params(series)?.y.scale;
            Ok(raw.into_iter().map(|value| value * scale).collect())
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SeasonCycle {
    pub dates: Vec<NaiveDateTime>,
    pub values: Vec<f64>,
}

/// One period of a seasonality, sampled at a cadence matching the table's precision.
pub fn season_cycle(
    model: &dyn ForecastModel,
    table_ds: &[NaiveDateTime],
    name: &str,
    series: &SeriesSelection,
    quantile_index: usize,
    path: QueryPath,
) -> Result<SeasonCycle> {
    let period = model.config().seasonality(name)?.period;
    let precision = TimePrecision::detect(table_ds);
    let count = plot_points(period, precision);
    debug!(season = name, period, ?precision, count, "Sampling seasonal cycle");
    let dates = canonical_dates(reference_start()?, period, count);
    let values = evaluate(model, name, &dates, series, quantile_index, path)?;
    Ok(SeasonCycle { dates, values })
}

/// Date tick format for a cycle of the given length.
pub fn tick_format(period_days: f64) -> &'static str {
    if period_days <= 2.0 {
        "%H:%M"
    } else if period_days < 7.0 {
        "%A %H:%M"
    } else if period_days < 14.0 {
        "%A"
    } else {
        "%B"
    }
}

/// `weekly` → `Day of week`, other names are kept whole.
pub fn cycle_axis_title(name: &str) -> String {
    let unit = name.strip_suffix("ly").unwrap_or(name);
    format!("Day of {unit}")
}

/// Which fixed layout the parameter view uses for a seasonality.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleShape {
    Weekly,
    Yearly,
    Daily,
    Custom,
}

impl CycleShape {
    pub fn classify(name: &str, period: f64) -> Self {
        let lower = name.to_lowercase();
        let is = |reference: f64| (period - reference).abs() < f64::EPSILON;
        if lower == "weekly" || is(WEEKLY_PERIOD) {
            Self::Weekly
        } else if lower == "yearly" || is(YEARLY_PERIOD) {
            Self::Yearly
        } else if lower == "daily" || is(DAILY_PERIOD) {
            Self::Daily
        } else {
            Self::Custom
        }
    }
}

/// Sampled cycle on an index axis with its tick marks.
#[derive(Clone, Debug, PartialEq)]
pub struct CycleSamples {
    pub dates: Vec<NaiveDateTime>,
    pub ticks: Vec<Tick>,
}

/// 168 hourly samples starting `weekly_start` days after the reference Sunday.
pub fn weekly_samples(weekly_start: i64) -> Result<CycleSamples> {
    let start = shifted_start(weekly_start, 8)?;
    let dates = (0..WEEK_SAMPLES as i64)
        .map(|hour| start + Duration::hours(hour))
        .collect_vec();
    let ticks = (0..=7)
        .map(|day| Tick {
            at: AxisPoint::Number((day * 24) as f64),
            label: (start + Duration::days(day % 7)).format("%A").to_string(),
        })
        .collect();
    Ok(CycleSamples { dates, ticks })
}

/// 365 daily samples starting `yearly_start` days after January 1; ticks on the first of
/// every second month.
pub fn yearly_samples(yearly_start: i64) -> Result<CycleSamples> {
    let start = shifted_start(yearly_start, YEAR_SAMPLES as i64)?;
    let dates = (0..YEAR_SAMPLES as i64)
        .map(|day| start + Duration::days(day))
        .collect_vec();
    let ticks = dates
        .iter()
        .filter(|date| date.day() == 1 && date.month() % 2 == 1)
        .map(|date| Tick {
            at: AxisPoint::Date(*date),
            label: date.format("%B %-d").to_string(),
        })
        .collect();
    Ok(CycleSamples { dates, ticks })
}

/// 288 five-minute samples of the reference day; hour ticks every 12 samples.
pub fn daily_samples() -> Result<CycleSamples> {
    let start = reference_start()?;
    let dates = (0..DAY_SAMPLES as i64)
        .map(|step| start + Duration::minutes(step * DAY_SAMPLE_MINUTES))
        .collect_vec();
    let ticks = (0..=24)
        .map(|hour| Tick {
            at: AxisPoint::Number((hour * 12) as f64),
            label: hour.to_string(),
        })
        .collect();
    Ok(CycleSamples { dates, ticks })
}

/// Positions `0..=1` over one period of a custom seasonality.
pub fn custom_positions() -> Vec<f64> {
    (0..=CUSTOM_STEPS)
        .map(|step| step as f64 / CUSTOM_STEPS as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::{at, sample_snapshot};

    #[test]
    fn precision_follows_table_timestamps() {
        let daily = [at(2022, 1, 1, 0), at(2022, 1, 2, 0)];
        let hourly = [at(2022, 1, 1, 0), at(2022, 1, 1, 5)];
        let minutes = [hourly[0], hourly[1] + Duration::minutes(30)];
        assert_eq!(TimePrecision::detect(&daily), TimePrecision::Day);
        assert_eq!(TimePrecision::detect(&hourly), TimePrecision::Hour);
        assert_eq!(TimePrecision::detect(&minutes), TimePrecision::Minute);
        assert_eq!(plot_points(7.0, TimePrecision::Day), 168);
        assert_eq!(plot_points(365.25, TimePrecision::Day), 8766);
        assert_eq!(plot_points(1.0, TimePrecision::Hour), 576);
    }

    #[test]
    fn canonical_range_excludes_period_end() {
        let start = reference_start().expect("start");
        let dates = canonical_dates(start, 7.0, 168);
        assert_eq!(dates.len(), 168);
        assert_eq!(dates[0], start);
        assert_eq!(dates[167], start + Duration::hours(167));
    }

    #[test]
    fn quick_and_full_paths_agree() {
        let model = sample_snapshot();
        let series = SeriesSelection::global();
        let ds = [at(2022, 1, 1, 0), at(2022, 1, 2, 0)];
        for name in ["weekly", "yearly"] {
            let quick = season_cycle(&model, &ds, name, &series, 0, QueryPath::Quick).expect("quick");
            let full = season_cycle(&model, &ds, name, &series, 0, QueryPath::Full).expect("full");
            let period = model.config.seasonality(name).expect("season").period;
            assert_eq!(quick.values.len(), plot_points(period, TimePrecision::Day));
            assert_eq!(quick.dates, full.dates);
            for (left, right) in quick.values.iter().zip(&full.values) {
                assert!((left - right).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn tick_formats_depend_on_period() {
        assert_eq!(tick_format(1.0), "%H:%M");
        assert_eq!(tick_format(3.0), "%A %H:%M");
        assert_eq!(tick_format(7.0), "%A");
        assert_eq!(tick_format(365.25), "%B");
        assert_eq!(cycle_axis_title("weekly"), "Day of week");
        assert_eq!(cycle_axis_title("monthly"), "Day of month");
        assert_eq!(cycle_axis_title("quarter"), "Day of quarter");
    }

    #[test]
    fn weekly_start_rotates_labels() {
        let sunday = weekly_samples(0).expect("weekly");
        assert_eq!(sunday.dates.len(), 168);
        assert_eq!(sunday.ticks.len(), 8);
        assert_eq!(sunday.ticks[0].label, "Sunday");
        assert_eq!(sunday.ticks[7].label, "Sunday");
        let monday = weekly_samples(1).expect("weekly");
        assert_eq!(monday.ticks[0].label, "Monday");
        assert_eq!(monday.dates[0], sunday.dates[24]);
    }

    #[test]
    fn out_of_range_start_offsets_are_errors() {
        assert!(matches!(weekly_samples(10_000_000_000), Err(PlotError::Time(_))));
        assert!(matches!(weekly_samples(-10_000_000_000), Err(PlotError::Time(_))));
        assert!(matches!(yearly_samples(i64::MAX), Err(PlotError::Time(_))));
        assert!(yearly_samples(-400).is_ok());
    }

    #[test]
    fn yearly_ticks_every_second_month() {
        let samples = yearly_samples(0).expect("yearly");
        assert_eq!(samples.dates.len(), 365);
        let labels = samples.ticks.iter().map(|tick| tick.label.as_str()).collect_vec();
        assert_eq!(
            labels,
            vec!["January 1", "March 1", "May 1", "July 1", "September 1", "November 1"]
        );
    }

    #[test]
    fn daily_and_custom_sample_counts() {
        let daily = daily_samples().expect("daily");
        assert_eq!(daily.dates.len(), 288);
        assert_eq!(daily.ticks.last().map(|tick| tick.label.as_str()), Some("24"));
        let custom = custom_positions();
        assert_eq!(custom.len(), 301);
        assert_eq!(custom.last().copied(), Some(1.0));
        assert_eq!(CycleShape::classify("weekly", 3.0), CycleShape::Weekly);
        assert_eq!(CycleShape::classify("w", 7.0), CycleShape::Weekly);
        assert_eq!(CycleShape::classify("monthly", 30.5), CycleShape::Custom);
    }
}
