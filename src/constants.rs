//! Shared column names and formatting constants, so strings are not repeated across modules.

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

pub const COLUMN_DS: &str = "ds";
pub const COLUMN_Y: &str = "y";
/// Series identifier; text, never plotted.
pub const COLUMN_ID: &str = "ID";
pub const COLUMN_TREND: &str = "trend";
pub const PREFIX_YHAT: &str = "yhat";
pub const PREFIX_ORIGIN: &str = "origin-";
pub const PREFIX_AR: &str = "ar";
pub const PREFIX_RESIDUAL: &str = "residual";
pub const PREFIX_LAGGED_REGRESSOR: &str = "lagged_regressor_";
pub const PREFIX_SEASON: &str = "season_";
pub const COLUMN_EVENTS_ADDITIVE: &str = "events_additive";
pub const COLUMN_EVENTS_MULTIPLICATIVE: &str = "events_multiplicative";
pub const COLUMN_FUTURE_REGRESSORS_ADDITIVE: &str = "future_regressors_additive";
pub const COLUMN_FUTURE_REGRESSORS_MULTIPLICATIVE: &str = "future_regressors_multiplicative";

/// Identifier of the global normalization parameters.
pub const GLOBAL_SERIES: &str = "__df__";

/// Canonical start of every synthesized seasonal cycle (a Sunday).
pub const SEASON_REFERENCE_DATE: (i32, u32, u32) = (2017, 1, 1);

pub const OVERLAY_ALPHA_MIN: f64 = 0.2;
pub const OVERLAY_ALPHA_SOFTNESS: f64 = 1.2;
