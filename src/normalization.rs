//! Read-only lookup of the shift/scale pairs used to map normalized model outputs back
//! into original units.
//!
//! Unknown series are resolved once per plotting call into a [`SeriesSelection`] that
//! carries its own `allow_unknown` flag, so the model configuration is never mutated.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDateTime};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::constants::GLOBAL_SERIES;
use crate::error::{PlotError, Result};

/// Shift/scale of the time axis: `t = (ds - shift) / scale`.
#[derive(Clone, Debug, Deserialize)]
pub struct TimeParams {
    pub shift: NaiveDateTime,
    pub scale_seconds: f64,
}

impl TimeParams {
    pub fn start(&self) -> NaiveDateTime {
        self.shift
    }

    pub fn end(&self) -> NaiveDateTime {
        self.at(1.0)
    }

    /// Timestamp of a normalized time value.
    pub fn at(&self, t: f64) -> NaiveDateTime {
        self.shift + seconds(t * self.scale_seconds)
    }

    /// Normalized time of a timestamp.
    pub fn normalize(&self, ds: NaiveDateTime) -> f64 {
        let elapsed = (ds - self.shift).num_milliseconds() as f64 / 1000.0;
        if self.scale_seconds == 0.0 {
            0.0
        } else {
            elapsed / self.scale_seconds
        }
    }
}

/// Shift/scale of the target variable: `y = y_norm * scale + shift`.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct TargetParams {
    pub shift: f64,
    pub scale: f64,
}

impl TargetParams {
    pub fn denormalize(&self, value: f64) -> f64 {
        value.mul_add(self.scale, self.shift)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct DataParams {
    pub ds: TimeParams,
    pub y: TargetParams,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NormalizationConfig {
    #[serde(default = "default_true")]
    pub global_normalization: bool,
    #[serde(default)]
    pub unknown_data_normalization: bool,
    pub global_params: DataParams,
    #[serde(default)]
    pub local_params: BTreeMap<String, DataParams>,
}

const fn default_true() -> bool {
    true
}

/// Series whose normalization parameters a plotting call uses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeriesSelection {
    pub name: String,
    /// Permits falling back to the global parameters for this call only.
    pub allow_unknown: bool,
}

impl SeriesSelection {
    pub fn global() -> Self {
        Self {
            name: GLOBAL_SERIES.to_string(),
            allow_unknown: false,
        }
    }

    pub fn is_global(&self) -> bool {
        self.name == GLOBAL_SERIES
    }
}

impl NormalizationConfig {
    /// Decides which series a call should read, warning once when it has to fall back.
    pub fn resolve(&self, requested: Option<&str>) -> SeriesSelection {
        if self.global_normalization {
            if requested.is_some() {
                debug!("Global normalization set - ignoring given df_name for normalization");
            }
            return SeriesSelection::global();
        }

        match requested {
            None => {
                warn!("Local normalization set, but df_name is None. Using global data params instead.");
                self.fallback()
            }
            Some(name) if !self.local_params.contains_key(name) => {
                warn!(
                    df_name = name,
                    "Local normalization set, but df_name not found. Using global data params instead."
                );
                self.fallback()
            }
            Some(name) => {
                debug!(df_name = name, "Local normalization set, using series data params");
                SeriesSelection {
                    name: name.to_string(),
                    allow_unknown: false,
                }
            }
        }
    }

    fn fallback(&self) -> SeriesSelection {
        SeriesSelection {
            name: GLOBAL_SERIES.to_string(),
            allow_unknown: !self.unknown_data_normalization,
        }
    }

    /// Parameters for a resolved series.
    pub fn data_params(&self, selection: &SeriesSelection) -> Result<&DataParams> {
        if self.global_normalization {
            return Ok(&self.global_params);
        }
        if let Some(params) = self.local_params.get(&selection.name) {
            return Ok(params);
        }
        if selection.allow_unknown || self.unknown_data_normalization {
            return Ok(&self.global_params);
        }
        Err(PlotError::UnknownSeries(selection.name.clone()))
    }
}

fn seconds(value: f64) -> Duration {
    Duration::milliseconds((value * 1000.0).round() as i64)
}
