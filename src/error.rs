//! Error taxonomy shared by every plotting call.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlotError>;

/// Failures that abort a plotting call. No partial figure is ever returned.
#[derive(Debug, Error)]
pub enum PlotError {
    #[error("quantile {0} is not among the configured model quantiles")]
    QuantileNotConfigured(f64),
    #[error("weights of {0} are not scalar")]
    NotScalar(String),
    #[error("unexpected weight shape: {0}")]
    WeightShape(String),
    #[error("column '{0}' is missing from the forecast table")]
    MissingColumn(String),
    #[error("column '{column}' holds non-numeric value '{value}'")]
    InvalidValue { column: String, value: String },
    #[error("column '{name}' has {actual} rows, expected {expected}")]
    ColumnLength {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("no normalization parameters for series '{0}'")]
    UnknownSeries(String),
    #[error("model has no component named '{0}'")]
    UnknownComponent(String),
    #[error("nothing to plot: {0}")]
    EmptyData(String),
    #[error("invalid theme: {0}")]
    InvalidTheme(String),
    #[error("invalid timestamp '{0}'")]
    Time(String),
    #[error("failed to render figure: {0}")]
    Backend(String),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Wraps a drawing-backend error whose type only promises `Debug`.
pub(crate) fn backend_error<E: std::fmt::Debug>(err: E) -> PlotError {
    PlotError::Backend(format!("{err:?}"))
}
