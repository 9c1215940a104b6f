//! Decides which panels a figure gets, in which order.
//!
//! Selection happens once per plotting call and yields [`Component`] values; renderers
//! dispatch on the variant, never on display names.

use tracing::debug;

use crate::constants::{
    COLUMN_EVENTS_ADDITIVE, COLUMN_EVENTS_MULTIPLICATIVE, COLUMN_FUTURE_REGRESSORS_ADDITIVE,
    COLUMN_FUTURE_REGRESSORS_MULTIPLICATIVE, COLUMN_TREND, PREFIX_AR, PREFIX_LAGGED_REGRESSOR,
    PREFIX_RESIDUAL, PREFIX_SEASON, PREFIX_YHAT,
};
use crate::model::{ModelConfig, Mode};
use crate::table::{ForecastTable, horizon_column, quantile_column};

/// Display name shared by every uncertainty band; they all land in one panel.
pub const UNCERTAINTY_PANEL: &str = "Uncertainty";

/// Multi-horizon inputs that have one column per forecast step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LaggedInput {
    Ar,
    Regressor(String),
    Residual,
}

impl LaggedInput {
    /// Column prefix before the horizon number.
    pub fn stem(&self) -> String {
        match self {
            Self::Ar => PREFIX_AR.to_string(),
            Self::Regressor(name) => format!("{PREFIX_LAGGED_REGRESSOR}{name}"),
            Self::Residual => PREFIX_RESIDUAL.to_string(),
        }
    }

    pub fn column(&self, horizon: usize) -> String {
        horizon_column(&self.stem(), horizon)
    }

    pub const fn is_residual(&self) -> bool {
        matches!(self, Self::Residual)
    }

    /// Name in the parameter view.
    pub fn label(&self) -> String {
        match self {
            Self::Ar => "AR".to_string(),
            Self::Regressor(name) => format!("Lagged Regressor \"{name}\""),
            Self::Residual => "Residuals".to_string(),
        }
    }

    fn overlay_title(&self) -> String {
        match self {
            Self::Ar => "Auto-Regression".to_string(),
            other => other.label(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregateGroup {
    Events,
    FutureRegressors,
    LaggedScalarRegressors,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Component {
    Trend,
    TrendRateChange,
    Seasonality {
        name: String,
        mode: Mode,
    },
    /// Every horizon of a lagged input overplotted with fading opacity.
    Overlay {
        input: LaggedInput,
        count: usize,
    },
    /// One forecast step of a lagged input.
    Horizon {
        input: LaggedInput,
        ahead: usize,
    },
    /// Per-lag weights of a lagged input (parameter view).
    LaggedWeights {
        input: LaggedInput,
        focus: Option<usize>,
    },
    /// Events or regressors folded into one column (forecast view) or one bar chart
    /// (parameter view). Lagged scalar regressors carry no mode.
    Aggregate {
        group: AggregateGroup,
        mode: Option<Mode>,
    },
    /// Distance between a quantile prediction and the point prediction.
    Uncertainty {
        quantile: f64,
        horizon: usize,
    },
}

impl Component {
    /// Display name; equal names share a panel.
    pub fn title(&self) -> String {
        match self {
            Self::Trend => "Trend".to_string(),
            Self::TrendRateChange => "Trend Rate Change".to_string(),
            Self::Seasonality { name, .. } => format!("{name} seasonality"),
            Self::Overlay { input, .. } => input.overlay_title(),
            Self::Horizon { input, ahead } => match input {
                LaggedInput::Ar => format!("AR ({ahead})-ahead"),
                other => format!("{} ({ahead})-ahead", other.label()),
            },
            Self::LaggedWeights { input, .. } => input.label(),
            Self::Aggregate { group, mode } => aggregate_title(*group, *mode),
            Self::Uncertainty { .. } => UNCERTAINTY_PANEL.to_string(),
        }
    }

    /// Column holding this component in a forecast table, when it has one.
    pub fn column(&self) -> Option<String> {
        match self {
            Self::Trend => Some(COLUMN_TREND.to_string()),
            Self::Seasonality { name, .. } => Some(format!("{PREFIX_SEASON}{name}")),
            Self::Horizon { input, ahead } => Some(input.column(*ahead)),
            Self::Aggregate { group, mode } => aggregate_column(*group, *mode).map(str::to_string),
            Self::Uncertainty { quantile, horizon } => {
                Some(quantile_column(PREFIX_YHAT, *horizon, *quantile))
            }
            Self::TrendRateChange | Self::Overlay { .. } | Self::LaggedWeights { .. } => None,
        }
    }

    /// Y values are ratios of the prediction.
    pub fn is_multiplicative(&self) -> bool {
        match self {
            Self::Seasonality { mode, .. } => *mode == Mode::Multiplicative,
            Self::Aggregate { mode, .. } => *mode == Some(Mode::Multiplicative),
            _ => false,
        }
    }

    /// Drawn as bars rather than lines.
    pub const fn is_bar(&self) -> bool {
        match self {
            Self::Overlay { .. } | Self::TrendRateChange | Self::LaggedWeights { .. } => true,
            Self::Horizon { input, .. } => input.is_residual(),
            _ => false,
        }
    }
}

fn aggregate_title(group: AggregateGroup, mode: Option<Mode>) -> String {
    let prefix = mode.map_or("", Mode::label);
    match group {
        AggregateGroup::Events => format!("{prefix} Events"),
        AggregateGroup::FutureRegressors => format!("{prefix} Future Regressors"),
        AggregateGroup::LaggedScalarRegressors => "Lagged Scalar Regressors".to_string(),
    }
}

fn aggregate_column(group: AggregateGroup, mode: Option<Mode>) -> Option<&'static str> {
    match (group, mode) {
        (AggregateGroup::Events, Some(Mode::Additive)) => Some(COLUMN_EVENTS_ADDITIVE),
        (AggregateGroup::Events, Some(Mode::Multiplicative)) => Some(COLUMN_EVENTS_MULTIPLICATIVE),
        (AggregateGroup::FutureRegressors, Some(Mode::Additive)) => {
            Some(COLUMN_FUTURE_REGRESSORS_ADDITIVE)
        }
        (AggregateGroup::FutureRegressors, Some(Mode::Multiplicative)) => {
            Some(COLUMN_FUTURE_REGRESSORS_MULTIPLICATIVE)
        }
        _ => None,
    }
}

/// Options of the forecast-component view.
#[derive(Clone, Copy, Debug, Default)]
pub struct ComponentOptions {
    /// Forecast step to show instead of overplotting every step.
    pub focus: Option<usize>,
    pub residuals: bool,
}

const MODES: [Mode; 2] = [Mode::Additive, Mode::Multiplicative];

/// Panels of the forecast-component view, backed by columns of `table`.
///
/// Components whose columns are absent are skipped. The trend and seasonalities are
/// always listed: they can be recomputed from the model.
pub fn select_forecast_components(
    config: &ModelConfig,
    table: &ForecastTable,
    options: ComponentOptions,
) -> Vec<Component> {
    let mut components = vec![Component::Trend];
    if config.trend.n_changepoints() > 0 {
        components.push(Component::TrendRateChange);
    }
    for season in config.seasonalities() {
        components.push(Component::Seasonality {
            name: season.name.clone(),
            mode: config.seasonality_mode(),
        });
    }

    let mut lagged = Vec::new();
    if config.n_lags > 0 {
        lagged.push(LaggedInput::Ar);
    }
    lagged.extend(
        config
            .lagged_regressors
            .iter()
            .map(|regressor| LaggedInput::Regressor(regressor.name.clone())),
    );
    for input in lagged {
        let component = match options.focus {
            None => Component::Overlay {
                input,
                count: config.n_forecasts,
            },
            Some(ahead) => Component::Horizon { input, ahead },
        };
        push_if_backed(&mut components, component, table);
    }

    for group in [AggregateGroup::Events, AggregateGroup::FutureRegressors] {
        for mode in MODES {
            push_if_backed(
                &mut components,
                Component::Aggregate {
                    group,
                    mode: Some(mode),
                },
                table,
            );
        }
    }

    if options.residuals {
        match options.focus {
            None if config.n_forecasts > 1 => {
                if table.count(&LaggedInput::Residual.column(1)) > 0 {
                    components.push(Component::Overlay {
                        input: LaggedInput::Residual,
                        count: config.n_forecasts,
                    });
                }
            }
            focus => {
                let ahead = focus.unwrap_or(1);
                if table.count(&LaggedInput::Residual.column(ahead)) > 0 {
                    components.push(Component::Horizon {
                        input: LaggedInput::Residual,
                        ahead,
                    });
                }
            }
        }
    }

    if config.has_uncertainty() {
        let horizon = options.focus.unwrap_or(1);
        for quantile in config.quantiles.iter().skip(1) {
            push_if_backed(
                &mut components,
                Component::Uncertainty {
                    quantile: *quantile,
                    horizon,
                },
                table,
            );
        }
    }

    debug!(count = components.len(), "Selected forecast components");
    components
}

fn push_if_backed(components: &mut Vec<Component>, component: Component, table: &ForecastTable) {
    let backing = match &component {
        Component::Overlay { input, .. } => input.column(1),
        other => match other.column() {
            Some(column) => column,
            None => {
                components.push(component);
                return;
            }
        },
    };
    if table.has_column(&backing) {
        components.push(component);
    } else {
        debug!(component = %component.title(), column = %backing, "Skipping component without data");
    }
}

/// Panels of the parameter view.
pub fn select_parameter_components(config: &ModelConfig, focus: Option<usize>) -> Vec<Component> {
    let mut components = vec![Component::Trend];
    if config.trend.n_changepoints() > 0 {
        components.push(Component::TrendRateChange);
    }
    for season in config.seasonalities() {
        components.push(Component::Seasonality {
            name: season.name.clone(),
            mode: config.seasonality_mode(),
        });
    }
    if config.n_lags > 0 {
        components.push(Component::LaggedWeights {
            input: LaggedInput::Ar,
            focus,
        });
    }
    for regressor in config.lagged_regressors.iter().filter(|lagged| !lagged.as_scalar) {
        components.push(Component::LaggedWeights {
            input: LaggedInput::Regressor(regressor.name.clone()),
            focus,
        });
    }
    if config.lagged_regressors.iter().any(|lagged| lagged.as_scalar) {
        components.push(Component::Aggregate {
            group: AggregateGroup::LaggedScalarRegressors,
            mode: None,
        });
    }
    for mode in MODES {
        let holidays = config
            .country_holidays
            .as_ref()
            .is_some_and(|holidays| holidays.mode == mode && !holidays.holiday_names.is_empty());
        if holidays || config.events.iter().any(|event| event.mode == mode) {
            components.push(Component::Aggregate {
                group: AggregateGroup::Events,
                mode: Some(mode),
            });
        }
    }
    for mode in MODES {
        if config.regressors.iter().any(|regressor| regressor.mode == mode) {
            components.push(Component::Aggregate {
                group: AggregateGroup::FutureRegressors,
                mode: Some(mode),
            });
        }
    }
    debug!(count = components.len(), "Selected parameter components");
    components
}
