//! Public plotting entry points. Each call resolves its inputs once, prepares every panel
//! and hands the result to the layout composer; any failure aborts the whole call.

use tracing::{debug, info};

use crate::components::{Component, ComponentOptions, select_forecast_components, select_parameter_components};
use crate::constants::PREFIX_SEASON;
use crate::error::{PlotError, Result};
use crate::figure::{Figure, FigureKind, Panel};
use crate::layout::{ForecastOptions, compose_forecast, compose_grid};
use crate::model::{ForecastModel, Mode};
use crate::normalization::SeriesSelection;
use crate::panels::{self, SeriesStyle};
use crate::parameters::ParameterContext;
use crate::season::QueryPath;
use crate::table::ForecastTable;
use crate::theme::Theme;

/// Options of the forecast-component view.
#[derive(Clone, Debug)]
pub struct ComponentsOptions {
    /// Series whose normalization parameters are used; `None` reads the global ones.
    pub df_name: Option<String>,
    /// Forecast step to show instead of overplotting every step.
    pub focus: Option<usize>,
    /// Show one canonical period per seasonality rather than the `season_*` columns.
    pub one_period_per_season: bool,
    pub residuals: bool,
    pub path: QueryPath,
    /// Window of a smoothed underlay drawn beneath single-column panels.
    pub rolling: Option<usize>,
}

impl Default for ComponentsOptions {
    fn default() -> Self {
        Self {
            df_name: None,
            focus: None,
            one_period_per_season: true,
            residuals: false,
            path: QueryPath::Quick,
            rolling: None,
        }
    }
}

/// Options of the parameter view.
#[derive(Clone, Debug, Default)]
pub struct ParameterOptions {
    /// Quantile whose parameters are shown; the first configured one when `None`.
    pub quantile: Option<f64>,
    pub focus: Option<usize>,
    pub weekly_start: i64,
    pub yearly_start: i64,
    pub df_name: Option<String>,
}

/// Main chart: actuals, point predictions and quantile bands.
pub fn plot_forecast(
    table: &ForecastTable,
    quantiles: &[f64],
    options: &ForecastOptions,
    theme: &Theme,
) -> Result<Figure> {
    if quantiles.is_empty() {
        return Err(PlotError::EmptyData("at least one quantile is required".to_string()));
    }
    info!(rows = table.len(), quantiles = quantiles.len(), "Plotting forecast");
    compose_forecast(table, quantiles, options, theme)
}

/// One panel per forecast component found in `table`.
pub fn plot_components(
    model: &dyn ForecastModel,
    table: &ForecastTable,
    options: &ComponentsOptions,
    theme: &Theme,
) -> Result<Figure> {
    let config = model.config();
    let series = config.normalization.resolve(options.df_name.as_deref());
    let components = select_forecast_components(
        config,
        table,
        ComponentOptions {
            focus: options.focus,
            residuals: options.residuals,
        },
    );
    info!(rows = table.len(), components = components.len(), series = %series.name, "Plotting components");

    let panels = components
        .iter()
        .map(|component| component_panel(model, table, component, &series, options, theme))
        .collect::<Result<Vec<_>>>()?;
    compose_grid(FigureKind::Components, panels, theme)
}

fn component_panel(
    model: &dyn ForecastModel,
    table: &ForecastTable,
    component: &Component,
    series: &SeriesSelection,
    options: &ComponentsOptions,
    theme: &Theme,
) -> Result<Panel> {
    let title = component.title();
    debug!(component = %title, "Preparing panel");
    let single = |column: &str, bar: bool, residual: bool| -> Result<Panel> {
        let mut style = SeriesStyle::line(&title);
        style.bar = bar;
        style.residual = residual;
        style.multiplicative = component.is_multiplicative();
        style.rolling = options.rolling;
        Ok(panels::series_panel(table.ds(), table.require(column)?, &style, theme))
    };

    match component {
        Component::Trend => panels::trend_panel(table, model, series, 0, options.rolling, theme),
        Component::TrendRateChange => ParameterContext {
            model,
            series,
            quantile_index: 0,
            focus: options.focus,
            weekly_start: 0,
            yearly_start: 0,
            theme,
        }
        .trend_change(),
        Component::Seasonality { name, mode } => {
            if options.one_period_per_season {
                panels::seasonality_panel(model, table, name, &title, series, 0, options.path, theme)
            } else {
                let mut panel = single(&format!("{PREFIX_SEASON}{name}"), false, false)?;
                panel.multiplicative = *mode == Mode::Multiplicative;
                Ok(panel)
            }
        }
        Component::Overlay { input, count } => {
            panels::overlay_panel(table, input, Some(*count), 1, &title, component.is_bar(), theme)
        }
        Component::Horizon { input, ahead } if input.is_residual() => {
            single(&input.column(*ahead), component.is_bar(), true)
        }
        Component::Horizon { input, ahead } => {
            panels::overlay_panel(table, input, None, *ahead, &title, component.is_bar(), theme)
        }
        Component::Aggregate { .. } => match component.column() {
            Some(column) => single(&column, false, false),
            None => Err(PlotError::UnknownComponent(title)),
        },
        Component::Uncertainty { horizon, .. } => match component.column() {
            Some(column) => panels::uncertainty_panel(table, &column, *horizon, &title, theme),
            None => Err(PlotError::UnknownComponent(title)),
        },
        Component::LaggedWeights { .. } => Err(PlotError::UnknownComponent(title)),
    }
}

/// One panel per learned parameter group of the model.
pub fn plot_parameters(model: &dyn ForecastModel, options: &ParameterOptions, theme: &Theme) -> Result<Figure> {
    let config = model.config();
    let quantile_index = match options.quantile {
        Some(quantile) => config.quantile_index(quantile)?,
        None => 0,
    };
    let series = config.normalization.resolve(options.df_name.as_deref());
    let components = select_parameter_components(config, options.focus);
    info!(components = components.len(), quantile_index, series = %series.name, "Plotting parameters");

    let context = ParameterContext {
        model,
        series: &series,
        quantile_index,
        focus: options.focus,
        weekly_start: options.weekly_start,
        yearly_start: options.yearly_start,
        theme,
    };
    let panels = components
        .iter()
        .map(|component| context.panel(component))
        .collect::<Result<Vec<_>>>()?;
    compose_grid(FigureKind::Parameters, panels, theme)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::figure::TickFormat;
    use crate::model::tests::{at, sample_snapshot};

    fn component_table() -> ForecastTable {
        let ds = (1..=10).map(|day| at(2022, 1, day, 0)).collect();
        let ramp = |offset: f64| (0..10).map(|idx| Some(f64::from(idx) + offset)).collect();
        [
            ("y", ramp(0.0)),
            ("yhat1", ramp(0.5)),
            ("yhat1 10.0%", ramp(-0.5)),
            ("yhat1 90.0%", ramp(1.5)),
            ("trend", ramp(0.2)),
            ("ar1", ramp(0.1)),
            ("ar2", ramp(0.1)),
            ("ar3", ramp(0.1)),
            ("future_regressors_multiplicative", ramp(0.01)),
        ]
        .into_iter()
        .try_fold(ForecastTable::new(ds), |table, (name, values)| table.with_column(name, values))
        .expect("aligned")
    }

    #[test]
    fn components_follow_selection_order() {
        let model = sample_snapshot();
        let figure = plot_components(&model, &component_table(), &ComponentsOptions::default(), &Theme::default())
            .expect("figure");
        let names = figure.panels.iter().map(|panel| panel.name.as_str()).collect::<Vec<_>>();
        assert_eq!(
            names,
            [
                "Trend",
                "Trend Rate Change",
                "yearly seasonality",
                "weekly seasonality",
                "Auto-Regression",
                "Multiplicative Future Regressors",
                "Uncertainty",
            ]
        );
        let uncertainty = figure.panel("Uncertainty").expect("uncertainty");
        assert_eq!(uncertainty.traces.len(), 2);
        let regressors = figure.panel("Multiplicative Future Regressors").expect("regressors");
        assert_eq!(regressors.y.tick_format, TickFormat::Percent);
        assert_eq!(figure.height, 7 * Theme::default().panel_height);
    }

    #[test]
    fn focus_draws_the_single_requested_step() {
        let model = sample_snapshot();
        let table = component_table()
            .with_column("ar2", (0..10).map(|idx| (idx < 8).then_some(f64::from(idx))).collect())
            .expect("aligned");
        let options = ComponentsOptions {
            focus: Some(2),
            ..ComponentsOptions::default()
        };
        let figure = plot_components(&model, &table, &options, &Theme::default()).expect("figure");
        assert!(figure.panel("Auto-Regression").is_none());
        let ar = figure.panel("AR (2)-ahead").expect("focused panel");
        assert_eq!(ar.traces.len(), 1);
        assert_eq!(ar.traces[0].y.len(), 8);
        assert!(!ar.has_bars());
    }

    #[test]
    fn focused_residuals_keep_rolling_underlay() {
        let model = sample_snapshot();
        let table = component_table()
            .with_column("residual2", vec![Some(2.0); 10])
            .expect("aligned");
        let options = ComponentsOptions {
            focus: Some(2),
            residuals: true,
            rolling: Some(3),
            ..ComponentsOptions::default()
        };
        let figure = plot_components(&model, &table, &options, &Theme::default()).expect("figure");
        let residuals = figure.panel("Residuals (2)-ahead").expect("residual panel");
        assert_eq!(residuals.traces.len(), 2);
        assert_eq!(residuals.traces[0].y.last().copied().flatten(), Some(2.0));
        assert_eq!(residuals.traces[1].y.last().copied().flatten(), Some(0.0));
        assert!(residuals.has_bars());
    }

    #[test]
    fn season_columns_replace_canonical_cycle() {
        let model = sample_snapshot();
        let table = component_table()
            .with_column("season_yearly", vec![Some(1.0); 10])
            .and_then(|table| table.with_column("season_weekly", vec![None; 10]))
            .expect("aligned");
        let options = ComponentsOptions {
            one_period_per_season: false,
            ..ComponentsOptions::default()
        };
        let figure = plot_components(&model, &table, &options, &Theme::default()).expect("figure");
        let yearly = figure.panel("yearly seasonality").expect("yearly");
        assert_eq!(yearly.traces[0].y.len(), 10);
        let weekly = figure.panel("weekly seasonality").expect("weekly");
        assert!(weekly.traces[0].y.is_empty());
    }

    #[test]
    fn parameters_reject_unknown_quantile() {
        let model = sample_snapshot();
        let options = ParameterOptions {
            quantile: Some(0.3),
            ..ParameterOptions::default()
        };
        let err = plot_parameters(&model, &options, &Theme::default()).expect_err("unknown quantile");
        assert!(matches!(err, PlotError::QuantileNotConfigured(q) if (q - 0.3).abs() < 1e-12));
    }

    #[test]
    fn parameters_cover_every_group() {
        let model = sample_snapshot();
        let figure = plot_parameters(&model, &ParameterOptions::default(), &Theme::default()).expect("figure");
        assert_eq!(figure.kind, FigureKind::Parameters);
        assert_eq!(figure.panels.len(), 9);
        assert!(figure.panel("AR").is_some_and(|panel| panel.y.tick_format == TickFormat::Percent));
    }

    #[test]
    fn forecast_needs_a_quantile() {
        assert!(plot_forecast(&component_table(), &[], &ForecastOptions::default(), &Theme::default()).is_err());
    }
}
