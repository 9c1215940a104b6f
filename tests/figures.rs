use std::io::Cursor;

use fcplot::components::{Component, ComponentOptions, select_forecast_components};
use fcplot::figure::{Fill, Mark, TickFormat};
use fcplot::normalization::SeriesSelection;
use fcplot::season::{QueryPath, season_cycle};
use fcplot::{
    ComponentsOptions, ForecastModel, ForecastOptions, ForecastTable, ModelSnapshot, ParameterOptions, PlotError,
    ReportSection, Theme, plot_components, plot_forecast, plot_parameters, save_figure, write_report,
};

const TEN_DAY_CSV: &str = "\
ds,y,yhat1,yhat1 10.0%,yhat1 90.0%,trend
2022-01-01,1.0,1.5,0.5,2.5,1.2
2022-01-02,2.0,2.5,1.5,3.5,2.2
2022-01-03,3.0,3.5,2.5,4.5,3.2
2022-01-04,4.0,4.5,3.5,5.5,4.2
2022-01-05,5.0,5.5,4.5,6.5,5.2
2022-01-06,6.0,6.5,5.5,7.5,6.2
2022-01-07,7.0,7.5,6.5,8.5,7.2
2022-01-08,8.0,8.5,7.5,9.5,8.2
2022-01-09,9.0,9.5,8.5,10.5,9.2
2022-01-10,,10.5,9.5,11.5,10.2
";

fn trend_model() -> ModelSnapshot {
    ModelSnapshot::from_json_str(
        r#"{
            "config": {
                "quantiles": [0.5, 0.1, 0.9],
                "normalization": {"global_params": {
                    "ds": {"shift": "2022-01-01T00:00:00", "scale_seconds": 864000.0},
                    "y": {"shift": 0.0, "scale": 10.0}}}
            },
            "params": {"bias": [0.0, 0.0, 0.0], "trend_k0": [[1.0], [1.0], [1.0]]}
        }"#,
    )
    .expect("valid model")
}

fn weekly_model(global: bool) -> ModelSnapshot {
    let raw = format!(
        r#"{{
            "config": {{
                "seasonality": {{"mode": "additive", "periods": [{{"name": "weekly", "period": 7.0, "resolution": 2}}]}},
                "normalization": {{
                    "global_normalization": {global},
                    "global_params": {{
                        "ds": {{"shift": "2022-01-01T00:00:00", "scale_seconds": 864000.0}},
                        "y": {{"shift": 0.0, "scale": 4.0}}}},
                    "local_params": {{"store_a": {{
                        "ds": {{"shift": "2022-01-01T00:00:00", "scale_seconds": 864000.0}},
                        "y": {{"shift": 0.0, "scale": 2.0}}}}}}
                }}
            }},
            "params": {{
                "bias": [0.0],
                "trend_k0": [[1.0]],
                "seasonality": {{"weekly": [[0.3, -0.1, 0.2, 0.05]]}}
            }}
        }}"#
    );
    ModelSnapshot::from_json_str(&raw).expect("valid model")
}

fn ten_day_table() -> ForecastTable {
    ForecastTable::from_reader(Cursor::new(TEN_DAY_CSV)).expect("valid csv")
}

#[test]
fn bare_table_selects_only_the_trend() {
    let table = ForecastTable::from_reader(Cursor::new("ds,y\n2022-01-01,1.0\n2022-01-02,2.0\n")).expect("valid csv");
    let model = trend_model();
    let components = select_forecast_components(model.config(), &table, ComponentOptions::default());
    assert_eq!(components, vec![Component::Trend]);
}

#[test]
fn trend_only_model_shows_trend_and_uncertainty() {
    let figure = plot_components(&trend_model(), &ten_day_table(), &ComponentsOptions::default(), &Theme::default())
        .expect("figure");
    let names = figure.panels.iter().map(|panel| panel.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, ["Trend", "Uncertainty"]);

    let uncertainty = figure.panel("Uncertainty").expect("uncertainty panel");
    assert_eq!(uncertainty.traces.len(), 2);
    let lower = &uncertainty.traces[0];
    assert_eq!(lower.name, "yhat1 10.0%");
    assert!(lower.y.iter().all(|value| value.is_some_and(|v| (v + 1.0).abs() < 1e-9)));
    assert!(matches!(lower.mark, Mark::Line { fill: Some(Fill::ToZero), .. }));
    let upper = &uncertainty.traces[1];
    assert!(upper.y.iter().all(|value| value.is_some_and(|v| (v - 1.0).abs() < 1e-9)));
}

#[test]
fn forecast_figure_has_actuals_predictions_and_bands() {
    let figure = plot_forecast(&ten_day_table(), &[0.5, 0.1, 0.9], &ForecastOptions::default(), &Theme::default())
        .expect("figure");
    assert_eq!(figure.panels.len(), 1);
    let panel = &figure.panels[0];
    let actual = panel.traces.iter().find(|trace| trace.name == "Actual").expect("actuals");
    assert_eq!(actual.y.iter().flatten().count(), 9);
    assert!(panel.traces.iter().any(|trace| trace.name == "yhat1"));
    assert!(panel.traces.iter().any(|trace| trace.name == "yhat1 90.0%"));
}

#[test]
fn quick_and_full_season_paths_agree() {
    let model = weekly_model(true);
    let ds = ten_day_table().ds().to_vec();
    let series = SeriesSelection::global();
    let quick = season_cycle(&model, &ds, "weekly", &series, 0, QueryPath::Quick).expect("quick");
    let full = season_cycle(&model, &ds, "weekly", &series, 0, QueryPath::Full).expect("full");
    assert_eq!(quick.dates, full.dates);
    for (a, b) in quick.values.iter().zip(&full.values) {
        assert!((a - b).abs() < 1e-9);
    }
}

#[test]
fn unknown_series_falls_back_without_touching_the_model() {
    let model = weekly_model(false);
    let options = ComponentsOptions {
        df_name: Some("store_b".to_string()),
        ..ComponentsOptions::default()
    };
    let figure = plot_components(&model, &ten_day_table(), &options, &Theme::default()).expect("figure");
    assert!(figure.panel("weekly seasonality").is_some());
    assert!(!model.config().normalization.global_normalization);
    assert!(!model.config().normalization.unknown_data_normalization);

    let known = ComponentsOptions {
        df_name: Some("store_a".to_string()),
        ..ComponentsOptions::default()
    };
    let local = plot_components(&model, &ten_day_table(), &known, &Theme::default()).expect("figure");
    let fallback_peak = figure.panel("weekly seasonality").expect("panel").traces[0]
        .finite_values()
        .fold(f64::MIN, f64::max);
    let local_peak = local.panel("weekly seasonality").expect("panel").traces[0]
        .finite_values()
        .fold(f64::MIN, f64::max);
    assert!((fallback_peak - 2.0 * local_peak).abs() < 1e-9);
}

#[test]
fn parameter_view_rejects_unconfigured_quantile() {
    let options = ParameterOptions {
        quantile: Some(0.42),
        ..ParameterOptions::default()
    };
    let err = plot_parameters(&trend_model(), &options, &Theme::default()).expect_err("not configured");
    assert!(matches!(err, PlotError::QuantileNotConfigured(_)));
}

#[test]
fn weekly_parameter_panel_uses_day_names() {
    let options = ParameterOptions {
        weekly_start: 1,
        ..ParameterOptions::default()
    };
    let figure = plot_parameters(&weekly_model(true), &options, &Theme::default()).expect("figure");
    let weekly = figure.panel("weekly seasonality").expect("weekly panel");
    assert_eq!(weekly.x.ticks.first().map(|tick| tick.label.as_str()), Some("Monday"));
    assert_eq!(weekly.y.tick_format, TickFormat::Auto);
}

#[test]
fn figures_are_written_in_both_formats() {
    let dir = tempfile::tempdir().expect("tempdir");
    let figure = plot_components(&trend_model(), &ten_day_table(), &ComponentsOptions::default(), &Theme::default())
        .expect("figure");

    let svg = dir.path().join("nested").join("components.svg");
    save_figure(&figure, &svg).expect("svg written");
    let content = std::fs::read_to_string(&svg).expect("svg readable");
    assert!(content.contains("<svg"));

    let html = dir.path().join("components.html");
    save_figure(&figure, &html).expect("html written");
    let content = std::fs::read_to_string(&html).expect("html readable");
    assert!(content.contains("Plotly.newPlot"));
}

fn many_season_model(count: usize) -> ModelSnapshot {
    let periods = (1..=count)
        .map(|idx| format!(r#"{{"name": "cycle{idx}", "period": {}.5, "resolution": 1}}"#, idx + 1))
        .collect::<Vec<_>>()
        .join(",");
    let weights = (1..=count)
        .map(|idx| format!(r#""cycle{idx}": [[0.{idx}, -0.1]]"#))
        .collect::<Vec<_>>()
        .join(",");
    let raw = format!(
        r#"{{
            "config": {{
                "seasonality": {{"mode": "additive", "periods": [{periods}]}},
                "normalization": {{"global_params": {{
                    "ds": {{"shift": "2022-01-01T00:00:00", "scale_seconds": 864000.0}},
                    "y": {{"shift": 0.0, "scale": 1.0}}}}}}
            }},
            "params": {{"bias": [0.0], "trend_k0": [[1.0]], "seasonality": {{{weights}}}}}
        }}"#
    );
    ModelSnapshot::from_json_str(&raw).expect("valid model")
}

#[test]
fn views_with_more_than_eight_panels_are_written_as_html() {
    let dir = tempfile::tempdir().expect("tempdir");
    let figure = plot_parameters(&many_season_model(9), &ParameterOptions::default(), &Theme::default())
        .expect("parameters");
    assert_eq!(figure.panels.len(), 10);

    let path = dir.path().join("parameters.html");
    save_figure(&figure, &path).expect("html written");
    let content = std::fs::read_to_string(&path).expect("html readable");
    assert!(content.contains("\"xaxis10\""));
    assert!(content.contains("\"yaxis10\""));
}

#[test]
fn report_bundles_every_view() {
    let dir = tempfile::tempdir().expect("tempdir");
    let model = trend_model();
    let table = ten_day_table();
    let theme = Theme::default();
    let forecast = plot_forecast(&table, &model.config().quantiles, &ForecastOptions::default(), &theme)
        .expect("forecast");
    let parameters = plot_parameters(&model, &ParameterOptions::default(), &theme).expect("parameters");
    let path = dir.path().join("report.html");
    write_report(
        &path,
        "Report",
        &[
            ReportSection {
                title: "Forecast",
                figure: &forecast,
            },
            ReportSection {
                title: "Parameters",
                figure: &parameters,
            },
        ],
    )
    .expect("report written");
    let content = std::fs::read_to_string(&path).expect("report readable");
    assert!(content.contains("figure-0") && content.contains("figure-1"));
}
