use std::fs::{self, File};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use tracing_subscriber::EnvFilter;

use fcplot::theme::DEFAULT_THEME_PATH;
use fcplot::{
    ComponentsOptions, ForecastModel, ForecastOptions, ForecastTable, ModelSnapshot, ParameterOptions, QueryPath,
    ReportSection, Theme, load_theme, plot_components, plot_forecast, plot_parameters, save_figure, write_report,
};

const APP_ABOUT: &str = "fcplot - charts for fitted forecast models";
const DEFAULT_FORECAST_CSV: &str = "dist/forecast.csv";
const DEFAULT_MODEL_JSON: &str = "dist/model.json";
const DEFAULT_FORECAST_OUTPUT: &str = "dist/forecast.html";
const DEFAULT_COMPONENTS_OUTPUT: &str = "dist/components.html";
const DEFAULT_PARAMETERS_OUTPUT: &str = "dist/parameters.html";
const DEFAULT_REPORT_OUTPUT: &str = "dist/report.html";
const REPORT_TITLE: &str = "Forecast model report";

#[derive(Parser, Debug)]
#[command(name = "fcplot", about = APP_ABOUT)]
struct Args {
    /// TOML theme overriding the built-in styling.
    #[arg(long = "theme", value_name = "PATH", global = true, default_value = DEFAULT_THEME_PATH)]
    theme: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Actuals, predictions and quantile bands in one chart.
    Forecast {
        /// Forecast table with `ds`, `y` and prediction columns.
        #[arg(short = 'c', long = "csv", value_name = "PATH", default_value = DEFAULT_FORECAST_CSV)]
        csv: PathBuf,
        /// Output file; `.svg` selects the static backend.
        #[arg(short = 'o', long = "output", value_name = "PATH", default_value = DEFAULT_FORECAST_OUTPUT)]
        output: PathBuf,
        /// Model quantiles, point estimate first.
        #[arg(long = "quantiles", value_delimiter = ',', default_value = "0.5")]
        quantiles: Vec<f64>,
        /// Forecast step to highlight with markers.
        #[arg(long = "highlight", value_name = "STEP")]
        highlight: Option<usize>,
        /// One line per forecast origin instead of per step.
        #[arg(long = "line-per-origin")]
        line_per_origin: bool,
        #[arg(long = "xlabel", default_value = "ds")]
        xlabel: String,
        #[arg(long = "ylabel", default_value = "y")]
        ylabel: String,
    },
    /// One panel per forecast component.
    Components {
        #[arg(short = 'c', long = "csv", value_name = "PATH", default_value = DEFAULT_FORECAST_CSV)]
        csv: PathBuf,
        /// Fitted model snapshot (JSON).
        #[arg(short = 'm', long = "model", value_name = "PATH", default_value = DEFAULT_MODEL_JSON)]
        model: PathBuf,
        #[arg(short = 'o', long = "output", value_name = "PATH", default_value = DEFAULT_COMPONENTS_OUTPUT)]
        output: PathBuf,
        /// Series whose normalization parameters are used.
        #[arg(long = "df-name", value_name = "NAME")]
        df_name: Option<String>,
        /// Forecast step to show instead of every step.
        #[arg(long = "focus", value_name = "STEP")]
        focus: Option<usize>,
        #[arg(long = "residuals")]
        residuals: bool,
        /// Evaluate seasonalities through the full prediction path.
        #[arg(long = "full-season")]
        full_season: bool,
        /// Plot the `season_*` columns instead of one canonical period.
        #[arg(long = "season-columns")]
        season_columns: bool,
        /// Window of a smoothed underlay.
        #[arg(long = "rolling", value_name = "WINDOW")]
        rolling: Option<usize>,
    },
    /// One panel per learned parameter group.
    Parameters {
        #[arg(short = 'm', long = "model", value_name = "PATH", default_value = DEFAULT_MODEL_JSON)]
        model: PathBuf,
        #[arg(short = 'o', long = "output", value_name = "PATH", default_value = DEFAULT_PARAMETERS_OUTPUT)]
        output: PathBuf,
        /// Quantile whose parameters are shown.
        #[arg(long = "quantile")]
        quantile: Option<f64>,
        #[arg(long = "focus", value_name = "STEP")]
        focus: Option<usize>,
        /// Days to shift the weekly cycle (0 starts on Sunday).
        #[arg(long = "weekly-start", default_value_t = 0)]
        weekly_start: i64,
        /// Days to shift the yearly cycle (0 starts on January 1).
        #[arg(long = "yearly-start", default_value_t = 0)]
        yearly_start: i64,
        #[arg(long = "df-name", value_name = "NAME")]
        df_name: Option<String>,
    },
    /// Forecast, components and parameters on one HTML page.
    Report {
        #[arg(short = 'c', long = "csv", value_name = "PATH", default_value = DEFAULT_FORECAST_CSV)]
        csv: PathBuf,
        #[arg(short = 'm', long = "model", value_name = "PATH", default_value = DEFAULT_MODEL_JSON)]
        model: PathBuf,
        #[arg(short = 'o', long = "output", value_name = "PATH", default_value = DEFAULT_REPORT_OUTPUT)]
        output: PathBuf,
    },
    /// Shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
        /// Output file; stdout when omitted.
        #[arg(short = 'o', long = "output", value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

fn generate_completions(shell: Shell, output: Option<PathBuf>) -> Result<(), String> {
    let mut cmd = Args::command();
    let bin_name = cmd.get_name().to_string();
    if let Some(path) = output {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| format!("Failed to create {}: {err}", parent.display()))?;
        }
        let mut file = File::create(&path).map_err(|err| format!("Failed to create {}: {err}", path.display()))?;
        generate(shell, &mut cmd, bin_name, &mut file);
    } else {
        let mut stdout = std::io::stdout();
        generate(shell, &mut cmd, bin_name, &mut stdout);
    }
    Ok(())
}

fn load_table(path: &Path) -> Result<ForecastTable, String> {
    ForecastTable::from_csv(path).map_err(|err| format!("Failed to read forecast table {}: {err}", path.display()))
}

fn load_model(path: &Path) -> Result<ModelSnapshot, String> {
    ModelSnapshot::from_path(path).map_err(|err| format!("Failed to read model {}: {err}", path.display()))
}

fn run_forecast(
    theme: &Theme,
    csv: &Path,
    output: &Path,
    quantiles: &[f64],
    options: &ForecastOptions,
) -> Result<(), String> {
    let table = load_table(csv)?;
    let figure =
        plot_forecast(&table, quantiles, options, theme).map_err(|err| format!("Failed to plot forecast: {err}"))?;
    save_figure(&figure, output).map_err(|err| format!("Failed to write {}: {err}", output.display()))
}

fn run_components(
    theme: &Theme,
    csv: &Path,
    model: &Path,
    output: &Path,
    options: &ComponentsOptions,
) -> Result<(), String> {
    let table = load_table(csv)?;
    let model = load_model(model)?;
    let figure = plot_components(&model, &table, options, theme)
        .map_err(|err| format!("Failed to plot components: {err}"))?;
    save_figure(&figure, output).map_err(|err| format!("Failed to write {}: {err}", output.display()))
}

fn run_parameters(theme: &Theme, model: &Path, output: &Path, options: &ParameterOptions) -> Result<(), String> {
    let model = load_model(model)?;
    let figure =
        plot_parameters(&model, options, theme).map_err(|err| format!("Failed to plot parameters: {err}"))?;
    save_figure(&figure, output).map_err(|err| format!("Failed to write {}: {err}", output.display()))
}

fn run_report(theme: &Theme, csv: &Path, model: &Path, output: &Path) -> Result<(), String> {
    let table = load_table(csv)?;
    let model = load_model(model)?;
    let forecast = plot_forecast(&table, &model.config().quantiles, &ForecastOptions::default(), theme)
        .map_err(|err| format!("Failed to plot forecast: {err}"))?;
    let components = plot_components(&model, &table, &ComponentsOptions::default(), theme)
        .map_err(|err| format!("Failed to plot components: {err}"))?;
    let parameters = plot_parameters(&model, &ParameterOptions::default(), theme)
        .map_err(|err| format!("Failed to plot parameters: {err}"))?;
    let sections = [
        ReportSection {
            title: "Forecast",
            figure: &forecast,
        },
        ReportSection {
            title: "Components",
            figure: &components,
        },
        ReportSection {
            title: "Parameters",
            figure: &parameters,
        },
    ];
    write_report(output, REPORT_TITLE, &sections).map_err(|err| format!("Failed to write report: {err}"))
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fcplot=info"));
    let ansi = std::io::stdout().is_terminal();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(ansi)
        .compact()
        .init();
}

fn headline(message: &str) {
    tracing::info!(status = "start", "{message}");
}

fn info(message: &str) {
    tracing::info!(status = "info", "{message}");
}

fn success(message: &str) {
    tracing::info!(status = "ok", "{message}");
}

fn error(message: &str) {
    tracing::error!(status = "err", "{message}");
}

fn main() {
    let args = Args::parse();
    if let Command::Completions { shell, output } = args.command {
        if let Err(err) = generate_completions(shell, output) {
            eprintln!("{err}");
        }
        return;
    }

    init_logging();
    headline(APP_ABOUT);
    let theme = match load_theme(&args.theme) {
        Ok(theme) => theme,
        Err(err) => {
            error(&format!("Failed to load theme: {err}"));
            return;
        }
    };

    let (result, output) = match args.command {
        Command::Forecast {
            csv,
            output,
            quantiles,
            highlight,
            line_per_origin,
            xlabel,
            ylabel,
        } => {
            tracing::info!(
                mode = "forecast",
                csv = %csv.display(),
                quantiles = ?quantiles,
                highlight,
                line_per_origin,
                "Plotting forecast"
            );
            let options = ForecastOptions {
                xlabel,
                ylabel,
                highlight,
                line_per_origin,
            };
            (run_forecast(&theme, &csv, &output, &quantiles, &options), output)
        }
        Command::Components {
            csv,
            model,
            output,
            df_name,
            focus,
            residuals,
            full_season,
            season_columns,
            rolling,
        } => {
            tracing::info!(
                mode = "components",
                csv = %csv.display(),
                model = %model.display(),
                df_name = ?df_name,
                focus,
                residuals,
                full_season,
                "Plotting components"
            );
            let options = ComponentsOptions {
                df_name,
                focus,
                one_period_per_season: !season_columns,
                residuals,
                path: if full_season { QueryPath::Full } else { QueryPath::Quick },
                rolling,
            };
            (run_components(&theme, &csv, &model, &output, &options), output)
        }
        Command::Parameters {
            model,
            output,
            quantile,
            focus,
            weekly_start,
            yearly_start,
            df_name,
        } => {
            tracing::info!(
                mode = "parameters",
                model = %model.display(),
                quantile,
                focus,
                weekly_start,
                yearly_start,
                "Plotting parameters"
            );
            let options = ParameterOptions {
                quantile,
                focus,
                weekly_start,
                yearly_start,
                df_name,
            };
            (run_parameters(&theme, &model, &output, &options), output)
        }
        Command::Report { csv, model, output } => {
            info(&format!("Building report from {} and {}", csv.display(), model.display()));
            (run_report(&theme, &csv, &model, &output), output)
        }
        Command::Completions { .. } => return,
    };

    match result {
        Ok(()) => success(&format!("Saved {}", output.display())),
        Err(err) => error(&err),
    }
}
