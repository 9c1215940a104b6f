//! Figures for fitted forecast models: the main forecast chart, a grid of forecast
//! components and a grid of learned parameters, rendered as interactive HTML or static SVG.

pub mod components;
pub mod constants;
pub mod error;
pub mod figure;
pub mod layout;
pub mod model;
pub mod normalization;
pub mod panels;
pub mod parameters;
pub mod plot;
pub mod render;
pub mod report;
pub mod season;
pub mod table;
pub mod theme;

pub use error::{PlotError, Result};
pub use figure::{Figure, FigureKind, Panel, Trace};
pub use layout::ForecastOptions;
pub use model::{ForecastModel, ModelSnapshot};
pub use plot::{ComponentsOptions, ParameterOptions, plot_components, plot_forecast, plot_parameters};
pub use render::{InteractiveBackend, InteractiveFigure, OutputFormat, RenderBackend, SvgBackend, save_figure};
pub use report::{ReportSection, write_report};
pub use season::QueryPath;
pub use table::ForecastTable;
pub use theme::{Theme, load_theme};
