//! Plotly rendering: one subplot row per panel, shared styling from the theme.
//!
//! Traces and the base layout come from the plotly builders. Axes are written into the
//! serialized layout afterwards, since the typed layout stops at eight axis pairs.

use itertools::Itertools;
use maud::{DOCTYPE, PreEscaped, html};
use plotly::color::Rgba as PlotlyRgba;
use plotly::common::{Fill as PlotlyFill, Font, Line, LineShape, Marker, MarkerSymbol, Mode, Title};
use plotly::layout::{
    Axis, AxisType, BarMode, GridPattern, HoverMode, Layout, LayoutGrid, Legend, Margin,
    RangeMode as PlotlyRangeMode, RangeSelector, RangeSlider, RowOrder, SelectorButton, SelectorStep,
    StepMode, TraceOrder,
};
use plotly::{Bar, Configuration, Plot, Scatter};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::RenderBackend;
use crate::constants::{DATETIME_FORMAT, PLOTLY_CDN};
use crate::error::{PlotError, Result};
use crate::figure::{
    AxisKind, AxisPoint, AxisSpec, Figure, FigureKind, Fill, Mark, Panel, RangeMode, Symbol, TickFormat, Trace,
    XValues,
};
use crate::theme::{Rgba, Theme};

const LEGEND_Y: f64 = 0.1;
const PERCENT_TICK_FORMAT: &str = ".1%";
const PERCENT_HOVER_FORMAT: &str = ".4%";
const STANDALONE_DIV_ID: &str = "figure";

#[derive(Clone, Copy, Debug, Default)]
pub struct InteractiveBackend;

/// A plotly figure ready for `Plotly.newPlot`.
#[derive(Clone, Debug, PartialEq)]
pub struct InteractiveFigure {
    data: Value,
    layout: Value,
    config: Value,
}

impl InteractiveFigure {
    pub const fn layout(&self) -> &Value {
        &self.layout
    }

    pub const fn data(&self) -> &Value {
        &self.data
    }

    pub fn to_json(&self) -> String {
        serde_json::json!({"data": self.data, "layout": self.layout, "config": self.config}).to_string()
    }

    /// A plot container plus the script that draws into it. Expects plotly.js on the page.
    pub fn to_inline_html(&self, div_id: &str) -> String {
        let call = format!(
            "Plotly.newPlot({}, {}, {}, {});",
            script_json(&Value::from(div_id)),
            script_json(&self.data),
            script_json(&self.layout),
            script_json(&self.config),
        );
        html! {
            div id=(div_id) class="plotly-graph-div" {}
            script type="text/javascript" { (PreEscaped(call)) }
        }
        .into_string()
    }

    /// Standalone page loading plotly.js from the CDN.
    pub fn to_html(&self) -> String {
        html! {
            (DOCTYPE)
            html lang="en" {
                head {
                    meta charset="utf-8";
                    script src=(PLOTLY_CDN) {}
                }
                body {
                    (PreEscaped(self.to_inline_html(STANDALONE_DIV_ID)))
                }
            }
        }
        .into_string()
    }
}

/// JSON that cannot close the surrounding `<script>` element.
fn script_json(value: &Value) -> String {
    value.to_string().replace("</", "<\\/")
}

impl RenderBackend for InteractiveBackend {
    type Output = InteractiveFigure;

    fn render(&self, figure: &Figure) -> Result<InteractiveFigure> {
        let theme = &figure.theme;

        let mut plot = Plot::new();
        for (index, panel) in figure.panels.iter().enumerate() {
            let suffix = axis_suffix(index);
            for trace in &panel.traces {
                add_trace(&mut plot, trace, &format!("x{suffix}"), &format!("y{suffix}"));
            }
        }

        let mut layout = Layout::new()
            .font(Font::new().family(theme.font_family.as_str()).size(theme.font_size))
            .width(theme.width as usize)
            .height(figure.height as usize)
            .margin(
                Margin::new()
                    .left(theme.margin.left)
                    .right(theme.margin.right)
                    .top(theme.margin.top)
                    .bottom(theme.margin.bottom)
                    .pad(theme.margin.pad),
            )
            .hover_mode(HoverMode::XUnified)
            .show_legend(figure.show_legend);
        if figure.panels.len() > 1 {
            layout = layout.grid(
                LayoutGrid::new()
                    .rows(figure.panels.len())
                    .columns(1)
                    .pattern(GridPattern::Independent)
                    .row_order(RowOrder::TopToBottom),
            );
        }
        if figure.panels.iter().any(Panel::has_bars) {
            layout = layout.bar_mode(BarMode::Overlay);
        }
        if figure.kind == FigureKind::Components {
            layout = layout.legend(Legend::new().y(LEGEND_Y).trace_order(TraceOrder::Reversed));
        }
        plot.set_layout(layout);
        plot.set_configuration(Configuration::new().responsive(true));

        let Value::Object(mut root) = serde_json::from_str::<Value>(&plot.to_json())? else {
            return Err(PlotError::Backend("plotly figure did not serialize to an object".to_string()));
        };
        let mut layout_fields = match root.remove("layout") {
            Some(Value::Object(layout)) => layout,
            _ => Map::new(),
        };
        for (index, panel) in figure.panels.iter().enumerate() {
            let suffix = axis_suffix(index);
            let mut x_axis = axis(&panel.x, theme);
            if figure.kind == FigureKind::Forecast {
                x_axis = x_axis
                    .range_selector(RangeSelector::new().buttons(range_buttons()))
                    .range_slider(RangeSlider::new().visible(true));
            }
            layout_fields.insert(format!("xaxis{suffix}"), axis_json(&x_axis, theme)?);
            layout_fields.insert(format!("yaxis{suffix}"), axis_json(&axis(&panel.y, theme), theme)?);
        }
        debug!(panels = figure.panels.len(), traces = figure.trace_count(), "Built plotly figure");

        Ok(InteractiveFigure {
            data: root.remove("data").unwrap_or_else(|| Value::Array(Vec::new())),
            layout: Value::Object(layout_fields),
            config: root.remove("config").unwrap_or_else(|| Value::Object(Map::new())),
        })
    }
}

/// Plotly names the first axis pair `x`/`y` and the rest `x2`/`y2` onwards.
fn axis_suffix(index: usize) -> String {
    if index == 0 { String::new() } else { (index + 1).to_string() }
}

/// Serialized axis with the theme's border width, which may be fractional.
fn axis_json(axis: &Axis, theme: &Theme) -> Result<Value> {
    let mut value = serde_json::to_value(axis)?;
    if let Value::Object(fields) = &mut value {
        fields.insert("linewidth".to_string(), Value::from(theme.axis_line_width));
    }
    Ok(value)
}

fn range_buttons() -> Vec<SelectorButton> {
    vec![
        SelectorButton::new()
            .count(7)
            .label("1w")
            .step(SelectorStep::Day)
            .step_mode(StepMode::Backward),
        SelectorButton::new()
            .count(1)
            .label("1m")
            .step(SelectorStep::Month)
            .step_mode(StepMode::Backward),
        SelectorButton::new()
            .count(6)
            .label("6m")
            .step(SelectorStep::Month)
            .step_mode(StepMode::Backward),
        SelectorButton::new()
            .count(1)
            .label("1y")
            .step(SelectorStep::Year)
            .step_mode(StepMode::Backward),
        SelectorButton::new().step(SelectorStep::All),
    ]
}

fn color(color: Rgba) -> PlotlyRgba {
    PlotlyRgba::new(color.r, color.g, color.b, color.a)
}

fn axis_point(point: AxisPoint) -> String {
    match point {
        AxisPoint::Date(date) => date.format(DATETIME_FORMAT).to_string(),
        AxisPoint::Number(value) => value.to_string(),
    }
}

fn axis(spec: &AxisSpec, theme: &Theme) -> Axis {
    let mut axis = Axis::new()
        .title(Title::with_text(spec.title.as_str()).font(Font::new().size(theme.title_font_size)))
        .show_line(true)
        .mirror(true)
        .line_color(color(theme.actual));
    axis = match spec.kind {
        AxisKind::Linear => axis,
        AxisKind::Date => axis.type_(AxisType::Date),
        AxisKind::Category => axis.type_(AxisType::Category),
    };
    if let Some((lower, upper)) = spec.range {
        axis = match (lower, upper) {
            (AxisPoint::Number(lower), AxisPoint::Number(upper)) => axis.range(vec![lower, upper]),
            (lower, upper) => axis.range(vec![axis_point(lower), axis_point(upper)]),
        };
    }
    axis = match spec.range_mode {
        RangeMode::Auto => axis.range_mode(PlotlyRangeMode::Normal),
        RangeMode::ToZero => axis.range_mode(PlotlyRangeMode::ToZero),
    };
    axis = match &spec.tick_format {
        TickFormat::Auto => axis,
        TickFormat::Time(format) => axis.tick_format(format.as_str()),
        TickFormat::Percent => axis
            .tick_format(PERCENT_TICK_FORMAT)
            .hover_format(PERCENT_HOVER_FORMAT),
    };
    let numeric_ticks = spec
        .ticks
        .iter()
        .filter_map(|tick| match tick.at {
            AxisPoint::Number(value) => Some((value, tick.label.clone())),
            AxisPoint::Date(_) => None,
        })
        .collect_vec();
    if !numeric_ticks.is_empty() {
        let (values, labels): (Vec<f64>, Vec<String>) = numeric_ticks.into_iter().unzip();
        axis = axis.tick_values(values).tick_text(labels);
    }
    if let Some(angle) = spec.tick_angle {
        axis = axis.tick_angle(angle);
    }
    axis
}

fn add_trace(plot: &mut Plot, trace: &Trace, x_ref: &str, y_ref: &str) {
    match &trace.x {
        XValues::Dates(dates) => {
            let x = dates
                .iter()
                .map(|date| date.format(DATETIME_FORMAT).to_string())
                .collect_vec();
            add_typed(plot, x, trace, x_ref, y_ref);
        }
        XValues::Numbers(values) => add_typed(plot, values.clone(), trace, x_ref, y_ref),
        XValues::Categories(names) => add_typed(plot, names.clone(), trace, x_ref, y_ref),
    }
}

/// Bars keep plotly's automatic width; explicit widths only matter for the static backend.
fn add_typed<X>(plot: &mut Plot, x: Vec<X>, trace: &Trace, x_ref: &str, y_ref: &str)
where
    X: Serialize + Clone + 'static,
{
    let y = trace.y.clone();
    match trace.mark {
        Mark::Bar { .. } => {
            plot.add_trace(
                Bar::new(x, y)
                    .name(trace.name.as_str())
                    .marker(Marker::new().color(color(trace.color)))
                    .opacity(trace.opacity)
                    .show_legend(trace.show_legend)
                    .x_axis(x_ref)
                    .y_axis(y_ref),
            );
        }
        Mark::Line { width, smooth, fill } => {
            let mut line = Line::new().color(color(trace.color)).width(width);
            if smooth {
                line = line.shape(LineShape::Spline);
            }
            let mut scatter = Scatter::new(x, y)
                .name(trace.name.as_str())
                .mode(Mode::Lines)
                .line(line)
                .opacity(trace.opacity)
                .show_legend(trace.show_legend)
                .x_axis(x_ref)
                .y_axis(y_ref);
            scatter = match fill {
                Some(Fill::ToZero) => scatter.fill(PlotlyFill::ToZeroY),
                Some(Fill::ToPrevious) => scatter.fill(PlotlyFill::ToNextY),
                None => scatter,
            };
            if let Some(fill_color) = trace.fill_color {
                scatter = scatter.fill_color(color(fill_color));
            }
            plot.add_trace(scatter);
        }
        Mark::Markers { symbol, size } => {
            let symbol = match symbol {
                Symbol::Circle => MarkerSymbol::Circle,
                Symbol::Cross => MarkerSymbol::X,
            };
            plot.add_trace(
                Scatter::new(x, y)
                    .name(trace.name.as_str())
                    .mode(Mode::Markers)
                    .marker(
                        Marker::new()
                            .color(color(trace.color))
                            .size(size.round() as usize)
                            .symbol(symbol),
                    )
                    .opacity(trace.opacity)
                    .show_legend(trace.show_legend)
                    .x_axis(x_ref)
                    .y_axis(y_ref),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::figure::AxisSpec;
    use crate::model::tests::at;

    fn panel(name: &str) -> Panel {
        let mut panel = Panel::new(name, AxisSpec::titled("ds").kind(AxisKind::Date), AxisSpec::titled(name));
        panel.traces.push(Trace::new(
            name,
            XValues::Dates(vec![at(2022, 1, 1, 0), at(2022, 1, 2, 0)]),
            vec![Some(1.0), None],
            Mark::Bar { width: Some(0.5) },
            Theme::default().prediction,
        ));
        panel
    }

    fn figure(kind: FigureKind, panels: usize) -> Figure {
        Figure {
            kind,
            width: 700,
            height: 210 * panels as u32,
            panels: (0..panels).map(|idx| panel(&format!("panel {idx}"))).collect(),
            show_legend: false,
            theme: Theme::default(),
        }
    }

    #[test]
    fn panels_map_to_numbered_axes() {
        let json = InteractiveBackend
            .render(&figure(FigureKind::Components, 3))
            .expect("plot")
            .to_json();
        assert!(json.contains("\"xaxis\":\"x3\""));
        assert!(json.contains("\"yaxis3\""));
        assert!(json.contains("\"barmode\":\"overlay\""));
        assert!(json.contains("\"traceorder\":\"reversed\""));
        assert!(json.contains("null"));
    }

    #[test]
    fn forecast_gets_range_controls() {
        let json = InteractiveBackend
            .render(&figure(FigureKind::Forecast, 1))
            .expect("plot")
            .to_json();
        assert!(json.contains("rangeselector"));
        assert!(json.contains("\"1w\""));
        assert!(json.contains("rangeslider"));
    }

    #[test]
    fn more_than_eight_panels_get_their_own_axes() {
        let plot = InteractiveBackend
            .render(&figure(FigureKind::Parameters, 10))
            .expect("plot");
        let layout = plot.layout();
        for key in ["xaxis", "yaxis", "xaxis9", "yaxis9", "xaxis10", "yaxis10"] {
            assert!(layout.get(key).is_some(), "{key} missing");
        }
        assert_eq!(layout["grid"]["rows"], 10);
        let last = &plot.data()[9];
        assert_eq!(last["xaxis"], "x10");
        assert_eq!(last["yaxis"], "y10");
    }

    #[test]
    fn full_parameter_view_renders_interactively() {
        let model = crate::model::tests::sample_snapshot();
        let options = crate::plot::ParameterOptions::default();
        let figure = crate::plot::plot_parameters(&model, &options, &Theme::default()).expect("figure");
        assert!(figure.panels.len() > 8);
        let plot = InteractiveBackend.render(&figure).expect("plot");
        let last = format!("yaxis{}", figure.panels.len());
        assert!(plot.layout().get(&last).is_some());
        assert!(plot.to_html().contains("Plotly.newPlot(\"figure\""));
    }

    #[test]
    fn axes_carry_the_theme_border_width() {
        let plot = InteractiveBackend
            .render(&figure(FigureKind::Components, 2))
            .expect("plot");
        let width = Theme::default().axis_line_width;
        for key in ["xaxis", "yaxis", "xaxis2", "yaxis2"] {
            assert_eq!(plot.layout()[key]["linewidth"].as_f64(), Some(width));
        }
    }

    #[test]
    fn inline_markup_cannot_close_its_script() {
        let mut figure = figure(FigureKind::Components, 1);
        figure.panels[0].traces[0].name = "</script><b>".to_string();
        let markup = InteractiveBackend.render(&figure).expect("plot").to_inline_html("figure-0");
        assert!(markup.starts_with("<div id=\"figure-0\""));
        assert_eq!(markup.matches("</script>").count(), 1);
    }

    #[test]
    fn percent_axes_use_percent_format() {
        let mut figure = figure(FigureKind::Components, 1);
        figure.panels[0].y.tick_format = TickFormat::Percent;
        let json = InteractiveBackend.render(&figure).expect("plot").to_json();
        assert!(json.contains("\".1%\""));
    }
}
