//! Backend-neutral figure tree: panels of typed traces plus axis metadata.
//!
//! Every plotting entry point builds a [`Figure`]; a [`crate::render::RenderBackend`]
//! turns it into something a browser or an image viewer can show.

use chrono::NaiveDateTime;

use crate::theme::{Rgba, Theme};

#[derive(Clone, Debug, PartialEq)]
pub enum XValues {
    Dates(Vec<NaiveDateTime>),
    Numbers(Vec<f64>),
    Categories(Vec<String>),
}

impl XValues {
    pub const fn len(&self) -> usize {
        match self {
            Self::Dates(values) => values.len(),
            Self::Numbers(values) => values.len(),
            Self::Categories(values) => values.len(),
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fill {
    /// Down to the zero line.
    ToZero,
    /// Up to the previous trace in the same panel.
    ToPrevious,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Symbol {
    Circle,
    Cross,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Mark {
    Line {
        width: f64,
        smooth: bool,
        fill: Option<Fill>,
    },
    /// Bar width in x units (days on date axes); `None` lets the backend pick.
    Bar { width: Option<f64> },
    Markers { symbol: Symbol, size: f64 },
}

impl Mark {
    pub const fn is_bar(&self) -> bool {
        matches!(self, Self::Bar { .. })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Trace {
    pub name: String,
    pub x: XValues,
    /// Missing values leave gaps; they are never drawn as zero.
    pub y: Vec<Option<f64>>,
    pub mark: Mark,
    pub color: Rgba,
    /// Colour of the filled region, when the mark fills.
    pub fill_color: Option<Rgba>,
    pub opacity: f64,
    pub show_legend: bool,
}

impl Trace {
    pub fn new(name: impl Into<String>, x: XValues, y: Vec<Option<f64>>, mark: Mark, color: Rgba) -> Self {
        Self {
            name: name.into(),
            x,
            y,
            mark,
            color,
            fill_color: None,
            opacity: 1.0,
            show_legend: false,
        }
    }

    #[must_use]
    pub const fn opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }

    #[must_use]
    pub const fn legend(mut self, show: bool) -> Self {
        self.show_legend = show;
        self
    }

    #[must_use]
    pub const fn fill_color(mut self, color: Rgba) -> Self {
        self.fill_color = Some(color);
        self
    }

    /// Present values only, in draw order.
    pub fn finite_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.y.iter().flatten().copied().filter(|value| value.is_finite())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AxisPoint {
    Date(NaiveDateTime),
    Number(f64),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AxisKind {
    #[default]
    Linear,
    Date,
    Category,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RangeMode {
    #[default]
    Auto,
    /// Always include zero.
    ToZero,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TickFormat {
    #[default]
    Auto,
    /// strftime pattern for date axes.
    Time(String),
    /// Fractions shown as percentages.
    Percent,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Tick {
    pub at: AxisPoint,
    pub label: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AxisSpec {
    pub title: String,
    pub kind: AxisKind,
    pub range: Option<(AxisPoint, AxisPoint)>,
    pub range_mode: RangeMode,
    pub tick_format: TickFormat,
    /// Explicit ticks; empty means the backend places them.
    pub ticks: Vec<Tick>,
    pub tick_angle: Option<f64>,
}

impl AxisSpec {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn kind(mut self, kind: AxisKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub const fn range_mode(mut self, mode: RangeMode) -> Self {
        self.range_mode = mode;
        self
    }

    #[must_use]
    pub fn tick_format(mut self, format: TickFormat) -> Self {
        self.tick_format = format;
        self
    }

    #[must_use]
    pub const fn range(mut self, lower: AxisPoint, upper: AxisPoint) -> Self {
        self.range = Some((lower, upper));
        self
    }

    #[must_use]
    pub fn ticks(mut self, ticks: Vec<Tick>) -> Self {
        self.ticks = ticks;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Panel {
    /// Display name; panels with the same name are merged by the layout composer.
    pub name: String,
    pub x: AxisSpec,
    pub y: AxisSpec,
    pub traces: Vec<Trace>,
    /// Y values are ratios and must be shown as percentages.
    pub multiplicative: bool,
}

impl Panel {
    pub fn new(name: impl Into<String>, x: AxisSpec, y: AxisSpec) -> Self {
        Self {
            name: name.into(),
            x,
            y,
            traces: Vec::new(),
            multiplicative: false,
        }
    }

    pub fn has_bars(&self) -> bool {
        self.traces.iter().any(|trace| trace.mark.is_bar())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FigureKind {
    /// Single chart of actuals and predictions.
    Forecast,
    Components,
    Parameters,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Figure {
    pub kind: FigureKind,
    pub width: u32,
    pub height: u32,
    pub panels: Vec<Panel>,
    pub show_legend: bool,
    pub theme: Theme,
}

impl Figure {
    pub fn trace_count(&self) -> usize {
        self.panels.iter().map(|panel| panel.traces.len()).sum()
    }

    pub fn panel(&self, name: &str) -> Option<&Panel> {
        self.panels.iter().find(|panel| panel.name == name)
    }
}
