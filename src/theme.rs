//! Immutable styling shared by every figure, with optional TOML overrides.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::constants::{OVERLAY_ALPHA_MIN, OVERLAY_ALPHA_SOFTNESS};
use crate::error::{PlotError, Result};

pub const DEFAULT_THEME_PATH: &str = "config/theme.toml";

const COLOR_PREDICTION: (u8, u8, u8) = (45, 146, 255);
const COLOR_ACTUAL: (u8, u8, u8) = (0, 0, 0);
const COLOR_TREND: (u8, u8, u8) = (178, 59, 0);
const COLOR_PARAMETER: (u8, u8, u8) = (0, 114, 178);
const COLOR_HIGHLIGHT: (u8, u8, u8) = (0, 0, 255);
const COLOR_BAND: (u8, u8, u8, f64) = (45, 146, 255, 0.2);
const LINE_WIDTH: f64 = 2.0;
const LINE_WIDTH_BAND: f64 = 1.0;
const LINE_WIDTH_AXIS: f64 = 1.5;
const MARKER_SIZE: f64 = 4.0;
const FONT_SIZE: usize = 10;
const FONT_SIZE_TITLE: usize = 12;
const FONT_FAMILY: &str = "sans-serif";
const MARGIN_LEFT: usize = 0;
const MARGIN_RIGHT: usize = 10;
const MARGIN_TOP: usize = 10;
const MARGIN_BOTTOM: usize = 0;
const MARGIN_PAD: usize = 0;
const FIGURE_WIDTH: u32 = 700;
const PANEL_HEIGHT: u32 = 210;
const AXIS_PADDING: f64 = 0.05;
const ROLLING_OPACITY: f64 = 0.5;
const FORECAST_ALPHA_BASE: f64 = 0.2;
const FORECAST_ALPHA_GAIN: f64 = 2.0;
const FORECAST_ALPHA_OFFSET: f64 = 2.5;

/// Colour with straight alpha in `0..=1`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Rgba {
    pub const fn rgb(color: (u8, u8, u8)) -> Self {
        Self {
            r: color.0,
            g: color.1,
            b: color.2,
            a: 1.0,
        }
    }

    pub const fn rgba(color: (u8, u8, u8, f64)) -> Self {
        Self {
            r: color.0,
            g: color.1,
            b: color.2,
            a: color.3,
        }
    }

    /// Parses `#rrggbb` or `#rrggbbaa`.
    pub fn parse_hex(raw: &str) -> Result<Self> {
        let invalid = || PlotError::InvalidTheme(format!("'{raw}' is not a #rrggbb colour"));
        let hex = raw.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !matches!(hex.len(), 6 | 8) || !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |idx: usize| u8::from_str_radix(&hex[idx..idx + 2], 16).map_err(|_| invalid());
        let alpha = if hex.len() == 8 {
            f64::from(channel(6)?) / 255.0
        } else {
            1.0
        };
        Ok(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
            a: alpha,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Margin {
    pub left: usize,
    pub right: usize,
    pub top: usize,
    pub bottom: usize,
    pub pad: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Theme {
    pub prediction: Rgba,
    pub actual: Rgba,
    pub trend: Rgba,
    /// Bars and lines of the parameter view.
    pub parameter: Rgba,
    /// Cross markers over a highlighted forecast step.
    pub highlight: Rgba,
    pub band: Rgba,
    pub line_width: f64,
    pub band_line_width: f64,
    pub axis_line_width: f64,
    pub marker_size: f64,
    pub font_size: usize,
    pub title_font_size: usize,
    pub font_family: String,
    pub margin: Margin,
    pub width: u32,
    pub panel_height: u32,
    /// Fraction of the data span added on both sides of a date axis.
    pub axis_padding: f64,
    pub rolling_opacity: f64,
    pub overlay_alpha_min: f64,
    pub overlay_alpha_softness: f64,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            prediction: Rgba::rgb(COLOR_PREDICTION),
            actual: Rgba::rgb(COLOR_ACTUAL),
            trend: Rgba::rgb(COLOR_TREND),
            parameter: Rgba::rgb(COLOR_PARAMETER),
            highlight: Rgba::rgb(COLOR_HIGHLIGHT),
            band: Rgba::rgba(COLOR_BAND),
            line_width: LINE_WIDTH,
            band_line_width: LINE_WIDTH_BAND,
            axis_line_width: LINE_WIDTH_AXIS,
            marker_size: MARKER_SIZE,
            font_size: FONT_SIZE,
            title_font_size: FONT_SIZE_TITLE,
            font_family: FONT_FAMILY.to_string(),
            margin: Margin {
                left: MARGIN_LEFT,
                right: MARGIN_RIGHT,
                top: MARGIN_TOP,
                bottom: MARGIN_BOTTOM,
                pad: MARGIN_PAD,
            },
            width: FIGURE_WIDTH,
            panel_height: PANEL_HEIGHT,
            axis_padding: AXIS_PADDING,
            rolling_opacity: ROLLING_OPACITY,
            overlay_alpha_min: OVERLAY_ALPHA_MIN,
            overlay_alpha_softness: OVERLAY_ALPHA_SOFTNESS,
        }
    }
}

impl Theme {
    /// Opacity of the horizon trace at 0-based `index`; 1.0 for the first horizon.
    pub fn overlay_alpha(&self, index: usize) -> f64 {
        let softness = self.overlay_alpha_softness;
        self.overlay_alpha_min + softness * (1.0 - self.overlay_alpha_min) / (index as f64 + softness)
    }

    /// Opacity of the `index`-th point-prediction line of the main forecast chart.
    pub fn forecast_line_alpha(index: usize) -> f64 {
        FORECAST_ALPHA_BASE + FORECAST_ALPHA_GAIN / (index as f64 + FORECAST_ALPHA_OFFSET)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThemeFile {
    pub colors: Option<ColorsFile>,
    pub lines: Option<LinesFile>,
    pub layout: Option<LayoutFile>,
    pub overlay: Option<OverlayFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColorsFile {
    pub prediction: Option<String>,
    pub actual: Option<String>,
    pub trend: Option<String>,
    pub parameter: Option<String>,
    pub highlight: Option<String>,
    pub band: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinesFile {
    pub width: Option<f64>,
    pub band_width: Option<f64>,
    pub axis_width: Option<f64>,
    pub marker_size: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayoutFile {
    pub width: Option<u32>,
    pub panel_height: Option<u32>,
    pub font_size: Option<usize>,
    pub title_font_size: Option<usize>,
    pub font_family: Option<String>,
    pub axis_padding: Option<f64>,
    pub margin: Option<[usize; 5]>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverlayFile {
    pub alpha_min: Option<f64>,
    pub alpha_softness: Option<f64>,
    pub rolling_opacity: Option<f64>,
}

fn apply_color(slot: &mut Rgba, raw: Option<String>) -> Result<()> {
    if let Some(raw) = raw {
        *slot = Rgba::parse_hex(&raw)?;
    }
    Ok(())
}

/// Merges file overrides onto the built-in theme.
pub fn resolve_theme(file: ThemeFile) -> Result<Theme> {
    let mut theme = Theme::default();
    if let Some(colors) = file.colors {
        apply_color(&mut theme.prediction, colors.prediction)?;
        apply_color(&mut theme.actual, colors.actual)?;
        apply_color(&mut theme.trend, colors.trend)?;
        apply_color(&mut theme.parameter, colors.parameter)?;
        apply_color(&mut theme.highlight, colors.highlight)?;
        apply_color(&mut theme.band, colors.band)?;
    }
    if let Some(lines) = file.lines {
        theme.line_width = lines.width.unwrap_or(theme.line_width);
        theme.band_line_width = lines.band_width.unwrap_or(theme.band_line_width);
        theme.axis_line_width = lines.axis_width.unwrap_or(theme.axis_line_width);
        theme.marker_size = lines.marker_size.unwrap_or(theme.marker_size);
    }
    if let Some(layout) = file.layout {
        theme.width = layout.width.unwrap_or(theme.width);
        theme.panel_height = layout.panel_height.unwrap_or(theme.panel_height);
        theme.font_size = layout.font_size.unwrap_or(theme.font_size);
        theme.title_font_size = layout.title_font_size.unwrap_or(theme.title_font_size);
        if let Some(family) = layout.font_family {
            theme.font_family = family;
        }
        theme.axis_padding = layout.axis_padding.unwrap_or(theme.axis_padding);
        if let Some([left, right, top, bottom, pad]) = layout.margin {
            theme.margin = Margin {
                left,
                right,
                top,
                bottom,
                pad,
            };
        }
    }
    if let Some(overlay) = file.overlay {
        theme.overlay_alpha_min = overlay.alpha_min.unwrap_or(theme.overlay_alpha_min);
        theme.overlay_alpha_softness = overlay
            .alpha_softness
            .unwrap_or(theme.overlay_alpha_softness);
        theme.rolling_opacity = overlay.rolling_opacity.unwrap_or(theme.rolling_opacity);
    }
    Ok(theme)
}

pub fn validate_theme(theme: &Theme) -> Result<()> {
    let positive = [
        ("lines.width", theme.line_width),
        ("lines.band_width", theme.band_line_width),
        ("lines.axis_width", theme.axis_line_width),
        ("lines.marker_size", theme.marker_size),
        ("overlay.alpha_softness", theme.overlay_alpha_softness),
    ];
    for (key, value) in positive {
        if !value.is_finite() || value <= 0.0 {
            return Err(PlotError::InvalidTheme(format!("{key} must be > 0")));
        }
    }
    let fractions = [
        ("overlay.alpha_min", theme.overlay_alpha_min),
        ("overlay.rolling_opacity", theme.rolling_opacity),
        ("layout.axis_padding", theme.axis_padding),
    ];
    for (key, value) in fractions {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(PlotError::InvalidTheme(format!("{key} must be within 0..=1")));
        }
    }
    if theme.width == 0 || theme.panel_height == 0 {
        return Err(PlotError::InvalidTheme(
            "layout.width and layout.panel_height must be > 0".to_string(),
        ));
    }
    if theme.font_size == 0 {
        return Err(PlotError::InvalidTheme("layout.font_size must be > 0".to_string()));
    }
    Ok(())
}

pub fn parse_theme(raw: &str) -> Result<Theme> {
    let file: ThemeFile =
        toml::from_str(raw).map_err(|err| PlotError::InvalidTheme(err.to_string()))?;
    let theme = resolve_theme(file)?;
    validate_theme(&theme)?;
    Ok(theme)
}

/// Loads a theme file. A missing file at the default location means built-in styling.
pub fn load_theme(path: &Path) -> Result<Theme> {
    if !path.exists() {
        if path == Path::new(DEFAULT_THEME_PATH) {
            tracing::info!(
                "Theme {} not found, using built-in defaults",
                path.display()
            );
            return Ok(Theme::default());
        }
        return Err(PlotError::InvalidTheme(format!(
            "theme file {} does not exist",
            path.display()
        )));
    }
    let raw = fs::read_to_string(path)?;
    parse_theme(&raw)
        .map_err(|err| PlotError::InvalidTheme(format!("{}: {err}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_alpha_fades_with_depth() {
        let theme = Theme::default();
        assert!((theme.overlay_alpha(0) - 1.0).abs() < 1e-12);
        let expected = 0.2 + 1.2 * 0.8 / (2.0 + 1.2);
        assert!((theme.overlay_alpha(2) - expected).abs() < 1e-12);
        assert!(theme.overlay_alpha(1) > theme.overlay_alpha(2));
    }

    #[test]
    fn parses_hex_colours() {
        assert_eq!(Rgba::parse_hex("#2d92ff").expect("hex"), Rgba::rgb((45, 146, 255)));
        let translucent = Rgba::parse_hex("#00000080").expect("hex");
        assert!((translucent.a - 128.0 / 255.0).abs() < 1e-12);
        assert!(Rgba::parse_hex("2d92ff").is_err());
        assert!(Rgba::parse_hex("#2d92f").is_err());
    }

    #[test]
    fn file_overrides_only_given_fields() {
        let theme = parse_theme(
            r##"
            [colors]
            trend = "#112233"

            [layout]
            panel_height = 300
            "##,
        )
        .expect("theme");
        assert_eq!(theme.trend, Rgba::rgb((0x11, 0x22, 0x33)));
        assert_eq!(theme.panel_height, 300);
        assert_eq!(theme.width, Theme::default().width);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let err = parse_theme("[overlay]\nalpha_min = 1.5\n").unwrap_err();
        assert!(matches!(err, PlotError::InvalidTheme(msg) if msg.contains("alpha_min")));
        assert!(parse_theme("[lines]\nwidth = 0.0\n").is_err());
        assert!(parse_theme("[unknown]\nx = 1\n").is_err());
    }

    #[test]
    fn missing_explicit_theme_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("theme.toml");
        let err = load_theme(&missing).unwrap_err();
        assert!(matches!(err, PlotError::InvalidTheme(msg) if msg.contains("does not exist")));
    }
}
