//! Turns backend-neutral figures into something a viewer can open.

mod interactive;
mod svg;

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::figure::Figure;

pub use interactive::{InteractiveBackend, InteractiveFigure};
pub use svg::{StaticFigure, SvgBackend};

/// A drawing target for [`Figure`]s.
pub trait RenderBackend {
    type Output;

    fn render(&self, figure: &Figure) -> Result<Self::Output>;
}

/// Output format picked from a file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Html,
    Svg,
}

impl OutputFormat {
    /// `.svg` selects the static backend; everything else is interactive HTML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("svg") => Self::Svg,
            _ => Self::Html,
        }
    }
}

/// Renders `figure` with the backend matching `path` and writes it there.
pub fn save_figure(figure: &Figure, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let format = OutputFormat::from_path(path);
    match format {
        OutputFormat::Svg => SvgBackend.render(figure)?.save(path)?,
        OutputFormat::Html => fs::write(path, InteractiveBackend.render(figure)?.to_html())?,
    }
    info!(format = ?format, path = %path.display(), "Figure written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_selects_backend() {
        assert_eq!(OutputFormat::from_path(Path::new("out/plot.svg")), OutputFormat::Svg);
        assert_eq!(OutputFormat::from_path(Path::new("out/plot.SVG")), OutputFormat::Svg);
        assert_eq!(OutputFormat::from_path(Path::new("out/plot.html")), OutputFormat::Html);
        assert_eq!(OutputFormat::from_path(Path::new("plot")), OutputFormat::Html);
    }
}
