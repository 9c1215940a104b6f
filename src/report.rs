//! Single HTML page bundling several interactive figures.

mod page;

use std::fs;
use std::path::Path;

use chrono::Utc;
use tracing::info;

use crate::error::{PlotError, Result};
use crate::figure::Figure;
use crate::render::{InteractiveBackend, RenderBackend};

/// A titled figure on the report page.
#[derive(Clone, Copy, Debug)]
pub struct ReportSection<'a> {
    pub title: &'a str,
    pub figure: &'a Figure,
}

/// Renders every section with the interactive backend and returns the page markup.
pub fn render_report(title: &str, sections: &[ReportSection<'_>]) -> Result<String> {
    if sections.is_empty() {
        return Err(PlotError::EmptyData("report has no figures".to_string()));
    }
    let plots = sections
        .iter()
        .map(|section| Ok((section.title, InteractiveBackend.render(section.figure)?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(page::render_report_page(title, &plots, Utc::now()))
}

pub fn write_report(path: &Path, title: &str, sections: &[ReportSection<'_>]) -> Result<()> {
    let page = render_report(title, sections)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, page)?;
    info!(sections = sections.len(), path = %path.display(), "Report written");
    Ok(())
}
