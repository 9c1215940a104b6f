//! maud page template for the report.

use chrono::{DateTime, Utc};
use maud::{DOCTYPE, PreEscaped, html};

use crate::constants::PLOTLY_CDN;
use crate::render::InteractiveFigure;

const GENERATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M UTC";
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub(super) fn render_report_page(
    title: &str,
    plots: &[(&str, InteractiveFigure)],
    generated_at: DateTime<Utc>,
) -> String {
    let generated_label = generated_at.format(GENERATED_AT_FORMAT).to_string();
    let page = html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
                script src=(PLOTLY_CDN) {}
                style {
                    "
                    :root {
                        --bg: #f7f6f2;
                        --card: #ffffff;
                        --ink: #1f2430;
                        --muted: #56606f;
                        --border: rgba(31, 36, 48, 0.08);
                    }
                    body {
                        margin: 0;
                        background: var(--bg);
                        color: var(--ink);
                        font-family: sans-serif;
                    }
                    .page {
                        max-width: 1240px;
                        margin: 40px auto 60px;
                        padding: 0 24px;
                    }
                    .title {
                        font-size: 26px;
                        font-weight: 600;
                        margin: 0 0 22px;
                    }
                    .card {
                        background: var(--card);
                        border-radius: 18px;
                        padding: 16px;
                        margin-bottom: 18px;
                        border: 1px solid var(--border);
                        overflow-x: auto;
                    }
                    .card h2 {
                        font-size: 16px;
                        font-weight: 500;
                        margin: 0 0 10px;
                    }
                    .footer {
                        color: var(--muted);
                        font-size: 12px;
                    }
                    "
                }
            }
            body {
                main class="page" {
                    h1 class="title" { (title) }
                    @for (idx, (section, plot)) in plots.iter().enumerate() {
                        section class="card" {
                            h2 { (section) }
                            (PreEscaped(plot.to_inline_html(&format!("figure-{idx}"))))
                        }
                    }
                    footer class="footer" {
                        "Generated " (generated_label) " by fcplot " (APP_VERSION)
                    }
                }
            }
        }
    };
    page.into_string()
}
