//! Report writers.
//!
//! Reports are rebuilt from the result list on every run:
//! - `reports/junit.xml` - machine readable, one suite per directory
//! - `reports/index.html` - hierarchical human readable report
//! - `reports/failures/<test>/` - artifacts of every failed test

mod failures;
mod html;
mod junit;

pub use failures::copy_failures;
pub use html::render_html;
pub use junit::render_junit;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::config::{FAILURES_DIR, HTML_REPORT_FILE, JUNIT_REPORT_FILE};
use crate::layout::BuildLayout;
use crate::media::{render_line_diff, MediaTypeRegistry};
use crate::result::SquitResult;

/// Errors raised while writing reports.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ReportError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ReportError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Paths of the written reports.
#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub junit: PathBuf,
    pub html: PathBuf,
    pub failures: PathBuf,
}

/// Write every report below the reports directory, replacing earlier ones.
pub fn write_reports(
    layout: &BuildLayout,
    media_types: &MediaTypeRegistry,
    results: &[SquitResult],
    title: &str,
) -> Result<ReportPaths, ReportError> {
    let dir = layout.reports_dir();
    if dir.exists() {
        fs::remove_dir_all(&dir).map_err(|e| ReportError::io(&dir, e))?;
    }
    fs::create_dir_all(&dir).map_err(|e| ReportError::io(&dir, e))?;

    let junit = dir.join(JUNIT_REPORT_FILE);
    write(&junit, &render_junit(results))?;

    let html = dir.join(HTML_REPORT_FILE);
    write(&html, &render_html(title, media_types, results))?;

    let failures = copy_failures(layout, media_types, results)?;

    info!(dir = %dir.display(), failures = failures.len(), "reports written");
    Ok(ReportPaths {
        junit,
        html,
        failures: dir.join(FAILURES_DIR),
    })
}

/// Line diff of the canonical forms of expected and actual response.
///
/// Documents that cannot be canonicalized are compared as text.
pub fn canonical_diff(result: &SquitResult, media_types: &MediaTypeRegistry) -> String {
    let handler = media_types.for_media_type(&result.media_type);
    let canonical = |path: PathBuf| -> String {
        let Ok(bytes) = fs::read(path) else {
            return String::new();
        };
        handler
            .canonicalize(&bytes)
            .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned())
    };
    render_line_diff(
        &canonical(result.expected_file()),
        &canonical(result.actual_file()),
    )
}

fn write(path: &Path, content: &str) -> Result<(), ReportError> {
    fs::write(path, content).map_err(|e| ReportError::io(path, e))
}

/// Escape markup special characters.
pub(crate) fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
