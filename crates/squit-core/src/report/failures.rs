use std::fs;
use std::path::{Path, PathBuf};

use super::{canonical_diff, ReportError};
use crate::config::{DIFF_FILE, ERROR_FILE, META_FILE};
use crate::layout::BuildLayout;
use crate::media::MediaTypeRegistry;
use crate::result::SquitResult;

/// Copy the artifacts of every failed test into `reports/failures/<test>/`.
///
/// Returns the created directories.
pub fn copy_failures(
    layout: &BuildLayout,
    media_types: &MediaTypeRegistry,
    results: &[SquitResult],
) -> Result<Vec<PathBuf>, ReportError> {
    let mut created = Vec::new();

    for result in results.iter().filter(|r| r.is_failure()) {
        let path = result.full_path();
        let target = layout.failures(&path);
        fs::create_dir_all(&target).map_err(|e| ReportError::io(&target, e))?;

        // Processed sources: request, expected response, SQL, config, description.
        copy_files(&layout.sources(&path), &target)?;

        let raw = layout.raw_responses(&path);
        copy_if_exists(&raw.join(META_FILE), &target.join(META_FILE))?;
        let actual = result.actual_file();
        if actual.is_file() {
            copy_if_exists(&actual, &target.join(&result.actual_name))?;
        } else {
            copy_if_exists(&raw.join(&result.actual_name), &target.join(&result.actual_name))?;
        }

        if result.is_error() {
            let file = target.join(ERROR_FILE);
            fs::write(&file, &result.difference).map_err(|e| ReportError::io(&file, e))?;
        } else {
            let mut diff = result.difference.clone();
            let lines = canonical_diff(result, media_types);
            if !lines.is_empty() {
                diff.push_str("\n\n");
                diff.push_str(&lines);
            }
            let file = target.join(DIFF_FILE);
            fs::write(&file, diff).map_err(|e| ReportError::io(&file, e))?;
        }

        created.push(target);
    }

    Ok(created)
}

fn copy_files(from: &Path, to: &Path) -> Result<(), ReportError> {
    let Ok(entries) = fs::read_dir(from) else {
        return Ok(());
    };
    for entry in entries {
        let entry = entry.map_err(|e| ReportError::io(from, e))?;
        let source = entry.path();
        if source.is_file() {
            copy_if_exists(&source, &to.join(entry.file_name()))?;
        }
    }
    Ok(())
}

fn copy_if_exists(from: &Path, to: &Path) -> Result<(), ReportError> {
    if !from.is_file() {
        return Ok(());
    }
    fs::copy(from, to)
        .map(|_| ())
        .map_err(|e| ReportError::io(from, e))
}
