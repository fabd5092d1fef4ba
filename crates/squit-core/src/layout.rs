//! Build-output layout shared by every pipeline stage.
//!
//! ```text
//! build/squit/
//!   sources/<test>/              # processed request, expected response, SQL, config
//!   responses/raw/<test>/        # actual response, meta.json, error.txt
//!   responses/processed/<test>/  # post-processed actual response
//!   reports/                     # junit.xml, index.html, failures/<test>/
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{
    ERROR_FILE, FAILURES_DIR, PROCESSED_RESPONSES_DIR, RAW_RESPONSES_DIR, REPORTS_DIR,
    SOURCES_DIR,
};

/// Paths of every artifact below the build directory.
#[derive(Debug, Clone)]
pub struct BuildLayout {
    build_dir: PathBuf,
}

impl BuildLayout {
    pub fn new(build_dir: impl Into<PathBuf>) -> Self {
        Self {
            build_dir: build_dir.into(),
        }
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// Processed sources of a test.
    pub fn sources(&self, test: &Path) -> PathBuf {
        self.build_dir.join(SOURCES_DIR).join(test)
    }

    /// Raw responses of a test.
    pub fn raw_responses(&self, test: &Path) -> PathBuf {
        self.build_dir.join(RAW_RESPONSES_DIR).join(test)
    }

    /// Post-processed responses of a test.
    pub fn processed_responses(&self, test: &Path) -> PathBuf {
        self.build_dir.join(PROCESSED_RESPONSES_DIR).join(test)
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.build_dir.join(REPORTS_DIR)
    }

    /// Failure artifacts of a test.
    pub fn failures(&self, test: &Path) -> PathBuf {
        self.reports_dir().join(FAILURES_DIR).join(test)
    }

    /// Error artifacts of a test, in stage order.
    pub fn error_files(&self, test: &Path) -> [PathBuf; 3] {
        [
            self.sources(test).join(ERROR_FILE),
            self.raw_responses(test).join(ERROR_FILE),
            self.processed_responses(test).join(ERROR_FILE),
        ]
    }

    /// First recorded error artifact of a test, if any stage recorded one.
    pub fn first_error(&self, test: &Path) -> Option<String> {
        self.error_files(test)
            .iter()
            .find(|path| path.is_file())
            .and_then(|path| fs::read_to_string(path).ok())
    }
}

/// Write a per-test error artifact into `dir`, creating it as needed.
pub fn write_error(dir: &Path, error: &dyn std::fmt::Display) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    fs::write(dir.join(ERROR_FILE), error.to_string())
}

/// Replace `dir` with an empty directory, dropping artifacts of a
/// previous run.
pub fn reset_dir(dir: &Path) -> std::io::Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)
}
