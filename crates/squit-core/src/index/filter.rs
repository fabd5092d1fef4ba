//! Test selection.

use std::path::Path;

use crate::config::{MergedConfig, RunConfig};

/// Decides whether an indexed leaf becomes a test.
pub trait TestFilter {
    fn accepts(&self, path: &Path, config: &MergedConfig) -> bool;
}

impl<F> TestFilter for F
where
    F: Fn(&Path, &MergedConfig) -> bool,
{
    fn accepts(&self, path: &Path, config: &MergedConfig) -> bool {
        self(path, config)
    }
}

/// Tag-based selection that also drops excluded tests.
///
/// Ignored tests are kept so they can be reported as ignored.
#[derive(Debug, Clone, Default)]
pub struct TagFilter {
    /// Every one of these tags must be present.
    pub all: Vec<String>,
    /// At least one of these tags must be present, unless empty.
    pub any: Vec<String>,
}

impl TagFilter {
    pub fn from_run_config(run: &RunConfig) -> Self {
        Self {
            all: run.tags_all.clone(),
            any: run.tags_any.clone(),
        }
    }
}

impl TestFilter for TagFilter {
    fn accepts(&self, _path: &Path, config: &MergedConfig) -> bool {
        !config.exclude
            && self.all.iter().all(|tag| config.has_tag(tag))
            && (self.any.is_empty() || self.any.iter().any(|tag| config.has_tag(tag)))
    }
}
