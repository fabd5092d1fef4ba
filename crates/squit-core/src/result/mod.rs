//! Test outcomes and their aggregation.

mod tree;

pub use tree::SquitResultTree;

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use crate::config::DESCRIPTION_FILE;
use crate::layout::BuildLayout;
use crate::runner::ResponseMeta;

/// Outcome of one test.
#[derive(Debug, Clone)]
pub struct SquitResult {
    /// Position of the test in path order.
    pub id: u64,
    /// Difference between expected and actual response, or the error text.
    /// Blank when the test passed.
    pub difference: String,
    /// Status code the test expects, if configured.
    pub expected_response_code: Option<u16>,
    pub ignored: bool,
    /// Whether `difference` holds a runtime error rather than a mismatch.
    pub error: bool,
    pub media_type: String,
    /// Configured title shown instead of the directory name.
    pub alternative_name: Option<String>,
    /// Project directory.
    pub context_path: PathBuf,
    /// Directories between project and test, possibly empty.
    pub suite_path: PathBuf,
    /// Leaf directory name.
    pub test_path: PathBuf,
    /// Artifact file names of the test's media type.
    pub request_name: String,
    pub expected_name: String,
    pub actual_name: String,
    layout: BuildLayout,
    meta: OnceLock<Option<ResponseMeta>>,
}

/// Everything needed to build a [`SquitResult`] besides its outcome.
#[derive(Debug, Clone)]
pub struct ResultContext {
    pub id: u64,
    pub path: PathBuf,
    pub media_type: String,
    pub alternative_name: Option<String>,
    pub expected_response_code: Option<u16>,
    pub request_name: String,
    pub expected_name: String,
    pub actual_name: String,
}

impl SquitResult {
    fn new(context: ResultContext, layout: &BuildLayout, difference: String) -> Self {
        let mut segments: Vec<PathBuf> = context
            .path
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(PathBuf::from(name)),
                _ => None,
            })
            .collect();

        let test_path = segments.pop().unwrap_or_default();
        let context_path = if segments.is_empty() {
            PathBuf::new()
        } else {
            segments.remove(0)
        };
        let suite_path = segments.iter().collect();

        Self {
            id: context.id,
            difference,
            expected_response_code: context.expected_response_code,
            ignored: false,
            error: false,
            media_type: context.media_type,
            alternative_name: context.alternative_name,
            context_path,
            suite_path,
            test_path,
            request_name: context.request_name,
            expected_name: context.expected_name,
            actual_name: context.actual_name,
            layout: layout.clone(),
            meta: OnceLock::new(),
        }
    }

    /// A compared test. A blank difference means it passed.
    pub fn compared(context: ResultContext, layout: &BuildLayout, difference: String) -> Self {
        Self::new(context, layout, difference)
    }

    /// A test that failed with a runtime error.
    pub fn errored(context: ResultContext, layout: &BuildLayout, error: String) -> Self {
        Self {
            error: true,
            ..Self::new(context, layout, error)
        }
    }

    /// A test that was not run.
    pub fn skipped(context: ResultContext, layout: &BuildLayout) -> Self {
        Self {
            ignored: true,
            ..Self::new(context, layout, String::new())
        }
    }

    /// Test directory relative to the source root.
    pub fn full_path(&self) -> PathBuf {
        self.context_path.join(&self.suite_path).join(&self.test_path)
    }

    /// Path segments from the project down to the test directory.
    pub fn segments(&self) -> Vec<String> {
        [&self.context_path, &self.suite_path, &self.test_path]
            .into_iter()
            .flat_map(|p| p.components())
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect()
    }

    /// Title if configured, otherwise the test directory name.
    pub fn name(&self) -> String {
        self.alternative_name
            .clone()
            .unwrap_or_else(|| self.test_path.to_string_lossy().to_string())
    }

    pub fn is_ignored(&self) -> bool {
        self.ignored
    }

    pub fn is_error(&self) -> bool {
        !self.ignored && self.error
    }

    pub fn is_success(&self) -> bool {
        !self.ignored && !self.error && self.difference.trim().is_empty()
    }

    /// Mismatch or error.
    pub fn is_failure(&self) -> bool {
        !self.ignored && !self.is_success()
    }

    /// Timing metadata of the request, loaded on first access.
    pub fn meta(&self) -> Option<&ResponseMeta> {
        self.meta
            .get_or_init(|| ResponseMeta::read(&self.layout.raw_responses(&self.full_path())))
            .as_ref()
    }

    pub fn request_file(&self) -> PathBuf {
        self.layout.sources(&self.full_path()).join(&self.request_name)
    }

    pub fn expected_file(&self) -> PathBuf {
        self.layout.sources(&self.full_path()).join(&self.expected_name)
    }

    pub fn actual_file(&self) -> PathBuf {
        self.layout
            .processed_responses(&self.full_path())
            .join(&self.actual_name)
    }

    pub fn expected_response(&self) -> Option<String> {
        read(&self.expected_file())
    }

    pub fn actual_response(&self) -> Option<String> {
        read(&self.actual_file())
    }

    pub fn description(&self) -> Option<String> {
        read(&self.layout.sources(&self.full_path()).join(DESCRIPTION_FILE))
    }
}

fn read(path: &Path) -> Option<String> {
    fs::read(path)
        .ok()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

/// Totals of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    /// Mismatches, not counting errors.
    pub failed: usize,
    pub errors: usize,
    pub ignored: usize,
}

impl RunSummary {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a SquitResult>) -> Self {
        results.into_iter().fold(Self::default(), |mut summary, result| {
            summary.total += 1;
            if result.is_ignored() {
                summary.ignored += 1;
            } else if result.is_error() {
                summary.errors += 1;
            } else if result.is_success() {
                summary.passed += 1;
            } else {
                summary.failed += 1;
            }
            summary
        })
    }

    /// Run-level outcome. Errors always fail the run; mismatches only when
    /// `fail_on_failures` is set. Ignored tests never count.
    pub fn is_success(&self, fail_on_failures: bool) -> bool {
        self.errors == 0 && (!fail_on_failures || self.failed == 0)
    }
}

#[cfg(test)]
pub(crate) fn context(id: u64, path: &str) -> ResultContext {
    ResultContext {
        id,
        path: PathBuf::from(path),
        media_type: "application/xml".to_string(),
        alternative_name: None,
        expected_response_code: None,
        request_name: "request.xml".to_string(),
        expected_name: "expected_response.xml".to_string(),
        actual_name: "actual_response.xml".to_string(),
    }
}
