//! The diff stage: turns processed artifacts into results.

use std::fs;

use tracing::{debug, info};

use crate::index::SquitTest;
use crate::layout::BuildLayout;
use crate::media::MediaTypeRegistry;
use crate::result::{ResultContext, RunSummary, SquitResult};
use crate::runner::ResponseMeta;

/// Compares expected with actual responses of every test.
pub struct DiffStage<'a> {
    layout: &'a BuildLayout,
    media_types: &'a MediaTypeRegistry,
}

impl<'a> DiffStage<'a> {
    pub fn new(layout: &'a BuildLayout, media_types: &'a MediaTypeRegistry) -> Self {
        Self {
            layout,
            media_types,
        }
    }

    /// One result per test, in path order. Ids are positions in that order.
    pub fn compare(&self, tests: &[SquitTest]) -> Vec<SquitResult> {
        let mut sorted: Vec<&SquitTest> = tests.iter().collect();
        sorted.sort_by(|a, b| a.path.cmp(&b.path));

        let results: Vec<SquitResult> = sorted
            .into_iter()
            .enumerate()
            .map(|(id, test)| self.compare_one(id as u64, test))
            .collect();

        let summary = RunSummary::from_results(&results);
        info!(
            passed = summary.passed,
            failed = summary.failed,
            errors = summary.errors,
            ignored = summary.ignored,
            "comparison finished"
        );
        results
    }

    fn compare_one(&self, id: u64, test: &SquitTest) -> SquitResult {
        let config = test.config.as_ref();
        let handler = self.media_types.for_media_type(&config.media_type);
        let context = ResultContext {
            id,
            path: test.path.clone(),
            media_type: config.media_type.clone(),
            alternative_name: config.title.clone(),
            expected_response_code: config.expected_response_code,
            request_name: handler.request_name(),
            expected_name: handler.expected_response_name(),
            actual_name: handler.actual_response_name(),
        };

        if config.ignore {
            return SquitResult::skipped(context, self.layout);
        }
        if let Some(error) = self.layout.first_error(&test.path) {
            return SquitResult::errored(context, self.layout, error);
        }

        if let Some(expected_code) = config.expected_response_code {
            let status = ResponseMeta::read(&self.layout.raw_responses(&test.path))
                .and_then(|meta| meta.status);
            if status != Some(expected_code) {
                let actual = status.map_or_else(|| "none".to_string(), |s| s.to_string());
                return SquitResult::compared(
                    context,
                    self.layout,
                    format!("Expected response code {expected_code} but got {actual}"),
                );
            }
        }

        let expected_path = self.layout.sources(&test.path).join(&context.expected_name);
        let actual_path = self
            .layout
            .processed_responses(&test.path)
            .join(&context.actual_name);

        let expected = match fs::read(&expected_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                let error = format!("Missing expected response {}: {e}", expected_path.display());
                return SquitResult::errored(context, self.layout, error);
            }
        };
        let actual = match fs::read(&actual_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                let error = format!("Missing actual response {}: {e}", actual_path.display());
                return SquitResult::errored(context, self.layout, error);
            }
        };

        match handler.diff(&expected, &actual, config) {
            Ok(difference) => {
                debug!(test = %test.path.display(), equal = difference.trim().is_empty(), "compared");
                SquitResult::compared(context, self.layout, difference)
            }
            Err(e) => SquitResult::errored(context, self.layout, e.to_string()),
        }
    }
}
