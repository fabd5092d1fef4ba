//! Fallback media type for arbitrary payloads.

use super::diff::render_line_diff;
use super::{MediaType, MediaTypeError};
use crate::config::{MergedConfig, MEDIA_TYPE_TEXT};

/// Exact, line-oriented comparison of arbitrary payloads.
pub struct GenericMediaType;

impl GenericMediaType {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GenericMediaType {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaType for GenericMediaType {
    fn name(&self) -> &'static str {
        MEDIA_TYPE_TEXT
    }

    fn extension(&self) -> &'static str {
        "txt"
    }

    fn handles(&self, _media_type: &str) -> bool {
        true
    }

    fn canonicalize(&self, body: &[u8]) -> Result<String, MediaTypeError> {
        Ok(String::from_utf8_lossy(body).into_owned())
    }

    fn diff(
        &self,
        expected: &[u8],
        actual: &[u8],
        _config: &MergedConfig,
    ) -> Result<String, MediaTypeError> {
        if expected == actual {
            return Ok(String::new());
        }

        let diff = render_line_diff(
            &String::from_utf8_lossy(expected),
            &String::from_utf8_lossy(actual),
        );
        if diff.is_empty() {
            // Same text, different bytes (e.g. invalid UTF-8 sequences).
            return Ok(format!(
                "Binary content differs: expected {} bytes, got {} bytes",
                expected.len(),
                actual.len()
            ));
        }

        Ok(diff)
    }
}
