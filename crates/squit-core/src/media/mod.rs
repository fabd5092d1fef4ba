//! Media types: file naming, processing hooks, canonical form and semantic
//! diff per content type.
//!
//! Built-in handlers:
//!
//! - [`XmlMediaType`] - whitespace-insensitive tree comparison
//! - [`JsonMediaType`] - key-order-insensitive value comparison
//! - [`GenericMediaType`] - exact line comparison, used as fallback

mod diff;
mod generic;
mod json;
mod xml;

pub use diff::render_line_diff;
pub use generic::GenericMediaType;
pub use json::JsonMediaType;
pub use xml::XmlMediaType;

use std::sync::Arc;
use thiserror::Error;

use crate::config::MergedConfig;

/// Errors raised while handling a document.
#[derive(Debug, Error)]
pub enum MediaTypeError {
    #[error("Malformed {kind} document: {message}")]
    Malformed { kind: &'static str, message: String },

    #[error("Document is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Handler for one content type.
///
/// A handler decides how test files are named, validates or transforms
/// documents before and after a request, renders a canonical form for
/// humans and compares expected with actual documents.
pub trait MediaType: Send + Sync {
    /// Canonical media type name, e.g. `application/xml`.
    fn name(&self) -> &'static str;

    /// File extension of test documents, without the leading dot.
    fn extension(&self) -> &'static str;

    /// Whether this handler accepts the given (normalized) media type.
    fn handles(&self, media_type: &str) -> bool;

    /// Request file name in the test tree.
    fn request_name(&self) -> String {
        format!("request.{}", self.extension())
    }

    /// Expected response file name in the test tree.
    fn source_response_name(&self) -> String {
        format!("response.{}", self.extension())
    }

    /// Expected response file name among the processed sources.
    fn expected_response_name(&self) -> String {
        format!("expected_response.{}", self.extension())
    }

    /// Actual response file name among the responses.
    fn actual_response_name(&self) -> String {
        format!("actual_response.{}", self.extension())
    }

    /// Check that a document is well-formed.
    fn validate(&self, _body: &[u8]) -> Result<(), MediaTypeError> {
        Ok(())
    }

    /// Hook applied to the request and the expected response before the
    /// request is made.
    fn pre_process(
        &self,
        request: Option<Vec<u8>>,
        expected: Vec<u8>,
        _config: &MergedConfig,
    ) -> Result<(Option<Vec<u8>>, Vec<u8>), MediaTypeError> {
        if let Some(request) = &request {
            self.validate(request)?;
        }
        self.validate(&expected)?;
        Ok((request, expected))
    }

    /// Hook applied to the actual response after the request was made.
    fn post_process(
        &self,
        actual: Vec<u8>,
        _config: &MergedConfig,
    ) -> Result<Vec<u8>, MediaTypeError> {
        self.validate(&actual)?;
        Ok(actual)
    }

    /// Stable textual form used for rendering differences.
    fn canonicalize(&self, body: &[u8]) -> Result<String, MediaTypeError>;

    /// Compare two documents. An empty string means they are equal.
    fn diff(
        &self,
        expected: &[u8],
        actual: &[u8],
        config: &MergedConfig,
    ) -> Result<String, MediaTypeError>;
}

/// Registry of media type handlers.
///
/// The most recently registered handler accepting a media type wins;
/// unknown types fall back to the generic handler.
pub struct MediaTypeRegistry {
    handlers: Vec<Arc<dyn MediaType>>,
    fallback: Arc<dyn MediaType>,
}

impl MediaTypeRegistry {
    /// Create a new registry with all built-in handlers.
    pub fn new() -> Self {
        let mut registry = Self {
            handlers: Vec::new(),
            fallback: Arc::new(GenericMediaType::new()),
        };

        registry.register(Arc::new(XmlMediaType::new()));
        registry.register(Arc::new(JsonMediaType::new()));

        registry
    }

    /// Register a handler. Later registrations take precedence.
    pub fn register(&mut self, handler: Arc<dyn MediaType>) {
        self.handlers.insert(0, handler);
    }

    /// Handler for a media type, ignoring case and parameters.
    pub fn for_media_type(&self, media_type: &str) -> Arc<dyn MediaType> {
        let normalized = normalize(media_type);
        self.handlers
            .iter()
            .find(|h| h.handles(&normalized))
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }
}

impl Default for MediaTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercase a media type and strip its parameters.
pub fn normalize(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        let registry = MediaTypeRegistry::new();
        assert_eq!(registry.for_media_type("application/xml").name(), "application/xml");
        assert_eq!(registry.for_media_type("text/xml").name(), "application/xml");
        assert_eq!(
            registry.for_media_type("application/soap+xml; charset=utf-8").name(),
            "application/xml"
        );
        assert_eq!(registry.for_media_type("APPLICATION/JSON").name(), "application/json");
        assert_eq!(registry.for_media_type("text/csv").name(), "text/plain");
    }

    #[test]
    fn test_file_names() {
        let registry = MediaTypeRegistry::new();
        let xml = registry.for_media_type("application/xml");
        assert_eq!(xml.request_name(), "request.xml");
        assert_eq!(xml.source_response_name(), "response.xml");
        assert_eq!(xml.expected_response_name(), "expected_response.xml");
        assert_eq!(xml.actual_response_name(), "actual_response.xml");

        let json = registry.for_media_type("application/json");
        assert_eq!(json.request_name(), "request.json");
    }
}
