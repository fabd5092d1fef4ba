//! Pre- and post-processing of test documents.
//!
//! Processors are registered under an id and referenced from test
//! configuration (`pre_processors`, `post_processors`). Scripts listed in
//! `pre_processor_scripts`/`post_processor_scripts` run out-of-process after
//! the registered processors.

mod builtin;
mod stage;

pub use builtin::{NormalizeNewlines, TrimWhitespace};
pub use stage::{ProcessingStage, StageReport};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::config::MergedConfig;
use crate::media::MediaTypeError;
use crate::script::ScriptError;

/// Errors raised while processing a test.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    MediaType(#[from] MediaTypeError),

    #[error("Unknown processor '{0}'")]
    UnknownProcessor(String),

    #[error("Processor '{name}' failed: {message}")]
    Processor { name: String, message: String },

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error("Failed to serialize configuration: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProcessError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ProcessError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Documents handed to a processor.
///
/// `response` is the expected response during pre-processing and the
/// actual response during post-processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Documents {
    pub request: Option<Vec<u8>>,
    pub response: Vec<u8>,
}

/// A document transformation referenced by id from test configuration.
pub trait Processor: Send + Sync {
    /// Id used in configuration files.
    fn name(&self) -> &'static str;

    fn process(&self, documents: Documents, config: &MergedConfig) -> Result<Documents, ProcessError>;
}

/// Registry of processors by id.
pub struct ProcessorRegistry {
    processors: HashMap<String, Arc<dyn Processor>>,
}

impl ProcessorRegistry {
    /// Create a new registry with all built-in processors.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(TrimWhitespace));
        registry.register(Arc::new(NormalizeNewlines));
        registry
    }

    /// Create a registry without any processor.
    pub fn empty() -> Self {
        Self {
            processors: HashMap::new(),
        }
    }

    /// Register a processor under its name, replacing any previous one.
    pub fn register(&mut self, processor: Arc<dyn Processor>) {
        self.processors
            .insert(processor.name().to_string(), processor);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Processor>> {
        self.processors.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.processors.contains_key(name)
    }

    /// Apply the named processors in order.
    pub fn apply(
        &self,
        names: &[String],
        mut documents: Documents,
        config: &MergedConfig,
    ) -> Result<Documents, ProcessError> {
        for name in names {
            let processor = self
                .get(name)
                .ok_or_else(|| ProcessError::UnknownProcessor(name.clone()))?;
            documents = processor.process(documents, config)?;
        }
        Ok(documents)
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
