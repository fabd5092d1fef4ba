//! Execution of fixtures, runners and the request of every test.

mod meta;
mod orchestrator;

pub use meta::ResponseMeta;
pub use orchestrator::Orchestrator;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::MergedConfig;
use crate::script::ScriptError;

/// Errors raised while executing a test.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Unknown runner '{0}'")]
    UnknownRunner(String),

    #[error("Runner '{name}' failed: {message}")]
    Runner { name: String, message: String },

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error("Failed to write metadata: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExecutionError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExecutionError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Custom code executed before or after the request of a test.
///
/// Referenced by id from `pre_runners`/`post_runners`.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Id used in configuration files.
    fn name(&self) -> &'static str;

    async fn run(&self, config: &MergedConfig) -> Result<(), ExecutionError>;
}

/// Registry of runners by id.
#[derive(Default)]
pub struct RunnerRegistry {
    runners: HashMap<String, Arc<dyn Runner>>,
}

impl RunnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a runner under its name, replacing any previous one.
    pub fn register(&mut self, runner: Arc<dyn Runner>) {
        self.runners.insert(runner.name().to_string(), runner);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Runner>> {
        self.runners.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.runners.contains_key(name)
    }
}
