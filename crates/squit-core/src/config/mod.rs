//! Configuration management for Squit.
//!
//! Two layers of configuration exist:
//!
//! - The run configuration ([`SquitConfig`]), loaded from `squit.toml` with
//!   environment variable overrides, then built-in defaults.
//! - Per-directory test configuration ([`ConfigNode`]) read from `test.conf`
//!   and `local.conf` files inside the test tree and folded into a
//!   [`MergedConfig`] per leaf by the [`ConfigWalker`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use serde::{Deserialize, Serialize};

mod defaults;
mod merged;
mod node;
mod walker;

pub use defaults::*;
pub use merged::MergedConfig;
pub use node::{fold_chain, substitute, ConfigNode, DatabaseConfig, HttpMethod, TaskKind, XmlNode};
pub use walker::{ConfigWalker, Overrides};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Unresolved variable ${{{name}}} in {}", path.display())]
    UnresolvedVariable { path: PathBuf, name: String },

    #[error("Missing required field '{field}' for test {}", path.display())]
    MissingField { path: PathBuf, field: &'static str },

    #[error("Unknown {kind} '{name}' referenced by test {}", path.display())]
    UnknownPlugin {
        path: PathBuf,
        kind: &'static str,
        name: String,
    },

    #[error("Path {} is outside the test root", .0.display())]
    OutsideRoot(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Main run configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SquitConfig {
    /// Source and build locations.
    pub paths: PathsConfig,

    /// Execution and selection settings.
    pub run: RunConfig,

    /// Values for `${name}` placeholders in test configuration files.
    pub properties: HashMap<String, String>,

    /// Shared defaults folded in below every test directory.
    pub defaults: ConfigNode,
}

impl SquitConfig {
    /// Load configuration from the default location.
    ///
    /// Reads `./squit.toml` when present, otherwise falls back to defaults.
    pub fn load() -> Result<Self, ConfigError> {
        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            return Self::from_file(DEFAULT_CONFIG_FILE);
        }

        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        let mut config: SquitConfig = toml::from_str(&content).map_err(|source| {
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;

        config.apply_env_overrides();

        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("SQUIT_SOURCE_DIR") {
            self.paths.source_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("SQUIT_BUILD_DIR") {
            self.paths.build_dir = PathBuf::from(dir);
        }
        if let Ok(value) = std::env::var("SQUIT_CONCURRENCY") {
            if let Ok(n) = value.parse() {
                self.run.concurrency = n;
            }
        }
        if let Ok(value) = std::env::var("SQUIT_TIMEOUT_SECS") {
            if let Ok(n) = value.parse() {
                self.run.timeout_secs = n;
            }
        }
    }

    /// Config walker over the configured source tree.
    pub fn walker(&self) -> ConfigWalker {
        ConfigWalker::new(
            &self.paths.source_dir,
            self.defaults.clone(),
            self.properties.clone(),
        )
        .with_overrides(Overrides {
            unignore: self.run.unignore,
            unexclude: self.run.unexclude,
        })
    }
}

/// Source and build locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root of the test tree.
    pub source_dir: PathBuf,

    /// Root of every generated artifact.
    pub build_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from(DEFAULT_SOURCE_DIR),
            build_dir: PathBuf::from(DEFAULT_BUILD_DIR),
        }
    }
}

/// Execution and selection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Size of the worker pool used by the processing and execution stages.
    pub concurrency: usize,

    /// HTTP connect/read/write timeout in seconds.
    pub timeout_secs: u64,

    /// Only tests carrying every one of these tags are selected.
    pub tags_all: Vec<String>,

    /// Only tests carrying at least one of these tags are selected.
    pub tags_any: Vec<String>,

    /// Run and report tests flagged `ignore`.
    pub unignore: bool,

    /// Run and report tests flagged `exclude`.
    pub unexclude: bool,

    /// Whether failed or errored tests fail the run.
    pub fail_on_failures: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            tags_all: Vec::new(),
            tags_any: Vec::new(),
            unignore: false,
            unexclude: false,
            fail_on_failures: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SquitConfig::default();
        assert_eq!(config.paths.source_dir, PathBuf::from(DEFAULT_SOURCE_DIR));
        assert_eq!(config.run.concurrency, DEFAULT_CONCURRENCY);
        assert!(config.run.fail_on_failures);
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
[paths]
source_dir = "it/squit"

[run]
concurrency = 2
tags_any = ["smoke"]

[properties]
rootEndpoint = "http://localhost:8080"

[defaults]
media_type = "application/xml"
"#;
        let config: SquitConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.paths.source_dir, PathBuf::from("it/squit"));
        assert_eq!(config.paths.build_dir, PathBuf::from(DEFAULT_BUILD_DIR));
        assert_eq!(config.run.concurrency, 2);
        assert_eq!(config.run.tags_any, vec!["smoke"]);
        assert_eq!(config.properties["rootEndpoint"], "http://localhost:8080");
        assert_eq!(config.defaults.media_type.as_deref(), Some("application/xml"));
    }
}
