//! Out-of-process execution of processor and runner scripts.
//!
//! Scripts run with a cleared environment. Only `PATH` and the `SQUIT_*`
//! variables describing the current test are passed in; documents are
//! exchanged through the files those variables point at.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::config::MergedConfig;

/// Longest stderr excerpt kept in an error.
const MAX_STDERR_LENGTH: usize = 2000;

/// Errors raised by a script.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Failed to start script {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Script {} exited with {status}: {stderr}", path.display())]
    Failed {
        path: PathBuf,
        status: String,
        stderr: String,
    },
}

/// Environment handed to a script.
#[derive(Debug, Clone, Default)]
pub struct ScriptEnv {
    vars: Vec<(String, String)>,
}

impl ScriptEnv {
    /// Variables describing a test.
    pub fn for_test(test_path: &Path, config: &MergedConfig) -> Self {
        Self::default()
            .var("SQUIT_TEST_PATH", test_path.to_string_lossy())
            .var("SQUIT_ENDPOINT", &config.endpoint)
            .var("SQUIT_MEDIA_TYPE", &config.media_type)
            .var("SQUIT_METHOD", config.method.as_str())
    }

    /// Adds a variable.
    pub fn var(mut self, name: impl Into<String>, value: impl AsRef<str>) -> Self {
        self.vars.push((name.into(), value.as_ref().to_string()));
        self
    }

    /// Adds a variable pointing at a file.
    pub fn file(self, name: impl Into<String>, path: &Path) -> Self {
        self.var(name, path.to_string_lossy())
    }
}

/// Resolve a script path configured relative to the source root.
pub fn resolve_script(source_root: &Path, script: &Path) -> PathBuf {
    if script.is_absolute() {
        script.to_path_buf()
    } else {
        source_root.join(script)
    }
}

/// Run a script to completion. A non-zero exit status is an error.
pub async fn run_script(script: &Path, env: &ScriptEnv) -> Result<(), ScriptError> {
    let mut command = Command::new(script);
    command
        .env_clear()
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    if let Ok(path) = std::env::var("PATH") {
        command.env("PATH", path);
    }
    for (name, value) in &env.vars {
        command.env(name, value);
    }

    let output = command.output().await.map_err(|source| ScriptError::Spawn {
        path: script.to_path_buf(),
        source,
    })?;

    debug!(script = %script.display(), status = %output.status, "script finished");

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(ScriptError::Failed {
        path: script.to_path_buf(),
        status: output.status.to_string(),
        stderr: stderr.chars().take(MAX_STDERR_LENGTH).collect(),
    })
}
