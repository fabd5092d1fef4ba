use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ExecutionError;
use crate::config::META_FILE;

/// Timing metadata recorded next to every raw response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub date: DateTime<Utc>,
    /// Wall-clock duration in milliseconds.
    pub duration: u64,
    /// HTTP status, absent when no response was received.
    pub status: Option<u16>,
}

impl ResponseMeta {
    /// Read `meta.json` from a raw response directory.
    pub fn read(dir: &Path) -> Option<Self> {
        let content = fs::read_to_string(dir.join(META_FILE)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Write `meta.json` into a raw response directory.
    pub fn write(&self, dir: &Path) -> Result<(), ExecutionError> {
        let path = dir.join(META_FILE);
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content).map_err(|e| ExecutionError::io(&path, e))
    }
}
