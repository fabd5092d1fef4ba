//! Fully resolved configuration of a leaf test directory.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::node::{ConfigNode, DatabaseConfig, HttpMethod, TaskKind};
use super::ConfigError;

/// Configuration of one test after folding every ancestor node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedConfig {
    pub endpoint: String,
    pub media_type: String,
    pub method: HttpMethod,
    pub headers: BTreeMap<String, String>,
    pub exclude: bool,
    pub ignore: bool,
    pub tags: BTreeSet<String>,
    pub title: Option<String>,
    pub expected_response_code: Option<u16>,
    pub pre_processors: Vec<String>,
    pub post_processors: Vec<String>,
    pub pre_processor_scripts: Vec<PathBuf>,
    pub post_processor_scripts: Vec<PathBuf>,
    pub pre_runners: Vec<String>,
    pub post_runners: Vec<String>,
    pub pre_runner_scripts: Vec<PathBuf>,
    pub post_runner_scripts: Vec<PathBuf>,
    pub databases: BTreeMap<String, DatabaseConfig>,
    pub pre_test_tasks: Vec<TaskKind>,
    pub post_test_tasks: Vec<TaskKind>,
    pub xml_strict: bool,
}

impl MergedConfig {
    /// Validate a folded node. `leaf` names the test in error messages.
    pub fn from_node(node: ConfigNode, leaf: &Path) -> Result<Self, ConfigError> {
        let endpoint = node.endpoint.ok_or_else(|| ConfigError::MissingField {
            path: leaf.to_path_buf(),
            field: "endpoint",
        })?;
        let media_type = node.media_type.ok_or_else(|| ConfigError::MissingField {
            path: leaf.to_path_buf(),
            field: "media_type",
        })?;

        Ok(Self {
            endpoint,
            media_type,
            method: node.method.unwrap_or_default(),
            headers: node.headers,
            exclude: node.exclude.unwrap_or(false),
            ignore: node.ignore.unwrap_or(false),
            tags: node.tags.into_iter().collect(),
            title: node.title,
            expected_response_code: node.expected_response_code,
            pre_processors: node.pre_processors,
            post_processors: node.post_processors,
            pre_processor_scripts: node.pre_processor_scripts,
            post_processor_scripts: node.post_processor_scripts,
            pre_runners: node.pre_runners,
            post_runners: node.post_runners,
            pre_runner_scripts: node.pre_runner_scripts,
            post_runner_scripts: node.post_runner_scripts,
            databases: node.databases,
            pre_test_tasks: node.pre_test_tasks.unwrap_or_else(TaskKind::default_order),
            post_test_tasks: node.post_test_tasks.unwrap_or_else(TaskKind::default_order),
            xml_strict: node.xml.strict.unwrap_or(true),
        })
    }

    /// Whether the test carries the given tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}
