//! Per-directory configuration nodes and the fold that merges them.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ConfigError;

/// HTTP method of a test request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    /// Whether a request of this method must carry a body.
    pub fn requires_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl Default for HttpMethod {
    fn default() -> Self {
        Self::Post
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        }
    }
}

/// Kind of work executed around the request of a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Per-database SQL fixture scripts.
    DatabaseScripts,
    /// Registered runners referenced by id.
    Runners,
    /// Out-of-process runner scripts.
    RunnerScripts,
}

impl TaskKind {
    /// Default task order: fixtures first, then runners, then scripts.
    pub fn default_order() -> Vec<TaskKind> {
        vec![Self::DatabaseScripts, Self::Runners, Self::RunnerScripts]
    }
}

/// Connection descriptor of a fixture database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database address, e.g. `jdbc:sqlite:/tmp/app.db` or `:memory:`.
    pub address: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// XML specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XmlNode {
    /// Compare namespace prefixes as well as namespace URIs.
    pub strict: Option<bool>,
}

/// Settings read from the configuration files of one directory.
///
/// Scalars are optional so that a missing value can be filled in by an
/// ancestor; collections start empty and are unioned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigNode {
    pub endpoint: Option<String>,
    pub media_type: Option<String>,
    pub method: Option<HttpMethod>,
    pub headers: BTreeMap<String, String>,
    pub exclude: Option<bool>,
    pub ignore: Option<bool>,
    pub tags: Vec<String>,
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
    pub pre_test_tasks: Option<Vec<TaskKind>>,
    pub post_test_tasks: Option<Vec<TaskKind>>,
    pub xml: XmlNode,
}

impl ConfigNode {
    /// Parse a node from file content, substituting `${name}` placeholders
    /// from `properties` first. `path` is only used for error reporting.
    pub fn parse(
        content: &str,
        properties: &HashMap<String, String>,
        path: &Path,
    ) -> Result<Self, ConfigError> {
        let content = substitute(content, properties).map_err(|name| {
            ConfigError::UnresolvedVariable {
                path: path.to_path_buf(),
                name,
            }
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read and parse a node from a file.
    pub fn from_file(path: &Path, properties: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        Self::parse(&content, properties, path)
    }

    /// Merge with a node further from the leaf.
    ///
    /// Values already set on `self` are kept; unset scalars are taken from
    /// `fallback`. Lists are unioned with `fallback`'s entries first, maps
    /// keep `self`'s entry for a key both define.
    pub fn merge(self, fallback: &ConfigNode) -> ConfigNode {
        ConfigNode {
            endpoint: self.endpoint.or_else(|| fallback.endpoint.clone()),
            media_type: self.media_type.or_else(|| fallback.media_type.clone()),
            method: self.method.or(fallback.method),
            headers: merge_maps(&fallback.headers, self.headers),
            exclude: self.exclude.or(fallback.exclude),
            ignore: self.ignore.or(fallback.ignore),
            tags: union(&fallback.tags, self.tags),
            title: self.title.or_else(|| fallback.title.clone()),
            expected_response_code: self.expected_response_code.or(fallback.expected_response_code),
            pre_processors: union(&fallback.pre_processors, self.pre_processors),
            post_processors: union(&fallback.post_processors, self.post_processors),
            pre_processor_scripts: union(&fallback.pre_processor_scripts, self.pre_processor_scripts),
            post_processor_scripts: union(
                &fallback.post_processor_scripts,
                self.post_processor_scripts,
            ),
            pre_runners: union(&fallback.pre_runners, self.pre_runners),
            post_runners: union(&fallback.post_runners, self.post_runners),
            pre_runner_scripts: union(&fallback.pre_runner_scripts, self.pre_runner_scripts),
            post_runner_scripts: union(&fallback.post_runner_scripts, self.post_runner_scripts),
            databases: merge_maps(&fallback.databases, self.databases),
            pre_test_tasks: self.pre_test_tasks.or_else(|| fallback.pre_test_tasks.clone()),
            post_test_tasks: self.post_test_tasks.or_else(|| fallback.post_test_tasks.clone()),
            xml: XmlNode {
                strict: self.xml.strict.or(fallback.xml.strict),
            },
        }
    }

    /// Add a tag unless already present.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }
}

/// Fold a chain of nodes ordered nearest-first into a single node.
///
/// The first node wins for every scalar it defines.
pub fn fold_chain<'a>(nodes: impl IntoIterator<Item = &'a ConfigNode>) -> ConfigNode {
    nodes
        .into_iter()
        .fold(ConfigNode::default(), |acc, node| acc.merge(node))
}

fn union<T: Clone + PartialEq>(first: &[T], second: Vec<T>) -> Vec<T> {
    let mut result = first.to_vec();
    for item in second {
        if !result.contains(&item) {
            result.push(item);
        }
    }
    result
}

fn merge_maps<V: Clone>(
    fallback: &BTreeMap<String, V>,
    preferred: BTreeMap<String, V>,
) -> BTreeMap<String, V> {
    let mut result = fallback.clone();
    result.extend(preferred);
    result
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{\s*([A-Za-z0-9_.\-]+)\s*\}").expect("placeholder pattern is valid")
    })
}

/// Replace `${name}` placeholders. Returns the first unknown name on failure.
pub fn substitute(content: &str, properties: &HashMap<String, String>) -> Result<String, String> {
    let pattern = placeholder_pattern();

    if let Some(missing) = pattern
        .captures_iter(content)
        .map(|c| c[1].to_string())
        .find(|name| !properties.contains_key(name))
    {
        return Err(missing);
    }

    Ok(pattern
        .replace_all(content, |caps: &regex::Captures<'_>| properties[&caps[1]].clone())
        .into_owned())
}
