//! Resolution of leaf configurations from the directory tree.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::debug;

use super::defaults::{LOCAL_CONFIG_FILE, TEST_CONFIG_FILE};
use super::merged::MergedConfig;
use super::node::{fold_chain, ConfigNode};
use super::ConfigError;

/// External switches applied after a configuration is resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Overrides {
    /// Run and report tests flagged `ignore`.
    pub unignore: bool,
    /// Run and report tests flagged `exclude`.
    pub unexclude: bool,
}

/// Walks from a leaf directory up to the source root and folds the
/// configuration found on the way.
///
/// Parsed directory nodes and resolved leaves are memoized, so sibling
/// leaves share their ancestors' nodes.
pub struct ConfigWalker {
    root: PathBuf,
    defaults: ConfigNode,
    properties: HashMap<String, String>,
    overrides: Overrides,
    nodes: RwLock<HashMap<PathBuf, Arc<ConfigNode>>>,
    resolved: RwLock<HashMap<PathBuf, Arc<MergedConfig>>>,
}

impl ConfigWalker {
    /// Create a walker for the tree below `root`.
    ///
    /// `defaults` is folded in as the outermost node.
    pub fn new(
        root: impl Into<PathBuf>,
        defaults: ConfigNode,
        properties: HashMap<String, String>,
    ) -> Self {
        Self {
            root: root.into(),
            defaults,
            properties,
            overrides: Overrides::default(),
            nodes: RwLock::new(HashMap::new()),
            resolved: RwLock::new(HashMap::new()),
        }
    }

    /// Sets the external override switches.
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Root of the test tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve the merged configuration of `leaf`.
    pub fn resolve(&self, leaf: &Path) -> Result<Arc<MergedConfig>, ConfigError> {
        if let Some(cached) = read_cache(&self.resolved, leaf) {
            return Ok(cached);
        }

        let relative = leaf
            .strip_prefix(&self.root)
            .map_err(|_| ConfigError::OutsideRoot(leaf.to_path_buf()))?;

        let chain = self
            .ancestors(leaf)
            .iter()
            .map(|dir| self.node_for(dir))
            .collect::<Result<Vec<_>, _>>()?;

        let mut folded = fold_chain(
            chain
                .iter()
                .map(|node| node.as_ref())
                .chain(std::iter::once(&self.defaults)),
        );
        // Display names never inherit.
        folded.title = chain.first().and_then(|node| node.title.clone());

        let mut config = MergedConfig::from_node(folded, relative)?;
        if self.overrides.unignore {
            config.ignore = false;
        }
        if self.overrides.unexclude {
            config.exclude = false;
        }

        debug!(test = %relative.display(), "resolved configuration");

        let config = Arc::new(config);
        write_cache(&self.resolved, leaf, Arc::clone(&config));
        Ok(config)
    }

    /// Directories from `leaf` up to and including the root, nearest first.
    pub fn ancestors(&self, leaf: &Path) -> Vec<PathBuf> {
        let mut result = Vec::new();
        let mut current = Some(leaf);

        while let Some(dir) = current {
            if !dir.starts_with(&self.root) {
                break;
            }
            result.push(dir.to_path_buf());
            if dir == self.root {
                break;
            }
            current = dir.parent();
        }

        result
    }

    /// Parsed node of a single directory, local override folded over the
    /// checked-in file. Every directory below the root tags its tests with
    /// its own name.
    fn node_for(&self, dir: &Path) -> Result<Arc<ConfigNode>, ConfigError> {
        if let Some(cached) = read_cache(&self.nodes, dir) {
            return Ok(cached);
        }

        let mut files = Vec::new();
        for name in [LOCAL_CONFIG_FILE, TEST_CONFIG_FILE] {
            let path = dir.join(name);
            if path.is_file() {
                files.push(ConfigNode::from_file(&path, &self.properties)?);
            }
        }

        let mut node = fold_chain(&files);
        if dir != self.root {
            if let Some(name) = dir.file_name().and_then(|n| n.to_str()) {
                node = node.with_tag(name);
            }
        }

        let node = Arc::new(node);
        write_cache(&self.nodes, dir, Arc::clone(&node));
        Ok(node)
    }
}

fn read_cache<T>(cache: &RwLock<HashMap<PathBuf, Arc<T>>>, key: &Path) -> Option<Arc<T>> {
    cache
        .read()
        .ok()
        .and_then(|map| map.get(key).cloned())
}

fn write_cache<T>(cache: &RwLock<HashMap<PathBuf, Arc<T>>>, key: &Path, value: Arc<T>) {
    if let Ok(mut map) = cache.write() {
        map.insert(key.to_path_buf(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_ancestors_nearest_first() {
        let walker = ConfigWalker::new("/tests", ConfigNode::default(), HashMap::new());
        let ancestors = walker.ancestors(Path::new("/tests/project/suite/call1"));
        assert_eq!(
            ancestors,
            vec![
                PathBuf::from("/tests/project/suite/call1"),
                PathBuf::from("/tests/project/suite"),
                PathBuf::from("/tests/project"),
                PathBuf::from("/tests"),
            ]
        );
    }

    #[test]
    fn test_local_conf_overrides_test_conf() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(
            &root.join("project/test.conf"),
            "endpoint = \"http://checked-in\"\nmedia_type = \"application/xml\"",
        );
        write(&root.join("project/local.conf"), "endpoint = \"http://local\"");
        fs::create_dir_all(root.join("project/call1")).unwrap();

        let walker = ConfigWalker::new(root, ConfigNode::default(), HashMap::new());
        let config = walker.resolve(&root.join("project/call1")).unwrap();
        assert_eq!(config.endpoint, "http://local");
    }

    #[test]
    fn test_unignore_override() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(
            &root.join("project/call1/test.conf"),
            "endpoint = \"http://x\"\nmedia_type = \"application/xml\"\nignore = true",
        );

        let walker = ConfigWalker::new(root, ConfigNode::default(), HashMap::new())
            .with_overrides(Overrides {
                unignore: true,
                unexclude: false,
            });
        let config = walker.resolve(&root.join("project/call1")).unwrap();
        assert!(!config.ignore);
    }

    #[test]
    fn test_title_is_not_inherited() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(
            &root.join("project/test.conf"),
            "endpoint = \"http://x\"\nmedia_type = \"application/xml\"\ntitle = \"Project\"",
        );
        fs::create_dir_all(root.join("project/call1")).unwrap();

        let walker = ConfigWalker::new(root, ConfigNode::default(), HashMap::new());
        let config = walker.resolve(&root.join("project/call1")).unwrap();
        assert_eq!(config.title, None);
    }
}
