//! Indexing of the test tree into executable tests.
//!
//! Every leaf directory (a directory without subdirectories) is one test.
//! Files contributing to a test may live at any level between the leaf and
//! the source root; each level yields a [`PartialTest`] and the partials are
//! merged into one [`SquitTest`].

mod filter;

pub use filter::{TagFilter, TestFilter};

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::WalkBuilder;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{
    ConfigError, ConfigWalker, MergedConfig, DESCRIPTION_FILE, POST_ONCE_SCRIPT_SUFFIX,
    POST_SCRIPT_SUFFIX, PRE_ONCE_SCRIPT_SUFFIX, PRE_SCRIPT_SUFFIX,
};
use crate::media::MediaTypeRegistry;

/// Errors that abort indexing.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid project structure: {0}")]
    Structure(String),

    #[error("Missing {file} for test {}", path.display())]
    MissingFile { path: PathBuf, file: String },

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to walk the test tree: {0}")]
    Walk(#[from] ignore::Error),
}

impl IndexError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IndexError::Io {
            path: path.into(),
            source,
        }
    }
}

/// One executable test.
#[derive(Debug, Clone)]
pub struct SquitTest {
    /// Leaf directory relative to the source root.
    pub path: PathBuf,
    pub config: Arc<MergedConfig>,
    /// Request document, absent for bodiless requests.
    pub request: Option<PathBuf>,
    /// Expected response document.
    pub response: PathBuf,
    /// Fixture scripts per database, in execution order.
    pub pre_scripts: BTreeMap<String, Vec<PathBuf>>,
    pub post_scripts: BTreeMap<String, Vec<PathBuf>>,
    /// Description fragments, outermost first.
    pub descriptions: Vec<String>,
    /// Whether the test carries a once script and so bounds a scope.
    pub once_scripts: bool,
}

impl SquitTest {
    /// Configured title, or the leaf directory name.
    pub fn display_name(&self) -> String {
        self.config.title.clone().unwrap_or_else(|| {
            self.path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        })
    }

    /// Combined description text.
    pub fn description(&self) -> String {
        self.descriptions.join("\n\n")
    }
}

/// Contribution of a single directory level to a test.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialTest {
    pub request: Option<PathBuf>,
    pub response: Option<PathBuf>,
    pub pre_scripts: BTreeMap<String, Vec<PathBuf>>,
    pub post_scripts: BTreeMap<String, Vec<PathBuf>>,
    pub descriptions: Vec<String>,
    pub once_scripts: bool,
}

impl PartialTest {
    /// Merge with the view of a level closer to the root.
    ///
    /// Documents of the deeper view win. Shallower pre scripts run first,
    /// shallower post scripts run last, shallower descriptions come first.
    pub fn merge(self, shallower: PartialTest) -> PartialTest {
        let mut pre_scripts = shallower.pre_scripts;
        for (db, scripts) in self.pre_scripts {
            pre_scripts.entry(db).or_default().extend(scripts);
        }

        let mut post_scripts = self.post_scripts;
        for (db, scripts) in shallower.post_scripts {
            post_scripts.entry(db).or_default().extend(scripts);
        }

        let mut descriptions = shallower.descriptions;
        descriptions.extend(self.descriptions);

        PartialTest {
            request: self.request.or(shallower.request),
            response: self.response.or(shallower.response),
            pre_scripts,
            post_scripts,
            descriptions,
            once_scripts: self.once_scripts || shallower.once_scripts,
        }
    }
}

/// Position of a scope's first and last executed leaf.
#[derive(Debug, Clone, Copy)]
struct ScopeBounds {
    first: usize,
    last: usize,
}

/// Builds [`SquitTest`]s from the tree below the walker's root.
pub struct TestIndexer<'a> {
    walker: &'a ConfigWalker,
    media_types: &'a MediaTypeRegistry,
}

impl<'a> TestIndexer<'a> {
    pub fn new(walker: &'a ConfigWalker, media_types: &'a MediaTypeRegistry) -> Self {
        Self {
            walker,
            media_types,
        }
    }

    /// Index every leaf accepted by `filter`, in lexicographic path order.
    pub fn index(&self, filter: &dyn TestFilter) -> Result<Vec<SquitTest>, IndexError> {
        let root = self.walker.root();
        if !root.is_dir() {
            return Err(IndexError::Structure(format!(
                "source directory {} does not exist",
                root.display()
            )));
        }

        let mut accepted = Vec::new();
        for leaf in find_leaves(root)? {
            let relative = leaf.strip_prefix(root).unwrap_or(&leaf).to_path_buf();
            if relative.components().count() < 2 {
                return Err(IndexError::Structure(format!(
                    "test {} must be nested in a project directory",
                    relative.display()
                )));
            }

            let config = self.walker.resolve(&leaf)?;
            if filter.accepts(&relative, &config) {
                accepted.push((leaf, relative, config));
            } else {
                debug!(test = %relative.display(), "filtered out");
            }
        }

        // Ignored tests never execute, so they cannot carry once scripts.
        let executed: Vec<(usize, &Path)> = accepted
            .iter()
            .enumerate()
            .filter(|(_, (_, _, config))| !config.ignore)
            .map(|(position, (leaf, _, _))| (position, leaf.as_path()))
            .collect();
        let scopes = self.scope_bounds(&executed);

        let mut tests = Vec::with_capacity(accepted.len());
        for (position, (leaf, relative, config)) in accepted.iter().enumerate() {
            tests.push(self.build_test(leaf, relative, config, position, &scopes)?);
        }

        info!(count = tests.len(), root = %root.display(), "indexed tests");
        Ok(tests)
    }

    /// First and last leaf position below every ancestor directory.
    fn scope_bounds(&self, leaves: &[(usize, &Path)]) -> HashMap<PathBuf, ScopeBounds> {
        let mut scopes: HashMap<PathBuf, ScopeBounds> = HashMap::new();
        for &(position, leaf) in leaves {
            for dir in self.walker.ancestors(leaf) {
                scopes
                    .entry(dir)
                    .and_modify(|bounds| bounds.last = position)
                    .or_insert(ScopeBounds {
                        first: position,
                        last: position,
                    });
            }
        }
        scopes
    }

    fn build_test(
        &self,
        leaf: &Path,
        relative: &Path,
        config: &Arc<MergedConfig>,
        position: usize,
        scopes: &HashMap<PathBuf, ScopeBounds>,
    ) -> Result<SquitTest, IndexError> {
        let merged = self
            .walker
            .ancestors(leaf)
            .iter()
            .map(|dir| {
                let (first, last) = scopes
                    .get(dir)
                    .map(|bounds| (bounds.first == position, bounds.last == position))
                    .unwrap_or((false, false));
                self.level_view(dir, config, first, last)
            })
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .reduce(PartialTest::merge)
            .unwrap_or_default();

        let handler = self.media_types.for_media_type(&config.media_type);

        let response = merged.response.ok_or_else(|| IndexError::MissingFile {
            path: relative.to_path_buf(),
            file: handler.source_response_name(),
        })?;

        if merged.request.is_none() && config.method.requires_body() {
            return Err(IndexError::MissingFile {
                path: relative.to_path_buf(),
                file: handler.request_name(),
            });
        }

        Ok(SquitTest {
            path: relative.to_path_buf(),
            config: Arc::clone(config),
            request: merged.request,
            response,
            pre_scripts: merged.pre_scripts,
            post_scripts: merged.post_scripts,
            descriptions: merged.descriptions,
            once_scripts: merged.once_scripts,
        })
    }

    /// What a single directory contributes to a test.
    fn level_view(
        &self,
        dir: &Path,
        config: &MergedConfig,
        first_in_scope: bool,
        last_in_scope: bool,
    ) -> Result<PartialTest, IndexError> {
        let handler = self.media_types.for_media_type(&config.media_type);
        let mut view = PartialTest {
            request: existing(dir.join(handler.request_name())),
            response: existing(dir.join(handler.source_response_name())),
            ..Default::default()
        };

        for db in config.databases.keys() {
            let mut pre = Vec::new();
            if first_in_scope {
                if let Some(script) = existing(dir.join(format!("{db}{PRE_ONCE_SCRIPT_SUFFIX}"))) {
                    pre.push(script);
                    view.once_scripts = true;
                }
            }
            pre.extend(existing(dir.join(format!("{db}{PRE_SCRIPT_SUFFIX}"))));

            let mut post = Vec::new();
            post.extend(existing(dir.join(format!("{db}{POST_SCRIPT_SUFFIX}"))));
            if last_in_scope {
                if let Some(script) = existing(dir.join(format!("{db}{POST_ONCE_SCRIPT_SUFFIX}"))) {
                    post.push(script);
                    view.once_scripts = true;
                }
            }

            if !pre.is_empty() {
                view.pre_scripts.insert(db.clone(), pre);
            }
            if !post.is_empty() {
                view.post_scripts.insert(db.clone(), post);
            }
        }

        if let Some(path) = existing(dir.join(DESCRIPTION_FILE)) {
            let text = fs::read_to_string(&path).map_err(|e| IndexError::io(&path, e))?;
            view.descriptions.push(text.trim().to_string());
        }

        Ok(view)
    }
}

fn existing(path: PathBuf) -> Option<PathBuf> {
    path.is_file().then_some(path)
}

/// Directories below `root` without subdirectories, sorted.
///
/// An unreadable directory fails the walk instead of dropping its tests.
pub fn find_leaves(root: &Path) -> Result<Vec<PathBuf>, IndexError> {
    let walker = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut dirs = Vec::new();
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_some_and(|t| t.is_dir()) && entry.path() != root {
            dirs.push(entry.into_path());
        }
    }

    let parents: HashSet<&Path> = dirs.iter().filter_map(|dir| dir.parent()).collect();

    let mut leaves: Vec<PathBuf> = dirs
        .iter()
        .filter(|dir| !parents.contains(dir.as_path()))
        .cloned()
        .collect();
    leaves.sort();
    Ok(leaves)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scripts(pairs: &[(&str, &[&str])]) -> BTreeMap<String, Vec<PathBuf>> {
        pairs
            .iter()
            .map(|(db, paths)| (db.to_string(), paths.iter().map(PathBuf::from).collect()))
            .collect()
    }

    #[test]
    fn test_merge_orders_scripts_and_descriptions() {
        let deeper = PartialTest {
            pre_scripts: scripts(&[("db", &["suite_pre.sql"])]),
            post_scripts: scripts(&[("db", &["suite_post.sql"])]),
            descriptions: vec!["suite".to_string()],
            ..Default::default()
        };
        let shallower = PartialTest {
            pre_scripts: scripts(&[("db", &["project_pre.sql"])]),
            post_scripts: scripts(&[("db", &["project_post.sql"])]),
            descriptions: vec!["project".to_string()],
            ..Default::default()
        };

        let merged = deeper.merge(shallower);
        assert_eq!(
            merged.pre_scripts["db"],
            vec![PathBuf::from("project_pre.sql"), PathBuf::from("suite_pre.sql")]
        );
        assert_eq!(
            merged.post_scripts["db"],
            vec![PathBuf::from("suite_post.sql"), PathBuf::from("project_post.sql")]
        );
        assert_eq!(merged.descriptions, vec!["project", "suite"]);
    }

    #[test]
    fn test_merge_is_associative() {
        let a = PartialTest {
            pre_scripts: scripts(&[("db", &["a"])]),
            post_scripts: scripts(&[("db", &["a"])]),
            descriptions: vec!["a".to_string()],
            ..Default::default()
        };
        let b = PartialTest {
            pre_scripts: scripts(&[("db", &["b"])]),
            post_scripts: scripts(&[("other", &["b"])]),
            request: Some(PathBuf::from("b/request.xml")),
            ..Default::default()
        };
        let c = PartialTest {
            pre_scripts: scripts(&[("db", &["c"])]),
            post_scripts: scripts(&[("db", &["c"])]),
            request: Some(PathBuf::from("c/request.xml")),
            descriptions: vec!["c".to_string()],
            ..Default::default()
        };

        let left = a.clone().merge(b.clone()).merge(c.clone());
        let right = a.merge(b.merge(c));
        assert_eq!(left, right);
        assert_eq!(left.request, Some(PathBuf::from("b/request.xml")));
    }

    #[test]
    fn test_deeper_documents_win() {
        let deeper = PartialTest {
            response: Some(PathBuf::from("leaf/response.xml")),
            ..Default::default()
        };
        let shallower = PartialTest {
            request: Some(PathBuf::from("suite/request.xml")),
            response: Some(PathBuf::from("suite/response.xml")),
            ..Default::default()
        };

        let merged = deeper.merge(shallower);
        assert_eq!(merged.request, Some(PathBuf::from("suite/request.xml")));
        assert_eq!(merged.response, Some(PathBuf::from("leaf/response.xml")));
    }

    #[test]
    fn test_missing_root_fails_walk() {
        let temp = tempfile::TempDir::new().unwrap();
        let missing = temp.path().join("missing");

        assert!(matches!(find_leaves(&missing), Err(IndexError::Walk(_))));
    }
}
