use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use squit_core::config::{ConfigNode, ConfigWalker, MergedConfig};
use squit_core::index::{find_leaves, IndexError, SquitTest, TagFilter, TestIndexer};
use squit_core::MediaTypeRegistry;
use tempfile::TempDir;

const PROJECT_CONF: &str = r#"
endpoint = "http://localhost:1"
media_type = "application/xml"

[databases.db]
address = ":memory:"
"#;

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn leaf(root: &Path, path: &str) {
    write(&root.join(path).join("request.xml"), "<request/>");
    write(&root.join(path).join("response.xml"), "<response/>");
}

fn index(root: &Path) -> Result<Vec<SquitTest>, IndexError> {
    let walker = ConfigWalker::new(root, ConfigNode::default(), HashMap::new());
    let media_types = MediaTypeRegistry::new();
    TestIndexer::new(&walker, &media_types).index(&|_: &Path, _: &MergedConfig| true)
}

fn names(scripts: Option<&Vec<PathBuf>>) -> Vec<String> {
    scripts
        .map(|paths| {
            paths
                .iter()
                .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn test_leaves_sorted() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    for path in ["b/z", "a/y/2", "a/y/10", "a/x"] {
        fs::create_dir_all(root.join(path)).unwrap();
    }

    let leaves: Vec<PathBuf> = find_leaves(root)
        .unwrap()
        .into_iter()
        .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
        .collect();
    assert_eq!(
        leaves,
        vec![
            PathBuf::from("a/x"),
            PathBuf::from("a/y/10"),
            PathBuf::from("a/y/2"),
            PathBuf::from("b/z"),
        ]
    );
}

#[test]
fn test_once_scripts_fire_at_scope_bounds() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(&root.join("project/test.conf"), PROJECT_CONF);
    write(&root.join("project/suite/db_pre_once.sql"), "-- setup");
    write(&root.join("project/suite/db_post_once.sql"), "-- teardown");
    write(&root.join("project/suite/db_pre.sql"), "-- every test");
    for name in ["call1", "call2", "call3"] {
        leaf(root, &format!("project/suite/{name}"));
    }

    let tests = index(root).unwrap();
    assert_eq!(tests.len(), 3);

    assert_eq!(
        names(tests[0].pre_scripts.get("db")),
        vec!["db_pre_once.sql", "db_pre.sql"]
    );
    assert_eq!(names(tests[1].pre_scripts.get("db")), vec!["db_pre.sql"]);
    assert_eq!(names(tests[2].pre_scripts.get("db")), vec!["db_pre.sql"]);

    assert!(tests[0].post_scripts.get("db").is_none());
    assert!(tests[1].post_scripts.get("db").is_none());
    assert_eq!(names(tests[2].post_scripts.get("db")), vec!["db_post_once.sql"]);

    let with_once = tests
        .iter()
        .filter(|t| names(t.pre_scripts.get("db")).contains(&"db_pre_once.sql".to_string()))
        .count();
    assert_eq!(with_once, 1);
}

#[test]
fn test_once_scope_uses_accepted_leaves() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(&root.join("project/test.conf"), PROJECT_CONF);
    write(&root.join("project/suite/db_pre_once.sql"), "-- setup");
    write(&root.join("project/suite/call1/test.conf"), "exclude = true");
    for name in ["call1", "call2"] {
        leaf(root, &format!("project/suite/{name}"));
    }

    let walker = ConfigWalker::new(root, ConfigNode::default(), HashMap::new());
    let media_types = MediaTypeRegistry::new();
    let tests = TestIndexer::new(&walker, &media_types)
        .index(&TagFilter::default())
        .unwrap();

    assert_eq!(tests.len(), 1);
    assert_eq!(tests[0].path, Path::new("project/suite/call2"));
    assert_eq!(names(tests[0].pre_scripts.get("db")), vec!["db_pre_once.sql"]);
}

#[test]
fn test_once_scope_skips_ignored_tests() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(&root.join("project/test.conf"), PROJECT_CONF);
    write(&root.join("project/suite/db_pre_once.sql"), "-- setup");
    write(&root.join("project/suite/db_post_once.sql"), "-- teardown");
    write(&root.join("project/suite/call1/test.conf"), "ignore = true");
    write(&root.join("project/suite/call3/test.conf"), "ignore = true");
    for name in ["call1", "call2", "call3"] {
        leaf(root, &format!("project/suite/{name}"));
    }

    let tests = index(root).unwrap();
    assert_eq!(tests.len(), 3);

    assert!(tests[0].pre_scripts.is_empty() && !tests[0].once_scripts);
    assert!(tests[2].post_scripts.is_empty() && !tests[2].once_scripts);
    assert_eq!(names(tests[1].pre_scripts.get("db")), vec!["db_pre_once.sql"]);
    assert_eq!(names(tests[1].post_scripts.get("db")), vec!["db_post_once.sql"]);
    assert!(tests[1].once_scripts);
}

#[test]
fn test_script_order_across_levels() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(&root.join("project/test.conf"), PROJECT_CONF);
    write(&root.join("project/db_pre.sql"), "-- project pre");
    write(&root.join("project/db_post.sql"), "-- project post");
    write(&root.join("project/suite/call1/db_pre.sql"), "-- leaf pre");
    write(&root.join("project/suite/call1/db_post.sql"), "-- leaf post");
    leaf(root, "project/suite/call1");

    let tests = index(root).unwrap();
    let pre: Vec<PathBuf> = tests[0].pre_scripts["db"].clone();
    let post: Vec<PathBuf> = tests[0].post_scripts["db"].clone();

    assert_eq!(pre, vec![root.join("project/db_pre.sql"), root.join("project/suite/call1/db_pre.sql")]);
    assert_eq!(post, vec![root.join("project/suite/call1/db_post.sql"), root.join("project/db_post.sql")]);
}

#[test]
fn test_scripts_for_unknown_databases_ignored() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(&root.join("project/test.conf"), PROJECT_CONF);
    write(&root.join("project/other_pre.sql"), "-- not configured");
    leaf(root, "project/call1");

    let tests = index(root).unwrap();
    assert!(tests[0].pre_scripts.is_empty());
}

#[test]
fn test_documents_inherited_from_ancestors() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(&root.join("project/test.conf"), PROJECT_CONF);
    write(&root.join("project/suite/request.xml"), "<shared/>");
    write(&root.join("project/suite/call1/response.xml"), "<r/>");
    write(&root.join("project/description.md"), "Project\n");
    write(&root.join("project/suite/call1/description.md"), "Call one\n");

    let tests = index(root).unwrap();
    assert_eq!(tests[0].request, Some(root.join("project/suite/request.xml")));
    assert_eq!(tests[0].descriptions, vec!["Project", "Call one"]);
    assert_eq!(tests[0].description(), "Project\n\nCall one");
}

#[test]
fn test_get_without_request() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(&root.join("project/test.conf"), PROJECT_CONF);
    write(&root.join("project/call1/test.conf"), "method = \"GET\"");
    write(&root.join("project/call1/response.xml"), "<r/>");

    let tests = index(root).unwrap();
    assert_eq!(tests.len(), 1);
    assert!(tests[0].request.is_none());
}

#[test]
fn test_post_without_request_fails() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(&root.join("project/test.conf"), PROJECT_CONF);
    write(&root.join("project/call1/response.xml"), "<r/>");

    match index(root).unwrap_err() {
        IndexError::MissingFile { path, file } => {
            assert_eq!(path, Path::new("project/call1"));
            assert_eq!(file, "request.xml");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_missing_response_fails() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(&root.join("project/test.conf"), PROJECT_CONF);
    write(&root.join("project/call1/request.xml"), "<q/>");

    let err = index(root).unwrap_err();
    assert!(matches!(err, IndexError::MissingFile { ref file, .. } if file == "response.xml"));
    assert!(err.to_string().contains("project/call1"));
}

#[test]
fn test_leaf_outside_project_is_structure_error() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(&root.join("test.conf"), PROJECT_CONF);
    leaf(root, "call1");

    assert!(matches!(index(root), Err(IndexError::Structure(_))));
}

#[test]
fn test_tag_filter() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(&root.join("project/test.conf"), PROJECT_CONF);
    write(&root.join("project/fast/call1/test.conf"), "tags = [\"smoke\"]");
    leaf(root, "project/fast/call1");
    leaf(root, "project/fast/call2");
    leaf(root, "project/slow/call3");

    let walker = ConfigWalker::new(root, ConfigNode::default(), HashMap::new());
    let media_types = MediaTypeRegistry::new();
    let indexer = TestIndexer::new(&walker, &media_types);

    let any = TagFilter {
        all: Vec::new(),
        any: vec!["slow".to_string(), "smoke".to_string()],
    };
    let paths: Vec<PathBuf> = indexer.index(&any).unwrap().into_iter().map(|t| t.path).collect();
    assert_eq!(paths, vec![PathBuf::from("project/fast/call1"), PathBuf::from("project/slow/call3")]);

    let all = TagFilter {
        all: vec!["fast".to_string(), "smoke".to_string()],
        any: Vec::new(),
    };
    let paths: Vec<PathBuf> = indexer.index(&all).unwrap().into_iter().map(|t| t.path).collect();
    assert_eq!(paths, vec![PathBuf::from("project/fast/call1")]);
}
