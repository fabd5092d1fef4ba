use std::collections::HashMap;
use std::fs;
use std::path::Path;

use squit_core::config::{
    ConfigError, ConfigNode, ConfigWalker, HttpMethod, Overrides, SquitConfig, TaskKind,
    DEFAULT_BUILD_DIR, DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT_SECS,
};
use tempfile::TempDir;

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn walker(root: &Path) -> ConfigWalker {
    ConfigWalker::new(root, ConfigNode::default(), HashMap::new())
}

#[test]
fn test_default_config() {
    let config = SquitConfig::default();
    assert_eq!(config.paths.build_dir, Path::new(DEFAULT_BUILD_DIR));
    assert_eq!(config.run.concurrency, DEFAULT_CONCURRENCY);
    assert_eq!(config.run.timeout_secs, DEFAULT_TIMEOUT_SECS);
    assert!(config.properties.is_empty());
}

#[test]
fn test_config_from_toml() {
    let toml_str = r#"
[paths]
source_dir = "it/squit"

[run]
concurrency = 2
tags_any = ["smoke"]
fail_on_failures = false

[properties]
host = "localhost:8080"

[defaults]
media_type = "application/json"
method = "GET"
"#;
    let config: SquitConfig = toml::from_str(toml_str).unwrap();
    assert_eq!(config.paths.source_dir, Path::new("it/squit"));
    assert_eq!(config.paths.build_dir, Path::new(DEFAULT_BUILD_DIR));
    assert_eq!(config.run.concurrency, 2);
    assert_eq!(config.run.tags_any, vec!["smoke"]);
    assert!(!config.run.fail_on_failures);
    assert_eq!(config.properties["host"], "localhost:8080");
    assert_eq!(config.defaults.method, Some(HttpMethod::Get));
}

#[test]
fn test_nearest_value_wins() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(
        &root.join("project/test.conf"),
        r#"
endpoint = "http://project"
media_type = "application/xml"
method = "PUT"
headers = { X-Env = "project", X-Project = "1" }
"#,
    );
    write(
        &root.join("project/suite/test.conf"),
        r#"
endpoint = "http://suite"
headers = { X-Env = "suite" }
"#,
    );
    write(&root.join("project/suite/call1/test.conf"), "method = \"PATCH\"");

    let config = walker(root)
        .resolve(&root.join("project/suite/call1"))
        .unwrap();
    assert_eq!(config.endpoint, "http://suite");
    assert_eq!(config.media_type, "application/xml");
    assert_eq!(config.method, HttpMethod::Patch);
    assert_eq!(config.headers["X-Env"], "suite");
    assert_eq!(config.headers["X-Project"], "1");
}

#[test]
fn test_directory_names_become_tags() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(
        &root.join("project/test.conf"),
        "endpoint = \"http://x\"\nmedia_type = \"application/xml\"\ntags = [\"slow\"]",
    );
    write(&root.join("project/suite/call1/test.conf"), "tags = [\"smoke\"]");

    let config = walker(root)
        .resolve(&root.join("project/suite/call1"))
        .unwrap();
    for tag in ["project", "suite", "call1", "slow", "smoke"] {
        assert!(config.has_tag(tag), "missing tag {tag}");
    }
}

#[test]
fn test_defaults_fold_in_last() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(&root.join("project/call1/test.conf"), "endpoint = \"http://leaf\"");

    let defaults = ConfigNode {
        endpoint: Some("http://default".to_string()),
        media_type: Some("application/json".to_string()),
        pre_test_tasks: Some(vec![TaskKind::Runners]),
        ..Default::default()
    };
    let walker = ConfigWalker::new(root, defaults, HashMap::new());
    let config = walker.resolve(&root.join("project/call1")).unwrap();

    assert_eq!(config.endpoint, "http://leaf");
    assert_eq!(config.media_type, "application/json");
    assert_eq!(config.pre_test_tasks, vec![TaskKind::Runners]);
    assert_eq!(config.post_test_tasks, TaskKind::default_order());
}

#[test]
fn test_properties_substituted() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(
        &root.join("project/test.conf"),
        "endpoint = \"http://${host}/api\"\nmedia_type = \"application/xml\"",
    );

    let properties = HashMap::from([("host".to_string(), "example:9000".to_string())]);
    let walker = ConfigWalker::new(root, ConfigNode::default(), properties);
    let config = walker.resolve(&root.join("project/call1")).unwrap();
    assert_eq!(config.endpoint, "http://example:9000/api");

    let err = self::walker(root)
        .resolve(&root.join("project/call1"))
        .unwrap_err();
    assert!(matches!(err, ConfigError::UnresolvedVariable { ref name, .. } if name == "host"));
}

#[test]
fn test_missing_media_type_names_leaf() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(&root.join("project/call1/test.conf"), "endpoint = \"http://x\"");

    let err = walker(root)
        .resolve(&root.join("project/call1"))
        .unwrap_err();
    match err {
        ConfigError::MissingField { path, field } => {
            assert_eq!(field, "media_type");
            assert_eq!(path, Path::new("project/call1"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_invalid_method_is_config_error() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(
        &root.join("project/test.conf"),
        "endpoint = \"http://x\"\nmedia_type = \"application/xml\"\nmethod = \"FETCH\"",
    );

    let err = walker(root)
        .resolve(&root.join("project/call1"))
        .unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn test_overrides_clear_flags() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(
        &root.join("project/test.conf"),
        "endpoint = \"http://x\"\nmedia_type = \"application/xml\"\nignore = true\nexclude = true",
    );

    let leaf = root.join("project/call1");
    let plain = walker(root).resolve(&leaf).unwrap();
    assert!(plain.ignore && plain.exclude);

    let forced = walker(root)
        .with_overrides(Overrides {
            unignore: true,
            unexclude: true,
        })
        .resolve(&leaf)
        .unwrap();
    assert!(!forced.ignore && !forced.exclude);
}

#[test]
fn test_title_not_inherited() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(
        &root.join("project/test.conf"),
        "endpoint = \"http://x\"\nmedia_type = \"application/xml\"\ntitle = \"Project\"",
    );
    write(&root.join("project/call2/test.conf"), "title = \"Second call\"");

    let walker = walker(root);
    assert_eq!(walker.resolve(&root.join("project/call1")).unwrap().title, None);
    assert_eq!(
        walker.resolve(&root.join("project/call2")).unwrap().title.as_deref(),
        Some("Second call")
    );
}
