//! Fixtures shared by unit tests.

use std::path::Path;

use crate::config::{ConfigNode, MergedConfig, MEDIA_TYPE_XML};

/// A minimal valid configuration.
pub fn config() -> MergedConfig {
    let node = ConfigNode {
        endpoint: Some("http://localhost:1".to_string()),
        media_type: Some(MEDIA_TYPE_XML.to_string()),
        ..Default::default()
    };
    MergedConfig::from_node(node, Path::new("project/test")).expect("fixture config is valid")
}
