//! Default values for Squit configuration.
//!
//! All hardcoded defaults are centralized here for easy maintenance.

// ============================================================================
// Run Defaults
// ============================================================================

/// Project-local run configuration file.
pub const DEFAULT_CONFIG_FILE: &str = "squit.toml";

/// Directory holding the test tree.
pub const DEFAULT_SOURCE_DIR: &str = "src/squit";

/// Directory receiving every build artifact.
pub const DEFAULT_BUILD_DIR: &str = "build/squit";

/// Number of tests processed or executed at the same time.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// HTTP connect/read/write timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Test Tree File Names
// ============================================================================

/// Checked-in configuration file of a directory.
pub const TEST_CONFIG_FILE: &str = "test.conf";

/// Optional local override of [`TEST_CONFIG_FILE`].
pub const LOCAL_CONFIG_FILE: &str = "local.conf";

/// Optional description of a directory level.
pub const DESCRIPTION_FILE: &str = "description.md";

/// Suffix of a per-database fixture script run before each test.
pub const PRE_SCRIPT_SUFFIX: &str = "_pre.sql";

/// Suffix of a per-database fixture script run after each test.
pub const POST_SCRIPT_SUFFIX: &str = "_post.sql";

/// Suffix of a per-database fixture script run before the first test of a scope.
pub const PRE_ONCE_SCRIPT_SUFFIX: &str = "_pre_once.sql";

/// Suffix of a per-database fixture script run after the last test of a scope.
pub const POST_ONCE_SCRIPT_SUFFIX: &str = "_post_once.sql";

// ============================================================================
// Build Output
// ============================================================================

/// Processed sources subdirectory.
pub const SOURCES_DIR: &str = "sources";

/// Raw responses subdirectory.
pub const RAW_RESPONSES_DIR: &str = "responses/raw";

/// Processed responses subdirectory.
pub const PROCESSED_RESPONSES_DIR: &str = "responses/processed";

/// Reports subdirectory.
pub const REPORTS_DIR: &str = "reports";

/// Failure artifacts subdirectory, inside the reports directory.
pub const FAILURES_DIR: &str = "failures";

/// Serialized merged configuration of a processed test.
pub const MERGED_CONFIG_FILE: &str = "config.json";

/// Timing metadata of an executed test.
pub const META_FILE: &str = "meta.json";

/// Per-test error artifact.
pub const ERROR_FILE: &str = "error.txt";

/// Rendered difference of a failed test.
pub const DIFF_FILE: &str = "diff.txt";

/// JUnit-style report file.
pub const JUNIT_REPORT_FILE: &str = "junit.xml";

/// Human-readable report file.
pub const HTML_REPORT_FILE: &str = "index.html";

// ============================================================================
// Request Defaults
// ============================================================================

/// Media type name of the XML handler.
pub const MEDIA_TYPE_XML: &str = "application/xml";

/// Media type name of the JSON handler.
pub const MEDIA_TYPE_JSON: &str = "application/json";

/// Media type name of the generic handler.
pub const MEDIA_TYPE_TEXT: &str = "text/plain";
