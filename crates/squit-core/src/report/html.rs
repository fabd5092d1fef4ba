//! Hierarchical HTML report.
//!
//! The page skeleton lives in `templates/` and is embedded at compile time.

use std::collections::HashMap;
use std::fmt::Write;

use chrono::Utc;

use super::{canonical_diff, escape};
use crate::media::MediaTypeRegistry;
use crate::result::{RunSummary, SquitResult, SquitResultTree};

const HTML_TEMPLATE: &str = include_str!("templates/report.html");
const STYLES: &str = include_str!("templates/styles.css");

/// Render the report page.
///
/// Placeholders substituted in the template:
/// - `{{TITLE}}` - report title
/// - `{{STYLES}}` - CSS styles
/// - `{{SUMMARY}}` - run totals
/// - `{{GENERATED}}` - generation time
/// - `{{TREE}}` - result hierarchy
/// - `{{DETAILS}}` - one section per failed test
pub fn render_html(title: &str, media_types: &MediaTypeRegistry, results: &[SquitResult]) -> String {
    let summary = RunSummary::from_results(results);
    let summary = format!(
        "{} tests: {} passed, {} failed, {} errors, {} ignored",
        summary.total, summary.passed, summary.failed, summary.errors, summary.ignored
    );

    let by_id: HashMap<u64, &SquitResult> = results.iter().map(|r| (r.id, r)).collect();
    let mut tree = String::from("<ul>\n");
    for node in SquitResultTree::build(results) {
        render_node(&mut tree, &node, &by_id);
    }
    tree.push_str("</ul>");

    let mut details = String::new();
    for result in results.iter().filter(|r| r.is_failure()) {
        render_details(&mut details, result, media_types);
    }
    if details.is_empty() {
        details.push_str("<p class=\"passed\">All tests passed.</p>");
    }

    HTML_TEMPLATE
        .replace("{{TITLE}}", &escape(title))
        .replace("{{STYLES}}", STYLES)
        .replace("{{SUMMARY}}", &escape(&summary))
        .replace("{{GENERATED}}", &Utc::now().to_rfc3339())
        .replace("{{TREE}}", &tree)
        .replace("{{DETAILS}}", &details)
}

fn render_node(out: &mut String, node: &SquitResultTree, results: &HashMap<u64, &SquitResult>) {
    let class = if node.failed > 0 {
        "failed"
    } else if node.successful == 0 && node.ignored > 0 {
        "ignored"
    } else {
        "passed"
    };

    match node.id.and_then(|id| results.get(&id)) {
        Some(result) if result.is_failure() => {
            let _ = writeln!(
                out,
                "<li class=\"{class}\"><a href=\"#test-{}\">{}</a></li>",
                result.id,
                escape(&node.name)
            );
        }
        Some(_) => {
            let _ = writeln!(out, "<li class=\"{class}\">{}</li>", escape(&node.name));
        }
        None => {
            let _ = writeln!(
                out,
                "<li class=\"{class}\">{} <span class=\"counts\">{} passed, {} failed, {} ignored</span>\n<ul>",
                escape(&node.name),
                node.successful,
                node.failed,
                node.ignored
            );
            for child in &node.children {
                render_node(out, child, results);
            }
            out.push_str("</ul></li>\n");
        }
    }
}

fn render_details(out: &mut String, result: &SquitResult, media_types: &MediaTypeRegistry) {
    let path = result.full_path().to_string_lossy().replace('\\', "/");
    let _ = writeln!(
        out,
        "<article id=\"test-{}\">\n<h2>{}</h2>\n<p><code>{}</code></p>",
        result.id,
        escape(&result.name()),
        escape(&path)
    );

    if let Some(description) = result.description() {
        let _ = writeln!(out, "<p>{}</p>", escape(description.trim()));
    }
    if let Some(meta) = result.meta() {
        let status = meta
            .status
            .map_or_else(|| "none".to_string(), |s| s.to_string());
        let _ = writeln!(
            out,
            "<p class=\"counts\">{} &middot; {} ms &middot; status {}</p>",
            meta.date.to_rfc3339(),
            meta.duration,
            status
        );
    }

    let heading = if result.is_error() { "Error" } else { "Difference" };
    let _ = writeln!(out, "<h3>{heading}</h3>\n<pre>{}</pre>", escape(&result.difference));

    if !result.is_error() {
        let diff = canonical_diff(result, media_types);
        if !diff.is_empty() {
            let _ = writeln!(out, "<h3>Line diff</h3>\n<pre>{}</pre>", escape(&diff));
        }
    }
    out.push_str("</article>\n");
}
