use std::collections::BTreeMap;
use std::fmt::Write;

use super::escape;
use crate::result::{RunSummary, SquitResult};

/// Render a JUnit XML report with one `testsuite` per directory holding
/// tests.
pub fn render_junit(results: &[SquitResult]) -> String {
    let mut suites: BTreeMap<String, Vec<&SquitResult>> = BTreeMap::new();
    for result in results {
        let suite = result.context_path.join(&result.suite_path);
        suites
            .entry(suite.to_string_lossy().replace('\\', "/"))
            .or_default()
            .push(result);
    }

    let total = RunSummary::from_results(results);
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(
        xml,
        "<testsuites tests=\"{}\" failures=\"{}\" errors=\"{}\" skipped=\"{}\">",
        total.total, total.failed, total.errors, total.ignored
    );

    for (name, members) in &suites {
        let summary = RunSummary::from_results(members.iter().copied());
        let time: f64 = members.iter().map(|r| seconds(r)).sum();
        let _ = writeln!(
            xml,
            "  <testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" errors=\"{}\" skipped=\"{}\" time=\"{:.3}\">",
            escape(name),
            summary.total,
            summary.failed,
            summary.errors,
            summary.ignored,
            time
        );

        for result in members {
            let _ = write!(
                xml,
                "    <testcase name=\"{}\" classname=\"{}\" time=\"{:.3}\"",
                escape(&result.name()),
                escape(name),
                seconds(result)
            );
            if result.is_success() {
                xml.push_str("/>\n");
                continue;
            }

            xml.push_str(">\n");
            if result.is_ignored() {
                xml.push_str("      <skipped/>\n");
            } else if result.is_error() {
                let _ = writeln!(
                    xml,
                    "      <error message=\"{}\">{}</error>",
                    escape(first_line(&result.difference)),
                    escape(&result.difference)
                );
            } else {
                let _ = writeln!(
                    xml,
                    "      <failure message=\"Response differs from expectation\">{}</failure>",
                    escape(&result.difference)
                );
            }
            xml.push_str("    </testcase>\n");
        }

        xml.push_str("  </testsuite>\n");
    }

    xml.push_str("</testsuites>\n");
    xml
}

fn seconds(result: &SquitResult) -> f64 {
    result
        .meta()
        .map(|meta| meta.duration as f64 / 1000.0)
        .unwrap_or(0.0)
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}
