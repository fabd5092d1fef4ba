//! XML media type.

use std::collections::BTreeMap;

use roxmltree::{Document, Node};

use super::{MediaType, MediaTypeError};
use crate::config::{MergedConfig, MEDIA_TYPE_XML};

/// Compares XML documents as trees.
///
/// Whitespace-only text, comments and processing instructions are not
/// significant. Namespace prefixes are only compared in strict mode
/// (`xml.strict`, the default); namespace URIs always are.
pub struct XmlMediaType;

impl XmlMediaType {
    pub fn new() -> Self {
        Self
    }

    fn parse(text: &str) -> Result<Document<'_>, MediaTypeError> {
        Document::parse(text).map_err(|e| MediaTypeError::Malformed {
            kind: "XML",
            message: e.to_string(),
        })
    }
}

impl Default for XmlMediaType {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaType for XmlMediaType {
    fn name(&self) -> &'static str {
        MEDIA_TYPE_XML
    }

    fn extension(&self) -> &'static str {
        "xml"
    }

    fn handles(&self, media_type: &str) -> bool {
        media_type == MEDIA_TYPE_XML || media_type == "text/xml" || media_type.ends_with("+xml")
    }

    fn validate(&self, body: &[u8]) -> Result<(), MediaTypeError> {
        Self::parse(std::str::from_utf8(body)?).map(|_| ())
    }

    fn canonicalize(&self, body: &[u8]) -> Result<String, MediaTypeError> {
        let doc = Self::parse(std::str::from_utf8(body)?)?;
        let mut out = String::new();
        write_element(doc.root_element(), 0, &mut out);
        Ok(out)
    }

    fn diff(
        &self,
        expected: &[u8],
        actual: &[u8],
        config: &MergedConfig,
    ) -> Result<String, MediaTypeError> {
        let expected = Self::parse(std::str::from_utf8(expected)?)?;
        let actual = Self::parse(std::str::from_utf8(actual)?)?;

        let mut differences = Vec::new();
        let comparator = Comparator {
            strict: config.xml_strict,
        };
        comparator.compare_elements(
            expected.root_element(),
            actual.root_element(),
            "",
            &mut differences,
        );
        Ok(differences.join("\n"))
    }
}

struct Comparator {
    strict: bool,
}

impl Comparator {
    fn compare_elements(&self, expected: Node, actual: Node, parent: &str, out: &mut Vec<String>) {
        let path = format!("{parent}/{}", qualified_name(expected));

        if !self.same_name(expected, actual) {
            out.push(format!(
                "Expected element '{}' but was '{}' at {parent}/",
                qualified_name(expected),
                qualified_name(actual)
            ));
            return;
        }

        let expected_attrs = attributes(expected);
        let actual_attrs = attributes(actual);
        for (name, value) in &expected_attrs {
            match actual_attrs.get(name) {
                Some(actual_value) if actual_value == value => {}
                Some(actual_value) => out.push(format!(
                    "Expected attribute {path}/@{name} to be '{value}' but was '{actual_value}'"
                )),
                None => out.push(format!("Missing attribute {path}/@{name}")),
            }
        }
        for name in actual_attrs.keys().filter(|k| !expected_attrs.contains_key(*k)) {
            out.push(format!("Unexpected attribute {path}/@{name}"));
        }

        let expected_children = significant_children(expected);
        let actual_children = significant_children(actual);
        if expected_children.len() != actual_children.len() {
            out.push(format!(
                "Expected {} child nodes at {path} but was {}",
                expected_children.len(),
                actual_children.len()
            ));
        }

        for (e, a) in expected_children.iter().zip(&actual_children) {
            match (e.is_element(), a.is_element()) {
                (true, true) => self.compare_elements(*e, *a, &path, out),
                (false, false) => {
                    let expected_text = e.text().unwrap_or_default().trim();
                    let actual_text = a.text().unwrap_or_default().trim();
                    if expected_text != actual_text {
                        out.push(format!(
                            "Expected text '{expected_text}' but was '{actual_text}' at {path}"
                        ));
                    }
                }
                (true, false) => out.push(format!(
                    "Expected element '{}' but was text at {path}",
                    qualified_name(*e)
                )),
                (false, true) => out.push(format!(
                    "Expected text but was element '{}' at {path}",
                    qualified_name(*a)
                )),
            }
        }
    }

    fn same_name(&self, expected: Node, actual: Node) -> bool {
        let e = expected.tag_name();
        let a = actual.tag_name();
        if e.name() != a.name() || e.namespace() != a.namespace() {
            return false;
        }
        !self.strict || prefix(expected) == prefix(actual)
    }
}

fn prefix<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    node.tag_name()
        .namespace()
        .and_then(|uri| node.lookup_prefix(uri))
        .filter(|p| !p.is_empty())
}

fn qualified_name(node: Node) -> String {
    match prefix(node) {
        Some(prefix) => format!("{prefix}:{}", node.tag_name().name()),
        None => node.tag_name().name().to_string(),
    }
}

/// Attributes keyed by `{namespace}name`.
fn attributes(node: Node) -> BTreeMap<String, String> {
    node.attributes()
        .map(|attr| {
            let key = match attr.namespace() {
                Some(ns) => format!("{{{ns}}}{}", attr.name()),
                None => attr.name().to_string(),
            };
            (key, attr.value().to_string())
        })
        .collect()
}

fn significant_children<'a, 'input>(node: Node<'a, 'input>) -> Vec<Node<'a, 'input>> {
    node.children()
        .filter(|child| {
            child.is_element()
                || (child.is_text() && !child.text().unwrap_or_default().trim().is_empty())
        })
        .collect()
}

fn write_element(node: Node, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    let name = qualified_name(node);

    out.push_str(&indent);
    out.push('<');
    out.push_str(&name);

    // Only declarations not already in scope on the parent.
    let inherited: Vec<(Option<&str>, &str)> = node
        .parent_element()
        .map(|p| p.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
        .unwrap_or_default();
    let mut declarations: Vec<(Option<&str>, &str)> = node
        .namespaces()
        .map(|ns| (ns.name(), ns.uri()))
        .filter(|ns| ns.0 != Some("xml") && !inherited.contains(ns))
        .collect();
    declarations.sort();
    for (prefix, uri) in declarations {
        match prefix {
            Some(prefix) => out.push_str(&format!(" xmlns:{prefix}=\"{}\"", escape(uri))),
            None => out.push_str(&format!(" xmlns=\"{}\"", escape(uri))),
        }
    }

    for (key, value) in attributes(node) {
        out.push_str(&format!(" {key}=\"{}\"", escape(&value)));
    }

    let children = significant_children(node);
    match children.as_slice() {
        [] => out.push_str("/>\n"),
        [only] if only.is_text() => {
            out.push('>');
            out.push_str(&escape(only.text().unwrap_or_default().trim()));
            out.push_str(&format!("</{name}>\n"));
        }
        _ => {
            out.push_str(">\n");
            for child in children {
                if child.is_element() {
                    write_element(child, depth + 1, out);
                } else {
                    out.push_str(&"  ".repeat(depth + 1));
                    out.push_str(&escape(child.text().unwrap_or_default().trim()));
                    out.push('\n');
                }
            }
            out.push_str(&format!("{indent}</{name}>\n"));
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
