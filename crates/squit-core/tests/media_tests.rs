use std::path::Path;

use squit_core::config::{ConfigNode, MergedConfig};
use squit_core::media::{render_line_diff, GenericMediaType, JsonMediaType, MediaType, XmlMediaType};
use squit_core::MediaTypeRegistry;

fn config(media_type: &str) -> MergedConfig {
    let node = ConfigNode {
        endpoint: Some("http://localhost".to_string()),
        media_type: Some(media_type.to_string()),
        ..Default::default()
    };
    MergedConfig::from_node(node, Path::new("project/call1")).unwrap()
}

#[test]
fn test_registry_dispatch() {
    let registry = MediaTypeRegistry::new();
    assert_eq!(registry.for_media_type("application/xml").extension(), "xml");
    assert_eq!(registry.for_media_type("text/xml").extension(), "xml");
    assert_eq!(
        registry
            .for_media_type("Application/JSON; charset=utf-8")
            .extension(),
        "json"
    );
    assert_eq!(registry.for_media_type("application/octet-stream").extension(), "txt");

    let xml = registry.for_media_type("application/soap+xml");
    assert_eq!(xml.request_name(), "request.xml");
    assert_eq!(xml.source_response_name(), "response.xml");
    assert_eq!(xml.expected_response_name(), "expected_response.xml");
    assert_eq!(xml.actual_response_name(), "actual_response.xml");
}

#[test]
fn test_diff_is_reflexive() {
    let documents: [(&dyn MediaType, &str, &[u8]); 3] = [
        (&XmlMediaType::new(), "application/xml", b"<a x=\"1\"><b>text</b><c/></a>"),
        (&JsonMediaType::new(), "application/json", br#"{"a": [1, {"b": null}], "c": "d"}"#),
        (&GenericMediaType::new(), "text/plain", b"line one\nline two\n"),
    ];

    for (handler, media_type, body) in documents {
        let diff = handler.diff(body, body, &config(media_type)).unwrap();
        assert!(diff.trim().is_empty(), "{} reported {diff}", handler.name());
    }
}

#[test]
fn test_permuted_json() {
    let expected = br#"{"name": "squit", "tags": ["a", "b"], "nested": {"x": 1, "y": 2}}"#;
    let actual = br#"{"nested": {"y": 2, "x": 1}, "tags": ["a", "b"], "name": "squit"}"#;

    let json = JsonMediaType::new()
        .diff(expected, actual, &config("application/json"))
        .unwrap();
    assert!(json.trim().is_empty());

    let generic = GenericMediaType::new()
        .diff(expected, actual, &config("text/plain"))
        .unwrap();
    assert!(!generic.trim().is_empty());
}

#[test]
fn test_xml_whitespace_and_prefixes() {
    let xml = XmlMediaType::new();
    let expected = br#"<s:Envelope xmlns:s="urn:soap"><s:Body><ok/></s:Body></s:Envelope>"#;
    let actual = b"<soap:Envelope xmlns:soap=\"urn:soap\">\n  <soap:Body>\n    <ok/>\n  </soap:Body>\n</soap:Envelope>";

    let mut lenient = config("application/xml");
    lenient.xml_strict = false;
    assert!(xml.diff(expected, actual, &lenient).unwrap().trim().is_empty());

    let strict = config("application/xml");
    assert!(!xml.diff(expected, actual, &strict).unwrap().trim().is_empty());
}

#[test]
fn test_xml_mismatch() {
    let diff = XmlMediaType::new()
        .diff(b"<nice/>", b"<not_nice/>", &config("application/xml"))
        .unwrap();
    assert!(diff.contains("nice"));
}

#[test]
fn test_malformed_documents_are_errors() {
    assert!(XmlMediaType::new()
        .diff(b"<a>", b"<a/>", &config("application/xml"))
        .is_err());
    assert!(JsonMediaType::new()
        .diff(b"{", b"{}", &config("application/json"))
        .is_err());
}

#[test]
fn test_canonical_line_diff() {
    let xml = XmlMediaType::new();
    let expected = xml.canonicalize(b"<a><b>1</b><c/></a>").unwrap();
    let actual = xml.canonicalize(b"<a>\n<b>2</b>\n<c/></a>").unwrap();

    let diff = render_line_diff(&expected, &actual);
    assert!(diff.contains("- ") && diff.contains("<b>1</b>"));
    assert!(diff.contains("+ ") && diff.contains("<b>2</b>"));
    assert!(diff.contains("  <c/>") || diff.contains("    <c/>"));
}
