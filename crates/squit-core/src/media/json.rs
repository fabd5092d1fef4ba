//! JSON media type.

use serde_json::Value;

use super::{MediaType, MediaTypeError};
use crate::config::{MergedConfig, MEDIA_TYPE_JSON};

/// Compares JSON documents by value, ignoring object key order.
pub struct JsonMediaType;

impl JsonMediaType {
    pub fn new() -> Self {
        Self
    }

    fn parse(body: &[u8]) -> Result<Value, MediaTypeError> {
        serde_json::from_slice(body).map_err(|e| MediaTypeError::Malformed {
            kind: "JSON",
            message: e.to_string(),
        })
    }
}

impl Default for JsonMediaType {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaType for JsonMediaType {
    fn name(&self) -> &'static str {
        MEDIA_TYPE_JSON
    }

    fn extension(&self) -> &'static str {
        "json"
    }

    fn handles(&self, media_type: &str) -> bool {
        media_type == MEDIA_TYPE_JSON || media_type == "text/json" || media_type.ends_with("+json")
    }

    fn validate(&self, body: &[u8]) -> Result<(), MediaTypeError> {
        Self::parse(body).map(|_| ())
    }

    fn canonicalize(&self, body: &[u8]) -> Result<String, MediaTypeError> {
        let value = Self::parse(body)?;
        serde_json::to_string_pretty(&value).map_err(|e| MediaTypeError::Malformed {
            kind: "JSON",
            message: e.to_string(),
        })
    }

    fn diff(
        &self,
        expected: &[u8],
        actual: &[u8],
        _config: &MergedConfig,
    ) -> Result<String, MediaTypeError> {
        let expected = Self::parse(expected)?;
        let actual = Self::parse(actual)?;

        let mut differences = Vec::new();
        compare(&expected, &actual, "$", &mut differences);
        Ok(differences.join("\n"))
    }
}

fn compare(expected: &Value, actual: &Value, path: &str, out: &mut Vec<String>) {
    match (expected, actual) {
        (Value::Object(expected), Value::Object(actual)) => {
            for (key, expected_value) in expected {
                let child = format!("{path}.{key}");
                match actual.get(key) {
                    Some(actual_value) => compare(expected_value, actual_value, &child, out),
                    None => out.push(format!("Missing property {child}")),
                }
            }
            for key in actual.keys().filter(|k| !expected.contains_key(*k)) {
                out.push(format!("Unexpected property {path}.{key}"));
            }
        }
        (Value::Array(expected), Value::Array(actual)) => {
            if expected.len() != actual.len() {
                out.push(format!(
                    "Expected {} elements at {path} but got {}",
                    expected.len(),
                    actual.len()
                ));
            }
            for (index, (e, a)) in expected.iter().zip(actual).enumerate() {
                compare(e, a, &format!("{path}[{index}]"), out);
            }
        }
        (expected, actual) if expected != actual => {
            out.push(format!("Expected {expected} at {path} but got {actual}"));
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::config;

    #[test]
    fn test_key_order_ignored() {
        let differ = JsonMediaType::new();
        let diff = differ
            .diff(br#"{"a":1,"b":[1,2]}"#, br#"{ "b": [1, 2], "a": 1 }"#, &config())
            .unwrap();
        assert_eq!(diff, "");
    }

    #[test]
    fn test_value_difference_names_path() {
        let differ = JsonMediaType::new();
        let diff = differ
            .diff(br#"{"a":{"b":1}}"#, br#"{"a":{"b":2}}"#, &config())
            .unwrap();
        assert_eq!(diff, "Expected 1 at $.a.b but got 2");
    }

    #[test]
    fn test_missing_and_unexpected_properties() {
        let differ = JsonMediaType::new();
        let diff = differ.diff(br#"{"a":1}"#, br#"{"b":1}"#, &config()).unwrap();
        assert!(diff.contains("Missing property $.a"));
        assert!(diff.contains("Unexpected property $.b"));
    }

    #[test]
    fn test_array_order_matters() {
        let differ = JsonMediaType::new();
        let diff = differ.diff(b"[1,2]", b"[2,1]", &config()).unwrap();
        assert!(!diff.is_empty());
    }

    #[test]
    fn test_malformed_actual() {
        let differ = JsonMediaType::new();
        let result = differ.diff(b"{}", b"{", &config());
        assert!(matches!(result, Err(MediaTypeError::Malformed { kind: "JSON", .. })));
    }

    #[test]
    fn test_canonical_form_sorts_keys() {
        let differ = JsonMediaType::new();
        let canonical = differ.canonicalize(br#"{"b":1,"a":2}"#).unwrap();
        assert!(canonical.find("\"a\"").unwrap() < canonical.find("\"b\"").unwrap());
    }
}
