//! Built-in processors.

use super::{Documents, ProcessError, Processor};
use crate::config::MergedConfig;

/// Removes trailing whitespace from every line and surrounding blank lines.
///
/// Documents that are not valid UTF-8 pass through unchanged.
pub struct TrimWhitespace;

impl Processor for TrimWhitespace {
    fn name(&self) -> &'static str {
        "trim-whitespace"
    }

    fn process(&self, documents: Documents, _config: &MergedConfig) -> Result<Documents, ProcessError> {
        Ok(Documents {
            request: documents.request.map(trim),
            response: trim(documents.response),
        })
    }
}

/// Converts CRLF and CR line endings to LF.
pub struct NormalizeNewlines;

impl Processor for NormalizeNewlines {
    fn name(&self) -> &'static str {
        "normalize-newlines"
    }

    fn process(&self, documents: Documents, _config: &MergedConfig) -> Result<Documents, ProcessError> {
        Ok(Documents {
            request: documents.request.map(normalize_newlines),
            response: normalize_newlines(documents.response),
        })
    }
}

fn trim(body: Vec<u8>) -> Vec<u8> {
    match String::from_utf8(body) {
        Ok(text) => {
            let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
            let trimmed = lines.join("\n");
            let mut result = trimmed.trim_matches('\n').to_string();
            if !result.is_empty() {
                result.push('\n');
            }
            result.into_bytes()
        }
        Err(err) => err.into_bytes(),
    }
}

fn normalize_newlines(body: Vec<u8>) -> Vec<u8> {
    let mut result = Vec::with_capacity(body.len());
    let mut bytes = body.into_iter().peekable();
    while let Some(byte) = bytes.next() {
        if byte == b'\r' {
            if bytes.peek() == Some(&b'\n') {
                bytes.next();
            }
            result.push(b'\n');
        } else {
            result.push(byte);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim() {
        assert_eq!(trim(b"\n\n<a>  \n  <b/>\t\n</a>\n\n".to_vec()), b"<a>\n  <b/>\n</a>\n");
        assert_eq!(trim(b"   ".to_vec()), b"");
    }

    #[test]
    fn test_trim_keeps_binary() {
        let binary = vec![0xff, 0x20, 0x20];
        assert_eq!(trim(binary.clone()), binary);
    }

    #[test]
    fn test_normalize_newlines() {
        assert_eq!(normalize_newlines(b"a\r\nb\rc\n".to_vec()), b"a\nb\nc\n");
    }
}
