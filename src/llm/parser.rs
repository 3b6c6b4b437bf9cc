//! Recover a JSON value from raw LLM text output
//!
//! Models wrap their JSON in prose, code fences, or both. The parser
//! tries the trimmed text directly, then falls back to candidate
//! substrings in a fixed order: fenced block content, the first
//! balanced object, the first balanced array.

use serde_json::Value;

use crate::core::error::{RelayError, Result};

/// Parse JSON out of an LLM completion, tolerating surrounding noise.
///
/// Fails with [`RelayError::EmptyResponse`] on blank input and with
/// [`RelayError::JsonExtraction`] (carrying the direct parse's
/// line/column and a snippet) when no candidate parses.
pub fn parse_json_safely(text: &str) -> Result<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(RelayError::EmptyResponse);
    }

    let direct_error = match serde_json::from_str(trimmed) {
        Ok(value) => return Ok(value),
        Err(error) => error,
    };

    let mut candidates: Vec<&str> = Vec::new();
    candidates.extend(fenced_block(trimmed));
    let object = balanced_slice(trimmed, '{', '}');
    let array = balanced_slice(trimmed, '[', ']');
    // An object nested inside an array is not the top-level value;
    // of the two delimited candidates, the one starting earlier wins.
    if trimmed.find('{').unwrap_or(usize::MAX) <= trimmed.find('[').unwrap_or(usize::MAX) {
        candidates.extend(object);
        candidates.extend(array);
    } else {
        candidates.extend(array);
        candidates.extend(object);
    }
    for candidate in candidates {
        if let Ok(value) = serde_json::from_str(candidate) {
            return Ok(value);
        }
    }

    Err(RelayError::JsonExtraction {
        line: direct_error.line(),
        column: direct_error.column(),
        snippet: trimmed.chars().take(80).collect(),
    })
}

/// First fenced code block whose content is object- or array-shaped.
///
/// An optional language tag after the opening fence is skipped.
fn fenced_block(text: &str) -> Option<&str> {
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after_fence = &rest[open + 3..];
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_fence[body_start..];
        let Some(close) = body.find("```") else {
            return None;
        };
        let content = body[..close].trim();
        if content.starts_with('{') || content.starts_with('[') {
            return Some(content);
        }
        rest = &body[close + 3..];
    }
    None
}

/// First balanced `open..close` substring, skipping delimiters inside
/// JSON string literals.
fn balanced_slice(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        } else if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(&text[start..start + offset + close.len_utf8()]);
            }
        }
    }
    None
}
