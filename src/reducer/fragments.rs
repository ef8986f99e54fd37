//! Structural helpers for replica JSON fragments.
//!
//! Replicas answer search commands with a bracketed list of store objects on a
//! single line. The splitter below cuts that list into top-level objects by
//! brace depth, tracking string and escape state so braces inside quoted values
//! are not structural. Each object is kept as the exact text the replica sent.

use serde_json::{Map, Value};

/// Returns the text between the outer `[` and `]`, trimmed.
pub fn array_body(reply: &str) -> Option<&str> {
    reply
        .trim()
        .strip_prefix('[')?
        .strip_suffix(']')
        .map(str::trim)
}

/// Slices every complete top-level `{...}` object out of `content`.
///
/// Stray closing braces and a trailing unterminated object are ignored.
pub fn split_top_level_objects(content: &str) -> Vec<&str> {
    let mut objects = Vec::new();
    let mut depth = 0usize;
    let mut start: Option<usize> = None;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, c) in content.char_indices() {
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

        match c {
            '"' => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(idx);
                }
                depth += 1;
            }
            '}' => {
                if depth == 0 {
                    continue;
                }
                depth -= 1;
                if depth == 0
                    && let Some(begin) = start.take()
                {
                    objects.push(&content[begin..=idx]);
                }
            }
            _ => {}
        }
    }

    objects
}

/// Reads a top-level field of one object as a string.
///
/// Strings come back unquoted, other values in their JSON form. Objects that
/// are not valid JSON fall back to a lenient textual lookup.
pub fn extract_field(object: &str, field: &str) -> Option<String> {
    match serde_json::from_str::<Map<String, Value>>(object) {
        Ok(map) => map.get(field).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }),
        Err(_) => extract_field_lenient(object, field),
    }
}

fn extract_field_lenient(object: &str, field: &str) -> Option<String> {
    let needle = format!("\"{}\"", field);
    let mut from = 0;

    while let Some(pos) = object[from..].find(&needle) {
        let after = from + pos + needle.len();
        let rest = object[after..].trim_start();

        if let Some(value) = rest.strip_prefix(':') {
            let value = value.trim_start();

            if let Some(quoted) = value.strip_prefix('"') {
                return closing_quote(quoted).map(|end| quoted[..end].to_string());
            }

            let end = value.find([',', '}']).unwrap_or(value.len());
            let raw = value[..end].trim();
            return (!raw.is_empty()).then(|| raw.to_string());
        }

        from = after;
    }

    None
}

fn closing_quote(s: &str) -> Option<usize> {
    let mut escaped = false;
    for (idx, c) in s.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return Some(idx),
            _ => {}
        }
    }
    None
}
