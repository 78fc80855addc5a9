//! Post-processing: deterministic repair of model output before parsing.
//!
//! Models asked for "only a JSON object" still produce:
//!
//! - the object wrapped in ` ```json ... ``` ` fences
//! - a sentence of prose before or after the object
//! - several objects back to back (`{...}{...}`), one per guess
//! - BOM / zero-width characters copied from OCR'd text
//!
//! The rules below strip those artefacts and pull out every JSON value the
//! output contains. Callers pick the value that fits what they asked for.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Normalise raw model output so JSON can be read out of it.
///
/// Rules (applied in order):
/// 1. Unwrap the first fenced code block, if any
/// 2. Normalise line endings (CRLF → LF)
/// 3. Strip invisible Unicode (BOM, zero-width spaces, soft hyphens)
/// 4. Trim surrounding whitespace
pub fn clean_model_output(input: &str) -> String {
    let s = unwrap_code_fence(input);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

// ── Rule 1: Unwrap fenced code block ─────────────────────────────────────────

static RE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n?(.*?)```").unwrap());

fn unwrap_code_fence(input: &str) -> String {
    match RE_FENCE.captures(input) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── JSON recovery ────────────────────────────────────────────────────────────

/// Every JSON value found in the output, in order.
///
/// Scans from the first `{` or `[` that starts a parseable value and reads
/// consecutive values from there, so concatenated objects are all returned.
pub fn json_values(raw: &str) -> Vec<Value> {
    let cleaned = clean_model_output(raw);
    let mut offset = 0;
    while let Some(pos) = cleaned[offset..].find(['{', '[']) {
        let start = offset + pos;
        let values: Vec<Value> = serde_json::Deserializer::from_str(&cleaned[start..])
            .into_iter::<Value>()
            .map_while(Result::ok)
            .collect();
        if !values.is_empty() {
            return values;
        }
        offset = start + 1;
    }
    Vec::new()
}

/// The first JSON object in the output.
///
/// A top-level array yields its first object element.
pub fn first_object(raw: &str) -> Option<Map<String, Value>> {
    json_values(raw).into_iter().find_map(|v| match v {
        Value::Object(map) => Some(map),
        Value::Array(items) => items.into_iter().find_map(|i| match i {
            Value::Object(map) => Some(map),
            _ => None,
        }),
        _ => None,
    })
}

/// The first object among the output's values that `accept` approves.
///
/// Used when several concatenated objects are returned and only one has the
/// expected shape.
pub fn first_object_where(
    raw: &str,
    accept: impl Fn(&Map<String, Value>) -> bool,
) -> Option<Map<String, Value>> {
    json_values(raw).into_iter().find_map(|v| match v {
        Value::Object(map) if accept(&map) => Some(map),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unwrap_json_fence() {
        let input = "```json\n{\"a\": 1}\n```";
        assert_eq!(clean_model_output(input), "{\"a\": 1}");
    }

    #[test]
    fn test_unwrap_fence_without_lang() {
        let input = "Here you go:\n```\n{\"a\": 1}\n```\nThanks";
        assert_eq!(clean_model_output(input), "{\"a\": 1}");
    }

    #[test]
    fn test_no_fence_passthrough() {
        assert_eq!(clean_model_output("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "\u{FEFF}{\"a\":\u{200B} 1}";
        assert_eq!(remove_invisible_chars(input), "{\"a\": 1}");
    }

    #[test]
    fn test_object_after_prose() {
        let map = first_object("The answer is {\"label\": \"invoice\"} as requested.").unwrap();
        assert_eq!(map["label"], "invoice");
    }

    #[test]
    fn test_concatenated_objects() {
        let values = json_values("{\"a\": 1}{\"b\": 2}\n{\"c\": 3}");
        assert_eq!(values, vec![json!({"a": 1}), json!({"b": 2}), json!({"c": 3})]);
    }

    #[test]
    fn test_first_object_where_skips_wrong_shape() {
        let raw = "{\"ten_mat_hang\": \"x\"}{\"so_hoa_don\": \"0001\"}";
        let map = first_object_where(raw, |m| m.contains_key("so_hoa_don")).unwrap();
        assert_eq!(map["so_hoa_don"], "0001");
    }

    #[test]
    fn test_array_yields_first_object() {
        let map = first_object("[1, {\"a\": true}]").unwrap();
        assert_eq!(map["a"], true);
    }

    #[test]
    fn test_brace_in_prose_is_skipped() {
        let map = first_object("use {braces} like {\"ok\": 1}").unwrap();
        assert_eq!(map["ok"], 1);
    }

    #[test]
    fn test_no_json() {
        assert!(first_object("I cannot read this document.").is_none());
        assert!(json_values("").is_empty());
    }
}
