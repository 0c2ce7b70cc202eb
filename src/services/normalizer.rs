use std::borrow::Cow;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::models::Record;

pub const DIAGNOSTIC_ERROR: &str = "parse failure";
const RAW_CONTENT_PREVIEW_CHARS: usize = 200;

static FENCE_OPEN_REGEX: OnceLock<Regex> = OnceLock::new();
static FENCE_CLOSE_REGEX: OnceLock<Regex> = OnceLock::new();

fn fence_open_regex() -> &'static Regex {
    FENCE_OPEN_REGEX.get_or_init(|| Regex::new(r"(?i)^```[ \t]*(?:json)?[ \t]*\r?\n?").expect("Invalid regex pattern"))
}

fn fence_close_regex() -> &'static Regex {
    FENCE_CLOSE_REGEX.get_or_init(|| Regex::new(r"\r?\n?[ \t]*```$").expect("Invalid regex pattern"))
}

/// Recovery steps tried in order; the first one that yields records wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    StrictParse,
    BracketScan,
    BraceScan,
    DiagnosticFallback,
}

impl RecoveryStrategy {
    pub const LADDER: [RecoveryStrategy; 3] = [
        RecoveryStrategy::StrictParse,
        RecoveryStrategy::BracketScan,
        RecoveryStrategy::BraceScan,
    ];

    pub fn attempt(&self, text: &str) -> Option<Vec<Record>> {
        match self {
            RecoveryStrategy::StrictParse => strict_parse(text),
            RecoveryStrategy::BracketScan => bracket_scan(text),
            RecoveryStrategy::BraceScan => brace_scan(text),
            RecoveryStrategy::DiagnosticFallback => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, RecoveryStrategy::DiagnosticFallback)
    }
}

impl fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryStrategy::StrictParse => write!(f, "strict-parse"),
            RecoveryStrategy::BracketScan => write!(f, "bracket-scan"),
            RecoveryStrategy::BraceScan => write!(f, "brace-scan"),
            RecoveryStrategy::DiagnosticFallback => write!(f, "diagnostic-fallback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub records: Vec<Record>,
    pub strategy: RecoveryStrategy,
}

/// Turns a raw model reply into records. Never fails: when nothing can be
/// recovered the result holds a single diagnostic record.
///
/// The expected shape is only used for logging; enforcing it is the job of
/// [`crate::services::validation`].
pub fn normalize(raw: &str, expected_row_count: usize, expected_columns: Option<&[String]>) -> Vec<Record> {
    normalize_with_strategy(raw, expected_row_count, expected_columns).records
}

pub fn normalize_with_strategy(
    raw: &str,
    expected_row_count: usize,
    expected_columns: Option<&[String]>,
) -> Normalized {
    let cleaned = strip_code_fences(raw);

    for strategy in RecoveryStrategy::LADDER {
        if let Some(records) = strategy.attempt(&cleaned) {
            tracing::debug!(
                %strategy,
                rows = records.len(),
                expected_rows = expected_row_count,
                expected_columns = expected_columns.map(|c| c.len()).unwrap_or(0),
                "recovered records from completion"
            );
            return Normalized { records, strategy };
        }
    }

    tracing::warn!(raw_chars = raw.len(), "could not recover records, returning diagnostic record");

    Normalized {
        records: vec![diagnostic_record(raw)],
        strategy: RecoveryStrategy::DiagnosticFallback,
    }
}

/// Removes a leading fence opener (optionally tagged `json`) and a trailing
/// fence closer. Either side may be missing.
pub fn strip_code_fences(raw: &str) -> Cow<'_, str> {
    let trimmed = raw.trim();
    let without_open = fence_open_regex().replace(trimmed, "");
    let without_close = fence_close_regex().replace(without_open.as_ref(), "");

    if without_close.len() == trimmed.len() {
        Cow::Borrowed(trimmed)
    } else {
        Cow::Owned(without_close.trim().to_string())
    }
}

pub fn diagnostic_record(raw: &str) -> Record {
    let mut record = Record::new();
    record.insert("error".to_string(), Value::String(DIAGNOSTIC_ERROR.to_string()));
    record.insert(
        "raw_content".to_string(),
        Value::String(raw.chars().take(RAW_CONTENT_PREVIEW_CHARS).collect()),
    );
    record
}

pub fn is_diagnostic(record: &Record) -> bool {
    record.get("error").and_then(Value::as_str) == Some(DIAGNOSTIC_ERROR) && record.contains_key("raw_content")
}

fn strict_parse(text: &str) -> Option<Vec<Record>> {
    let value: Value = serde_json::from_str(text).ok()?;
    into_records(value)
}

fn bracket_scan(text: &str) -> Option<Vec<Record>> {
    let candidate = scan_delimited(text, '[', ']')?;
    let value = parse_lenient(candidate)?;
    match value {
        Value::Array(_) => into_records(value),
        _ => None,
    }
}

fn brace_scan(text: &str) -> Option<Vec<Record>> {
    let candidate = scan_delimited(text, '{', '}')?;
    match parse_lenient(candidate)? {
        Value::Object(map) => Some(vec![map]),
        _ => None,
    }
}

/// serde_json first, then json5 for trailing commas, single quotes and
/// unquoted keys.
fn parse_lenient(candidate: &str) -> Option<Value> {
    serde_json::from_str(candidate)
        .ok()
        .or_else(|| json5::from_str::<Value>(candidate).ok())
}

fn into_records(value: Value) -> Option<Vec<Record>> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        Value::Object(map) => Some(vec![map]),
        _ => None,
    }
}

/// Finds the substring from the first `open` to its balancing `close`,
/// skipping delimiters inside string literals. If the text never balances,
/// falls back to the last `close` after the opener.
fn scan_delimited(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth: usize = 0;
    let mut in_string: Option<char> = None;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if let Some(quote) = in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == quote {
                in_string = None;
            }
            continue;
        }

        match ch {
            '"' | '\'' => in_string = Some(ch),
            c if c == open => depth += 1,
            c if c == close => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }

    let rel_end = text[start..].rfind(close)?;
    Some(&text[start..start + rel_end + close.len_utf8()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(value: Value) -> Vec<Record> {
        value
            .as_array()
            .expect("Expected an array")
            .iter()
            .map(|v| v.as_object().cloned().expect("Expected an object"))
            .collect()
    }

    mod fences {
        use super::*;

        #[test]
        fn test_strip_tagged_fence() {
            assert_eq!(strip_code_fences("```json\n[{\"a\": 1}]\n```"), "[{\"a\": 1}]");
        }

        #[test]
        fn test_strip_untagged_fence() {
            assert_eq!(strip_code_fences("  ```\n{\"a\": 1}\n```  "), "{\"a\": 1}");
        }

        #[test]
        fn test_strip_only_closing_fence() {
            assert_eq!(strip_code_fences("[1, 2]\n```"), "[1, 2]");
        }

        #[test]
        fn test_strip_leaves_plain_text_alone() {
            assert!(matches!(strip_code_fences("  [1]  "), Cow::Borrowed("[1]")));
        }

        #[test]
        fn test_fenced_and_plain_normalize_identically() {
            let plain = r#"[{"name": "Ada", "age": 36}, {"name": "Alan", "age": 41}]"#;
            let fenced = format!("```json\n{}\n```", plain);

            assert_eq!(normalize(&fenced, 2, None), normalize(plain, 2, None));
        }
    }

    mod strict {
        use super::*;

        #[test]
        fn test_array_round_trip() {
            let expected = json!([
                {"course": "Rust 101", "enrolled": 120},
                {"course": "Databases", "enrolled": 87},
                {"course": "Compilers", "enrolled": 45}
            ]);
            let raw = serde_json::to_string(&expected).expect("Failed to serialize");
            let columns = vec!["course".to_string(), "enrolled".to_string()];

            let result = normalize_with_strategy(&raw, 3, Some(&columns));

            assert_eq!(result.strategy, RecoveryStrategy::StrictParse);
            assert_eq!(result.records, records(expected));
        }

        #[test]
        fn test_single_object_is_wrapped() {
            let result = normalize(r#"{"city": "Lisbon", "active": true}"#, 1, None);
            assert_eq!(result, records(json!([{"city": "Lisbon", "active": true}])));
        }

        #[test]
        fn test_empty_array_is_accepted() {
            let result = normalize_with_strategy("[]", 1, None);
            assert_eq!(result.strategy, RecoveryStrategy::StrictParse);
            assert!(result.records.is_empty());
        }

        #[test]
        fn test_scalar_array_is_not_a_record_set() {
            assert_eq!(RecoveryStrategy::StrictParse.attempt("[1, 2, 3]"), None);
        }
    }

    mod scanning {
        use super::*;

        #[test]
        fn test_array_embedded_in_prose() {
            let raw = "Sure! Here is your data:\n[{\"id\": 1, \"tags\": [\"a\", \"b\"]},\n {\"id\": 2, \"tags\": []}]\nLet me know if you need more.";
            let result = normalize_with_strategy(raw, 2, None);

            assert_eq!(result.strategy, RecoveryStrategy::BracketScan);
            assert_eq!(
                result.records,
                records(json!([{"id": 1, "tags": ["a", "b"]}, {"id": 2, "tags": []}]))
            );
        }

        #[test]
        fn test_brackets_inside_strings_do_not_end_scan() {
            let raw = r#"Output: [{"note": "uses ] and [ inside"}] done"#;
            let result = normalize_with_strategy(raw, 1, None);

            assert_eq!(result.strategy, RecoveryStrategy::BracketScan);
            assert_eq!(result.records, records(json!([{"note": "uses ] and [ inside"}])));
        }

        #[test]
        fn test_json5_trailing_comma_is_tolerated() {
            let raw = "Result: [{'name': 'Ada', active: true,},]";
            let result = normalize_with_strategy(raw, 1, None);

            assert_eq!(result.strategy, RecoveryStrategy::BracketScan);
            assert_eq!(result.records, records(json!([{"name": "Ada", "active": true}])));
        }

        #[test]
        fn test_object_in_prose_is_wrapped() {
            let raw = "The record is {\"sku\": \"A-1\", \"price\": 9.99} as requested";
            let result = normalize_with_strategy(raw, 1, None);

            assert_eq!(result.strategy, RecoveryStrategy::BraceScan);
            assert_eq!(result.records, records(json!([{"sku": "A-1", "price": 9.99}])));
        }

        #[test]
        fn test_scalar_array_falls_through_to_object() {
            let raw = "ids [1, 2] then {\"ok\": true}";
            let result = normalize_with_strategy(raw, 1, None);

            assert_eq!(result.strategy, RecoveryStrategy::BraceScan);
            assert_eq!(result.records, records(json!([{"ok": true}])));
        }

        #[test]
        fn test_unbalanced_scan_uses_last_closer() {
            assert_eq!(scan_delimited("x [[1] y ]", '[', ']'), Some("[[1] y ]"));
            assert_eq!(scan_delimited("x [[1] y", '[', ']'), Some("[[1]"));
            assert_eq!(scan_delimited("no opener here", '[', ']'), None);
        }
    }

    mod fallback {
        use super::*;

        #[test]
        fn test_garbage_yields_diagnostic_record() {
            for raw in ["", "hello world", "{{{{", "[not json", "]["] {
                let result = normalize_with_strategy(raw, 5, None);

                assert_eq!(result.strategy, RecoveryStrategy::DiagnosticFallback);
                assert_eq!(result.records.len(), 1);
                assert!(result.records[0].contains_key("error"));
                assert!(is_diagnostic(&result.records[0]));
            }
        }

        #[test]
        fn test_raw_content_is_truncated_to_200_chars() {
            let raw = "é".repeat(500);
            let records = normalize(&raw, 1, None);

            assert_eq!(records[0]["error"], DIAGNOSTIC_ERROR);
            let preview = records[0]["raw_content"].as_str().expect("raw_content should be a string");
            assert_eq!(preview.chars().count(), 200);
        }

        #[test]
        fn test_fallback_keeps_original_text() {
            let raw = "```json\nnot really json\n```";
            let records = normalize(raw, 1, None);
            assert_eq!(records[0]["raw_content"], raw);
        }
    }
}
