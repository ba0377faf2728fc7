//! Best-effort repair of model output before structured parsing.
//!
//! Models asked for "a valid JSON object, no preamble" still wrap it in code
//! fences, prefix it with a `json` language tag, or slip in commentary lines.
//! The repair pass strips those artifacts and then parses strictly; it never
//! tries to guess at broken JSON beyond that.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::models::TagMapping;

/// Lines whose first non-blank character is `!`, with their line break.
static SENTINEL_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*!.*(?:\r?\n|$)").expect("sentinel line pattern is valid")
});

/// The cleaned response is not a JSON object of string to string.
#[derive(Debug, Error)]
#[error("response is not a JSON object of strings: {source}")]
pub struct MalformedResponseError {
    #[source]
    source: serde_json::Error,
}

/// Unwraps a markdown code fence and a leading `json` language tag.
///
/// Text without a fence is returned trimmed but otherwise unchanged.
///
/// # Examples
///
/// ```
/// use postenrich::repair::strip_code_fence;
///
/// assert_eq!(strip_code_fence("```json\n{\"A\": \"B\"}\n```"), "{\"A\": \"B\"}");
/// assert_eq!(strip_code_fence("  {\"A\": \"B\"} "), "{\"A\": \"B\"}");
/// ```
pub fn strip_code_fence(raw: &str) -> String {
    let unfenced = raw.trim().trim_matches('`');
    strip_language_tag(unfenced)
        .replace("```", "")
        .trim()
        .to_string()
}

fn strip_language_tag(text: &str) -> &str {
    let is_tag = text
        .get(..4)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("json"));
    if !is_tag {
        return text;
    }

    let rest = &text[4..];
    if rest.starts_with('\n') || rest.starts_with("\r\n") {
        rest
    } else {
        text
    }
}

/// Applies the full cleanup: fence and language tag removal, then drops every
/// line starting with the `!` sentinel.
pub fn clean_response(raw: &str) -> String {
    let unfenced = strip_code_fence(raw);
    SENTINEL_LINE.replace_all(&unfenced, "").trim().to_string()
}

/// Cleans `raw` and parses it strictly as a tag mapping.
///
/// Callers that can live without a mapping treat the error as "no mapping";
/// the tag unifier does this per chunk.
///
/// # Examples
///
/// ```
/// use postenrich::repair::parse_mapping;
///
/// let mapping = parse_mapping("!bad_key: x,\n{\"A\":\"B\"}").unwrap();
/// assert_eq!(mapping.get("A"), Some("B"));
///
/// assert!(parse_mapping("not json").is_err());
/// ```
///
/// # Errors
///
/// Returns `MalformedResponseError` if the cleaned text is not a JSON object
/// whose values are all strings.
pub fn parse_mapping(raw: &str) -> Result<TagMapping, MalformedResponseError> {
    let cleaned = clean_response(raw);
    serde_json::from_str::<BTreeMap<String, String>>(&cleaned)
        .map(TagMapping::from)
        .map_err(|source| MalformedResponseError { source })
}
