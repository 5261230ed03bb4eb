//! Extraction of structured payloads from free-form model output.
//!
//! Models frequently wrap JSON in markdown fences or surround it with prose.
//! These helpers locate the payload; a payload that still fails to parse is
//! reported as [`AiError::Protocol`] carrying the raw text.

use super::AiError;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Body of the first fenced code block, if the text contains one.
fn fenced_body(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    // Skip the info string (e.g. `json`) up to the end of the fence line.
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    let end = body.find("```").unwrap_or(body.len());
    Some(&body[..end])
}

/// Locate the first JSON object or array inside `text`.
///
/// Each `{` or `[` is tried as a candidate start; brackets in surrounding prose
/// that do not open a complete JSON value are skipped.
pub fn extract_json(text: &str) -> Option<&str> {
    let body = fenced_body(text).unwrap_or(text);
    body.match_indices(['{', '['])
        .find_map(|(start, _)| json_value_at(&body[start..]))
}

/// The complete JSON value at the beginning of `text`, if there is one.
fn json_value_at(text: &str) -> Option<&str> {
    let mut stream = serde_json::Deserializer::from_str(text).into_iter::<Value>();
    match stream.next() {
        Some(Ok(_)) => Some(&text[..stream.byte_offset()]),
        _ => None,
    }
}

/// Parse model output as `T`, tolerating fences and surrounding prose.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, AiError> {
    let payload =
        extract_json(text).ok_or_else(|| AiError::protocol("no JSON payload found", text))?;
    serde_json::from_str(payload).map_err(|e| AiError::protocol(e.to_string(), text))
}

/// Remove markdown code fences from generated source code.
pub fn strip_code_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
