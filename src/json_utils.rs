//! Structured-output extraction from free-form model text.
//!
//! Models asked for "raw JSON only" still wrap it in code fences or surround it with
//! commentary. [`extract_json`] recovers the payload with two heuristics:
//!
//! 1. a fenced block labelled `json` wins if present;
//! 2. otherwise the span from the earliest `{`/`[` to the latest `}`/`]` is parsed.
//!
//! The second rule is greedy. Text holding several unrelated JSON fragments, or
//! commentary with stray brackets, yields a span that does not parse (→ `None`) or
//! parses into something other than the intended payload. Callers must validate the
//! shape of whatever comes back.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};

const FENCE_OPEN: &str = "```json";
const FENCE_CLOSE: &str = "```";

/// Extract and parse the JSON payload embedded in `text`. Never panics or errors;
/// returns `None` when nothing parseable is found.
#[instrument(target = "exam_forge::json", skip(text), fields(text_len = text.len()))]
pub fn extract_json(text: &str) -> Option<Value> {
    let candidate = match fenced_block(text) {
        Some(block) => {
            debug!(target: "exam_forge::json", "using fenced json block");
            block
        }
        None => greedy_span(text)?,
    };

    match serde_json::from_str::<Value>(candidate) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(target: "exam_forge::json", error = %e, candidate_len = candidate.len(),
                  "Failed to parse extracted JSON");
            None
        }
    }
}

/// [`extract_json`] followed by deserialization into `T`.
pub fn extract_typed<T: DeserializeOwned>(text: &str) -> Option<T> {
    let value = extract_json(text)?;
    match serde_json::from_value(value) {
        Ok(typed) => Some(typed),
        Err(e) => {
            debug!(target: "exam_forge::json", error = %e, "extracted JSON does not match target type");
            None
        }
    }
}

/// Interior of the first ```` ```json ```` fenced block, if it is closed.
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find(FENCE_OPEN)?;
    let after_label = &text[open + FENCE_OPEN.len()..];
    // the label must end the line; "```jsonc" or "```json5" are not json fences
    let newline = after_label.find('\n')?;
    if !after_label[..newline].trim().is_empty() {
        return None;
    }
    let body = &after_label[newline + 1..];
    let close = body.find(FENCE_CLOSE)?;
    Some(body[..close].trim_end())
}

/// Earliest opening delimiter to latest closing delimiter, inclusive.
fn greedy_span(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let end = text.rfind(['}', ']'])?;
    if end < start {
        debug!(target: "exam_forge::json", start, end, "closing delimiter precedes opening delimiter");
        return None;
    }
    // both delimiters are ASCII, so `end + 1` is a char boundary
    Some(&text[start..=end])
}
