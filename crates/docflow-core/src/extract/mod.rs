//! Thought/payload separation and artifact recovery for streamed generations.
//!
//! Every function here is pure over the full accumulated text, so callers
//! re-run them after each delta instead of carrying incremental state.

pub mod parse;
pub mod raw;
pub(crate) mod scan;

use serde::{Deserialize, Serialize};

pub use parse::{ArtifactSchema, ParsedArtifact, has_content, merge_monotonic, parse, parse_value};
pub use raw::extract_raw;

const FENCE: &str = "```";

/// Fence tags that mark structured data.
const STRUCTURED_TAGS: &[&str] = &["json"];

/// Accumulated text split into reasoning and the (possibly truncated) payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedBuffer {
    pub thought: String,
    pub payload_fragment: String,
    /// Once true for a stream it stays true for every longer prefix.
    pub payload_started: bool,
}

/// Splits `text` into thought and payload. First match wins:
///
/// 1. a ` ```json ` fence: the payload runs from the line after the opener to
///    the closing fence (or the end of text);
/// 2. the first unescaped `{` or `[`: the payload runs from there to the end;
/// 3. otherwise everything is thought.
pub fn decode(text: &str) -> DecodedBuffer {
    if let Some((opener, body_start)) = structured_fence(text) {
        let body = &text[body_start..];
        let body = match closing_fence(body) {
            Some(end) => &body[..end],
            None => body,
        };
        return DecodedBuffer {
            thought: text[..opener].trim().to_string(),
            payload_fragment: body.trim().to_string(),
            payload_started: true,
        };
    }

    if let Some(start) = scan::find_unescaped(text, &['{', '[']) {
        return DecodedBuffer {
            thought: strip_trailing_fence(&text[..start]).trim().to_string(),
            payload_fragment: text[start..].to_string(),
            payload_started: true,
        };
    }

    DecodedBuffer {
        thought: text.trim().to_string(),
        payload_fragment: String::new(),
        payload_started: false,
    }
}

/// Finds the first fence opener whose tag names structured data. Returns the
/// offset of the opener and the offset where its body starts. The tag only
/// counts once the whitespace after it has arrived, so a half-received
/// ` ```js` never matches.
fn structured_fence(text: &str) -> Option<(usize, usize)> {
    let mut from = 0_usize;
    while let Some(rel) = text[from..].find(FENCE) {
        let opener = from + rel;
        let tag_start = opener + FENCE.len();
        let rest = &text[tag_start..];
        let tag_len = rest
            .find(|c: char| c.is_whitespace())
            .unwrap_or(rest.len());
        let tag = &rest[..tag_len];
        let terminated = tag_len < rest.len();
        if terminated && STRUCTURED_TAGS.iter().any(|t| tag.eq_ignore_ascii_case(t)) {
            let after_tag = tag_start + tag_len;
            let body_start = match text[after_tag..].find('\n') {
                Some(nl) => after_tag + nl + 1,
                None => text.len(),
            };
            return Some((opener, body_start));
        }
        from = tag_start;
    }
    None
}

/// A closing fence only counts at the start of a line; string values inside a
/// JSON payload never contain raw newlines, so backticks in them are skipped.
fn closing_fence(body: &str) -> Option<usize> {
    let mut from = 0_usize;
    while let Some(rel) = body[from..].find(FENCE) {
        let idx = from + rel;
        if idx == 0 || body[..idx].ends_with('\n') {
            return Some(idx);
        }
        from = idx + FENCE.len();
    }
    None
}

/// Drops an untagged (or non-structured) fence opener left at the end of the
/// thought when the payload was found by its first bracket.
fn strip_trailing_fence(thought: &str) -> &str {
    let trimmed = thought.trim_end();
    match trimmed.rfind(FENCE) {
        Some(idx)
            if !trimmed[idx + FENCE.len()..]
                .chars()
                .any(|c| c.is_whitespace()) =>
        {
            &trimmed[..idx]
        }
        _ => thought,
    }
}
