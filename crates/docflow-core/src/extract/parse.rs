//! Speculative parsing of a payload fragment that may still be growing.
//!
//! Tiers, in order:
//! 1. strict parse of the whole fragment (a trailing fence marker removed);
//! 2. strict parse of the outermost balanced object/array;
//! 3. field-level recovery of the fields of interest from unclosed text.
//!
//! Parsing never fails past this module: an unusable fragment is a
//! `ParsedArtifact` with `value: None`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::scan;

/// Result of parsing one fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedArtifact<T> {
    pub value: Option<T>,
    /// False only when the fragment strict-parsed and is textually complete.
    pub is_partial: bool,
}

impl<T> ParsedArtifact<T> {
    /// Nothing recoverable yet.
    pub fn miss() -> Self {
        Self {
            value: None,
            is_partial: true,
        }
    }

    pub fn is_miss(&self) -> bool {
        self.value.is_none()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> Option<U>) -> ParsedArtifact<U> {
        ParsedArtifact {
            value: self.value.and_then(f),
            is_partial: self.is_partial,
        }
    }
}

/// Typed artifacts that can be recovered from a streamed payload.
///
/// Implementors should give every field a serde default so that a partially
/// recovered object still deserializes.
pub trait ArtifactSchema: DeserializeOwned {
    /// Top-level fields recovered field-by-field while the object is unclosed.
    const STREAMED_FIELDS: &'static [&'static str];
}

/// Parses `fragment` into `T`. A recovered value that does not deserialize into
/// `T` is treated as a miss.
pub fn parse<T: ArtifactSchema>(fragment: &str) -> ParsedArtifact<T> {
    parse_value(fragment, T::STREAMED_FIELDS).map(|value| serde_json::from_value(value).ok())
}

/// Untyped parse. `fields` are the names recovered by the field-level tier.
pub fn parse_value<S: AsRef<str>>(fragment: &str, fields: &[S]) -> ParsedArtifact<Value> {
    let trimmed = fragment.trim();
    if trimmed.is_empty() {
        return ParsedArtifact::miss();
    }

    let (candidate, fence) = strip_trailing_fence(trimmed);
    if let Ok(value) = serde_json::from_str::<Value>(candidate)
        && is_structured(&value)
    {
        return ParsedArtifact {
            value: Some(value),
            is_partial: fence == TrailingFence::Partial,
        };
    }

    if let Some(value) = outermost_balanced(candidate) {
        return ParsedArtifact {
            value: Some(value),
            is_partial: true,
        };
    }

    let recovered = recover_fields(candidate, fields);
    if recovered.is_empty() {
        return ParsedArtifact::miss();
    }
    ParsedArtifact {
        value: Some(Value::Object(recovered)),
        is_partial: true,
    }
}

#[derive(Debug, PartialEq, Eq)]
enum TrailingFence {
    None,
    Complete,
    Partial,
}

/// Removes a trailing run of one to three backticks.
fn strip_trailing_fence(fragment: &str) -> (&str, TrailingFence) {
    let without = fragment.trim_end_matches('`');
    let ticks = fragment.len() - without.len();
    match ticks {
        0 => (fragment, TrailingFence::None),
        1 | 2 => (without.trim_end(), TrailingFence::Partial),
        _ => (without.trim_end(), TrailingFence::Complete),
    }
}

fn is_structured(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

fn outermost_balanced(fragment: &str) -> Option<Value> {
    let start = scan::find_unescaped(fragment, &['{', '['])?;
    let end = scan::balanced_end(fragment, start)?;
    serde_json::from_str::<Value>(&fragment[start..end])
        .ok()
        .filter(is_structured)
}

fn recover_fields<S: AsRef<str>>(fragment: &str, fields: &[S]) -> Map<String, Value> {
    let mut recovered = Map::new();
    for field in fields {
        let field = field.as_ref();
        if let Some(found) = scan::string_field(fragment, field) {
            recovered.insert(field.to_string(), Value::String(found.value));
        } else if let Some(value) = scan::complete_field_value(fragment, field) {
            recovered.insert(field.to_string(), value);
        }
    }
    recovered
}

/// Merges a newer partial value over the previous one so that populated
/// fields never revert to empty.
///
/// Objects merge key by key (recursively). A key the newer value lacks, or
/// holds empty (`null`, `""`, `[]`, `{}`), keeps its previous value.
pub fn merge_monotonic(previous: Option<&Value>, next: Value) -> Value {
    let Some(previous) = previous else {
        return next;
    };
    match (previous, next) {
        (Value::Object(prev), Value::Object(mut next)) => {
            for (key, prev_value) in prev {
                let merged = match next.remove(key) {
                    Some(next_value) => merge_monotonic(Some(prev_value), next_value),
                    None => prev_value.clone(),
                };
                next.insert(key.clone(), merged);
            }
            Value::Object(next)
        }
        (prev, next) if is_empty(&next) && !is_empty(prev) => prev.clone(),
        (_, next) => next,
    }
}

/// Whether `value` holds anything beyond empty strings, arrays and objects.
pub fn has_content(value: &Value) -> bool {
    match value {
        Value::Object(fields) => fields.values().any(has_content),
        Value::Array(items) => !items.is_empty(),
        other => !is_empty(other),
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}
