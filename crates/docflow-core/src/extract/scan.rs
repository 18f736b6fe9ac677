//! Low-level scanners shared by the extractors. All offsets are byte offsets
//! into the scanned `&str` and always fall on char boundaries.

use std::str::Chars;

/// Offset of the first char in `targets` not escaped by an odd run of
/// backslashes.
pub(crate) fn find_unescaped(text: &str, targets: &[char]) -> Option<usize> {
    let mut backslashes = 0_usize;
    for (idx, ch) in text.char_indices() {
        if ch == '\\' {
            backslashes += 1;
            continue;
        }
        if targets.contains(&ch) && backslashes % 2 == 0 {
            return Some(idx);
        }
        backslashes = 0;
    }
    None
}

/// Given `text[start..]` beginning with `{` or `[`, returns the offset just past
/// the bracket that closes it. Brackets inside string literals are ignored.
/// Bracket kinds are not cross-checked; the strict parse that follows does that.
pub(crate) fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0_usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text.get(start..)?.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                if depth == 0 {
                    return None;
                }
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// A string value captured after `"field":`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FieldString {
    pub value: String,
    /// Whether the closing quote was seen.
    pub closed: bool,
}

/// Offsets of the values of every `"field"` key that belongs directly to a
/// top-level object. Keys of nested objects are ignored, as are matches whose
/// value has not started yet. Each offset points at the first non-whitespace
/// char after the colon. Text between top-level objects is skipped.
fn field_value_starts(text: &str, field: &str) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut depth = 0_usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut key_start = None;
    for (idx, ch) in text.char_indices() {
        if depth == 0 {
            if ch == '{' {
                depth = 1;
            }
            continue;
        }
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
                if let Some(start) = key_start.take()
                    && &text[start..idx] == field
                    && let Some(value) = value_after_colon(text, idx + 1)
                {
                    starts.push(value);
                }
            }
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                if depth == 1 {
                    key_start = Some(idx + 1);
                }
            }
            '{' | '[' => depth += 1,
            '}' | ']' => depth -= 1,
            _ => {}
        }
    }
    starts
}

fn value_after_colon(text: &str, from: usize) -> Option<usize> {
    let value = text[from..].trim_start().strip_prefix(':')?.trim_start();
    (!value.is_empty()).then(|| text.len() - value.len())
}

/// First `"field": "..."` string in `text`, captured up to the next unescaped
/// quote or the end of input, with escapes reversed.
pub(crate) fn string_field(text: &str, field: &str) -> Option<FieldString> {
    field_value_starts(text, field)
        .into_iter()
        .find(|start| text[*start..].starts_with('"'))
        .map(|start| read_string(&text[start + 1..]))
}

/// First `"field": <value>` whose value is a complete nested object/array or a
/// terminated literal (`true`, `false`, `null`, number).
pub(crate) fn complete_field_value(text: &str, field: &str) -> Option<serde_json::Value> {
    field_value_starts(text, field).into_iter().find_map(|start| {
        let rest = &text[start..];
        if rest.starts_with('{') || rest.starts_with('[') {
            let end = balanced_end(text, start)?;
            return serde_json::from_str(&text[start..end]).ok();
        }
        let end = rest.find(|c: char| c == ',' || c == '}' || c == ']' || c.is_whitespace())?;
        let literal = &rest[..end];
        match serde_json::from_str::<serde_json::Value>(literal) {
            Ok(value) if !value.is_string() => Some(value),
            _ => None,
        }
    })
}

fn read_string(rest: &str) -> FieldString {
    let mut escaped = false;
    for (idx, ch) in rest.char_indices() {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == '"' {
            return FieldString {
                value: unescape(&rest[..idx]),
                closed: true,
            };
        }
    }
    FieldString {
        value: unescape(rest),
        closed: false,
    }
}

/// Reverses JSON string escapes. A truncated escape at the end of input (a lone
/// backslash or a short `\u` sequence) is dropped rather than emitted.
pub(crate) fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let Some(code) = read_hex4(&mut chars) else {
                    break;
                };
                out.push(decode_code_unit(code, &mut chars));
            }
            Some(other) => out.push(other),
            None => break,
        }
    }
    out
}

fn read_hex4(chars: &mut Chars<'_>) -> Option<u32> {
    let mut code = 0_u32;
    for _ in 0..4 {
        let digit = chars.next()?.to_digit(16)?;
        code = code * 16 + digit;
    }
    Some(code)
}

fn decode_code_unit(code: u32, chars: &mut Chars<'_>) -> char {
    if (0xD800..0xDC00).contains(&code) {
        let mut look = chars.clone();
        if look.next() == Some('\\')
            && look.next() == Some('u')
            && let Some(low) = read_hex4(&mut look)
            && (0xDC00..0xE000).contains(&low)
        {
            *chars = look;
            let combined = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
            return char::from_u32(combined).unwrap_or('\u{FFFD}');
        }
    }
    char::from_u32(code).unwrap_or('\u{FFFD}')
}
