//! Recovery of document fragments (markup) that are not JSON values.

use super::scan;

/// Extracts markup for `field`, trying in order: the string value of
/// `"field":` (escapes reversed, possibly unterminated); a fenced block tagged
/// `language`; a bare document spanning its root element's opening and closing
/// tags. `None` means "not available yet".
pub fn extract_raw(fragment: &str, field: &str, language: &str) -> Option<String> {
    if let Some(found) = scan::string_field(fragment, field)
        && !found.value.trim().is_empty()
    {
        return Some(found.value);
    }
    if let Some(block) = fenced_block(fragment, language) {
        return Some(block);
    }
    bare_document(fragment)
}

fn fenced_block(text: &str, language: &str) -> Option<String> {
    let mut from = 0_usize;
    while let Some(rel) = text[from..].find("```") {
        let tag_start = from + rel + 3;
        let line_end = text[tag_start..]
            .find('\n')
            .map(|nl| tag_start + nl)?;
        let tag = text[tag_start..line_end].trim();
        if tag.eq_ignore_ascii_case(language) {
            let body = &text[line_end + 1..];
            let body = match body.find("\n```") {
                Some(end) => &body[..end],
                None => body.trim_end_matches('`'),
            };
            let body = body.trim();
            return (!body.is_empty()).then(|| body.to_string());
        }
        from = line_end;
    }
    None
}

fn bare_document(text: &str) -> Option<String> {
    let lower = text.to_ascii_lowercase();
    let (start, root) = match lower.find("<!doctype") {
        Some(start) => {
            let name = lower[start + "<!doctype".len()..]
                .split(|c: char| c.is_whitespace() || c == '>')
                .find(|s| !s.is_empty())?
                .to_string();
            (start, name)
        }
        None => first_element(&lower)?,
    };
    let closing = format!("</{root}>");
    let end = lower[start..].rfind(&closing)? + start + closing.len();
    Some(text[start..end].to_string())
}

/// Offset and name of the first opening tag.
fn first_element(lower: &str) -> Option<(usize, String)> {
    let mut from = 0_usize;
    while let Some(rel) = lower[from..].find('<') {
        let start = from + rel;
        let name: String = lower[start + 1..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect();
        if name.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
            return Some((start, name));
        }
        from = start + 1;
    }
    None
}
