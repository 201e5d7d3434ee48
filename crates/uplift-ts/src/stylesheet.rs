//! CSS/SCSS scanner producing rule preludes.
//!
//! Only selectors are renamed in stylesheets, so the scanner reports the span
//! of every rule prelude (the text before a `{` that opens a style rule) and
//! skips declarations, comments, strings and at-rule headers.

use uplift_core::patch::Span;

use crate::selector::{self, SelectorComponent};

/// Spans of the selector preludes of all style rules, in document order.
///
/// `scss` enables `//` line comments and `#{...}` interpolation.
pub fn rule_preludes(text: &str, scss: bool) -> Vec<Span> {
    let bytes = text.as_bytes();
    let mut preludes = Vec::new();
    let mut start = 0usize;
    let mut pos = 0usize;

    while pos < bytes.len() {
        match bytes[pos] {
            b'/' if bytes.get(pos + 1) == Some(&b'*') => {
                pos = text[pos + 2..]
                    .find("*/")
                    .map(|i| pos + 2 + i + 2)
                    .unwrap_or(bytes.len());
                if text[start..pos].trim().starts_with("/*") {
                    start = pos;
                }
            }
            b'/' if scss && bytes.get(pos + 1) == Some(&b'/') => {
                pos = text[pos..]
                    .find('\n')
                    .map(|i| pos + i + 1)
                    .unwrap_or(bytes.len());
                if text[start..pos].trim().starts_with("//") {
                    start = pos;
                }
            }
            q @ (b'"' | b'\'') => {
                pos += 1;
                while pos < bytes.len() && bytes[pos] != q {
                    if bytes[pos] == b'\\' {
                        pos += 1;
                    }
                    pos += 1;
                }
                pos += 1;
            }
            b'#' if scss && bytes.get(pos + 1) == Some(&b'{') => {
                pos = text[pos..]
                    .find('}')
                    .map(|i| pos + i + 1)
                    .unwrap_or(bytes.len());
            }
            b'{' => {
                let raw = &text[start..pos];
                let trimmed = raw.trim();
                if !trimmed.is_empty() && !trimmed.starts_with('@') {
                    let lead = raw.len() - raw.trim_start().len();
                    let begin = start + lead;
                    preludes.push(Span::new(begin, begin + trimmed.len()));
                }
                pos += 1;
                start = pos;
            }
            b';' | b'}' => {
                pos += 1;
                start = pos;
            }
            b'u' | b'U' if is_url_open(text, pos) => {
                pos = skip_url(bytes, pos + 4);
            }
            _ => pos += 1,
        }
    }
    preludes
}

/// `url(` starting at `pos`, not preceded by an identifier character.
fn is_url_open(text: &str, pos: usize) -> bool {
    let opens = text
        .get(pos..pos + 4)
        .is_some_and(|head| head.eq_ignore_ascii_case("url("));
    let boundary = pos == 0 || {
        let prev = text.as_bytes()[pos - 1];
        !(prev.is_ascii_alphanumeric() || prev == b'-' || prev == b'_')
    };
    opens && boundary
}

/// Position just past the `)` closing a `url(` whose contents begin at `pos`.
/// Unquoted contents may hold `//` and `;`, quoted ones may also hold `)`.
fn skip_url(bytes: &[u8], mut pos: usize) -> usize {
    let mut quote = None;
    while pos < bytes.len() {
        match (quote, bytes[pos]) {
            (Some(_), b'\\') => pos += 1,
            (Some(q), b) if b == q => quote = None,
            (None, q @ (b'"' | b'\'')) => quote = Some(q),
            (None, b')') => return pos + 1,
            _ => {}
        }
        pos += 1;
    }
    bytes.len()
}

/// Selector components of every rule prelude, with spans relative to `text`.
pub fn selector_components(text: &str, scss: bool) -> Vec<SelectorComponent> {
    rule_preludes(text, scss)
        .into_iter()
        .flat_map(|prelude| {
            selector::components(&text[prelude.range()])
                .into_iter()
                .map(move |mut c| {
                    c.span = c.span.offset_by(prelude.start);
                    c
                })
        })
        .collect()
}
