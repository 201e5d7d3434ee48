//! Splitting selector lists into renameable components.
//!
//! A selector list such as `a, b.old-name > [cdkPortalHost]` is broken on
//! commas and combinators into simple components (element names, class names,
//! attribute names). Each component carries the byte span of its name within
//! the scanned text, so a rename replaces only that name and leaves the rest
//! of the list untouched.
//!
//! Text that cannot be a selector (stray punctuation, quotes, braces) yields
//! no components at all.

use uplift_core::patch::Span;
use uplift_core::rules::RuleCategory;

/// What a selector component names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    /// `mat-form-field`
    Element,
    /// `.mat-form-field`
    Class,
    /// `[cdkPortalOutlet]`
    Attribute,
}

impl ComponentKind {
    /// Rule category a component of this kind is looked up in.
    pub fn category(&self) -> RuleCategory {
        match self {
            ComponentKind::Element => RuleCategory::ElementSelector,
            ComponentKind::Class => RuleCategory::CssSelector,
            ComponentKind::Attribute => RuleCategory::AttributeSelector,
        }
    }
}

/// One named component of a selector, with the span of its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorComponent {
    pub kind: ComponentKind,
    pub name: String,
    pub span: Span,
}

/// Pseudo-classes whose argument is itself a selector list.
const SELECTOR_PSEUDOS: &[&str] = &[
    "not",
    "is",
    "where",
    "has",
    "matches",
    "host",
    "host-context",
    "-webkit-any",
    "-moz-any",
];

fn is_name_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'-' || c == b'_' || c >= 0x80
}

fn is_name_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'-' || c == b'_' || c >= 0x80
}

struct Scanner<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    out: Vec<SelectorComponent>,
}

impl<'a> Scanner<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn read_name(&mut self) -> Span {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_name_char(c) {
                self.pos += 1;
            } else if c == b'\\' && self.pos + 1 < self.bytes.len() {
                self.pos += 2;
            } else {
                break;
            }
        }
        // Never split a multi-byte character.
        while !self.text.is_char_boundary(self.pos) {
            self.pos += 1;
        }
        Span::new(start, self.pos)
    }

    fn push(&mut self, kind: ComponentKind, span: Span) {
        if span.is_empty() {
            return;
        }
        let name = &self.text[span.range()];
        if !name.bytes().next().is_some_and(is_name_start) {
            return;
        }
        self.out.push(SelectorComponent {
            kind,
            name: name.to_string(),
            span,
        });
    }

    /// Skip a balanced `(...)` or `[...]` group, honouring quotes.
    fn skip_group(&mut self, open: u8, close: u8) -> bool {
        let mut depth = 0usize;
        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                b'"' | b'\'' => {
                    if !self.skip_quoted(c) {
                        return false;
                    }
                }
                c if c == open => depth += 1,
                c if c == close => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return true;
                    }
                }
                _ => {}
            }
        }
        false
    }

    fn skip_quoted(&mut self, quote: u8) -> bool {
        while let Some(c) = self.peek() {
            self.pos += 1;
            if c == b'\\' {
                self.pos += 1;
            } else if c == quote {
                return true;
            }
        }
        false
    }

    /// Scan until `end` (exclusive). Returns false if the text is not a selector.
    fn scan(&mut self, end: usize) -> bool {
        while self.pos < end {
            let Some(c) = self.peek() else {
                break;
            };
            match c {
                b' ' | b'\t' | b'\n' | b'\r' | b',' | b'>' | b'+' | b'~' | b'*' | b'&' => {
                    self.pos += 1;
                }
                b'.' => {
                    self.pos += 1;
                    let span = self.read_name();
                    if span.is_empty() {
                        return false;
                    }
                    self.push(ComponentKind::Class, span);
                }
                b'#' if self.peek_at(1) == Some(b'{') => {
                    // SCSS interpolation
                    if !self.skip_group(b'{', b'}') {
                        return false;
                    }
                }
                b'#' | b'%' => {
                    self.pos += 1;
                    self.read_name();
                }
                b'[' => {
                    self.pos += 1;
                    while matches!(self.peek(), Some(b' ' | b'\t')) {
                        self.pos += 1;
                    }
                    let span = self.read_name();
                    self.push(ComponentKind::Attribute, span);
                    // Rewind to the bracket and skip the whole group.
                    let mut depth_scan = Scanner {
                        text: self.text,
                        bytes: self.bytes,
                        pos: span.start,
                        out: Vec::new(),
                    };
                    while let Some(c) = depth_scan.peek() {
                        if c == b']' {
                            break;
                        }
                        depth_scan.pos += 1;
                        if c == b'"' || c == b'\'' {
                            if !depth_scan.skip_quoted(c) {
                                return false;
                            }
                        }
                    }
                    if depth_scan.peek() != Some(b']') {
                        return false;
                    }
                    self.pos = depth_scan.pos + 1;
                }
                b':' => {
                    self.pos += 1;
                    if self.peek() == Some(b':') {
                        self.pos += 1;
                    }
                    let name_span = self.read_name();
                    let name = self.text[name_span.range()].to_ascii_lowercase();
                    if self.peek() == Some(b'(') {
                        let open = self.pos;
                        if !self.skip_group(b'(', b')') {
                            return false;
                        }
                        if SELECTOR_PSEUDOS.contains(&name.as_str()) {
                            let close = self.pos - 1;
                            let resume = self.pos;
                            self.pos = open + 1;
                            if !self.scan(close) {
                                return false;
                            }
                            self.pos = resume;
                        }
                    }
                }
                b'\\' => {
                    let span = self.read_name();
                    self.push(ComponentKind::Element, span);
                }
                c if is_name_char(c) => {
                    let span = self.read_name();
                    self.push(ComponentKind::Element, span);
                }
                _ => return false,
            }
        }
        true
    }
}

/// Split a selector list into components.
///
/// Spans are relative to `text`. Returns an empty list when `text` is not a
/// selector list.
pub fn components(text: &str) -> Vec<SelectorComponent> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let mut scanner = Scanner {
        text,
        bytes: text.as_bytes(),
        pos: 0,
        out: Vec::new(),
    };
    if scanner.scan(text.len()) {
        scanner.out
    } else {
        Vec::new()
    }
}
