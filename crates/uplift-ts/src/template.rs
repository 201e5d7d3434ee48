//! Component template scanner.
//!
//! Templates are HTML with Angular binding syntax. The scanner only needs
//! what the migration units rename or inspect: element tags (open and close),
//! attribute names with their binding form, and attribute values. Text
//! content, comments and interpolations are skipped.
//!
//! All spans are relative to the scanned text; callers add the offset of an
//! inline template within its host file.

use uplift_core::patch::Span;

/// How an attribute binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingForm {
    /// `x="..."`
    Plain,
    /// `[x]="..."` or `bind-x="..."`
    Property,
    /// `(x)="..."` or `on-x="..."`
    Event,
    /// `[(x)]="..."` or `bindon-x="..."`
    TwoWay,
    /// `*x="..."`
    Structural,
    /// `#x` or `ref-x`
    Reference,
    /// `@x`, `let-x` and other forms nothing renames
    Other,
}

/// One attribute of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateAttribute {
    /// The attribute as written, e.g. `[(ngModel)]`.
    pub raw_name: String,
    /// Binding target without decoration, e.g. `ngModel`.
    pub name: String,
    /// Span of `name` within the raw attribute.
    pub name_span: Span,
    /// Span from the first character of the name to the end of the value.
    pub full_span: Span,
    pub form: BindingForm,
    /// Value without quotes.
    pub value: Option<String>,
    /// Span of the value without quotes.
    pub value_span: Option<Span>,
}

/// One element with its attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateElement {
    /// Tag name as written.
    pub tag: String,
    pub tag_span: Span,
    /// Span of the tag name in the matching close tag.
    pub close_tag_span: Option<Span>,
    pub attributes: Vec<TemplateAttribute>,
}

impl TemplateElement {
    /// Attribute names as matched by selectors (binding decoration removed).
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|a| a.name.as_str())
    }

    pub fn attribute(&self, name: &str) -> Option<&TemplateAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

fn is_tag_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'-' | b'_' | b':' | b'.') || c >= 0x80
}

fn is_space(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c')
}

/// Split a raw attribute name into binding form and target name span.
fn classify(raw: &str) -> (BindingForm, usize, usize) {
    let len = raw.len();
    if raw.starts_with("[(") && raw.ends_with(")]") && len > 4 {
        return (BindingForm::TwoWay, 2, len - 2);
    }
    if raw.starts_with('[') && raw.ends_with(']') && len > 2 {
        return (BindingForm::Property, 1, len - 1);
    }
    if raw.starts_with('(') && raw.ends_with(')') && len > 2 {
        return (BindingForm::Event, 1, len - 1);
    }
    for (prefix, form) in [
        ("bindon-", BindingForm::TwoWay),
        ("bind-", BindingForm::Property),
        ("on-", BindingForm::Event),
        ("ref-", BindingForm::Reference),
        ("let-", BindingForm::Other),
    ] {
        if raw.len() > prefix.len() && raw.starts_with(prefix) {
            return (form, prefix.len(), len);
        }
    }
    match raw.as_bytes().first() {
        Some(b'*') => (BindingForm::Structural, 1, len),
        Some(b'#') => (BindingForm::Reference, 1, len),
        Some(b'@') => (BindingForm::Other, 1, len),
        _ => (BindingForm::Plain, 0, len),
    }
}

struct Scanner<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn starts_with(&self, s: &str) -> bool {
        self.bytes[self.pos..].starts_with(s.as_bytes())
    }

    fn skip_past(&mut self, s: &str) {
        match self.text[self.pos..].find(s) {
            Some(i) => self.pos += i + s.len(),
            None => self.pos = self.bytes.len(),
        }
    }

    fn skip_space(&mut self) {
        while self.peek().is_some_and(is_space) {
            self.pos += 1;
        }
    }

    fn read_tag_name(&mut self) -> Span {
        let start = self.pos;
        while self.peek().is_some_and(is_tag_char) {
            self.pos += 1;
        }
        Span::new(start, self.pos)
    }

    fn read_attribute_name(&mut self) -> Span {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_space(c) || c == b'=' || c == b'>' || c == b'"' || c == b'\'' {
                break;
            }
            if c == b'/' && self.bytes.get(self.pos + 1) == Some(&b'>') {
                break;
            }
            self.pos += 1;
        }
        // Names only contain ASCII punctuation stops, so this is a char boundary.
        Span::new(start, self.pos)
    }

    /// Parse attributes up to the end of the start tag.
    /// Returns the attributes and whether the tag was self-closing.
    fn read_attributes(&mut self) -> (Vec<TemplateAttribute>, bool) {
        let mut attributes = Vec::new();
        loop {
            self.skip_space();
            match self.peek() {
                None => return (attributes, false),
                Some(b'>') => {
                    self.pos += 1;
                    return (attributes, false);
                }
                Some(b'/') if self.bytes.get(self.pos + 1) == Some(&b'>') => {
                    self.pos += 2;
                    return (attributes, true);
                }
                Some(b'/') | Some(b'"') | Some(b'\'') => {
                    self.pos += 1;
                    continue;
                }
                _ => {}
            }

            let name_span = self.read_attribute_name();
            if name_span.is_empty() {
                self.pos += 1;
                continue;
            }
            let raw = &self.text[name_span.range()];
            let (form, from, to) = classify(raw);

            let mut full_end = name_span.end;
            let mut value = None;
            let mut value_span = None;
            let after_name = self.pos;
            self.skip_space();
            if self.peek() == Some(b'=') {
                self.pos += 1;
                self.skip_space();
                match self.peek() {
                    Some(q @ (b'"' | b'\'')) => {
                        let start = self.pos + 1;
                        let end = self.text[start..]
                            .find(q as char)
                            .map(|i| start + i)
                            .unwrap_or(self.bytes.len());
                        value_span = Some(Span::new(start, end));
                        self.pos = (end + 1).min(self.bytes.len());
                    }
                    _ => {
                        let start = self.pos;
                        while self.peek().is_some_and(|c| !is_space(c) && c != b'>') {
                            self.pos += 1;
                        }
                        value_span = Some(Span::new(start, self.pos));
                    }
                }
                full_end = self.pos;
                value = value_span.map(|s| self.text[s.range()].to_string());
            } else {
                self.pos = after_name;
            }

            attributes.push(TemplateAttribute {
                raw_name: raw.to_string(),
                name: raw[from..to].to_string(),
                name_span: Span::new(name_span.start + from, name_span.start + to),
                full_span: Span::new(name_span.start, full_end),
                form,
                value,
                value_span,
            });
        }
    }

    fn run(mut self) -> Vec<TemplateElement> {
        let mut elements: Vec<TemplateElement> = Vec::new();
        // Indices into `elements` of open, unclosed tags.
        let mut open: Vec<usize> = Vec::new();

        while self.pos < self.bytes.len() {
            if self.starts_with("<!--") {
                self.skip_past("-->");
            } else if self.starts_with("{{") {
                self.skip_past("}}");
            } else if self.starts_with("</") {
                self.pos += 2;
                let span = self.read_tag_name();
                let tag = &self.text[span.range()];
                if let Some(depth) = open
                    .iter()
                    .rposition(|&i| elements[i].tag.eq_ignore_ascii_case(tag))
                {
                    let index = open[depth];
                    elements[index].close_tag_span = Some(span);
                    open.truncate(depth);
                }
                self.skip_past(">");
            } else if self.starts_with("<!") || self.starts_with("<?") {
                self.skip_past(">");
            } else if self.peek() == Some(b'<')
                && self
                    .bytes
                    .get(self.pos + 1)
                    .is_some_and(|c| c.is_ascii_alphabetic())
            {
                self.pos += 1;
                let tag_span = self.read_tag_name();
                let tag = self.text[tag_span.range()].to_string();
                let (attributes, self_closing) = self.read_attributes();
                let lower = tag.to_ascii_lowercase();
                let is_raw_text = lower == "script" || lower == "style";
                elements.push(TemplateElement {
                    tag,
                    tag_span,
                    close_tag_span: None,
                    attributes,
                });
                if is_raw_text && !self_closing {
                    let close = format!("</{}", lower);
                    match self.text[self.pos..].to_ascii_lowercase().find(&close) {
                        Some(i) => self.pos += i,
                        None => self.pos = self.bytes.len(),
                    }
                } else if !self_closing && !VOID_ELEMENTS.contains(&lower.as_str()) {
                    open.push(elements.len() - 1);
                }
            } else {
                self.pos += 1;
                while !self.text.is_char_boundary(self.pos) {
                    self.pos += 1;
                }
            }
        }
        elements
    }
}

/// Scan a template into its elements, in document order of start tags.
pub fn scan(text: &str) -> Vec<TemplateElement> {
    Scanner {
        text,
        bytes: text.as_bytes(),
        pos: 0,
    }
    .run()
}

/// Class names listed in a `class` attribute value, with spans relative to
/// the value start.
pub fn class_tokens(value: &str) -> Vec<(String, Span)> {
    let mut tokens = Vec::new();
    let mut start = None;
    for (i, c) in value.char_indices().chain(std::iter::once((value.len(), ' '))) {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                tokens.push((value[s..i].to_string(), Span::new(s, i)));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    tokens
}
