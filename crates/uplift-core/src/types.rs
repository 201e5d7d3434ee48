//! Common types shared between error, diagnostics and output modules.

use serde::{Deserialize, Serialize};

use crate::patch::Span;
use crate::text::LineIndex;

/// Location in a source file.
///
/// - `file`: Workspace-relative path
/// - `line`: 1-indexed line number
/// - `col`: 1-indexed column, counted in characters
/// - `byte_start` / `byte_end`: byte span in the original content (optional)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Location {
    /// File path (workspace-relative).
    pub file: String,
    /// Line number (1-indexed).
    pub line: u32,
    /// Column number (1-indexed).
    pub col: u32,
    /// Byte offset from file start (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_start: Option<usize>,
    /// Byte offset end, exclusive (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_end: Option<usize>,
}

impl Location {
    /// Locate `span` in `content` using a prebuilt line index.
    pub fn from_span(
        file: impl Into<String>,
        content: &str,
        index: &LineIndex,
        span: Span,
    ) -> Self {
        let (line, col) = index.position(content, span.start);
        Location {
            file: file.into(),
            line,
            col,
            byte_start: Some(span.start),
            byte_end: Some(span.end),
        }
    }

    /// Comparison key for deterministic sorting: (file, byte offset, line, col).
    fn sort_key(&self) -> (&str, usize, u32, u32) {
        (
            &self.file,
            self.byte_start.unwrap_or(0),
            self.line,
            self.col,
        )
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}

impl PartialOrd for Location {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Location {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_serializes_without_absent_offsets() {
        let loc = Location::new("src/app.ts", 4, 2);
        let json = serde_json::to_string(&loc).unwrap();
        assert!(!json.contains("byte_start"));
        assert!(json.contains("\"line\":4"));
    }

    #[test]
    fn parse_handles_colons_in_path() {
        let loc = Location::parse("C:/work/app.ts:10:5").unwrap();
        assert_eq!(loc.file, "C:/work/app.ts");
        assert_eq!((loc.line, loc.col), (10, 5));
        assert_eq!(loc.to_string(), "C:/work/app.ts:10:5");
    }

    #[test]
    fn from_span_records_bytes_and_position() {
        let content = "a\nbb cc";
        let index = LineIndex::new(content);
        let loc = Location::from_span("x.html", content, &index, Span::new(5, 7));
        assert_eq!((loc.line, loc.col), (2, 4));
        assert_eq!(loc.byte_start, Some(5));
        assert_eq!(loc.byte_end, Some(7));
    }
}
