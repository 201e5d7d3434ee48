//! Text position utilities for byte offset and line:column conversions.
//!
//! ## Coordinate Conventions
//!
//! - Lines and columns are **1-indexed** (matching editor conventions)
//! - Byte offsets are **0-indexed**
//! - Columns count Unicode scalar values, not bytes
//!
//! [`byte_offset_to_position_str`] is fine for a handful of lookups. The
//! reporter converts every diagnostic of a file, so it builds a [`LineIndex`]
//! once and answers each lookup with a binary search.

/// Convert a byte offset to 1-indexed line and column (Unicode-aware).
///
/// Offsets past the end of `content` map to the end position.
pub fn byte_offset_to_position_str(content: &str, offset: usize) -> (u32, u32) {
    let mut line = 1u32;
    let mut col = 1u32;
    let mut current_offset = 0usize;

    for ch in content.chars() {
        if current_offset >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
        current_offset += ch.len_utf8();
    }

    (line, col)
}

/// Precomputed line starts for repeated offset lookups.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    /// Index the line starts of `content`.
    pub fn new(content: &str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(content.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        LineIndex { line_starts }
    }

    /// 1-indexed `(line, col)` of `offset` within `content`.
    ///
    /// `content` must be the text the index was built from.
    pub fn position(&self, content: &str, offset: usize) -> (u32, u32) {
        let offset = offset.min(content.len());
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let line_start = self.line_starts[line];
        let col = content
            .get(line_start..offset)
            .map(|prefix| prefix.chars().count())
            .unwrap_or(offset - line_start);
        (line as u32 + 1, col as u32 + 1)
    }

    /// Number of lines in the indexed text.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_counts_chars_not_bytes() {
        let content = "héllo\nwörld";
        // 'w' follows the newline; "wö" is 3 bytes, 'r' at col 3
        let offset = content.find('r').unwrap();
        assert_eq!(byte_offset_to_position_str(content, offset), (2, 3));
    }

    #[test]
    fn line_index_matches_linear_scan() {
        let content = "a\nbc\n\ndéf\n";
        let index = LineIndex::new(content);
        for offset in content.char_indices().map(|(i, _)| i) {
            assert_eq!(
                index.position(content, offset),
                byte_offset_to_position_str(content, offset),
                "offset {offset}"
            );
        }
        assert_eq!(index.line_count(), 5);
    }
}
