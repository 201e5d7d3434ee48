//! Patch IR: source edits, per-file commit, and patch materialization.
//!
//! This module implements the edit infrastructure for uplift:
//! - Byte spans into the *original* file content
//! - Per-file overlap resolution (narrower edit wins)
//! - Single-pass commit in descending offset order
//! - Patch materialization (output edits, unified diff)
//!
//! Edits are discovered in traversal order by migration units and are never
//! applied as they are found. A [`FilePatch`] collects every edit for one file
//! and [`FilePatch::commit`] applies the surviving ones against the untouched
//! buffer, so the offsets recorded during traversal stay valid.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use crate::text::byte_offset_to_position_str;

/// Hash type for content verification (SHA-256, stored as hex string for JSON compatibility).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Compute SHA-256 hash of the given bytes, returning hex-encoded string.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let result = hasher.finalize();
        ContentHash(hex::encode(result))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Core Types
// ============================================================================

/// Stable file identifier within a source tree.
///
/// Assigned in path order when the tree is collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct FileId(pub u32);

impl FileId {
    /// Create a new file ID.
    pub fn new(id: u32) -> Self {
        FileId(id)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file_{}", self.0)
    }
}

/// Byte offsets into file content.
///
/// Spans are half-open intervals: `[start, end)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
}

impl Span {
    /// Create a new span.
    ///
    /// # Panics
    /// Panics if `start > end`.
    pub fn new(start: usize, end: usize) -> Self {
        assert!(
            start <= end,
            "Span start ({}) must be <= end ({})",
            start,
            end
        );
        Span { start, end }
    }

    /// Empty span at `offset`, used for insertions.
    pub fn empty(offset: usize) -> Self {
        Span {
            start: offset,
            end: offset,
        }
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Check if span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Check if this span overlaps with another.
    ///
    /// Two spans overlap if they share any byte positions.
    /// Adjacent spans (one ends where another starts) do NOT overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Check if this span contains another span entirely.
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Shift both ends by `base`; used to map a span inside an embedded
    /// template or stylesheet back onto its host file.
    pub fn offset_by(&self, base: usize) -> Span {
        Span {
            start: self.start + base,
            end: self.end + base,
        }
    }

    /// The span as a `Range<usize>` for slicing.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Span::new(range.start, range.end)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

// ============================================================================
// Edit Operations
// ============================================================================

/// The kind of edit operation, derived from span and replacement text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditKind {
    /// Insert text at `span.start`.
    Insert,
    /// Delete the bytes in `span`.
    Delete,
    /// Replace the bytes in `span` with new text.
    Replace,
}

/// Provenance for an edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditLabels {
    /// The migration unit that generated this edit.
    pub unit: Option<String>,
    /// Human-readable reason for the edit.
    pub reason: Option<String>,
}

/// A single text change in one file, anchored to the original content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEdit {
    /// Discovery order within the file; breaks ties between equally specific edits.
    pub id: u32,
    /// The file this edit applies to.
    pub file_id: FileId,
    /// Byte range in the original content.
    pub span: Span,
    /// The replacement text (empty for deletions).
    pub text: String,
    /// Optional provenance labels.
    pub labels: EditLabels,
}

impl SourceEdit {
    /// Create a replacement edit.
    pub fn replace(id: u32, file_id: FileId, span: Span, text: impl Into<String>) -> Self {
        SourceEdit {
            id,
            file_id,
            span,
            text: text.into(),
            labels: EditLabels::default(),
        }
    }

    /// Create an insertion at `offset`.
    pub fn insert(id: u32, file_id: FileId, offset: usize, text: impl Into<String>) -> Self {
        SourceEdit::replace(id, file_id, Span::empty(offset), text)
    }

    /// Add labels to this edit.
    pub fn with_labels(mut self, labels: EditLabels) -> Self {
        self.labels = labels;
        self
    }

    /// Classify the edit.
    pub fn kind(&self) -> EditKind {
        if self.span.is_empty() {
            EditKind::Insert
        } else if self.text.is_empty() {
            EditKind::Delete
        } else {
            EditKind::Replace
        }
    }

    fn same_change(&self, other: &SourceEdit) -> bool {
        self.span == other.span && self.text == other.text
    }
}

// ============================================================================
// Conflicts
// ============================================================================

/// Why an edit was not committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Conflict {
    /// The edit overlaps a narrower (or earlier, equally wide) accepted edit.
    OverlappingSpans { dropped: Span, kept: Span },
    /// The span does not fit the file or splits a UTF-8 character.
    SpanOutOfBounds { span: Span, file_len: usize },
}

/// An edit rejected during commit, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedEdit {
    pub edit: SourceEdit,
    pub conflict: Conflict,
}

// ============================================================================
// PatchSet
// ============================================================================

/// Edits for many files, keyed by file.
///
/// Worker threads each fill their own `PatchSet`; [`PatchSet::merge`] joins
/// them once traversal is over.
#[derive(Debug, Clone, Default)]
pub struct PatchSet {
    edits: BTreeMap<FileId, Vec<SourceEdit>>,
}

impl PatchSet {
    /// Create an empty patch set.
    pub fn new() -> Self {
        PatchSet::default()
    }

    /// Add an edit.
    pub fn push(&mut self, edit: SourceEdit) {
        self.edits.entry(edit.file_id).or_default().push(edit);
    }

    /// Absorb another patch set.
    pub fn merge(&mut self, other: PatchSet) {
        for (file_id, edits) in other.edits {
            self.edits.entry(file_id).or_default().extend(edits);
        }
    }

    /// Take the edits of one file out of the set.
    pub fn take_file(&mut self, file_id: FileId) -> Vec<SourceEdit> {
        self.edits.remove(&file_id).unwrap_or_default()
    }
}

// ============================================================================
// Per-file Commit
// ============================================================================

/// Collects the edits for one file and commits them in one pass.
#[derive(Debug)]
pub struct FilePatch<'a> {
    file_id: FileId,
    original: &'a str,
    edits: Vec<SourceEdit>,
}

/// Outcome of [`FilePatch::commit`].
#[derive(Debug, Clone)]
pub struct CommitResult {
    /// New file content (equal to the original when nothing was accepted).
    pub text: String,
    /// Accepted edits, ordered by span start.
    pub accepted: Vec<SourceEdit>,
    /// Rejected edits with the conflict that removed them.
    pub dropped: Vec<DroppedEdit>,
}

impl<'a> FilePatch<'a> {
    /// Start a patch against the original content of `file_id`.
    pub fn new(file_id: FileId, original: &'a str) -> Self {
        FilePatch {
            file_id,
            original,
            edits: Vec::new(),
        }
    }

    /// Add an edit. Edits for other files are ignored.
    pub fn push(&mut self, edit: SourceEdit) {
        if edit.file_id == self.file_id {
            self.edits.push(edit);
        }
    }

    /// Add many edits.
    pub fn extend(&mut self, edits: impl IntoIterator<Item = SourceEdit>) {
        for edit in edits {
            self.push(edit);
        }
    }

    /// Resolve conflicts and apply the surviving edits to the original buffer.
    ///
    /// Conflict policy:
    /// - identical duplicates (same span and text) collapse into one edit;
    /// - of two overlapping edits the narrower one wins;
    /// - for equal widths the earlier-discovered edit (lower id) wins.
    ///
    /// Survivors are applied from the highest start offset to the lowest, so
    /// every recorded offset still refers to unmodified text when it is used.
    #[must_use]
    pub fn commit(self) -> CommitResult {
        let file_len = self.original.len();
        let mut candidates = self.edits;
        candidates.sort_by(|a, b| a.span.len().cmp(&b.span.len()).then(a.id.cmp(&b.id)));

        let mut accepted: Vec<SourceEdit> = Vec::new();
        let mut dropped = Vec::new();

        for edit in candidates {
            let span = edit.span;
            if span.end > file_len
                || !self.original.is_char_boundary(span.start)
                || !self.original.is_char_boundary(span.end)
            {
                dropped.push(DroppedEdit {
                    edit,
                    conflict: Conflict::SpanOutOfBounds { span, file_len },
                });
                continue;
            }
            if accepted.iter().any(|a| a.same_change(&edit)) {
                continue;
            }
            if let Some(kept) = accepted.iter().find(|a| a.span.overlaps(&span)) {
                dropped.push(DroppedEdit {
                    conflict: Conflict::OverlappingSpans {
                        dropped: span,
                        kept: kept.span,
                    },
                    edit,
                });
                continue;
            }
            accepted.push(edit);
        }

        // Descending start; for equal starts apply wider ranges first so an
        // insertion lands in front of a replacement at the same offset, and
        // later-discovered insertions first so discovery order is kept.
        accepted.sort_by(|a, b| {
            b.span
                .start
                .cmp(&a.span.start)
                .then(b.span.end.cmp(&a.span.end))
                .then(b.id.cmp(&a.id))
        });

        let mut text = self.original.to_string();
        for edit in &accepted {
            text.replace_range(edit.span.range(), &edit.text);
        }

        accepted.reverse();
        CommitResult {
            text,
            accepted,
            dropped,
        }
    }
}

// ============================================================================
// Patch Materialization
// ============================================================================

/// A single edit as it appears in output (for JSON serialization).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputEdit {
    /// Workspace-relative file path.
    pub file: String,
    /// Byte range being replaced.
    pub span: Span,
    /// Original text (for verification).
    pub old_text: String,
    /// Replacement text.
    pub new_text: String,
    /// 1-indexed line number (for display).
    pub line: u32,
    /// 1-indexed column (for display).
    pub col: u32,
    /// Unit that produced the edit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Materialized patch output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterializedPatch {
    /// Individual edits (ordered by file, then span.start).
    pub edits: Vec<OutputEdit>,
    /// Standard unified diff format.
    pub unified_diff: String,
}

impl MaterializedPatch {
    /// Append the accepted edits of one file.
    ///
    /// `original` is the content the edits were computed against.
    pub fn add_file(&mut self, path: &str, original: &str, accepted: &[SourceEdit]) {
        if accepted.is_empty() {
            return;
        }
        for edit in accepted {
            let old_text = original
                .get(edit.span.range())
                .unwrap_or_default()
                .to_string();
            let (line, col) = byte_offset_to_position_str(original, edit.span.start);
            self.edits.push(OutputEdit {
                file: path.to_string(),
                span: edit.span,
                old_text,
                new_text: edit.text.clone(),
                line,
                col,
                unit: edit.labels.unit.clone(),
            });
        }
        self.unified_diff
            .push_str(&generate_unified_diff(path, original, accepted));
    }
}

/// Generate a unified diff section for one file.
///
/// Edits touching the same or adjacent line ranges share a hunk. Hunks cover
/// whole lines without context, which `git apply` accepts.
fn generate_unified_diff(path: &str, original: &str, accepted: &[SourceEdit]) -> String {
    let mut diff = String::new();
    diff.push_str(&format!("--- a/{}\n", path));
    diff.push_str(&format!("+++ b/{}\n", path));

    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(original.match_indices('\n').map(|(i, _)| i + 1))
        .filter(|&start| start < original.len() || start == 0)
        .collect();
    let line_of = |offset: usize| line_starts.partition_point(|&s| s <= offset).saturating_sub(1);

    let mut sorted: Vec<&SourceEdit> = accepted.iter().collect();
    sorted.sort_by_key(|e| (e.span.start, e.span.end, e.id));

    // (first line, last line, edits)
    let mut groups: Vec<(usize, usize, Vec<&SourceEdit>)> = Vec::new();
    for edit in sorted {
        let first = line_of(edit.span.start);
        let last = line_of(edit.span.end.saturating_sub(1).max(edit.span.start));
        if let Some(group) = groups.last_mut() {
            if first <= group.1 {
                group.1 = group.1.max(last);
                group.2.push(edit);
                continue;
            }
        }
        groups.push((first, last, vec![edit]));
    }

    let mut line_delta: i64 = 0;
    for (first, last, edits) in groups {
        let block_start = line_starts[first];
        let block_end = line_starts
            .get(last + 1)
            .copied()
            .unwrap_or(original.len());
        let old_block = &original[block_start..block_end];
        let mut new_block = old_block.to_string();
        for edit in edits.iter().rev() {
            let range = (edit.span.start - block_start)..(edit.span.end - block_start);
            new_block.replace_range(range, &edit.text);
        }

        let old_count = old_block.lines().count();
        let new_count = new_block.lines().count();
        let new_first = first as i64 + 1 + line_delta;
        diff.push_str(&format!(
            "@@ -{},{} +{},{} @@\n",
            first + 1,
            old_count,
            new_first,
            new_count
        ));
        for old_line in old_block.lines() {
            diff.push_str(&format!("-{}\n", old_line));
        }
        for new_line in new_block.lines() {
            diff.push_str(&format!("+{}\n", new_line));
        }
        line_delta += new_count as i64 - old_count as i64;
    }

    diff
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn edit(id: u32, start: usize, end: usize, text: &str) -> SourceEdit {
        SourceEdit::replace(id, FileId::new(0), Span::new(start, end), text)
    }

    mod span_tests {
        use super::*;

        #[test]
        fn span_overlap_detection() {
            let span1 = Span::new(10, 20);
            let span2 = Span::new(15, 25);
            let span3 = Span::new(20, 30);
            let span4 = Span::new(5, 15);

            assert!(span1.overlaps(&span2));
            assert!(span2.overlaps(&span1));

            // Adjacent spans don't overlap
            assert!(!span1.overlaps(&span3));
            assert!(!span3.overlaps(&span1));

            assert!(span1.overlaps(&span4));
            assert!(span4.overlaps(&span1));
        }

        #[test]
        fn empty_span_never_overlaps() {
            let insert = Span::empty(10);
            assert!(!insert.overlaps(&Span::new(10, 12)));
            assert!(!insert.overlaps(&Span::empty(10)));
        }

        #[test]
        fn span_offset_by() {
            assert_eq!(Span::new(2, 5).offset_by(10), Span::new(12, 15));
        }
    }

    mod commit_tests {
        use super::*;

        #[test]
        fn applies_in_descending_order_against_original() {
            let original = "aaa bbb ccc";
            let mut patch = FilePatch::new(FileId::new(0), original);
            patch.push(edit(0, 0, 3, "x"));
            patch.push(edit(1, 8, 11, "zzzzz"));
            patch.push(edit(2, 4, 7, "yy"));

            let result = patch.commit();
            assert_eq!(result.text, "x yy zzzzz");
            assert!(result.dropped.is_empty());
            let starts: Vec<usize> = result.accepted.iter().map(|e| e.span.start).collect();
            assert_eq!(starts, vec![0, 4, 8]);
        }

        #[test]
        fn narrower_edit_wins_overlap() {
            let original = "'a, b.old-name'";
            let mut patch = FilePatch::new(FileId::new(0), original);
            patch.push(edit(0, 0, 15, "'whole'"));
            patch.push(edit(1, 6, 14, "new-name"));

            let result = patch.commit();
            assert_eq!(result.text, "'a, b.new-name'");
            assert_eq!(result.dropped.len(), 1);
            assert_eq!(
                result.dropped[0].conflict,
                Conflict::OverlappingSpans {
                    dropped: Span::new(0, 15),
                    kept: Span::new(6, 14),
                }
            );
        }

        #[test]
        fn equal_width_overlap_keeps_earlier() {
            let original = "abcdef";
            let mut patch = FilePatch::new(FileId::new(0), original);
            patch.push(edit(0, 1, 3, "X"));
            patch.push(edit(1, 2, 4, "Y"));

            let result = patch.commit();
            assert_eq!(result.text, "aXdef");
            assert_eq!(result.dropped.len(), 1);
            assert_eq!(result.dropped[0].edit.id, 1);
        }

        #[test]
        fn duplicate_edits_collapse() {
            let original = "old";
            let mut patch = FilePatch::new(FileId::new(0), original);
            patch.push(edit(0, 0, 3, "new"));
            patch.push(edit(1, 0, 3, "new"));

            let result = patch.commit();
            assert_eq!(result.text, "new");
            assert_eq!(result.accepted.len(), 1);
            assert!(result.dropped.is_empty());
        }

        #[test]
        fn insertion_before_replacement_at_same_offset() {
            let original = "import x;";
            let mut patch = FilePatch::new(FileId::new(0), original);
            patch.push(edit(0, 0, 6, "export"));
            patch.push(SourceEdit::insert(1, FileId::new(0), 0, "// hi\n"));

            let result = patch.commit();
            assert_eq!(result.text, "// hi\nexport x;");
        }

        #[test]
        fn out_of_bounds_is_dropped() {
            let mut patch = FilePatch::new(FileId::new(0), "abc");
            patch.push(edit(0, 2, 10, "x"));
            let result = patch.commit();
            assert_eq!(result.text, "abc");
            assert!(matches!(
                result.dropped[0].conflict,
                Conflict::SpanOutOfBounds { file_len: 3, .. }
            ));
        }

        #[test]
        fn committed_edits_never_overlap() {
            let original = "0123456789";
            let mut patch = FilePatch::new(FileId::new(0), original);
            for (i, (s, e)) in [(0, 5), (2, 3), (4, 8), (7, 9), (1, 2)].iter().enumerate() {
                patch.push(edit(i as u32, *s, *e, "_"));
            }
            let result = patch.commit();
            for (i, a) in result.accepted.iter().enumerate() {
                for b in &result.accepted[i + 1..] {
                    assert!(!a.span.overlaps(&b.span));
                }
            }
        }
    }

    mod materialize_tests {
        use super::*;

        #[test]
        fn output_edit_positions_use_original() {
            let original = "line one\nconst x = 'old';\n";
            let accepted = vec![edit(0, 20, 23, "new")];
            let mut patch = MaterializedPatch::default();
            patch.add_file("src/app.ts", original, &accepted);

            assert_eq!(patch.edits.len(), 1);
            assert_eq!(patch.edits[0].line, 2);
            assert_eq!(patch.edits[0].col, 12);
            assert_eq!(patch.edits[0].old_text, "old");
            assert!(patch.unified_diff.contains("-const x = 'old';"));
            assert!(patch.unified_diff.contains("+const x = 'new';"));
        }
    }
}
