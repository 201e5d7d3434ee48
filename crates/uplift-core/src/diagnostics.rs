//! Source-located diagnostics and the reporter that orders and renders them.
//!
//! Diagnostics are recorded with byte spans into the original file content.
//! Line and column are only computed when the reporter locates them, so
//! workers never need more than the span they already hold.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::patch::Span;
use crate::text::LineIndex;
use crate::types::Location;

/// How urgently a diagnostic needs attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// A rewrite was applied, or nothing needs doing.
    Informational,
    /// The change could not be made automatically.
    ActionRequired,
}

impl Severity {
    /// Label used in text output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Informational => "info",
            Severity::ActionRequired => "action-required",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message anchored to a byte span of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Workspace-relative path.
    pub file: String,
    /// Byte span in the original content.
    pub span: Span,
    pub severity: Severity,
    pub message: String,
    /// Name of the migration unit (or driver stage) that raised it.
    pub unit: String,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        unit: impl Into<String>,
        file: impl Into<String>,
        span: Span,
        message: impl Into<String>,
    ) -> Self {
        Diagnostic {
            file: file.into(),
            span,
            severity,
            message: message.into(),
            unit: unit.into(),
        }
    }

    pub fn informational(
        unit: impl Into<String>,
        file: impl Into<String>,
        span: Span,
        message: impl Into<String>,
    ) -> Self {
        Diagnostic::new(Severity::Informational, unit, file, span, message)
    }

    pub fn action_required(
        unit: impl Into<String>,
        file: impl Into<String>,
        span: Span,
        message: impl Into<String>,
    ) -> Self {
        Diagnostic::new(Severity::ActionRequired, unit, file, span, message)
    }

    pub fn is_action_required(&self) -> bool {
        self.severity == Severity::ActionRequired
    }
}

/// A diagnostic with its line/column resolved, ready for output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatedDiagnostic {
    pub location: Location,
    pub severity: Severity,
    pub unit: String,
    pub message: String,
}

impl fmt::Display for LocatedDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} [{}]: {}",
            self.location, self.severity, self.unit, self.message
        )
    }
}

/// Accumulates diagnostics from every worker.
#[derive(Debug, Clone, Default)]
pub struct Reporter {
    diagnostics: Vec<Diagnostic>,
}

impl Reporter {
    pub fn new() -> Self {
        Reporter::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    /// Absorb another reporter (used when reducing worker accumulators).
    pub fn merge(&mut self, other: Reporter) {
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn action_required_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.is_action_required())
            .count()
    }

    pub fn informational_count(&self) -> usize {
        self.diagnostics.len() - self.action_required_count()
    }

    /// Resolve positions and order diagnostics by path, then byte position.
    ///
    /// `source_of` returns the original content of a path. Diagnostics whose
    /// file is unknown keep line 1, column 1.
    pub fn locate<'a>(self, source_of: impl Fn(&str) -> Option<&'a str>) -> Vec<LocatedDiagnostic> {
        let mut by_file: BTreeMap<String, Vec<Diagnostic>> = BTreeMap::new();
        for diagnostic in self.diagnostics {
            by_file
                .entry(diagnostic.file.clone())
                .or_default()
                .push(diagnostic);
        }

        let mut located = Vec::new();
        for (file, mut diagnostics) in by_file {
            // Stable: diagnostics at the same span keep their discovery order.
            diagnostics.sort_by_key(|d| (d.span.start, d.span.end));
            let content = source_of(&file).unwrap_or("");
            let index = LineIndex::new(content);
            for d in diagnostics {
                located.push(LocatedDiagnostic {
                    location: Location::from_span(file.clone(), content, &index, d.span),
                    severity: d.severity,
                    unit: d.unit,
                    message: d.message,
                });
            }
        }
        located
    }
}

/// Render located diagnostics one per line.
pub fn render_text(diagnostics: &[LocatedDiagnostic]) -> String {
    let mut out = String::new();
    for d in diagnostics {
        out.push_str(&d.to_string());
        out.push('\n');
    }
    out
}
