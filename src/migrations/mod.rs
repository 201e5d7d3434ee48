//! Migration units.
//!
//! A unit is a self-contained upgrade procedure. The driver hands every unit
//! each parsed script, each template (external or inline) and each
//! stylesheet (external or inline) of the tree; units record edits and
//! diagnostics in a per-file [`FileContext`]. Units that need a view of the
//! whole project record facts during the pass and act in
//! [`MigrationUnit::post_analysis`], which runs once every file has been
//! visited.

use std::collections::BTreeSet;

use tracing::warn;
use tree_sitter::Node;

use uplift_core::diagnostics::{Diagnostic, Severity};
use uplift_core::patch::{EditLabels, FileId, SourceEdit, Span};
use uplift_core::rules::{MajorVersion, RuleCategory, RuleRegistry, VersionRange};
use uplift_core::workspace::{SourceFile, SourceKind, SourceTree};
use uplift_ts::decorator::{component_metadata, ComponentMetadata};
use uplift_ts::{parse, Dialect, FileTypeResolver, Outcome};

pub mod bootstrap;
pub mod constructor;
pub mod ripple_speed;
pub mod rules;

/// Edit ids handed out after the parallel pass start here, so project-level
/// edits always count as discovered later than per-file ones.
pub const POST_ANALYSIS_ID_BASE: u32 = 1 << 24;

// ============================================================================
// Unit Contract
// ============================================================================

/// Versions a unit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionGate {
    /// Every upgrade (rule-driven units; the registry does the filtering).
    Any,
    /// Upgrades that span this version.
    Since(MajorVersion),
}

impl VersionGate {
    pub fn applies(&self, versions: &VersionRange) -> bool {
        match self {
            VersionGate::Any => !versions.is_empty(),
            VersionGate::Since(version) => versions.spans(*version),
        }
    }
}

/// Read-only state shared by every unit during a run.
#[derive(Debug, Clone, Copy)]
pub struct RunContext<'a> {
    pub registry: &'a RuleRegistry,
    pub library_modules: &'a [String],
    /// Workspace-relative path of the bootstrap file.
    pub bootstrap: &'a str,
    pub versions: VersionRange,
}

/// A parsed script.
pub struct Script<'s, 't> {
    pub file: &'s SourceFile,
    pub root: Node<'t>,
    pub resolver: &'s FileTypeResolver<'t>,
    pub metadata: &'s [ComponentMetadata],
}

impl Script<'_, '_> {
    pub fn source(&self) -> &str {
        &self.file.text
    }
}

/// Template or stylesheet text, either a whole file or embedded in a script.
#[derive(Debug, Clone, Copy)]
pub struct Embedded<'s> {
    pub file: &'s SourceFile,
    pub text: &'s str,
    /// Offset of `text` within the file.
    pub base: usize,
    pub scss: bool,
}

impl<'s> Embedded<'s> {
    /// The whole file.
    pub fn whole(file: &'s SourceFile) -> Self {
        Embedded {
            file,
            text: &file.text,
            base: 0,
            scss: file.path.ends_with(".scss"),
        }
    }

    /// An inline template or style of a script.
    pub fn inline(file: &'s SourceFile, span: Span) -> Self {
        Embedded {
            file,
            text: file.text.get(span.range()).unwrap_or_default(),
            base: span.start,
            scss: false,
        }
    }
}

/// One upgrade procedure.
pub trait MigrationUnit: Send + Sync {
    fn name(&self) -> &'static str;

    fn gate(&self) -> VersionGate {
        VersionGate::Any
    }

    /// Rule categories the unit consumes.
    fn categories(&self) -> &[RuleCategory] {
        &[]
    }

    fn visit_script(&self, _cx: &RunContext<'_>, _script: &Script<'_, '_>, _out: &mut FileContext) {
    }

    fn visit_template(
        &self,
        _cx: &RunContext<'_>,
        _template: &Embedded<'_>,
        _out: &mut FileContext,
    ) {
    }

    fn visit_stylesheet(
        &self,
        _cx: &RunContext<'_>,
        _stylesheet: &Embedded<'_>,
        _out: &mut FileContext,
    ) {
    }

    /// Project-level work after every file was visited.
    fn post_analysis(
        &self,
        _cx: &RunContext<'_>,
        _tree: &SourceTree,
        _facts: &ProjectFacts,
    ) -> Vec<FileContext> {
        Vec::new()
    }
}

/// Every unit, in the order they run.
pub fn all_units() -> Vec<Box<dyn MigrationUnit>> {
    vec![
        Box::new(rules::RuleMigration::selectors()),
        Box::new(rules::RuleMigration::class_names()),
        Box::new(rules::RuleMigration::bindings()),
        Box::new(rules::RuleMigration::property_names()),
        Box::new(rules::RuleMigration::method_calls()),
        Box::new(constructor::ConstructorSignatures),
        Box::new(ripple_speed::RippleSpeedFactor),
        Box::new(bootstrap::GestureBootstrapImport),
    ]
}

/// Units whose gate admits `versions`.
pub fn select_units(versions: &VersionRange) -> Vec<Box<dyn MigrationUnit>> {
    all_units()
        .into_iter()
        .filter(|unit| unit.gate().applies(versions))
        .collect()
}

// ============================================================================
// Per-file Output
// ============================================================================

/// Facts recorded during the per-file pass for project-level units.
#[derive(Debug, Clone, Default)]
pub struct ProjectFacts {
    /// Files whose templates bind gesture events.
    pub gesture_files: BTreeSet<String>,
}

impl ProjectFacts {
    pub fn merge(&mut self, other: ProjectFacts) {
        self.gesture_files.extend(other.gesture_files);
    }
}

/// Edits and diagnostics produced for one file.
#[derive(Debug)]
pub struct FileContext {
    file_id: FileId,
    path: String,
    unit: &'static str,
    next_id: u32,
    edits: Vec<SourceEdit>,
    diagnostics: Vec<Diagnostic>,
    facts: ProjectFacts,
}

impl FileContext {
    pub fn new(file: &SourceFile) -> Self {
        FileContext::with_first_id(file, 0)
    }

    /// A context whose edit ids start at `first_id`.
    pub fn with_first_id(file: &SourceFile, first_id: u32) -> Self {
        FileContext {
            file_id: file.id,
            path: file.path.clone(),
            unit: "",
            next_id: first_id,
            edits: Vec::new(),
            diagnostics: Vec::new(),
            facts: ProjectFacts::default(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Attribute subsequent edits and diagnostics to `unit`.
    pub fn set_unit(&mut self, unit: &'static str) {
        self.unit = unit;
    }

    /// Replace `span` with `text`.
    pub fn replace(&mut self, span: Span, text: impl Into<String>, reason: impl Into<String>) {
        let edit =
            SourceEdit::replace(self.next_id, self.file_id, span, text).with_labels(EditLabels {
                unit: Some(self.unit.to_string()),
                reason: Some(reason.into()),
            });
        self.next_id += 1;
        self.edits.push(edit);
    }

    /// Insert `text` at `offset`.
    pub fn insert(&mut self, offset: usize, text: impl Into<String>, reason: impl Into<String>) {
        self.replace(Span::empty(offset), text, reason);
    }

    pub fn diagnostic(&mut self, severity: Severity, span: Span, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(
            severity,
            self.unit,
            self.path.clone(),
            span,
            message,
        ));
    }

    pub fn action_required(&mut self, span: Span, message: impl Into<String>) {
        self.diagnostic(Severity::ActionRequired, span, message);
    }

    /// Record a matcher outcome.
    pub fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Edit { span, text, reason } => self.replace(span, text, reason),
            Outcome::Diagnostic {
                span,
                severity,
                message,
            } => self.diagnostic(severity, span, message),
        }
    }

    pub fn facts_mut(&mut self) -> &mut ProjectFacts {
        &mut self.facts
    }

    pub fn edits(&self) -> &[SourceEdit] {
        &self.edits
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_parts(self) -> (Vec<SourceEdit>, Vec<Diagnostic>, ProjectFacts) {
        (self.edits, self.diagnostics, self.facts)
    }
}

// ============================================================================
// File Visit
// ============================================================================

/// Run `units` over one file.
///
/// Scripts are parsed once; every unit sees the script, then each inline
/// template and style of its component metadata. A script that fails to
/// parse yields one action-required diagnostic and nothing else.
pub fn visit_file<'u>(
    units: impl IntoIterator<Item = &'u dyn MigrationUnit>,
    cx: &RunContext<'_>,
    file: &SourceFile,
) -> FileContext {
    let mut out = FileContext::new(file);
    match file.kind {
        SourceKind::Html => {
            let template = Embedded::whole(file);
            for unit in units {
                out.set_unit(unit.name());
                unit.visit_template(cx, &template, &mut out);
            }
        }
        SourceKind::Css | SourceKind::Scss => {
            let stylesheet = Embedded::whole(file);
            for unit in units {
                out.set_unit(unit.name());
                unit.visit_stylesheet(cx, &stylesheet, &mut out);
            }
        }
        SourceKind::TypeScript | SourceKind::Tsx => {
            let Some(dialect) = Dialect::for_kind(file.kind) else {
                return out;
            };
            let tree = match parse(&file.text, dialect) {
                Ok(tree) => tree,
                Err(err) => {
                    warn!(file = %file.path, error = %err, "parse failed, file skipped");
                    out.set_unit("parser");
                    out.action_required(
                        err.span(),
                        format!("file could not be parsed and was skipped: {err}"),
                    );
                    return out;
                }
            };
            let root = tree.root_node();
            let resolver = FileTypeResolver::new(root, &file.text).with_registry(cx.registry);
            let metadata = component_metadata(root, &file.text);
            let script = Script {
                file,
                root,
                resolver: &resolver,
                metadata: &metadata,
            };
            for unit in units {
                out.set_unit(unit.name());
                unit.visit_script(cx, &script, &mut out);
                for meta in &metadata {
                    if let Some(span) = meta.template {
                        unit.visit_template(cx, &Embedded::inline(file, span), &mut out);
                    }
                    for span in &meta.styles {
                        unit.visit_stylesheet(cx, &Embedded::inline(file, *span), &mut out);
                    }
                }
            }
        }
    }
    out
}

/// Run a single unit over one file.
#[cfg(test)]
pub(crate) fn visit_with(
    unit: &dyn MigrationUnit,
    cx: &RunContext<'_>,
    file: &SourceFile,
) -> FileContext {
    visit_file(std::iter::once(unit), cx, file)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(from: u32, to: u32) -> VersionRange {
        VersionRange::new(MajorVersion(from), MajorVersion(to))
    }

    #[test]
    fn gates() {
        assert!(VersionGate::Any.applies(&range(5, 6)));
        assert!(!VersionGate::Any.applies(&range(6, 6)));
        assert!(VersionGate::Since(MajorVersion(7)).applies(&range(6, 7)));
        assert!(!VersionGate::Since(MajorVersion(7)).applies(&range(7, 8)));
        assert!(!VersionGate::Since(MajorVersion(9)).applies(&range(5, 8)));
    }

    #[test]
    fn unit_selection_by_range() {
        let names = |units: Vec<Box<dyn MigrationUnit>>| -> Vec<&'static str> {
            units.iter().map(|u| u.name()).collect()
        };
        let all = names(select_units(&range(5, 9)));
        assert!(all.contains(&"ripple-speed-factor"));
        assert!(all.contains(&"gesture-bootstrap-import"));

        let early = names(select_units(&range(5, 6)));
        assert!(early.contains(&"selectors"));
        assert!(!early.contains(&"ripple-speed-factor"));
        assert!(!early.contains(&"gesture-bootstrap-import"));
    }

    #[test]
    fn unit_names_are_unique() {
        let units = all_units();
        let names: BTreeSet<&str> = units.iter().map(|u| u.name()).collect();
        assert_eq!(names.len(), units.len());
    }

    #[test]
    fn context_labels_edits_with_unit() {
        let tree = SourceTree::from_files([("a.ts", "let x = 1;")]);
        let mut cx = FileContext::new(&tree.files()[0]);
        cx.set_unit("selectors");
        cx.replace(Span::new(4, 5), "y", "renamed");
        cx.insert(0, "// note\n", "inserted");
        cx.action_required(Span::new(0, 3), "check this");

        let (edits, diagnostics, _) = cx.into_parts();
        assert_eq!(edits.len(), 2);
        assert_eq!(edits[0].id, 0);
        assert_eq!(edits[1].id, 1);
        assert_eq!(edits[0].labels.unit.as_deref(), Some("selectors"));
        assert_eq!(diagnostics[0].unit, "selectors");
        assert!(diagnostics[0].is_action_required());
    }
}
