//! Migration driver.
//!
//! A run has three phases:
//!
//! 1. **Per-file pass** (parallel): every selected unit visits every file.
//!    Each worker folds its files into its own [`Accumulator`]; the
//!    accumulators are reduced at the end, so no state is shared.
//! 2. **Project pass**: units that need the whole tree act on the facts
//!    gathered in phase 1.
//! 3. **Commit**: the edits of each file are resolved and applied once
//!    against the original content, then written back unless the run is dry.

use std::collections::BTreeMap;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use uplift_core::diagnostics::{Diagnostic, Reporter};
use uplift_core::error::UpliftError;
use uplift_core::output::{MigrateResponse, Patch, Summary};
use uplift_core::patch::{Conflict, FilePatch, PatchSet, Span};
use uplift_core::rules::RuleRegistry;
use uplift_core::workspace::{SourceFile, SourceTree};

use crate::config::RunConfig;
use crate::migrations::{
    select_units, visit_file, FileContext, MigrationUnit, ProjectFacts, RunContext,
};

/// Result of a run: the response plus the new content of changed files.
#[derive(Debug, Clone)]
pub struct MigrationReport {
    pub response: MigrateResponse,
    /// Rewritten content keyed by workspace-relative path.
    pub rewritten: BTreeMap<String, String>,
}

impl MigrationReport {
    /// Whether any diagnostic needs manual follow-up.
    pub fn needs_action(&self) -> bool {
        self.response.summary.action_required > 0
    }
}

// ============================================================================
// Accumulation
// ============================================================================

/// Per-worker output of the per-file pass.
#[derive(Debug, Default)]
struct Accumulator {
    patches: PatchSet,
    reporter: Reporter,
    facts: ProjectFacts,
}

impl Accumulator {
    fn absorb(&mut self, out: FileContext) {
        let (edits, diagnostics, facts) = out.into_parts();
        for edit in edits {
            self.patches.push(edit);
        }
        self.reporter.extend(diagnostics);
        self.facts.merge(facts);
    }

    fn merge(mut self, other: Accumulator) -> Accumulator {
        self.patches.merge(other.patches);
        self.reporter.merge(other.reporter);
        self.facts.merge(other.facts);
        self
    }
}

fn analyze(
    tree: &SourceTree,
    units: &[Box<dyn MigrationUnit>],
    cx: &RunContext<'_>,
    deadline: Option<Instant>,
) -> Accumulator {
    tree.files()
        .par_iter()
        .fold(Accumulator::default, |mut acc, file| {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(file = %file.path, "deadline passed, file skipped");
                acc.reporter.push(Diagnostic::action_required(
                    "driver",
                    file.path.clone(),
                    Span::empty(0),
                    "run deadline passed before this file was started; file skipped",
                ));
                return acc;
            }
            debug!(file = %file.path, "visiting");
            acc.absorb(visit_file(units.iter().map(|u| u.as_ref()), cx, file));
            acc
        })
        .reduce(Accumulator::default, Accumulator::merge)
}

// ============================================================================
// Run
// ============================================================================

/// Migrate `tree` as configured.
pub fn migrate(tree: &SourceTree, config: &RunConfig) -> Result<MigrationReport, UpliftError> {
    config.validate()?;
    let tables = config.load_tables()?;
    let registry = RuleRegistry::for_upgrade(&tables, config.versions);
    let units = select_units(&config.versions);
    let unit_names: Vec<String> = units.iter().map(|u| u.name().to_string()).collect();
    info!(
        versions = %config.versions,
        rules = registry.len(),
        units = unit_names.len(),
        files = tree.len(),
        "starting migration"
    );

    let cx = RunContext {
        registry: &registry,
        library_modules: &config.library_modules,
        bootstrap: &config.bootstrap,
        versions: config.versions,
    };
    let deadline = config.timeout.map(|t| Instant::now() + t);

    let mut acc = match config.jobs {
        Some(jobs) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(jobs)
                .build()
                .map_err(|e| UpliftError::internal(format!("failed to start worker pool: {}", e)))?;
            pool.install(|| analyze(tree, &units, &cx, deadline))
        }
        None => analyze(tree, &units, &cx, deadline),
    };

    for unit in &units {
        for out in unit.post_analysis(&cx, tree, &acc.facts) {
            acc.absorb(out);
        }
    }
    for skipped in tree.skipped() {
        acc.reporter.push(Diagnostic::action_required(
            "workspace",
            skipped.path.clone(),
            Span::empty(0),
            format!("file was not migrated: {}; review it by hand", skipped.reason),
        ));
    }

    commit(tree, config, &unit_names, acc)
}

/// Accepted edits of one file.
struct Committed<'a> {
    file: &'a SourceFile,
    text: String,
}

fn commit(
    tree: &SourceTree,
    config: &RunConfig,
    unit_names: &[String],
    acc: Accumulator,
) -> Result<MigrationReport, UpliftError> {
    let Accumulator {
        mut patches,
        mut reporter,
        ..
    } = acc;
    let mut patch = Patch::default();
    let mut summary = Summary {
        files_scanned: tree.len() as u32,
        ..Summary::default()
    };
    let mut changed: Vec<Committed<'_>> = Vec::new();

    for file in tree.files() {
        let edits = patches.take_file(file.id);
        if edits.is_empty() {
            continue;
        }
        let mut file_patch = FilePatch::new(file.id, &file.text);
        file_patch.extend(edits);
        let result = file_patch.commit();

        for edit in &result.accepted {
            let unit = edit.labels.unit.clone().unwrap_or_default();
            let reason = edit.labels.reason.clone().unwrap_or_else(|| "rewritten".to_string());
            reporter.push(Diagnostic::informational(unit, file.path.clone(), edit.span, reason));
        }
        for dropped in &result.dropped {
            let unit = dropped.edit.labels.unit.clone().unwrap_or_default();
            let reason = dropped.edit.labels.reason.clone().unwrap_or_default();
            match &dropped.conflict {
                Conflict::OverlappingSpans { kept, .. } => {
                    warn!(
                        file = %file.path,
                        span = ?dropped.edit.span,
                        kept = ?kept,
                        "overlapping edit dropped"
                    );
                    reporter.push(Diagnostic::informational(
                        unit,
                        file.path.clone(),
                        dropped.edit.span,
                        format!(
                            "broader rewrite not applied ({}); \
                             a narrower rewrite at {}..{} was applied",
                            reason, kept.start, kept.end
                        ),
                    ));
                }
                Conflict::SpanOutOfBounds { span, file_len } => {
                    warn!(
                        file = %file.path,
                        span = ?span,
                        file_len = *file_len,
                        "edit outside the file dropped"
                    );
                    reporter.push(Diagnostic::action_required(
                        unit,
                        file.path.clone(),
                        *span,
                        format!(
                            "rewrite could not be applied ({}); the edit lies outside the file",
                            reason
                        ),
                    ));
                }
            }
        }
        summary.edits_applied += result.accepted.len() as u32;
        summary.edits_dropped += result.dropped.len() as u32;

        if result.text != file.text {
            patch.add_file(&file.path, &file.text, &result.accepted);
            changed.push(Committed {
                file,
                text: result.text,
            });
        }
    }
    summary.files_changed = changed.len() as u32;

    let files_written = if config.dry_run {
        None
    } else {
        let mut written = Vec::new();
        for committed in &changed {
            let path = &committed.file.path;
            match tree.write_back(committed.file.id, &committed.text) {
                Ok(true) => written.push(path.clone()),
                Ok(false) => {}
                Err(err) => {
                    warn!(file = %path, error = %err, "rewrite not written");
                    reporter.push(Diagnostic::action_required(
                        "workspace",
                        path.clone(),
                        Span::empty(0),
                        format!("rewrite was not written: {err}; the file is unchanged"),
                    ));
                }
            }
        }
        Some(written)
    };

    summary.informational = reporter.informational_count() as u32;
    summary.action_required = reporter.action_required_count() as u32;
    let diagnostics = reporter.locate(|path| tree.file_by_path(path).map(|f| f.text.as_str()));

    info!(
        files_changed = summary.files_changed,
        edits = summary.edits_applied,
        dropped = summary.edits_dropped,
        action_required = summary.action_required,
        dry_run = config.dry_run,
        "migration finished"
    );

    let rewritten = changed
        .into_iter()
        .map(|c| (c.file.path.clone(), c.text))
        .collect();
    Ok(MigrationReport {
        response: MigrateResponse::new(
            config.versions,
            unit_names.to_vec(),
            config.dry_run,
            summary,
            patch,
            diagnostics,
            files_written,
        ),
        rewritten,
    })
}
