//! CLI helpers.
//!
//! The binary parses arguments into a [`RunConfig`] and calls these
//! functions; they return response values and leave printing to the caller.
//!
//! ## Error Handling
//!
//! All functions return `Result<T, UpliftError>`. A run that finishes with
//! action-required diagnostics is still `Ok`; the caller decides the exit
//! code from the response summary.

use std::fmt::Write as _;
use std::path::Path;

use tracing::info;

use uplift_core::diagnostics::{render_text, Severity};
use uplift_core::error::UpliftError;
use uplift_core::output::{MigrateResponse, RulesResponse};
use uplift_core::rules::RuleRegistry;
use uplift_core::workspace::SourceTree;

use crate::config::RunConfig;
use crate::driver::{self, MigrationReport};

/// Scan `workspace` and migrate it.
pub fn run_migrate(workspace: &Path, config: &RunConfig) -> Result<MigrationReport, UpliftError> {
    if !workspace.is_dir() {
        return Err(UpliftError::file_not_found(workspace.display().to_string()));
    }
    let tree = SourceTree::scan(workspace, &config.scan)?;
    info!(root = %workspace.display(), files = tree.len(), "scanned workspace");
    driver::migrate(&tree, config)
}

/// Rules selected for the configured upgrade.
pub fn run_rules(config: &RunConfig) -> Result<RulesResponse, UpliftError> {
    config.validate()?;
    let tables = config.load_tables()?;
    let registry = RuleRegistry::for_upgrade(&tables, config.versions);
    Ok(RulesResponse::from_registry(config.versions, &registry))
}

/// Human-readable summary of a migrate response.
pub fn render_text_summary(response: &MigrateResponse) -> String {
    let summary = &response.summary;
    let mut out = String::new();
    let verb = if response.dry_run { "would change" } else { "changed" };
    let _ = writeln!(
        out,
        "Migration {}: {} of {} file(s) {}, {} edit(s) applied, {} dropped",
        response.versions,
        summary.files_changed,
        summary.files_scanned,
        verb,
        summary.edits_applied,
        summary.edits_dropped,
    );

    let actions: Vec<_> = response
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::ActionRequired)
        .cloned()
        .collect();
    if actions.is_empty() {
        out.push_str("No manual follow-up needed.\n");
    } else {
        let _ = writeln!(out, "{} item(s) need manual follow-up:", actions.len());
        out.push_str(&render_text(&actions));
    }
    out
}

/// Every diagnostic of a migrate response, one per line.
///
/// Diff output carries only the patch, so the binary prints these to stderr.
pub fn render_diagnostics(response: &MigrateResponse) -> String {
    render_text(&response.diagnostics)
}

/// Human-readable listing of rules.
pub fn render_rules(response: &RulesResponse) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} rule(s) for {}", response.rules.len(), response.versions);
    for rule in &response.rules {
        let _ = writeln!(
            out,
            "  [{}] {} {}: {}",
            rule.version, rule.category, rule.subject, rule.detail
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use uplift_core::rules::{MajorVersion, VersionRange};

    fn config(from: u32, to: u32) -> RunConfig {
        RunConfig::new(VersionRange::new(MajorVersion(from), MajorVersion(to)))
    }

    #[test]
    fn missing_workspace() {
        let err = run_migrate(Path::new("/definitely/not/here"), &config(5, 7)).unwrap_err();
        assert_eq!(err.error_code().code(), 3);
    }

    #[test]
    fn migrate_writes_changes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.css"), ".mat-input-flex { display: flex; }").unwrap();
        let report = run_migrate(dir.path(), &config(5, 6)).unwrap();
        assert_eq!(report.response.files_written, Some(vec!["app.css".to_string()]));
        let text = fs::read_to_string(dir.path().join("app.css")).unwrap();
        assert_eq!(text, ".mat-form-field-flex { display: flex; }");
    }

    #[test]
    fn text_summary() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.css"), ".mat-input-flex {}").unwrap();
        let report = run_migrate(dir.path(), &config(5, 6).with_dry_run(true)).unwrap();
        let text = render_text_summary(&report.response);
        assert!(text.contains("1 of 1 file(s) would change"));
        assert!(text.contains("No manual follow-up needed."));
    }

    #[test]
    fn diagnostics_accompany_diff_output() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.css"), ".mat-input-flex {}").unwrap();
        fs::write(dir.path().join("legacy.css"), [0xff, 0xfe, b'x']).unwrap();
        let report = run_migrate(dir.path(), &config(5, 6).with_dry_run(true)).unwrap();
        assert!(report.needs_action());

        let rendered = render_diagnostics(&report.response);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), report.response.diagnostics.len());
        assert!(lines.iter().any(|l| l.contains("legacy.css") && l.contains("workspace")));
        assert!(lines.iter().any(|l| l.contains("app.css")));
    }

    #[test]
    fn rules_listing() {
        let response = run_rules(&config(6, 7)).unwrap();
        assert_eq!(response.status, "ok");
        assert!(response
            .rules
            .iter()
            .any(|r| r.subject == "cdkFocusTrap" && r.detail == "cdkTrapFocus"));
        assert!(render_rules(&response).contains("cdkFocusTrap"));
    }
}
