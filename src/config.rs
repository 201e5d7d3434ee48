//! Run configuration.
//!
//! `RunConfig` gathers everything a migration run needs besides the source
//! tree itself. The CLI fills it from arguments; tests build it directly.

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use uplift_core::error::UpliftError;
use uplift_core::rules::{RuleTables, VersionRange};
use uplift_core::workspace::ScanConfig;

/// Bootstrap file searched for `bootstrapModule(...)` calls.
pub const DEFAULT_BOOTSTRAP: &str = "src/main.ts";

/// Module prefixes whose exports are library classes.
pub const DEFAULT_LIBRARY_MODULES: &[&str] = &["@angular/material", "@angular/cdk"];

/// How the run result is printed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Summary and diagnostics, one per line (default).
    #[default]
    Text,
    /// Full JSON response.
    Json,
    /// Unified diff of the accepted edits.
    Diff,
}

/// Configuration for one migration run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub versions: VersionRange,
    /// Workspace-relative path of the bootstrap file.
    pub bootstrap: String,
    pub library_modules: Vec<String>,
    pub scan: ScanConfig,
    /// Directory of extra rule tables merged with the builtin ones.
    pub rules_dir: Option<PathBuf>,
    /// Worker threads (default: rayon's choice).
    pub jobs: Option<usize>,
    /// Files not started within this time are skipped.
    pub timeout: Option<Duration>,
    pub dry_run: bool,
    pub format: OutputFormat,
}

impl RunConfig {
    pub fn new(versions: VersionRange) -> Self {
        RunConfig {
            versions,
            bootstrap: DEFAULT_BOOTSTRAP.to_string(),
            library_modules: DEFAULT_LIBRARY_MODULES
                .iter()
                .map(|m| m.to_string())
                .collect(),
            scan: ScanConfig::default(),
            rules_dir: None,
            jobs: None,
            timeout: None,
            dry_run: false,
            format: OutputFormat::default(),
        }
    }

    pub fn with_bootstrap(mut self, path: impl Into<String>) -> Self {
        self.bootstrap = path.into();
        self
    }

    pub fn with_library_modules(mut self, modules: Vec<String>) -> Self {
        if !modules.is_empty() {
            self.library_modules = modules;
        }
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Reject configurations no run can satisfy.
    pub fn validate(&self) -> Result<(), UpliftError> {
        if self.versions.is_empty() {
            return Err(UpliftError::invalid_args(format!(
                "target version must be later than the source version ({})",
                self.versions
            )));
        }
        if self.jobs == Some(0) {
            return Err(UpliftError::invalid_args("--jobs must be at least 1"));
        }
        if self.library_modules.iter().any(|m| m.trim().is_empty()) {
            return Err(UpliftError::invalid_args("library module prefixes must not be empty"));
        }
        Ok(())
    }

    /// Builtin rule tables merged with the tables of `rules_dir`.
    pub fn load_tables(&self) -> Result<RuleTables, UpliftError> {
        let mut tables = RuleTables::builtin()?;
        if let Some(dir) = &self.rules_dir {
            if !dir.is_dir() {
                return Err(UpliftError::file_not_found(dir.display().to_string()));
            }
            let extra = RuleTables::load_dir(dir)?;
            debug!(dir = %dir.display(), rules = extra.len(), "loaded extra rule tables");
            tables.merge(extra)?;
        }
        Ok(tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uplift_core::rules::MajorVersion;

    fn range(from: u32, to: u32) -> VersionRange {
        VersionRange::new(MajorVersion(from), MajorVersion(to))
    }

    #[test]
    fn defaults() {
        let config = RunConfig::new(range(5, 7));
        assert_eq!(config.bootstrap, "src/main.ts");
        assert_eq!(
            config.library_modules,
            vec!["@angular/material".to_string(), "@angular/cdk".to_string()]
        );
        assert!(!config.dry_run);
        assert_eq!(config.format, OutputFormat::Text);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_range_is_invalid() {
        let err = RunConfig::new(range(7, 7)).validate().unwrap_err();
        assert_eq!(err.error_code().code(), 2);
        assert!(RunConfig::new(range(8, 6)).validate().is_err());
    }

    #[test]
    fn zero_jobs_is_invalid() {
        let mut config = RunConfig::new(range(5, 7));
        config.jobs = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_module_list_keeps_defaults() {
        let config = RunConfig::new(range(5, 7)).with_library_modules(Vec::new());
        assert_eq!(config.library_modules.len(), 2);
    }

    #[test]
    fn missing_rules_dir() {
        let mut config = RunConfig::new(range(5, 7));
        config.rules_dir = Some(PathBuf::from("/definitely/not/here"));
        let err = config.load_tables().unwrap_err();
        assert_eq!(err.error_code().code(), 3);
    }

    #[test]
    fn extra_tables_are_merged() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("class_names.json"),
            r#"{ "8": [ { "old": "MatFooModule", "new": "MatBarModule" } ] }"#,
        )
        .unwrap();
        let mut config = RunConfig::new(range(5, 9));
        config.rules_dir = Some(dir.path().to_path_buf());
        let tables = config.load_tables().unwrap();
        assert_eq!(tables.len(), RuleTables::builtin().unwrap().len() + 1);
    }
}
