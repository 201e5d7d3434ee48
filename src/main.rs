//! Binary entry point for the uplift CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Migrate the current directory from v5 to v7 (writes files)
//! uplift migrate --from 5 --to 7
//!
//! # Preview the changes as a unified diff
//! uplift migrate --from 5 --to 9 --dry-run --format diff
//!
//! # List the rules an upgrade applies
//! uplift rules --from 6 --to 8
//! ```
//!
//! Exit codes: 0 when nothing needs manual follow-up, 5 when the run left
//! action-required diagnostics, and the error codes of `OutputErrorCode`
//! otherwise.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};

use uplift::cli::{render_diagnostics, render_rules, render_text_summary, run_migrate, run_rules};
use uplift::config::{OutputFormat, RunConfig};
use uplift::error::{OutputErrorCode, UpliftError};
use uplift::output::{emit_response, ErrorResponse};
use uplift::rules::{MajorVersion, VersionRange};

// ============================================================================
// CLI Structure
// ============================================================================

/// Version-upgrade migrations for application sources.
///
/// Rewrites TypeScript, templates and stylesheets for a new major version
/// of the UI library and reports what it could not change.
#[derive(Parser, Debug)]
#[command(name = "uplift", version, about = "Version-upgrade migrations for application sources")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

/// Global arguments shared by all subcommands.
#[derive(Parser, Debug)]
struct GlobalArgs {
    /// Workspace root directory (default: current directory).
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    /// Log level for tracing output.
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Output format for the rules command.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum RulesFormat {
    /// One rule per line (default).
    #[default]
    Text,
    /// Full JSON response.
    Json,
}

/// Source and target versions (`7`, `v7` and `7.2.1` all mean major 7).
#[derive(clap::Args, Debug, Clone)]
struct VersionArgs {
    /// Library version the sources are written for.
    #[arg(long, value_parser = parse_version)]
    from: MajorVersion,
    /// Library version to migrate to.
    #[arg(long, value_parser = parse_version)]
    to: MajorVersion,
    /// Directory of extra rule tables (`<category>.json`).
    #[arg(long = "rules")]
    rules_dir: Option<PathBuf>,
}

impl VersionArgs {
    fn range(&self) -> VersionRange {
        VersionRange::new(self.from, self.to)
    }
}

fn parse_version(s: &str) -> Result<MajorVersion, String> {
    s.parse::<MajorVersion>().map_err(|e| e.to_string())
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Migrate the workspace (apply-by-default).
    ///
    /// Use --dry-run to preview changes without modifying files.
    Migrate {
        #[command(flatten)]
        versions: VersionArgs,
        /// Preview changes without applying (default: apply changes).
        #[arg(long)]
        dry_run: bool,
        /// Output format.
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
        /// Bootstrap file, relative to the workspace.
        #[arg(long, default_value = uplift::config::DEFAULT_BOOTSTRAP)]
        bootstrap: String,
        /// Only migrate files matching this glob (repeatable).
        #[arg(long)]
        include: Vec<String>,
        /// Skip files matching this glob (repeatable).
        #[arg(long)]
        exclude: Vec<String>,
        /// Module prefix whose exports are library classes (repeatable).
        #[arg(long = "library-module")]
        library_modules: Vec<String>,
        /// Worker threads.
        #[arg(long)]
        jobs: Option<usize>,
        /// Skip files not started within this many seconds.
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// List the rules an upgrade applies.
    Rules {
        #[command(flatten)]
        versions: VersionArgs,
        /// Output format.
        #[arg(long, value_enum, default_value = "text")]
        format: RulesFormat,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.global.log_level);

    match execute(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(OutputErrorCode::ActionRequired.code()),
        Err(err) => {
            // Errors go to stdout as JSON, like every other response.
            let error_code = OutputErrorCode::from(&err);
            let response = ErrorResponse::from_error(&err);
            let _ = emit_response(&response, &mut io::stdout());
            let _ = io::stdout().flush();
            ExitCode::from(error_code.code())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: LogLevel) {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Execute the CLI command. `Ok(false)` means manual follow-up remains.
fn execute(cli: Cli) -> Result<bool, UpliftError> {
    match cli.command {
        Command::Migrate {
            versions,
            dry_run,
            format,
            bootstrap,
            include,
            exclude,
            library_modules,
            jobs,
            timeout,
        } => {
            let mut config = RunConfig::new(versions.range())
                .with_bootstrap(bootstrap)
                .with_library_modules(library_modules)
                .with_dry_run(dry_run);
            config.rules_dir = versions.rules_dir;
            config.jobs = jobs;
            config.timeout = timeout.map(Duration::from_secs);
            config.format = format;
            for pattern in &include {
                config.scan = config.scan.include(pattern);
            }
            for pattern in &exclude {
                config.scan = config.scan.exclude(pattern);
            }
            execute_migrate(&cli.global, &config)
        }
        Command::Rules { versions, format } => {
            let mut config = RunConfig::new(versions.range());
            config.rules_dir = versions.rules_dir;
            execute_rules(&config, format)
        }
    }
}

// ============================================================================
// Command Executors
// ============================================================================

fn workspace_root(global: &GlobalArgs) -> Result<PathBuf, UpliftError> {
    match &global.workspace {
        Some(path) => Ok(path.clone()),
        None => std::env::current_dir().map_err(UpliftError::from),
    }
}

fn execute_migrate(global: &GlobalArgs, config: &RunConfig) -> Result<bool, UpliftError> {
    let root = workspace_root(global)?;
    let report = run_migrate(&root, config)?;
    let response = &report.response;

    let mut stdout = io::stdout();
    match config.format {
        OutputFormat::Json => {
            emit_response(response, &mut stdout)
                .map_err(|e| UpliftError::internal(e.to_string()))?;
        }
        OutputFormat::Diff => {
            write!(stdout, "{}", response.patch.unified_diff)?;
            let mut stderr = io::stderr();
            write!(stderr, "{}", render_diagnostics(response))?;
            stderr.flush()?;
        }
        OutputFormat::Text => {
            write!(stdout, "{}", render_text_summary(response))?;
        }
    }
    stdout.flush()?;

    Ok(!report.needs_action())
}

fn execute_rules(config: &RunConfig, format: RulesFormat) -> Result<bool, UpliftError> {
    let response = run_rules(config)?;
    let mut stdout = io::stdout();
    match format {
        RulesFormat::Json => {
            emit_response(&response, &mut stdout)
                .map_err(|e| UpliftError::internal(e.to_string()))?;
        }
        RulesFormat::Text => {
            write!(stdout, "{}", render_rules(&response))?;
        }
    }
    stdout.flush()?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    mod cli_parsing {
        use super::*;

        #[test]
        fn migrate_defaults() {
            let cli = Cli::try_parse_from(["uplift", "migrate", "--from", "5", "--to", "v7.1.0"])
                .unwrap();
            match cli.command {
                Command::Migrate {
                    versions,
                    dry_run,
                    format,
                    bootstrap,
                    jobs,
                    ..
                } => {
                    assert_eq!(
                        versions.range(),
                        VersionRange::new(MajorVersion(5), MajorVersion(7))
                    );
                    assert!(!dry_run);
                    assert_eq!(format, OutputFormat::Text);
                    assert_eq!(bootstrap, "src/main.ts");
                    assert_eq!(jobs, None);
                }
                _ => panic!("expected Migrate"),
            }
            assert!(matches!(cli.global.log_level, LogLevel::Warn));
        }

        #[test]
        fn migrate_all_options() {
            let cli = Cli::try_parse_from([
                "uplift",
                "--workspace",
                "/tmp/app",
                "migrate",
                "--from",
                "8",
                "--to",
                "9",
                "--dry-run",
                "--format",
                "diff",
                "--exclude",
                "**/*.spec.ts",
                "--library-module",
                "@acme/ui",
                "--jobs",
                "4",
                "--timeout",
                "30",
            ])
            .unwrap();
            assert_eq!(cli.global.workspace, Some(PathBuf::from("/tmp/app")));
            match cli.command {
                Command::Migrate {
                    dry_run,
                    format,
                    exclude,
                    library_modules,
                    jobs,
                    timeout,
                    ..
                } => {
                    assert!(dry_run);
                    assert_eq!(format, OutputFormat::Diff);
                    assert_eq!(exclude, vec!["**/*.spec.ts".to_string()]);
                    assert_eq!(library_modules, vec!["@acme/ui".to_string()]);
                    assert_eq!(jobs, Some(4));
                    assert_eq!(timeout, Some(30));
                }
                _ => panic!("expected Migrate"),
            }
        }

        #[test]
        fn rules_json() {
            let cli = Cli::try_parse_from([
                "uplift", "rules", "--from", "6", "--to", "8", "--format", "json",
            ])
            .unwrap();
            match cli.command {
                Command::Rules { versions, format } => {
                    assert_eq!(versions.to, MajorVersion(8));
                    assert_eq!(format, RulesFormat::Json);
                }
                _ => panic!("expected Rules"),
            }
        }

        #[test]
        fn bad_version_is_rejected() {
            let parsed = Cli::try_parse_from(["uplift", "rules", "--from", "six", "--to", "8"]);
            assert!(parsed.is_err());
        }
    }
}
