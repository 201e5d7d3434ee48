//! JSON output types and serialization for CLI responses.
//!
//! ## Design Principles
//!
//! 1. **Status first:** Every response has `status` as first field
//! 2. **Deterministic:** Same input -> same output (field order, array ordering)
//! 3. **Nullable vs absent:** Absent field means "not applicable"
//! 4. **Versioned:** Schema version in response enables forward compatibility

use std::io::{self, Write};
use std::time::SystemTime;

use serde::{Deserialize, Serialize, Serializer};

use crate::diagnostics::LocatedDiagnostic;
use crate::error::{OutputErrorCode, UpliftError};
use crate::rules::{RuleCategory, RuleRegistry, VersionRange};

pub use crate::patch::{MaterializedPatch as Patch, OutputEdit as Edit, Span};
pub use crate::types::Location;

/// Current schema version for all responses.
pub const SCHEMA_VERSION: &str = "1";

/// Format a timestamp for JSON output (ISO 8601).
pub fn format_timestamp(time: SystemTime) -> String {
    use chrono::{DateTime, Utc};

    let datetime: DateTime<Utc> = time.into();
    datetime.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

// ============================================================================
// Summary
// ============================================================================

/// Counts for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Files visited.
    pub files_scanned: u32,
    /// Files whose content changed.
    pub files_changed: u32,
    /// Edits committed.
    pub edits_applied: u32,
    /// Edits rejected by overlap resolution.
    pub edits_dropped: u32,
    /// Informational diagnostics.
    pub informational: u32,
    /// Diagnostics needing manual follow-up.
    pub action_required: u32,
}

// ============================================================================
// Error Output
// ============================================================================

/// Error information for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Numeric error code (also the exit code).
    pub code: u8,
    /// Human-readable message.
    pub message: String,
    /// Error-specific structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorInfo {
    /// Create from an UpliftError.
    pub fn from_error(err: &UpliftError) -> Self {
        let details = match err {
            UpliftError::InvalidArguments { details, .. } => details.clone(),
            UpliftError::FileNotFound { path } => Some(serde_json::json!({ "path": path })),
            UpliftError::ApplyError { file, .. } => {
                file.as_ref().map(|f| serde_json::json!({ "file": f }))
            }
            _ => None,
        };
        ErrorInfo {
            code: OutputErrorCode::from(err).code(),
            message: err.to_string(),
            details,
        }
    }
}

/// Error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Status: "error".
    pub status: String,
    /// Schema version for compatibility.
    pub schema_version: String,
    /// Error information.
    pub error: ErrorInfo,
}

impl ErrorResponse {
    /// Create an error response from an UpliftError.
    pub fn from_error(err: &UpliftError) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo::from_error(err),
        }
    }
}

// ============================================================================
// Migrate Response
// ============================================================================

/// Response for the `migrate` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrateResponse {
    /// "ok" when nothing needs manual follow-up, else "action_required".
    pub status: String,
    /// Schema version for compatibility.
    pub schema_version: String,
    /// Source and target library versions.
    pub versions: VersionRange,
    /// Names of the units that ran.
    pub units: Vec<String>,
    /// Whether files were left untouched.
    pub dry_run: bool,
    /// Counts.
    pub summary: Summary,
    /// Accepted edits and the unified diff.
    #[serde(serialize_with = "serialize_sorted_patch")]
    pub patch: Patch,
    /// Diagnostics ordered by file, then position.
    pub diagnostics: Vec<LocatedDiagnostic>,
    /// Files rewritten on disk (absent on dry runs).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_written: Option<Vec<String>>,
    /// When the run finished (ISO 8601).
    pub generated_at: String,
}

impl MigrateResponse {
    pub fn new(
        versions: VersionRange,
        units: Vec<String>,
        dry_run: bool,
        summary: Summary,
        patch: Patch,
        diagnostics: Vec<LocatedDiagnostic>,
        files_written: Option<Vec<String>>,
    ) -> Self {
        let status = if summary.action_required == 0 {
            "ok"
        } else {
            "action_required"
        };
        MigrateResponse {
            status: status.to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            versions,
            units,
            dry_run,
            summary,
            patch,
            diagnostics,
            files_written,
            generated_at: format_timestamp(SystemTime::now()),
        }
    }
}

// ============================================================================
// Rules Response
// ============================================================================

/// One row of the `rules` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleInfo {
    pub category: RuleCategory,
    pub version: String,
    /// Old name, class name, or `Class.method`.
    pub subject: String,
    /// New name, signatures, or invalid argument counts.
    pub detail: String,
}

/// Response for the `rules` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesResponse {
    /// Status: "ok".
    pub status: String,
    /// Schema version for compatibility.
    pub schema_version: String,
    pub versions: VersionRange,
    pub rules: Vec<RuleInfo>,
}

impl RulesResponse {
    /// List every rule selected for `versions`, in category order.
    pub fn from_registry(versions: VersionRange, registry: &RuleRegistry) -> Self {
        let mut rules = Vec::new();
        for category in RuleCategory::ALL {
            match category {
                RuleCategory::ConstructorSignature => {
                    for sig in registry.constructor_signatures() {
                        let rendered: Vec<String> = sig
                            .signatures
                            .iter()
                            .map(|s| format!("({})", s.join(", ")))
                            .collect();
                        rules.push(RuleInfo {
                            category,
                            version: sig.applies_from_version.to_string(),
                            subject: sig.class_name.clone(),
                            detail: rendered.join(" | "),
                        });
                    }
                }
                RuleCategory::MethodCall => {
                    for check in registry.method_checks() {
                        let counts: Vec<String> = check
                            .invalid_arg_counts
                            .iter()
                            .map(|c| c.count.to_string())
                            .collect();
                        rules.push(RuleInfo {
                            category,
                            version: check.applies_from_version.to_string(),
                            subject: format!("{}.{}", check.class_name, check.method),
                            detail: format!("invalid argument counts: {}", counts.join(", ")),
                        });
                    }
                }
                _ => {
                    for rule in registry.rules(category) {
                        rules.push(RuleInfo {
                            category,
                            version: rule.applies_from_version.to_string(),
                            subject: rule.old_name.clone(),
                            detail: rule.new_name.clone(),
                        });
                    }
                }
            }
        }
        RulesResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            versions,
            rules,
        }
    }
}

// ============================================================================
// Serialization Helpers
// ============================================================================

/// Serialize a patch with edits sorted by file then span start.
fn serialize_sorted_patch<S>(patch: &Patch, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut sorted_edits = patch.edits.clone();
    sorted_edits.sort_by(|a, b| match a.file.cmp(&b.file) {
        std::cmp::Ordering::Equal => a.span.start.cmp(&b.span.start),
        other => other,
    });

    let sorted_patch = Patch {
        edits: sorted_edits,
        unified_diff: patch.unified_diff.clone(),
    };

    sorted_patch.serialize(serializer)
}

// ============================================================================
// Response Emission
// ============================================================================

/// Emit a response as pretty-printed JSON to a writer.
///
/// This is the single output path for CLI, ensuring consistency.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::OutputEdit;
    use crate::rules::{MajorVersion, RuleTables};

    fn versions() -> VersionRange {
        VersionRange::new(MajorVersion(5), MajorVersion(7))
    }

    fn edit(file: &str, start: usize) -> OutputEdit {
        OutputEdit {
            file: file.to_string(),
            span: Span::new(start, start + 1),
            old_text: "a".to_string(),
            new_text: "b".to_string(),
            line: 1,
            col: start as u32 + 1,
            unit: None,
        }
    }

    #[test]
    fn status_is_first_field() {
        let response = MigrateResponse::new(
            versions(),
            vec!["selectors".to_string()],
            true,
            Summary::default(),
            Patch::default(),
            vec![],
            None,
        );
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.starts_with("{\"status\":\"ok\""));
        assert!(!json.contains("files_written"));
    }

    #[test]
    fn action_required_status() {
        let summary = Summary {
            action_required: 2,
            ..Summary::default()
        };
        let response = MigrateResponse::new(
            versions(),
            vec![],
            false,
            summary,
            Patch::default(),
            vec![],
            Some(vec![]),
        );
        assert_eq!(response.status, "action_required");
    }

    #[test]
    fn edits_serialize_sorted() {
        let patch = Patch {
            edits: vec![edit("b.ts", 0), edit("a.ts", 5), edit("a.ts", 1)],
            unified_diff: String::new(),
        };
        let response = MigrateResponse::new(
            versions(),
            vec![],
            true,
            Summary::default(),
            patch,
            vec![],
            None,
        );
        let value: serde_json::Value = serde_json::to_value(&response).unwrap();
        let files: Vec<(String, u64)> = value["patch"]["edits"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| {
                (
                    e["file"].as_str().unwrap().to_string(),
                    e["span"]["start"].as_u64().unwrap(),
                )
            })
            .collect();
        assert_eq!(
            files,
            vec![
                ("a.ts".to_string(), 1),
                ("a.ts".to_string(), 5),
                ("b.ts".to_string(), 0)
            ]
        );
    }

    #[test]
    fn error_response_carries_code() {
        let err = UpliftError::file_not_found("src/main.ts");
        let response = ErrorResponse::from_error(&err);
        let mut out = Vec::new();
        emit_response(&response, &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"]["code"], 3);
        assert_eq!(value["error"]["details"]["path"], "src/main.ts");
    }

    #[test]
    fn rules_listing_covers_categories() {
        let tables = RuleTables::builtin().unwrap();
        let all = VersionRange::new(MajorVersion(5), MajorVersion(9));
        let registry = RuleRegistry::for_upgrade(&tables, all);
        let response = RulesResponse::from_registry(versions(), &registry);
        assert!(response
            .rules
            .iter()
            .any(|r| r.category == RuleCategory::ConstructorSignature
                && r.subject == "NativeDateAdapter"
                && r.detail == "(string, Platform)"));
        assert!(response
            .rules
            .iter()
            .any(|r| r.subject == "FocusMonitor.monitor"));
    }

    #[test]
    fn timestamp_is_iso8601() {
        let ts = format_timestamp(SystemTime::UNIX_EPOCH);
        assert_eq!(ts, "1970-01-01T00:00:00Z");
    }
}
