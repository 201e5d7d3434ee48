//! Error types and error code constants for uplift.
//!
//! `UpliftError` is the single process-level error type. Subsystem errors
//! (rule data, parsing, I/O) bridge into it with `From` impls, and
//! `OutputErrorCode` turns it into a stable exit code.
//!
//! ## Error Code Mapping
//!
//! - `2`: Invalid arguments (bad versions, malformed rule tables)
//! - `3`: Resolution errors (workspace or bootstrap file not found)
//! - `4`: Apply errors (write-back failed or file changed on disk)
//! - `5`: Action required (the run finished but left diagnostics needing a human)
//! - `10`: Internal errors (bugs, unexpected state)

use std::fmt;

use thiserror::Error;

use crate::rules::RuleError;
use crate::workspace::WorkspaceError;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Error codes for JSON output.
///
/// These codes map to CLI exit codes and appear in JSON error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments from caller (bad input, malformed request).
    InvalidArguments = 2,
    /// Resolution errors (file or directory not found).
    ResolutionError = 3,
    /// Apply errors (failed to write changes, stale content).
    ApplyError = 4,
    /// Diagnostics that need manual follow-up remain.
    ActionRequired = 5,
    /// Internal errors (bugs, unexpected state).
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for CLI output.
#[derive(Debug, Error)]
pub enum UpliftError {
    /// Invalid arguments from caller.
    #[error("invalid arguments: {message}")]
    InvalidArguments {
        message: String,
        details: Option<serde_json::Value>,
    },

    /// Rule tables could not be loaded.
    #[error("rule data: {0}")]
    Rules(#[from] RuleError),

    /// File or directory not found.
    #[error("file not found: {path}")]
    FileNotFound { path: String },

    /// Failed to write changes.
    #[error("apply error: {message}")]
    ApplyError {
        message: String,
        file: Option<String>,
    },

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    InternalError { message: String },
}

// ============================================================================
// Error Code Mapping
// ============================================================================

impl From<&UpliftError> for OutputErrorCode {
    fn from(err: &UpliftError) -> Self {
        match err {
            UpliftError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            UpliftError::Rules(_) => OutputErrorCode::InvalidArguments,
            UpliftError::FileNotFound { .. } => OutputErrorCode::ResolutionError,
            UpliftError::ApplyError { .. } => OutputErrorCode::ApplyError,
            UpliftError::InternalError { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<UpliftError> for OutputErrorCode {
    fn from(err: UpliftError) -> Self {
        OutputErrorCode::from(&err)
    }
}

impl From<std::io::Error> for UpliftError {
    fn from(err: std::io::Error) -> Self {
        UpliftError::InternalError {
            message: format!("IO error: {}", err),
        }
    }
}

impl From<WorkspaceError> for UpliftError {
    fn from(err: WorkspaceError) -> Self {
        match err {
            WorkspaceError::Glob(e) => {
                UpliftError::invalid_args(format!("invalid glob pattern: {}", e))
            }
            WorkspaceError::RootNotFound(path) => UpliftError::FileNotFound {
                path: path.display().to_string(),
            },
            WorkspaceError::Stale { path } => UpliftError::ApplyError {
                message: format!("{} changed on disk since it was read", path),
                file: Some(path),
            },
            WorkspaceError::Io { path, source } => UpliftError::InternalError {
                message: format!("IO error on {}: {}", path, source),
            },
        }
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl UpliftError {
    /// Create an invalid arguments error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        UpliftError::InvalidArguments {
            message: message.into(),
            details: None,
        }
    }

    /// Create a file not found error.
    pub fn file_not_found(path: impl Into<String>) -> Self {
        UpliftError::FileNotFound { path: path.into() }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        UpliftError::InternalError {
            message: message.into(),
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}

// ============================================================================
// Tests
// ============================================================================
