//! Core infrastructure for uplift.
//!
//! This crate provides the language-agnostic parts of a migration run:
//! - Rule tables and the per-run rule registry
//! - Patch IR: byte-span edits, per-file commit, diff materialization
//! - Diagnostics and their reporter
//! - Source tree scanning and guarded write-back
//! - Error types, exit codes and JSON output types

pub mod diagnostics;
pub mod error;
pub mod output;
pub mod patch;
pub mod rules;
pub mod text;
pub mod types;
pub mod workspace;
