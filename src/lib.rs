//! Uplift: rule-driven migration of application sources across breaking
//! UI library versions.
//!
//! A run scans a source tree, selects the rules and migration units that
//! apply between two library versions, rewrites scripts, templates and
//! stylesheets in place and reports what needs manual follow-up.

// Core infrastructure - re-exported from uplift-core
pub use uplift_core::diagnostics;
pub use uplift_core::error;
pub use uplift_core::output;
pub use uplift_core::patch;
pub use uplift_core::rules;
pub use uplift_core::text;
pub use uplift_core::types;
pub use uplift_core::workspace;

// Script and template front end
pub use uplift_ts as front_end;

pub mod config;
pub mod driver;
pub mod migrations;

// Front door
pub mod cli;

pub use config::{OutputFormat, RunConfig};
pub use driver::{migrate, MigrationReport};
