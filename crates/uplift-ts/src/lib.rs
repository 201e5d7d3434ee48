//! TypeScript, template and stylesheet front-end for uplift.
//!
//! Scripts are parsed with tree-sitter; templates and stylesheets use small
//! hand-written scanners that only report what renames need (tags,
//! attribute names and values, selector preludes).
//!
//! - [`parser`]: tree-sitter parsing and node helpers
//! - [`resolver`]: the [`TypeResolver`](resolver::TypeResolver) seam and the
//!   syntax-backed [`FileTypeResolver`](resolver::FileTypeResolver)
//! - [`matcher`]: candidate discovery and the rule dispatch table
//! - [`signature`]: constructor signature checks

pub mod decorator;
pub mod matcher;
pub mod parser;
pub mod resolver;
pub mod selector;
pub mod signature;
pub mod stylesheet;
pub mod template;
pub mod testing;

pub use matcher::{Candidate, Matcher, Origin, Outcome, SyntaxCandidates};
pub use parser::{parse, Dialect, ParseError};
pub use resolver::{Declaration, DeclarationKind, FileTypeResolver, TypeId, TypeResolver};
pub use signature::{SignatureChecker, SignatureMismatch};
