//! Source tree inventory for a migration run.
//!
//! This module collects the files a run looks at:
//! - Deterministic file ordering (sorted by path)
//! - Stable FileId assignment within a tree
//! - Content hashes recorded at read time, checked again on write-back
//!
//! A tree is either scanned from a workspace root or built from an in-memory
//! list of path and contents.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::patch::{ContentHash, FileId};

// ============================================================================
// Source Kinds
// ============================================================================

/// Kinds of files the migration units understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// TypeScript (.ts)
    TypeScript,
    /// TypeScript with JSX (.tsx)
    Tsx,
    /// Component templates (.html)
    Html,
    /// Plain stylesheets (.css)
    Css,
    /// SCSS stylesheets (.scss)
    Scss,
}

impl SourceKind {
    /// Detect kind from file extension. Declaration files are not sources.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if name.ends_with(".d.ts") {
            return None;
        }
        match path.extension()?.to_str()? {
            "ts" => Some(SourceKind::TypeScript),
            "tsx" => Some(SourceKind::Tsx),
            "html" => Some(SourceKind::Html),
            "css" => Some(SourceKind::Css),
            "scss" => Some(SourceKind::Scss),
            _ => None,
        }
    }

    pub fn is_script(&self) -> bool {
        matches!(self, SourceKind::TypeScript | SourceKind::Tsx)
    }

    pub fn is_stylesheet(&self) -> bool {
        matches!(self, SourceKind::Css | SourceKind::Scss)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::TypeScript => write!(f, "typescript"),
            SourceKind::Tsx => write!(f, "tsx"),
            SourceKind::Html => write!(f, "html"),
            SourceKind::Css => write!(f, "css"),
            SourceKind::Scss => write!(f, "scss"),
        }
    }
}

// ============================================================================
// Source Files
// ============================================================================

/// One file of the tree with its original content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub id: FileId,
    /// Relative path from the root (always forward slashes).
    pub path: String,
    pub kind: SourceKind,
    pub text: String,
    /// SHA-256 of `text` as read.
    pub content_hash: ContentHash,
}

// ============================================================================
// Scan Configuration
// ============================================================================

/// Default directories to exclude from scans.
const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    ".angular",
    ".cache",
    "bower_components",
    "coverage",
    "dist",
    "out-tsc",
    "tmp",
    "target",
];

/// Check if a path has a default-excluded directory component.
fn should_exclude(path: &Path) -> bool {
    path.components().any(|component| match component {
        std::path::Component::Normal(name) => {
            let name = name.to_string_lossy();
            DEFAULT_EXCLUDE_DIRS.iter().any(|pattern| name == *pattern)
        }
        _ => false,
    })
}

/// Configuration for scanning a workspace.
#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    /// Glob patterns a file must match (empty = every source file).
    pub include_patterns: Vec<String>,
    /// Glob patterns to exclude (in addition to defaults).
    pub exclude_patterns: Vec<String>,
    /// Whether to follow symlinks.
    pub follow_symlinks: bool,
    /// Maximum file size to include (bytes). Larger files are skipped.
    pub max_file_size: Option<u64>,
}

impl ScanConfig {
    /// Add an include pattern.
    pub fn include(mut self, pattern: &str) -> Self {
        self.include_patterns.push(pattern.to_string());
        self
    }

    /// Add an exclude pattern.
    pub fn exclude(mut self, pattern: &str) -> Self {
        self.exclude_patterns.push(pattern.to_string());
        self
    }

    /// Compile the glob patterns.
    pub fn compile(&self) -> Result<PathFilter, globset::Error> {
        Ok(PathFilter {
            include: build_globset(&self.include_patterns)?,
            exclude: build_globset(&self.exclude_patterns)?,
        })
    }
}

fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>, globset::Error> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(Some(builder.build()?))
}

/// Compiled include/exclude globs.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

impl PathFilter {
    /// Whether a relative path passes the filter.
    pub fn accepts(&self, relative: &str) -> bool {
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(relative) {
                return false;
            }
        }
        match &self.include {
            Some(include) => include.is_match(relative),
            None => true,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while scanning or writing back files.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// An include or exclude pattern is not a valid glob.
    #[error("invalid glob pattern: {0}")]
    Glob(#[from] globset::Error),

    /// The workspace root does not exist.
    #[error("workspace root not found: {}", .0.display())]
    RootNotFound(PathBuf),

    /// The file changed on disk after it was read.
    #[error("{path} changed on disk since it was read")]
    Stale { path: String },

    /// Reading or writing failed.
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

// ============================================================================
// Source Tree
// ============================================================================

/// The files of one run, ordered by path.
#[derive(Debug, Clone, Default)]
pub struct SourceTree {
    root: Option<PathBuf>,
    files: Vec<SourceFile>,
    path_to_id: HashMap<String, FileId>,
    /// Source files found by a scan but not read, with the reason.
    skipped: Vec<SkippedFile>,
}

/// A source file the scan found but could not load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

impl SourceTree {
    /// Scan `root` for source files.
    ///
    /// Files are ordered by path and FileIds follow that order. Files that
    /// are not valid UTF-8 are recorded in [`SourceTree::skipped`].
    pub fn scan(root: &Path, config: &ScanConfig) -> Result<Self, WorkspaceError> {
        let root = root
            .canonicalize()
            .map_err(|_| WorkspaceError::RootNotFound(root.to_path_buf()))?;
        let filter = config.compile()?;
        let mut entries: Vec<(String, SourceKind, String)> = Vec::new();
        let mut skipped = Vec::new();

        for entry in WalkDir::new(&root)
            .follow_links(config.follow_symlinks)
            .into_iter()
            .filter_entry(|e| !should_exclude(e.path().strip_prefix(&root).unwrap_or(e.path())))
        {
            let entry = entry.map_err(|e| WorkspaceError::Io {
                path: root.display().to_string(),
                source: io::Error::other(e),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let full_path = entry.path();
            let Some(kind) = SourceKind::from_path(full_path) else {
                continue;
            };
            let relative = full_path
                .strip_prefix(&root)
                .unwrap_or(full_path)
                .to_string_lossy()
                .replace(std::path::MAIN_SEPARATOR, "/");
            if !filter.accepts(&relative) {
                continue;
            }
            if let Some(max_size) = config.max_file_size {
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                if size > max_size {
                    debug!(path = %relative, size, "skipping oversized file");
                    continue;
                }
            }
            let bytes = fs::read(full_path).map_err(|source| WorkspaceError::Io {
                path: relative.clone(),
                source,
            })?;
            match String::from_utf8(bytes) {
                Ok(text) => entries.push((relative, kind, text)),
                Err(err) => {
                    warn!(path = %relative, "skipping file that is not valid UTF-8");
                    skipped.push(SkippedFile {
                        path: relative,
                        reason: format!("not valid UTF-8 ({})", err.utf8_error()),
                    });
                }
            }
        }

        let mut tree = SourceTree::from_entries(entries);
        skipped.sort_by(|a: &SkippedFile, b| a.path.cmp(&b.path));
        tree.root = Some(root);
        tree.skipped = skipped;
        Ok(tree)
    }

    /// Build a tree from in-memory `(path, contents)` pairs.
    ///
    /// Paths whose extension is not a source kind are ignored.
    pub fn from_files<P, T>(files: impl IntoIterator<Item = (P, T)>) -> Self
    where
        P: Into<String>,
        T: Into<String>,
    {
        let entries = files
            .into_iter()
            .filter_map(|(path, text)| {
                let path: String = path.into();
                let kind = SourceKind::from_path(Path::new(&path))?;
                Some((path, kind, text.into()))
            })
            .collect();
        SourceTree::from_entries(entries)
    }

    fn from_entries(mut entries: Vec<(String, SourceKind, String)>) -> Self {
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.dedup_by(|a, b| a.0 == b.0);

        let files: Vec<SourceFile> = entries
            .into_iter()
            .enumerate()
            .map(|(idx, (path, kind, text))| SourceFile {
                id: FileId::new(idx as u32),
                content_hash: ContentHash::compute(text.as_bytes()),
                path,
                kind,
                text,
            })
            .collect();
        let path_to_id = files.iter().map(|f| (f.path.clone(), f.id)).collect();

        SourceTree {
            root: None,
            files,
            path_to_id,
            skipped: Vec::new(),
        }
    }

    /// Root directory, when the tree was scanned from disk.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    /// Source files the scan could not load, ordered by path.
    pub fn skipped(&self) -> &[SkippedFile] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn file(&self, id: FileId) -> Option<&SourceFile> {
        self.files.get(id.0 as usize)
    }

    pub fn file_id(&self, path: &str) -> Option<FileId> {
        self.path_to_id.get(path).copied()
    }

    pub fn file_by_path(&self, path: &str) -> Option<&SourceFile> {
        self.file_id(path).and_then(|id| self.file(id))
    }

    /// Write new content for `id`, refusing if the file on disk no longer
    /// matches what was read.
    ///
    /// Trees built in memory have no root and nothing is written.
    pub fn write_back(&self, id: FileId, new_text: &str) -> Result<bool, WorkspaceError> {
        let (Some(root), Some(file)) = (self.root.as_deref(), self.file(id)) else {
            return Ok(false);
        };
        let full_path = root.join(&file.path);
        let io_err = |source| WorkspaceError::Io {
            path: file.path.clone(),
            source,
        };

        let current = fs::read(&full_path).map_err(io_err)?;
        if ContentHash::compute(&current) != file.content_hash {
            return Err(WorkspaceError::Stale {
                path: file.path.clone(),
            });
        }
        fs::write(&full_path, new_text).map_err(io_err)?;
        Ok(true)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, rel: &str, content: &str) {
        let path = dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    mod kind_tests {
        use super::*;

        #[test]
        fn detects_source_kinds() {
            assert_eq!(
                SourceKind::from_path(Path::new("a/app.component.ts")),
                Some(SourceKind::TypeScript)
            );
            assert_eq!(
                SourceKind::from_path(Path::new("a/app.component.scss")),
                Some(SourceKind::Scss)
            );
            assert_eq!(SourceKind::from_path(Path::new("typings.d.ts")), None);
            assert_eq!(SourceKind::from_path(Path::new("package.json")), None);
        }
    }

    mod scan_tests {
        use super::*;

        #[test]
        fn scan_orders_by_path_and_skips_defaults() {
            let dir = TempDir::new().unwrap();
            write(&dir, "src/b.ts", "b");
            write(&dir, "src/a.html", "a");
            write(&dir, "node_modules/lib/index.ts", "x");
            write(&dir, "dist/main.js", "x");
            write(&dir, "README.md", "x");

            let tree = SourceTree::scan(dir.path(), &ScanConfig::default()).unwrap();
            let paths: Vec<&str> = tree.files().iter().map(|f| f.path.as_str()).collect();
            assert_eq!(paths, vec!["src/a.html", "src/b.ts"]);
            assert_eq!(tree.file_id("src/b.ts"), Some(FileId::new(1)));
        }

        #[test]
        fn scan_applies_globs() {
            let dir = TempDir::new().unwrap();
            write(&dir, "src/app/a.ts", "a");
            write(&dir, "src/app/a.spec.ts", "a");
            write(&dir, "e2e/b.ts", "b");

            let config = ScanConfig::default()
                .include("src/**")
                .exclude("**/*.spec.ts");
            let tree = SourceTree::scan(dir.path(), &config).unwrap();
            let paths: Vec<&str> = tree.files().iter().map(|f| f.path.as_str()).collect();
            assert_eq!(paths, vec!["src/app/a.ts"]);
        }

        #[test]
        fn non_utf8_files_are_recorded_as_skipped() {
            let dir = TempDir::new().unwrap();
            write(&dir, "src/a.ts", "a");
            fs::write(dir.path().join("src/legacy.css"), [0xff, 0xfe, b'x']).unwrap();

            let tree = SourceTree::scan(dir.path(), &ScanConfig::default()).unwrap();
            assert_eq!(tree.len(), 1);
            assert_eq!(tree.skipped().len(), 1);
            assert_eq!(tree.skipped()[0].path, "src/legacy.css");
            assert!(tree.skipped()[0].reason.contains("UTF-8"));
        }

        #[test]
        fn invalid_glob_is_an_error() {
            let dir = TempDir::new().unwrap();
            let config = ScanConfig::default().exclude("src/[");
            assert!(matches!(
                SourceTree::scan(dir.path(), &config),
                Err(WorkspaceError::Glob(_))
            ));
        }

        #[test]
        fn missing_root_is_reported() {
            let err = SourceTree::scan(Path::new("/definitely/not/here"), &ScanConfig::default())
                .unwrap_err();
            assert!(matches!(err, WorkspaceError::RootNotFound(_)));
        }
    }

    mod write_back_tests {
        use super::*;

        #[test]
        fn writes_when_unchanged() {
            let dir = TempDir::new().unwrap();
            write(&dir, "src/a.ts", "old");
            let tree = SourceTree::scan(dir.path(), &ScanConfig::default()).unwrap();
            let id = tree.file_id("src/a.ts").unwrap();
            assert!(tree.write_back(id, "new").unwrap());
            assert_eq!(fs::read_to_string(dir.path().join("src/a.ts")).unwrap(), "new");
        }

        #[test]
        fn refuses_stale_file() {
            let dir = TempDir::new().unwrap();
            write(&dir, "src/a.ts", "old");
            let tree = SourceTree::scan(dir.path(), &ScanConfig::default()).unwrap();
            write(&dir, "src/a.ts", "edited elsewhere");
            let id = tree.file_id("src/a.ts").unwrap();
            assert!(matches!(
                tree.write_back(id, "new"),
                Err(WorkspaceError::Stale { .. })
            ));
            assert_eq!(
                fs::read_to_string(dir.path().join("src/a.ts")).unwrap(),
                "edited elsewhere"
            );
        }

        #[test]
        fn in_memory_tree_never_writes() {
            let tree = SourceTree::from_files([("src/a.ts", "x"), ("notes.txt", "y")]);
            assert_eq!(tree.len(), 1);
            assert!(!tree.write_back(FileId::new(0), "z").unwrap());
        }
    }
}
