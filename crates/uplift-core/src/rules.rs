//! Versioned rule tables and the per-run rule registry.
//!
//! Rule data is stored as one JSON table per [`RuleCategory`]. Each table maps
//! a major library version to the entries introduced by that version:
//!
//! ```json
//! { "6": [ { "old": "mat-input-container", "new": "mat-form-field" } ] }
//! ```
//!
//! [`RuleTables`] holds every loaded entry regardless of version.
//! [`RuleRegistry::for_upgrade`] selects the entries an upgrade spans and
//! indexes them for O(1) lookup. The registry is immutable once built and is
//! shared by reference across worker threads.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while loading rule data.
#[derive(Debug, Error)]
pub enum RuleError {
    /// A table is not valid JSON or has the wrong shape.
    #[error("malformed {category} table: {source}")]
    Json {
        category: RuleCategory,
        #[source]
        source: serde_json::Error,
    },

    /// A version key could not be parsed.
    #[error("invalid version '{text}'")]
    InvalidVersion { text: String },

    /// A table file name does not name a category.
    #[error("unknown rule category '{name}'")]
    UnknownCategory { name: String },

    /// The same key appears twice across the loaded tables.
    #[error("duplicate {category} rule for '{name}'")]
    DuplicateRule { category: RuleCategory, name: String },

    /// An entry is structurally valid JSON but unusable.
    #[error("invalid {category} entry: {message}")]
    InvalidEntry {
        category: RuleCategory,
        message: String,
    },

    /// A table file could not be read.
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// Categories and Versions
// ============================================================================

/// The closed set of rule categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleCategory {
    AttributeSelector,
    ElementSelector,
    CssSelector,
    ClassName,
    InputName,
    OutputName,
    PropertyName,
    MethodCall,
    ConstructorSignature,
}

impl RuleCategory {
    /// Every category, in table order.
    pub const ALL: [RuleCategory; 9] = [
        RuleCategory::AttributeSelector,
        RuleCategory::ElementSelector,
        RuleCategory::CssSelector,
        RuleCategory::ClassName,
        RuleCategory::InputName,
        RuleCategory::OutputName,
        RuleCategory::PropertyName,
        RuleCategory::MethodCall,
        RuleCategory::ConstructorSignature,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCategory::AttributeSelector => "attribute-selector",
            RuleCategory::ElementSelector => "element-selector",
            RuleCategory::CssSelector => "css-selector",
            RuleCategory::ClassName => "class-name",
            RuleCategory::InputName => "input-name",
            RuleCategory::OutputName => "output-name",
            RuleCategory::PropertyName => "property-name",
            RuleCategory::MethodCall => "method-call",
            RuleCategory::ConstructorSignature => "constructor-signature",
        }
    }

    /// File stem of the table holding this category (`<stem>.json`).
    pub fn table_name(&self) -> &'static str {
        match self {
            RuleCategory::AttributeSelector => "attribute_selectors",
            RuleCategory::ElementSelector => "element_selectors",
            RuleCategory::CssSelector => "css_selectors",
            RuleCategory::ClassName => "class_names",
            RuleCategory::InputName => "input_names",
            RuleCategory::OutputName => "output_names",
            RuleCategory::PropertyName => "property_names",
            RuleCategory::MethodCall => "method_call_checks",
            RuleCategory::ConstructorSignature => "constructor_signatures",
        }
    }

    /// Whether the category matches components of selector lists.
    pub fn is_selector(&self) -> bool {
        matches!(
            self,
            RuleCategory::AttributeSelector
                | RuleCategory::ElementSelector
                | RuleCategory::CssSelector
        )
    }

    /// Whether the category's entries are plain `old -> new` renames.
    pub fn is_rename(&self) -> bool {
        !matches!(
            self,
            RuleCategory::MethodCall | RuleCategory::ConstructorSignature
        )
    }
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleCategory {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RuleCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s || c.table_name() == s)
            .ok_or_else(|| RuleError::UnknownCategory {
                name: s.to_string(),
            })
    }
}

/// A library major version.
///
/// `7`, `v7` and `7.2.1` all parse to major 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MajorVersion(pub u32);

impl fmt::Display for MajorVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl FromStr for MajorVersion {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        let major = digits.split('.').next().unwrap_or("");
        major
            .parse::<u32>()
            .map(MajorVersion)
            .map_err(|_| RuleError::InvalidVersion {
                text: s.to_string(),
            })
    }
}

/// The versions an upgrade crosses: `from < v <= to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRange {
    pub from: MajorVersion,
    pub to: MajorVersion,
}

impl VersionRange {
    pub fn new(from: MajorVersion, to: MajorVersion) -> Self {
        VersionRange { from, to }
    }

    /// Whether upgrading across this range passes through `version`.
    pub fn spans(&self, version: MajorVersion) -> bool {
        self.from < version && version <= self.to
    }

    /// Whether the range crosses any version at all.
    pub fn is_empty(&self) -> bool {
        self.from >= self.to
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

// ============================================================================
// Rule Types
// ============================================================================

/// Optional restrictions on where a rename applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitedTo {
    /// Template element tags (input/output names).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<String>,
    /// Template attributes that must be present on the element (input/output names).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<String>,
    /// Receiver classes (property names).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
}

impl LimitedTo {
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.attributes.is_empty() && self.classes.is_empty()
    }

    /// Whether a template element qualifies.
    ///
    /// With neither `elements` nor `attributes` set every element qualifies;
    /// otherwise the tag must be listed or one of the attributes present.
    pub fn allows_element<'a>(
        &self,
        tag: &str,
        mut attributes: impl Iterator<Item = &'a str>,
    ) -> bool {
        if self.elements.is_empty() && self.attributes.is_empty() {
            return true;
        }
        if self.elements.iter().any(|e| e.eq_ignore_ascii_case(tag)) {
            return true;
        }
        attributes.any(|a| self.attributes.iter().any(|want| want.eq_ignore_ascii_case(a)))
    }

    /// Whether a receiver class qualifies.
    pub fn allows_class(&self, class_name: &str) -> bool {
        self.classes.iter().any(|c| c == class_name)
    }
}

/// A rename of one public identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierRule {
    pub category: RuleCategory,
    pub old_name: String,
    pub new_name: String,
    pub applies_from_version: MajorVersion,
    #[serde(default, skip_serializing_if = "LimitedTo::is_empty")]
    pub limited_to: LimitedTo,
}

/// Valid construct signatures for a library class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructorSignature {
    pub class_name: String,
    /// Each overload as an ordered list of type names.
    pub signatures: Vec<Vec<String>>,
    pub applies_from_version: MajorVersion,
}

/// An argument count that is no longer accepted, with guidance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidArgCount {
    pub count: usize,
    pub message: String,
}

/// Method-call arity check for a library class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodCallCheck {
    pub class_name: String,
    pub method: String,
    pub invalid_arg_counts: Vec<InvalidArgCount>,
    pub applies_from_version: MajorVersion,
}

impl MethodCallCheck {
    /// Guidance for a call with `count` arguments, if that count is invalid.
    pub fn invalid_count(&self, count: usize) -> Option<&InvalidArgCount> {
        self.invalid_arg_counts.iter().find(|c| c.count == count)
    }
}

// ============================================================================
// Table Parsing
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RenameEntry {
    old: String,
    new: String,
    #[serde(default)]
    limited_to: LimitedTo,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SignatureEntry {
    class_name: String,
    signatures: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MethodCheckEntry {
    class_name: String,
    method: String,
    invalid_arg_counts: Vec<InvalidArgCount>,
}

fn parse_table<T: for<'de> Deserialize<'de>>(
    category: RuleCategory,
    text: &str,
) -> Result<Vec<(MajorVersion, T)>, RuleError> {
    let raw: BTreeMap<String, Vec<T>> =
        serde_json::from_str(text).map_err(|source| RuleError::Json { category, source })?;
    let mut entries = Vec::new();
    for (version, list) in raw {
        let version: MajorVersion = version.parse()?;
        entries.extend(list.into_iter().map(|entry| (version, entry)));
    }
    Ok(entries)
}

fn require_name(category: RuleCategory, field: &str, value: &str) -> Result<(), RuleError> {
    if value.trim().is_empty() {
        return Err(RuleError::InvalidEntry {
            category,
            message: format!("empty '{}'", field),
        });
    }
    Ok(())
}

const BUILTIN_TABLES: [(RuleCategory, &str); 9] = [
    (
        RuleCategory::AttributeSelector,
        include_str!("../rules/attribute_selectors.json"),
    ),
    (
        RuleCategory::ElementSelector,
        include_str!("../rules/element_selectors.json"),
    ),
    (
        RuleCategory::CssSelector,
        include_str!("../rules/css_selectors.json"),
    ),
    (
        RuleCategory::ClassName,
        include_str!("../rules/class_names.json"),
    ),
    (
        RuleCategory::InputName,
        include_str!("../rules/input_names.json"),
    ),
    (
        RuleCategory::OutputName,
        include_str!("../rules/output_names.json"),
    ),
    (
        RuleCategory::PropertyName,
        include_str!("../rules/property_names.json"),
    ),
    (
        RuleCategory::MethodCall,
        include_str!("../rules/method_call_checks.json"),
    ),
    (
        RuleCategory::ConstructorSignature,
        include_str!("../rules/constructor_signatures.json"),
    ),
];

// ============================================================================
// RuleTables
// ============================================================================

/// Every loaded rule, across all versions.
#[derive(Debug, Clone, Default)]
pub struct RuleTables {
    renames: Vec<IdentifierRule>,
    constructors: Vec<ConstructorSignature>,
    method_checks: Vec<MethodCallCheck>,
}

impl RuleTables {
    /// The tables shipped with uplift.
    pub fn builtin() -> Result<Self, RuleError> {
        let mut tables = RuleTables::default();
        for (category, text) in BUILTIN_TABLES {
            tables.merge(RuleTables::from_json(category, text)?)?;
        }
        Ok(tables)
    }

    /// Parse one category table.
    pub fn from_json(category: RuleCategory, text: &str) -> Result<Self, RuleError> {
        let mut tables = RuleTables::default();
        match category {
            RuleCategory::ConstructorSignature => {
                for (version, entry) in parse_table::<SignatureEntry>(category, text)? {
                    require_name(category, "class_name", &entry.class_name)?;
                    if entry.signatures.is_empty() {
                        return Err(RuleError::InvalidEntry {
                            category,
                            message: format!("'{}' lists no signatures", entry.class_name),
                        });
                    }
                    tables.constructors.push(ConstructorSignature {
                        class_name: entry.class_name,
                        signatures: entry.signatures,
                        applies_from_version: version,
                    });
                }
            }
            RuleCategory::MethodCall => {
                for (version, entry) in parse_table::<MethodCheckEntry>(category, text)? {
                    require_name(category, "class_name", &entry.class_name)?;
                    require_name(category, "method", &entry.method)?;
                    tables.method_checks.push(MethodCallCheck {
                        class_name: entry.class_name,
                        method: entry.method,
                        invalid_arg_counts: entry.invalid_arg_counts,
                        applies_from_version: version,
                    });
                }
            }
            _ => {
                for (version, entry) in parse_table::<RenameEntry>(category, text)? {
                    require_name(category, "old", &entry.old)?;
                    require_name(category, "new", &entry.new)?;
                    tables.renames.push(IdentifierRule {
                        category,
                        old_name: entry.old,
                        new_name: entry.new,
                        applies_from_version: version,
                        limited_to: entry.limited_to,
                    });
                }
            }
        }
        tables.check_unique()?;
        Ok(tables)
    }

    /// Load every `<category>.json` in `dir`.
    ///
    /// Other files are ignored; a JSON file whose stem names no category is
    /// an error.
    pub fn load_dir(dir: &Path) -> Result<Self, RuleError> {
        let io_err = |source| RuleError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(io_err)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut tables = RuleTables::default();
        for path in paths {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            let category: RuleCategory = stem.parse()?;
            let text = std::fs::read_to_string(&path).map_err(|source| RuleError::Io {
                path: path.clone(),
                source,
            })?;
            debug!(path = %path.display(), %category, "loading rule table");
            tables.merge(RuleTables::from_json(category, &text)?)?;
        }
        Ok(tables)
    }

    /// Union with another set of tables. Shared keys are an error.
    pub fn merge(&mut self, other: RuleTables) -> Result<(), RuleError> {
        self.renames.extend(other.renames);
        self.constructors.extend(other.constructors);
        self.method_checks.extend(other.method_checks);
        self.check_unique()
    }

    fn check_unique(&self) -> Result<(), RuleError> {
        let mut seen = HashSet::new();
        for rule in &self.renames {
            if !seen.insert((rule.category, rule.old_name.as_str(), "")) {
                return Err(RuleError::DuplicateRule {
                    category: rule.category,
                    name: rule.old_name.clone(),
                });
            }
        }
        for sig in &self.constructors {
            if !seen.insert((RuleCategory::ConstructorSignature, sig.class_name.as_str(), "")) {
                return Err(RuleError::DuplicateRule {
                    category: RuleCategory::ConstructorSignature,
                    name: sig.class_name.clone(),
                });
            }
        }
        for check in &self.method_checks {
            if !seen.insert((
                RuleCategory::MethodCall,
                check.class_name.as_str(),
                check.method.as_str(),
            )) {
                return Err(RuleError::DuplicateRule {
                    category: RuleCategory::MethodCall,
                    name: format!("{}.{}", check.class_name, check.method),
                });
            }
        }
        Ok(())
    }

    /// Number of entries across all categories.
    pub fn len(&self) -> usize {
        self.renames.len() + self.constructors.len() + self.method_checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// RuleRegistry
// ============================================================================

/// Rules selected for one upgrade, indexed for lookup.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    renames: HashMap<RuleCategory, HashMap<String, IdentifierRule>>,
    constructors: HashMap<String, ConstructorSignature>,
    method_checks: HashMap<String, HashMap<String, MethodCallCheck>>,
}

impl RuleRegistry {
    /// Select the rules whose version the upgrade crosses.
    ///
    /// Rename chains are collapsed here: when `A -> B` at v6 and `B -> C` at
    /// v7 are both selected, `A` maps straight to `C`.
    pub fn for_upgrade(tables: &RuleTables, range: VersionRange) -> Self {
        let mut registry = RuleRegistry::default();

        for rule in tables
            .renames
            .iter()
            .filter(|r| range.spans(r.applies_from_version))
        {
            registry
                .renames
                .entry(rule.category)
                .or_default()
                .insert(rule.old_name.clone(), rule.clone());
        }
        for sig in tables
            .constructors
            .iter()
            .filter(|s| range.spans(s.applies_from_version))
        {
            registry
                .constructors
                .insert(sig.class_name.clone(), sig.clone());
        }
        for check in tables
            .method_checks
            .iter()
            .filter(|c| range.spans(c.applies_from_version))
        {
            registry
                .method_checks
                .entry(check.class_name.clone())
                .or_default()
                .insert(check.method.clone(), check.clone());
        }

        for rules in registry.renames.values_mut() {
            resolve_chains(rules);
        }

        debug!(
            %range,
            renames = registry.renames.values().map(HashMap::len).sum::<usize>(),
            constructors = registry.constructors.len(),
            method_checks = registry.method_checks.values().map(HashMap::len).sum::<usize>(),
            "rule registry built"
        );
        registry
    }

    /// Exact-name lookup.
    pub fn lookup(&self, category: RuleCategory, old_name: &str) -> Option<&IdentifierRule> {
        self.renames.get(&category)?.get(old_name)
    }

    /// Whether any rule of `category` was selected.
    pub fn has_category(&self, category: RuleCategory) -> bool {
        match category {
            RuleCategory::ConstructorSignature => !self.constructors.is_empty(),
            RuleCategory::MethodCall => !self.method_checks.is_empty(),
            _ => self.renames.get(&category).is_some_and(|m| !m.is_empty()),
        }
    }

    /// Rename rules of one category, sorted by old name.
    pub fn rules(&self, category: RuleCategory) -> Vec<&IdentifierRule> {
        let mut rules: Vec<&IdentifierRule> = self
            .renames
            .get(&category)
            .map(|m| m.values().collect())
            .unwrap_or_default();
        rules.sort_by(|a, b| a.old_name.cmp(&b.old_name));
        rules
    }

    pub fn constructor_signature(&self, class_name: &str) -> Option<&ConstructorSignature> {
        self.constructors.get(class_name)
    }

    /// Constructor tables sorted by class name.
    pub fn constructor_signatures(&self) -> Vec<&ConstructorSignature> {
        let mut sigs: Vec<_> = self.constructors.values().collect();
        sigs.sort_by(|a, b| a.class_name.cmp(&b.class_name));
        sigs
    }

    pub fn method_check(&self, class_name: &str, method: &str) -> Option<&MethodCallCheck> {
        self.method_checks.get(class_name)?.get(method)
    }

    /// Whether any method on `method` name is checked, for any class.
    pub fn checks_method(&self, method: &str) -> bool {
        self.method_checks.values().any(|m| m.contains_key(method))
    }

    /// Method checks sorted by class then method.
    pub fn method_checks(&self) -> Vec<&MethodCallCheck> {
        let mut checks: Vec<_> = self
            .method_checks
            .values()
            .flat_map(HashMap::values)
            .collect();
        checks.sort_by(|a, b| (&a.class_name, &a.method).cmp(&(&b.class_name, &b.method)));
        checks
    }

    /// Total number of selected entries.
    pub fn len(&self) -> usize {
        self.renames.values().map(HashMap::len).sum::<usize>()
            + self.constructors.len()
            + self.method_checks.values().map(HashMap::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Follow `old -> new` links to their end.
///
/// A link is only followed into a strictly later version: a name introduced
/// by a rename is a new identifier and only later renames can apply to it.
fn resolve_chains(rules: &mut HashMap<String, IdentifierRule>) {
    let resolved: Vec<(String, String)> = rules
        .values()
        .filter_map(|rule| {
            let mut current = rule;
            let mut visited = HashSet::new();
            visited.insert(rule.old_name.as_str());
            while let Some(next) = rules.get(&current.new_name) {
                if next.applies_from_version <= current.applies_from_version
                    || !visited.insert(next.old_name.as_str())
                {
                    break;
                }
                current = next;
            }
            (current.new_name != rule.new_name)
                .then(|| (rule.old_name.clone(), current.new_name.clone()))
        })
        .collect();

    for (old_name, new_name) in resolved {
        if new_name == old_name {
            // Renamed and later renamed back: nothing to do for this upgrade.
            rules.remove(&old_name);
        } else if let Some(rule) = rules.get_mut(&old_name) {
            rule.new_name = new_name;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
