//! Type resolution for one TypeScript file.
//!
//! Matching decisions that depend on types go through the narrow
//! [`TypeResolver`] trait, so the matcher and the signature checker can be
//! driven by scripted answers in tests.
//!
//! [`FileTypeResolver`] answers from the syntax tree alone:
//! - import bindings, including aliases, default and namespace imports
//! - lexical scopes (program, blocks, functions, `for`, `catch`)
//! - parameter, variable and field annotations, and initializer types
//! - `this.field` including constructor parameter properties
//! - literal types, `new` and `as` expressions
//! - construct signatures of local classes and, for library classes, the
//!   signatures listed in the rule registry
//!
//! Anything else is unresolved. Callers treat unresolved as "no match".

use std::collections::HashMap;
use std::fmt;

use tree_sitter::Node;

use uplift_core::patch::Span;
use uplift_core::rules::RuleRegistry;

use crate::parser::{
    ancestor_of_kind, children, named_children, node_text, span_of, string_value,
    strip_expression,
};

/// Resolution depth limit for chains of `let a = b` initializers.
const MAX_DEPTH: usize = 16;

const FUNCTION_KINDS: &[&str] = &[
    "function_declaration",
    "function_expression",
    "function",
    "generator_function_declaration",
    "generator_function",
    "arrow_function",
    "method_definition",
];

const SCOPE_KINDS: &[&str] = &[
    "program",
    "statement_block",
    "for_statement",
    "for_in_statement",
    "catch_clause",
    "function_declaration",
    "function_expression",
    "function",
    "generator_function_declaration",
    "generator_function",
    "arrow_function",
    "method_definition",
];

const CLASS_KINDS: &[&str] = &["class_declaration", "abstract_class_declaration", "class"];

// ============================================================================
// Public Types
// ============================================================================

/// Identity of a resolved type: its declared name.
///
/// Two types are the same iff their names are equal; assignability is not
/// modelled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub String);

impl TypeId {
    pub fn new(name: impl Into<String>) -> Self {
        TypeId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a name comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationKind {
    /// `import { imported as name } from 'module'` (`imported` is `default`
    /// for default imports).
    Import { module: String, imported: String },
    /// `import * as name from 'module'`
    NamespaceImport { module: String },
    /// A class declared in this file.
    Class,
    /// Any other local declaration.
    Local,
}

/// The declaration an identifier resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclarationKind,
    /// Span of the declaring name.
    pub span: Span,
}

impl Declaration {
    /// Module the name is imported from, if it is an import.
    pub fn module(&self) -> Option<&str> {
        match &self.kind {
            DeclarationKind::Import { module, .. }
            | DeclarationKind::NamespaceImport { module } => Some(module),
            _ => None,
        }
    }
}

/// Answers type questions about nodes of one syntax tree.
pub trait TypeResolver {
    /// Type of an expression, if known.
    fn resolve_type(&self, expr: Node<'_>) -> Option<TypeId>;

    /// Every construct signature of `class_name`, as parameter type lists.
    /// Empty when the class is unknown.
    fn construct_signatures(&self, class_name: &str) -> Vec<Vec<TypeId>>;

    /// Declaration an identifier (or type identifier) refers to.
    fn resolve_declaration(&self, ident: Node<'_>) -> Option<Declaration>;
}

// ============================================================================
// FileTypeResolver
// ============================================================================

#[derive(Debug, Clone)]
struct Binding<'t> {
    kind: DeclarationKind,
    name_node: Node<'t>,
    annotation: Option<Node<'t>>,
    value: Option<Node<'t>>,
}

/// [`TypeResolver`] backed by the syntax tree of one file.
#[derive(Debug)]
pub struct FileTypeResolver<'t> {
    source: &'t str,
    /// Bindings keyed by the id of the node that opens the scope.
    scopes: HashMap<usize, HashMap<String, Binding<'t>>>,
    classes: HashMap<String, Node<'t>>,
    library: HashMap<String, Vec<Vec<TypeId>>>,
}

impl<'t> FileTypeResolver<'t> {
    /// Index the declarations of a parsed file.
    pub fn new(root: Node<'t>, source: &'t str) -> Self {
        let mut resolver = FileTypeResolver {
            source,
            scopes: HashMap::new(),
            classes: HashMap::new(),
            library: HashMap::new(),
        };
        resolver.collect(root);
        resolver
    }

    /// Seed library construct signatures from the registry.
    pub fn with_registry(mut self, registry: &RuleRegistry) -> Self {
        for sig in registry.constructor_signatures() {
            self.library.insert(
                sig.class_name.clone(),
                sig.signatures
                    .iter()
                    .map(|s| s.iter().map(TypeId::new).collect())
                    .collect(),
            );
        }
        self
    }

    fn text(&self, node: Node<'_>) -> &'t str {
        node_text(node, self.source)
    }

    // ------------------------------------------------------------------------
    // Declaration collection
    // ------------------------------------------------------------------------

    fn bind(&mut self, scope: Node<'t>, name_node: Node<'t>, binding_kind: DeclarationKind) {
        self.bind_typed(scope, name_node, binding_kind, None, None);
    }

    fn bind_typed(
        &mut self,
        scope: Node<'t>,
        name_node: Node<'t>,
        kind: DeclarationKind,
        annotation: Option<Node<'t>>,
        value: Option<Node<'t>>,
    ) {
        let name = self.text(name_node).to_string();
        self.scopes.entry(scope.id()).or_default().insert(
            name,
            Binding {
                kind,
                name_node,
                annotation,
                value,
            },
        );
    }

    /// Bind every identifier of a destructuring pattern as a plain local.
    fn bind_pattern(&mut self, scope: Node<'t>, pattern: Node<'t>) {
        match pattern.kind() {
            "identifier" | "shorthand_property_identifier_pattern" => {
                self.bind(scope, pattern, DeclarationKind::Local)
            }
            _ => {
                for child in named_children(pattern) {
                    if child.kind() == "pair_pattern" {
                        if let Some(value) = child.child_by_field_name("value") {
                            self.bind_pattern(scope, value);
                        }
                    } else if child.kind() != "property_identifier" {
                        self.bind_pattern(scope, child);
                    }
                }
            }
        }
    }

    fn collect(&mut self, node: Node<'t>) {
        match node.kind() {
            "import_statement" => self.collect_import(node),
            "class_declaration" | "abstract_class_declaration" => {
                if let Some(name) = node.child_by_field_name("name") {
                    if let Some(scope) = enclosing_scope(node) {
                        self.bind(scope, name, DeclarationKind::Class);
                    }
                    let class_name = self.text(name).to_string();
                    self.classes.insert(class_name, node);
                }
            }
            "function_declaration"
            | "generator_function_declaration"
            | "interface_declaration"
            | "type_alias_declaration"
            | "enum_declaration" => {
                if let (Some(name), Some(scope)) =
                    (node.child_by_field_name("name"), enclosing_scope(node))
                {
                    self.bind(scope, name, DeclarationKind::Local);
                }
            }
            "variable_declarator" => {
                if let (Some(name), Some(scope)) =
                    (node.child_by_field_name("name"), enclosing_scope(node))
                {
                    if name.kind() == "identifier" {
                        self.bind_typed(
                            scope,
                            name,
                            DeclarationKind::Local,
                            node.child_by_field_name("type"),
                            node.child_by_field_name("value"),
                        );
                    } else {
                        self.bind_pattern(scope, name);
                    }
                }
            }
            "required_parameter" | "optional_parameter" => {
                if let (Some(pattern), Some(function)) = (
                    node.child_by_field_name("pattern"),
                    ancestor_of_kind(node, FUNCTION_KINDS),
                ) {
                    if pattern.kind() == "identifier" {
                        self.bind_typed(
                            function,
                            pattern,
                            DeclarationKind::Local,
                            node.child_by_field_name("type"),
                            node.child_by_field_name("value"),
                        );
                    } else {
                        self.bind_pattern(function, pattern);
                    }
                }
            }
            "arrow_function" => {
                if let Some(param) = node.child_by_field_name("parameter") {
                    self.bind(node, param, DeclarationKind::Local);
                }
            }
            "catch_clause" => {
                if let Some(param) = node.child_by_field_name("parameter") {
                    self.bind_pattern(node, param);
                }
            }
            _ => {}
        }
        for child in named_children(node) {
            self.collect(child);
        }
    }

    fn collect_import(&mut self, node: Node<'t>) {
        let Some(module) = node
            .child_by_field_name("source")
            .and_then(|s| string_value(s, self.source))
        else {
            return;
        };
        let Some(scope) = enclosing_scope(node) else {
            return;
        };
        let Some(clause) = named_children(node)
            .into_iter()
            .find(|n| n.kind() == "import_clause")
        else {
            return;
        };
        for part in named_children(clause) {
            match part.kind() {
                "identifier" => self.bind(
                    scope,
                    part,
                    DeclarationKind::Import {
                        module: module.to_string(),
                        imported: "default".to_string(),
                    },
                ),
                "namespace_import" => {
                    if let Some(ident) = named_children(part)
                        .into_iter()
                        .find(|n| n.kind() == "identifier")
                    {
                        self.bind(
                            scope,
                            ident,
                            DeclarationKind::NamespaceImport {
                                module: module.to_string(),
                            },
                        );
                    }
                }
                "named_imports" => {
                    for spec in named_children(part)
                        .into_iter()
                        .filter(|n| n.kind() == "import_specifier")
                    {
                        let Some(name) = spec.child_by_field_name("name") else {
                            continue;
                        };
                        let local = spec.child_by_field_name("alias").unwrap_or(name);
                        self.bind(
                            scope,
                            local,
                            DeclarationKind::Import {
                                module: module.to_string(),
                                imported: import_name(name, self.source).to_string(),
                            },
                        );
                    }
                }
                _ => {}
            }
        }
    }

    // ------------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------------

    fn lookup(&self, name: &str, from: Node<'_>) -> Option<&Binding<'t>> {
        let mut current = Some(from);
        while let Some(node) = current {
            if let Some(binding) = self.scopes.get(&node.id()).and_then(|s| s.get(name)) {
                return Some(binding);
            }
            current = node.parent();
        }
        None
    }

    /// Canonical name of a class referenced by an expression or type name:
    /// the imported name for imports, the written name otherwise.
    pub fn class_name_of(&self, expr: Node<'_>) -> Option<TypeId> {
        let expr = strip_expression(expr);
        match expr.kind() {
            "identifier" | "type_identifier" => {
                let text = self.text(expr);
                match self.lookup(text, expr).map(|b| &b.kind) {
                    Some(DeclarationKind::Import { imported, .. }) if imported != "default" => {
                        Some(TypeId::new(imported.clone()))
                    }
                    Some(DeclarationKind::NamespaceImport { .. }) => None,
                    _ => Some(TypeId::new(text)),
                }
            }
            "member_expression" | "nested_type_identifier" => {
                let field = if expr.kind() == "member_expression" {
                    "property"
                } else {
                    "name"
                };
                expr.child_by_field_name(field)
                    .map(|p| TypeId::new(self.text(p)))
            }
            "generic_type" => expr
                .child_by_field_name("name")
                .and_then(|n| self.class_name_of(n)),
            _ => None,
        }
    }

    /// Type named by a type node.
    pub fn type_to_id(&self, ty: Node<'_>) -> Option<TypeId> {
        match ty.kind() {
            "type_annotation" | "parenthesized_type" => {
                named_children(ty).first().and_then(|t| self.type_to_id(*t))
            }
            "predefined_type" => match self.text(ty) {
                "any" | "unknown" | "never" => None,
                other => Some(TypeId::new(other)),
            },
            "type_identifier" | "nested_type_identifier" | "generic_type" => {
                self.class_name_of(ty)
            }
            "literal_type" => {
                let inner = named_children(ty).into_iter().next()?;
                literal_type(inner.kind()).map(TypeId::new)
            }
            "array_type" => {
                let inner = named_children(ty).into_iter().next()?;
                self.type_to_id(inner).map(|t| TypeId::new(format!("{}[]", t)))
            }
            _ => {
                let normalized: Vec<&str> = self.text(ty).split_whitespace().collect();
                Some(TypeId::new(normalized.join(" ")))
            }
        }
    }

    fn binding_type(&self, binding: &Binding<'t>, depth: usize) -> Option<TypeId> {
        if let Some(annotation) = binding.annotation {
            return self.type_to_id(annotation);
        }
        match binding.kind {
            DeclarationKind::Local => binding
                .value
                .and_then(|v| self.resolve_type_at(v, depth + 1)),
            _ => None,
        }
    }

    /// Type of a member declared on a local class.
    fn member_type(&self, class: Node<'_>, member: &str, depth: usize) -> Option<TypeId> {
        let body = class.child_by_field_name("body")?;
        for item in named_children(body) {
            match item.kind() {
                "public_field_definition" => {
                    let Some(name) = item.child_by_field_name("name") else {
                        continue;
                    };
                    if self.text(name) != member {
                        continue;
                    }
                    if let Some(ty) = item.child_by_field_name("type") {
                        return self.type_to_id(ty);
                    }
                    return item
                        .child_by_field_name("value")
                        .and_then(|v| self.resolve_type_at(v, depth + 1));
                }
                "method_definition" => {
                    let is_constructor = item
                        .child_by_field_name("name")
                        .is_some_and(|n| self.text(n) == "constructor");
                    if !is_constructor {
                        continue;
                    }
                    let Some(params) = item.child_by_field_name("parameters") else {
                        continue;
                    };
                    for param in named_children(params) {
                        let is_property = children(param).iter().any(|c| {
                            c.kind() == "accessibility_modifier" || c.kind() == "readonly"
                        });
                        let matches = param
                            .child_by_field_name("pattern")
                            .is_some_and(|p| self.text(p) == member);
                        if is_property && matches {
                            return param
                                .child_by_field_name("type")
                                .and_then(|t| self.type_to_id(t));
                        }
                    }
                }
                _ => {}
            }
        }
        None
    }

    fn resolve_type_at(&self, expr: Node<'_>, depth: usize) -> Option<TypeId> {
        if depth > MAX_DEPTH {
            return None;
        }
        let expr = strip_expression(expr);
        match expr.kind() {
            "string" | "template_string" => Some(TypeId::new("string")),
            "number" => Some(TypeId::new("number")),
            "true" | "false" => Some(TypeId::new("boolean")),
            "null" => Some(TypeId::new("null")),
            "undefined" => Some(TypeId::new("undefined")),
            "regex" => Some(TypeId::new("RegExp")),
            "new_expression" => expr
                .child_by_field_name("constructor")
                .and_then(|c| self.class_name_of(c)),
            "as_expression" | "satisfies_expression" => {
                let parts = named_children(expr);
                match parts.get(1) {
                    Some(ty) if self.text(*ty) != "const" => self.type_to_id(*ty),
                    // `x as const`
                    _ => self.resolve_type_at(*parts.first()?, depth + 1),
                }
            }
            "type_assertion" => {
                let args = named_children(expr)
                    .into_iter()
                    .find(|n| n.kind() == "type_arguments")?;
                named_children(args)
                    .first()
                    .and_then(|t| self.type_to_id(*t))
            }
            "identifier" => {
                let binding = self.lookup(self.text(expr), expr)?;
                self.binding_type(binding, depth)
            }
            "member_expression" => {
                let object = strip_expression(expr.child_by_field_name("object")?);
                let property = self.text(expr.child_by_field_name("property")?);
                let class = if object.kind() == "this" {
                    ancestor_of_kind(expr, CLASS_KINDS)?
                } else {
                    let owner = self.resolve_type_at(object, depth + 1)?;
                    *self.classes.get(owner.as_str())?
                };
                self.member_type(class, property, depth)
            }
            _ => None,
        }
    }

    fn local_constructor_signatures(&self, class_name: &str, depth: usize) -> Vec<Vec<TypeId>> {
        let Some(class) = self.classes.get(class_name).copied() else {
            return Vec::new();
        };
        let constructors: Vec<Node<'t>> = class
            .child_by_field_name("body")
            .map(named_children)
            .unwrap_or_default()
            .into_iter()
            .filter(|m| {
                m.kind() == "method_definition"
                    && m.child_by_field_name("name")
                        .is_some_and(|n| self.text(n) == "constructor")
            })
            .collect();
        if constructors.is_empty() {
            if depth < MAX_DEPTH {
                if let Some(base) = extends_expression(class) {
                    if let Some(base_name) = self.class_name_of(base) {
                        let inherited = self.construct_signatures_at(base_name.as_str(), depth + 1);
                        if !inherited.is_empty() {
                            return inherited;
                        }
                    }
                }
            }
            return vec![Vec::new()];
        }
        constructors
            .into_iter()
            .filter_map(|ctor| {
                let params = ctor.child_by_field_name("parameters")?;
                named_children(params)
                    .into_iter()
                    .filter(|p| matches!(p.kind(), "required_parameter" | "optional_parameter"))
                    .map(|p| {
                        p.child_by_field_name("type")
                            .and_then(|t| self.type_to_id(t))
                    })
                    .collect::<Option<Vec<TypeId>>>()
            })
            .collect()
    }

    fn construct_signatures_at(&self, class_name: &str, depth: usize) -> Vec<Vec<TypeId>> {
        if let Some(sigs) = self.library.get(class_name) {
            return sigs.clone();
        }
        self.local_constructor_signatures(class_name, depth)
    }
}

impl TypeResolver for FileTypeResolver<'_> {
    fn resolve_type(&self, expr: Node<'_>) -> Option<TypeId> {
        self.resolve_type_at(expr, 0)
    }

    fn construct_signatures(&self, class_name: &str) -> Vec<Vec<TypeId>> {
        self.construct_signatures_at(class_name, 0)
    }

    fn resolve_declaration(&self, ident: Node<'_>) -> Option<Declaration> {
        // The imported name of `import { A as B }` declares nothing itself,
        // and neither does `export { A } from 'module'`.
        if let Some(parent) = ident.parent() {
            let is_specifier_name = matches!(parent.kind(), "import_specifier" | "export_specifier")
                && parent
                    .child_by_field_name("name")
                    .is_some_and(|n| n.id() == ident.id());
            let module = ancestor_of_kind(parent, &["import_statement", "export_statement"])
                .and_then(|s| s.child_by_field_name("source"))
                .and_then(|s| string_value(s, self.source));
            if let (true, Some(module)) = (is_specifier_name, module) {
                return Some(Declaration {
                    name: self.text(ident).to_string(),
                    kind: DeclarationKind::Import {
                        module: module.to_string(),
                        imported: import_name(ident, self.source).to_string(),
                    },
                    span: span_of(ident),
                });
            }
        }
        let name = self.text(ident);
        let binding = self.lookup(name, ident)?;
        Some(Declaration {
            name: name.to_string(),
            kind: binding.kind.clone(),
            span: span_of(binding.name_node),
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn enclosing_scope(node: Node<'_>) -> Option<Node<'_>> {
    ancestor_of_kind(node, SCOPE_KINDS)
}

/// Name of an import specifier's `name`, unquoting string names.
fn import_name<'s>(name: Node<'_>, source: &'s str) -> &'s str {
    string_value(name, source).unwrap_or_else(|| node_text(name, source))
}

fn literal_type(kind: &str) -> Option<&'static str> {
    match kind {
        "string" => Some("string"),
        "number" => Some("number"),
        "true" | "false" => Some("boolean"),
        "null" => Some("null"),
        "undefined" => Some("undefined"),
        _ => None,
    }
}

/// The expression after `extends` in a class heritage clause.
pub fn extends_expression(class: Node<'_>) -> Option<Node<'_>> {
    let heritage = named_children(class)
        .into_iter()
        .find(|n| n.kind() == "class_heritage")?;
    let clause = named_children(heritage)
        .into_iter()
        .find(|n| n.kind() == "extends_clause")?;
    clause
        .child_by_field_name("value")
        .or_else(|| named_children(clause).into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse, Dialect};
    use tree_sitter::Tree;

    fn find<'t>(node: Node<'t>, source: &str, kind: &str, text: &str) -> Option<Node<'t>> {
        if node.kind() == kind && node_text(node, source) == text {
            return Some(node);
        }
        named_children(node)
            .into_iter()
            .find_map(|c| find(c, source, kind, text))
    }

    fn setup(source: &str) -> Tree {
        parse(source, Dialect::TypeScript).unwrap()
    }

    mod declaration_tests {
        use super::*;

        const SOURCE: &str = r#"
import { MatInputContainer, PortalHost as Host } from '@angular/material';
import * as portal from '@angular/cdk/portal';
import Default from 'lib';

function f() {
  class MatInputContainer {}
  return new MatInputContainer();
}
const used = MatInputContainer;
const aliased = Host;
const viaNamespace = portal;
"#;

        #[test]
        fn imports_and_shadowing() {
            let tree = setup(SOURCE);
            let root = tree.root_node();
            let resolver = FileTypeResolver::new(root, SOURCE);

            let used_at = SOURCE.find("= MatInputContainer").unwrap() + 2;
            let used = root.descendant_for_byte_range(used_at, used_at + 1).unwrap();
            let decl = resolver.resolve_declaration(used).unwrap();
            assert_eq!(decl.module(), Some("@angular/material"));

            let shadow_at = SOURCE.find("new MatInputContainer").unwrap() + 4;
            let shadowed = root.descendant_for_byte_range(shadow_at, shadow_at + 1).unwrap();
            assert_eq!(
                resolver.resolve_declaration(shadowed).unwrap().kind,
                DeclarationKind::Class
            );
        }

        #[test]
        fn aliases_resolve_to_imported_name() {
            let tree = setup(SOURCE);
            let root = tree.root_node();
            let resolver = FileTypeResolver::new(root, SOURCE);

            let host = find(root, SOURCE, "identifier", "Host").unwrap();
            let decl = resolver.resolve_declaration(host).unwrap();
            assert_eq!(
                decl.kind,
                DeclarationKind::Import {
                    module: "@angular/material".to_string(),
                    imported: "PortalHost".to_string()
                }
            );

            let imported = find(root, SOURCE, "identifier", "PortalHost").unwrap();
            let decl = resolver.resolve_declaration(imported).unwrap();
            assert_eq!(decl.module(), Some("@angular/material"));

            let ns_at = SOURCE.find("= portal").unwrap() + 2;
            let ns = root.descendant_for_byte_range(ns_at, ns_at + 1).unwrap();
            assert!(matches!(
                resolver.resolve_declaration(ns).unwrap().kind,
                DeclarationKind::NamespaceImport { .. }
            ));
        }
    }

    mod type_tests {
        use super::*;

        const SOURCE: &str = r#"
import { Platform } from '@angular/cdk/platform';
import { NativeDateAdapter as Adapter } from '@angular/material/core';

class Holder {
  field: Platform;
  count = 3;
  constructor(private readonly platform: Platform, plain: string) {}

  make() {
    const locale = 'en-US';
    const copy = locale;
    const n = 4 as number;
    const adapter = new Adapter(locale, this.platform);
    return [this.field, this.count, copy, n, adapter];
  }
}
"#;

        fn type_of(source: &str, needle: &str, offset: usize) -> Option<TypeId> {
            let tree = setup(source);
            let root = tree.root_node();
            let resolver = FileTypeResolver::new(root, source);
            let at = source.rfind(needle).unwrap() + offset;
            let mut node = root
                .descendant_for_byte_range(at, at + needle.len() - offset)
                .unwrap();
            while node_text(node, source) != &needle[offset..] {
                node = node.parent().unwrap();
            }
            resolver.resolve_type(node)
        }

        #[test]
        fn this_fields_and_parameter_properties() {
            assert_eq!(type_of(SOURCE, "this.field", 0), Some(TypeId::new("Platform")));
            assert_eq!(type_of(SOURCE, "this.platform", 0), Some(TypeId::new("Platform")));
            assert_eq!(type_of(SOURCE, "this.count", 0), Some(TypeId::new("number")));
        }

        #[test]
        fn locals_literals_and_assertions() {
            assert_eq!(
                type_of(SOURCE, "[this.field, this.count, copy", 25),
                Some(TypeId::new("string"))
            );
            assert_eq!(type_of(SOURCE, "4 as number", 0), Some(TypeId::new("number")));
        }

        #[test]
        fn new_expression_uses_imported_name() {
            assert_eq!(
                type_of(SOURCE, "new Adapter(locale, this.platform)", 0),
                Some(TypeId::new("NativeDateAdapter"))
            );
        }

        #[test]
        fn local_constructor_signatures() {
            let tree = setup(SOURCE);
            let resolver = FileTypeResolver::new(tree.root_node(), SOURCE);
            assert_eq!(
                resolver.construct_signatures("Holder"),
                vec![vec![TypeId::new("Platform"), TypeId::new("string")]]
            );
            assert!(resolver.construct_signatures("Unknown").is_empty());
        }

        #[test]
        fn library_signatures_come_from_registry() {
            use uplift_core::rules::{MajorVersion, RuleTables, VersionRange};

            let tables = RuleTables::builtin().unwrap();
            let registry = RuleRegistry::for_upgrade(
                &tables,
                VersionRange::new(MajorVersion(6), MajorVersion(7)),
            );
            let tree = setup(SOURCE);
            let resolver = FileTypeResolver::new(tree.root_node(), SOURCE).with_registry(&registry);
            assert_eq!(
                resolver.construct_signatures("NativeDateAdapter"),
                vec![vec![TypeId::new("string"), TypeId::new("Platform")]]
            );
        }
    }
}
