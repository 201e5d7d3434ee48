//! Scripted type resolution for tests.
//!
//! `ScriptedResolver` answers every question by the source text of the node
//! asked about, so a test can state "`this.platform` is a `Platform`" without
//! writing the declarations that would make it so.

use std::collections::HashMap;

use tree_sitter::Node;

use crate::parser::{node_text, span_of};
use crate::resolver::{Declaration, DeclarationKind, TypeId, TypeResolver};

/// A [`TypeResolver`] with fixed answers keyed by node text.
#[derive(Debug, Default, Clone)]
pub struct ScriptedResolver<'s> {
    source: &'s str,
    types: HashMap<String, TypeId>,
    signatures: HashMap<String, Vec<Vec<TypeId>>>,
    declarations: HashMap<String, DeclarationKind>,
}

impl<'s> ScriptedResolver<'s> {
    pub fn new(source: &'s str) -> Self {
        ScriptedResolver {
            source,
            ..ScriptedResolver::default()
        }
    }

    /// Expressions written as `expr` have type `ty`.
    pub fn with_type(mut self, expr: &str, ty: &str) -> Self {
        self.types.insert(expr.to_string(), TypeId::new(ty));
        self
    }

    /// Construct signatures of `class_name`.
    pub fn with_signatures(mut self, class_name: &str, signatures: &[&[&str]]) -> Self {
        self.signatures.insert(
            class_name.to_string(),
            signatures
                .iter()
                .map(|sig| sig.iter().map(|t| TypeId::new(*t)).collect())
                .collect(),
        );
        self
    }

    /// Identifiers written as `name` are declared by `kind`.
    pub fn with_declaration(mut self, name: &str, kind: DeclarationKind) -> Self {
        self.declarations.insert(name.to_string(), kind);
        self
    }

    /// Shorthand for a named import of `name` from `module`.
    pub fn with_import(self, name: &str, module: &str) -> Self {
        self.with_declaration(
            name,
            DeclarationKind::Import {
                module: module.to_string(),
                imported: name.to_string(),
            },
        )
    }
}

impl TypeResolver for ScriptedResolver<'_> {
    fn resolve_type(&self, expr: Node<'_>) -> Option<TypeId> {
        self.types.get(node_text(expr, self.source)).cloned()
    }

    fn construct_signatures(&self, class_name: &str) -> Vec<Vec<TypeId>> {
        self.signatures.get(class_name).cloned().unwrap_or_default()
    }

    fn resolve_declaration(&self, ident: Node<'_>) -> Option<Declaration> {
        let name = node_text(ident, self.source);
        self.declarations.get(name).map(|kind| Declaration {
            name: name.to_string(),
            kind: kind.clone(),
            span: span_of(ident),
        })
    }
}
