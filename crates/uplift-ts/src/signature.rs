//! Constructor signature checks.
//!
//! Every `new C(...)` and every `super(...)` of a class extending `C` is
//! compared against the construct signatures of `C` when the registry lists
//! `C`. A call is compliant when some signature has the same length and the
//! same type at every position. Anything unresolved is skipped.

use tracing::debug;
use tree_sitter::Node;

use uplift_core::patch::Span;
use uplift_core::rules::RuleRegistry;

use crate::parser::{ancestor_of_kind, call_arguments, named_children, node_text, span_of};
use crate::resolver::{extends_expression, DeclarationKind, TypeId, TypeResolver};

const CLASS_KINDS: &[&str] = &["class_declaration", "abstract_class_declaration", "class"];

/// A construct call whose argument types match no signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureMismatch {
    /// Span of the whole call.
    pub span: Span,
    pub class_name: String,
    pub argument_types: Vec<TypeId>,
    pub message: String,
}

/// Render a signature as `(A, B)`.
pub fn render_signature(types: &[TypeId]) -> String {
    let parts: Vec<&str> = types.iter().map(TypeId::as_str).collect();
    format!("({})", parts.join(", "))
}

/// Checks construct calls of one file.
pub struct SignatureChecker<'a> {
    registry: &'a RuleRegistry,
    resolver: &'a dyn TypeResolver,
}

impl<'a> SignatureChecker<'a> {
    pub fn new(registry: &'a RuleRegistry, resolver: &'a dyn TypeResolver) -> Self {
        SignatureChecker { registry, resolver }
    }

    /// All mismatching construct calls under `root`, in document order.
    pub fn check(&self, root: Node<'_>, source: &str) -> Vec<SignatureMismatch> {
        let mut mismatches = Vec::new();
        if self.registry.constructor_signatures().is_empty() {
            return mismatches;
        }
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            let mut kids = named_children(node);
            kids.reverse();
            stack.extend(kids);

            let class_expr = match node.kind() {
                "new_expression" => node.child_by_field_name("constructor"),
                "call_expression" => node
                    .child_by_field_name("function")
                    .filter(|f| f.kind() == "super")
                    .and_then(|_| ancestor_of_kind(node, CLASS_KINDS))
                    .and_then(extends_expression),
                _ => None,
            };
            if let Some(class_expr) = class_expr {
                if let Some(mismatch) = self.check_call(node, class_expr, source) {
                    mismatches.push(mismatch);
                }
            }
        }
        mismatches
    }

    /// Library class named by a callee expression.
    fn class_name(&self, expr: Node<'_>, source: &str) -> Option<String> {
        match expr.kind() {
            "identifier" => match self.resolver.resolve_declaration(expr)?.kind {
                DeclarationKind::Import { imported, .. } if imported != "default" => Some(imported),
                _ => None,
            },
            "member_expression" => {
                let object = expr.child_by_field_name("object")?;
                match self.resolver.resolve_declaration(object)?.kind {
                    DeclarationKind::NamespaceImport { .. } => expr
                        .child_by_field_name("property")
                        .map(|p| node_text(p, source).to_string()),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn check_call(
        &self,
        call: Node<'_>,
        class_expr: Node<'_>,
        source: &str,
    ) -> Option<SignatureMismatch> {
        let call_text = node_text(call, source);
        let Some(class_name) = self.class_name(class_expr, source) else {
            debug!(call = call_text, "constructor not resolved to a library class");
            return None;
        };
        self.registry.constructor_signature(&class_name)?;

        let mut argument_types = Vec::new();
        for arg in call_arguments(call) {
            if arg.kind() == "spread_element" {
                debug!(call = call_text, "spread argument");
                return None;
            }
            let Some(ty) = self.resolver.resolve_type(arg) else {
                debug!(
                    call = call_text,
                    argument = node_text(arg, source),
                    "argument type unresolved"
                );
                return None;
            };
            argument_types.push(ty);
        }

        let signatures = self.resolver.construct_signatures(&class_name);
        if signatures.is_empty() {
            debug!(class = %class_name, "no construct signatures");
            return None;
        }
        if signatures.iter().any(|sig| *sig == argument_types) {
            return None;
        }

        let valid: Vec<String> = signatures.iter().map(|s| render_signature(s)).collect();
        let quoted: Vec<&str> = call_text.split_whitespace().collect();
        let message = format!(
            "`{}` constructed with {} in `{}`; valid signatures: {}",
            class_name,
            render_signature(&argument_types),
            quoted.join(" "),
            valid.join(", ")
        );
        Some(SignatureMismatch {
            span: span_of(call),
            class_name,
            argument_types,
            message,
        })
    }
}
