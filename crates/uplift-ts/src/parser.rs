//! tree-sitter front-end for TypeScript sources.
//!
//! A parser is created per call since `tree_sitter::Parser` is not `Sync`.
//! The helpers below are shared by every module that walks a syntax tree.

use thiserror::Error;
use tree_sitter::{Node, Parser, Tree};

use uplift_core::error::UpliftError;
use uplift_core::patch::Span;
use uplift_core::workspace::SourceKind;

/// Errors raised while parsing a script.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The grammar could not be loaded into the parser.
    #[error("failed to initialize {dialect} grammar: {message}")]
    Language {
        dialect: &'static str,
        message: String,
    },

    /// tree-sitter returned no tree.
    #[error("parser produced no syntax tree")]
    NoTree,

    /// The tree contains error or missing nodes.
    #[error("syntax error at byte {}", .span.start)]
    Syntax { span: Span },
}

impl ParseError {
    /// Where the failure is, for diagnostics.
    pub fn span(&self) -> Span {
        match self {
            ParseError::Syntax { span } => *span,
            _ => Span::empty(0),
        }
    }
}

impl From<ParseError> for UpliftError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Language { .. } => UpliftError::internal(err.to_string()),
            _ => UpliftError::invalid_args(err.to_string()),
        }
    }
}

/// Which TypeScript grammar to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    TypeScript,
    Tsx,
}

impl Dialect {
    /// Grammar for a script file kind. Non-script kinds have none.
    pub fn for_kind(kind: SourceKind) -> Option<Self> {
        match kind {
            SourceKind::TypeScript => Some(Dialect::TypeScript),
            SourceKind::Tsx => Some(Dialect::Tsx),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Dialect::TypeScript => "typescript",
            Dialect::Tsx => "tsx",
        }
    }
}

/// Parse `source`, failing when the tree has any error node.
pub fn parse(source: &str, dialect: Dialect) -> Result<Tree, ParseError> {
    let mut parser = Parser::new();
    let language = match dialect {
        Dialect::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT,
        Dialect::Tsx => tree_sitter_typescript::LANGUAGE_TSX,
    };
    parser
        .set_language(&language.into())
        .map_err(|e| ParseError::Language {
            dialect: dialect.name(),
            message: e.to_string(),
        })?;
    let tree = parser.parse(source, None).ok_or(ParseError::NoTree)?;
    if tree.root_node().has_error() {
        let span = first_error(tree.root_node())
            .map(span_of)
            .unwrap_or_else(|| Span::empty(0));
        return Err(ParseError::Syntax { span });
    }
    Ok(tree)
}

/// The first error or missing node in document order.
fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    children(node).into_iter().find_map(first_error)
}

// ============================================================================
// Node Helpers
// ============================================================================

/// Source text of a node.
pub fn node_text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    source.get(node.byte_range()).unwrap_or("")
}

/// Byte span of a node.
pub fn span_of(node: Node<'_>) -> Span {
    Span::new(node.start_byte(), node.end_byte())
}

/// Named children collected in order.
pub fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// All children (named and anonymous) collected in order.
pub fn children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

/// Nearest ancestor whose kind is one of `kinds`.
pub fn ancestor_of_kind<'t>(node: Node<'t>, kinds: &[&str]) -> Option<Node<'t>> {
    let mut current = node.parent();
    while let Some(n) = current {
        if kinds.contains(&n.kind()) {
            return Some(n);
        }
        current = n.parent();
    }
    None
}

/// Content span of a string or substitution-free template literal,
/// excluding the quotes. `None` for other nodes or templates with `${}`.
pub fn string_content_span(node: Node<'_>) -> Option<Span> {
    match node.kind() {
        "string" => {}
        "template_string" => {
            if named_children(node)
                .iter()
                .any(|c| c.kind() == "template_substitution")
            {
                return None;
            }
        }
        _ => return None,
    }
    let (start, end) = (node.start_byte(), node.end_byte());
    if end < start + 2 {
        return None;
    }
    Some(Span::new(start + 1, end - 1))
}

/// Unquoted value of a string literal node.
pub fn string_value<'s>(node: Node<'_>, source: &'s str) -> Option<&'s str> {
    string_content_span(node).and_then(|span| source.get(span.range()))
}

/// Arguments of a call or `new` expression, skipping comments.
pub fn call_arguments(node: Node<'_>) -> Vec<Node<'_>> {
    node.child_by_field_name("arguments")
        .map(|args| {
            named_children(args)
                .into_iter()
                .filter(|n| n.kind() != "comment")
                .collect()
        })
        .unwrap_or_default()
}

/// Unwrap parentheses and non-null assertions.
pub fn strip_expression(node: Node<'_>) -> Node<'_> {
    let mut current = node;
    loop {
        let inner = match current.kind() {
            "parenthesized_expression" | "non_null_expression" => current.named_child(0),
            _ => None,
        };
        match inner {
            Some(next) => current = next,
            None => return current,
        }
    }
}
