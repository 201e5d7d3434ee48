//! Candidate discovery and rule evaluation.
//!
//! Discovery walks a source and yields a [`Candidate`] for every construct
//! whose shape corresponds to a rule category: string literals holding
//! selector lists, identifiers that may name library classes, property
//! accesses, method calls, decorator host keys, template tags and bindings,
//! and stylesheet selectors.
//!
//! [`Matcher::evaluate`] is the single dispatch table that decides, per
//! category, whether a candidate becomes an edit, a diagnostic, or nothing.

use std::collections::VecDeque;

use tracing::debug;
use tree_sitter::Node;

use uplift_core::diagnostics::Severity;
use uplift_core::patch::Span;
use uplift_core::rules::{IdentifierRule, RuleCategory, RuleRegistry};

use crate::decorator::ComponentMetadata;
use crate::parser::{call_arguments, named_children, node_text, span_of, string_content_span};
use crate::resolver::{DeclarationKind, TypeResolver};
use crate::selector;
use crate::stylesheet;
use crate::template::{self, BindingForm};

// ============================================================================
// Candidates
// ============================================================================

/// Where a candidate was found.
#[derive(Debug, Clone)]
pub enum Origin<'t> {
    /// A node of a parsed script. Class names point at the identifier (or the
    /// `ns.Name` member expression), property names at the member
    /// expression, method calls at the call expression.
    Syntax(Node<'t>),
    /// A selector component inside a script string literal.
    Selector,
    /// A template element, with the attribute names present on it.
    Template { tag: String, attributes: Vec<String> },
    /// A key of a decorator `host` object.
    Host,
    /// A stylesheet rule prelude.
    Stylesheet,
}

/// A construct that may match a rule.
#[derive(Debug, Clone)]
pub struct Candidate<'t> {
    pub category: RuleCategory,
    /// The name as written.
    pub old_name: String,
    /// Span of the name in the file (for method calls, the whole call).
    pub span: Span,
    pub origin: Origin<'t>,
}

fn selector_candidates<'t>(text: &str, base: usize, origin: Origin<'t>) -> Vec<Candidate<'t>> {
    selector::components(text)
        .into_iter()
        .map(|c| Candidate {
            category: c.kind.category(),
            old_name: c.name,
            span: c.span.offset_by(base),
            origin: origin.clone(),
        })
        .collect()
}

/// Lazy sequence of candidates found in a parsed script.
pub struct SyntaxCandidates<'t, 'm> {
    source: &'t str,
    metadata: &'m [ComponentMetadata],
    stack: Vec<Node<'t>>,
    buffer: VecDeque<Candidate<'t>>,
}

impl<'t, 'm> SyntaxCandidates<'t, 'm> {
    /// Candidates of the tree under `root`.
    ///
    /// Strings inside decorator metadata other than `selector` are skipped;
    /// host keys of that metadata are yielded first.
    pub fn new(root: Node<'t>, source: &'t str, metadata: &'m [ComponentMetadata]) -> Self {
        let mut buffer = VecDeque::new();
        for meta in metadata {
            for key in &meta.host_keys {
                if let Some(candidate) = host_candidate(&source[key.range()], key.start) {
                    buffer.push_back(candidate);
                }
            }
        }
        SyntaxCandidates {
            source,
            metadata,
            stack: vec![root],
            buffer,
        }
    }

    fn excluded(&self, span: Span) -> bool {
        self.metadata.iter().any(|m| m.excludes(span))
    }

    fn visit(&mut self, node: Node<'t>) {
        match node.kind() {
            "string" | "template_string" => self.visit_string(node),
            "identifier" | "type_identifier" | "shorthand_property_identifier" => {
                self.buffer.push_back(Candidate {
                    category: RuleCategory::ClassName,
                    old_name: node_text(node, self.source).to_string(),
                    span: span_of(node),
                    origin: Origin::Syntax(node),
                });
            }
            "member_expression" => self.visit_member(node),
            "call_expression" => {
                let method = node
                    .child_by_field_name("function")
                    .filter(|f| f.kind() == "member_expression")
                    .and_then(|f| f.child_by_field_name("property"));
                if let Some(method) = method {
                    self.buffer.push_back(Candidate {
                        category: RuleCategory::MethodCall,
                        old_name: node_text(method, self.source).to_string(),
                        span: span_of(node),
                        origin: Origin::Syntax(node),
                    });
                }
            }
            _ => {}
        }
    }

    fn visit_string(&mut self, node: Node<'t>) {
        if is_module_specifier(node) {
            return;
        }
        let Some(content) = string_content_span(node) else {
            return;
        };
        if self.excluded(content) {
            return;
        }
        let text = &self.source[content.range()];
        self.buffer
            .extend(selector_candidates(text, content.start, Origin::Selector));
    }

    fn visit_member(&mut self, node: Node<'t>) {
        let Some(property) = node.child_by_field_name("property") else {
            return;
        };
        if property.kind() != "property_identifier" {
            return;
        }
        let name = node_text(property, self.source).to_string();
        let is_namespace_access = node
            .child_by_field_name("object")
            .is_some_and(|o| o.kind() == "identifier");
        if is_namespace_access {
            self.buffer.push_back(Candidate {
                category: RuleCategory::ClassName,
                old_name: name.clone(),
                span: span_of(property),
                origin: Origin::Syntax(node),
            });
        }
        self.buffer.push_back(Candidate {
            category: RuleCategory::PropertyName,
            old_name: name,
            span: span_of(property),
            origin: Origin::Syntax(node),
        });
    }
}

impl<'t> Iterator for SyntaxCandidates<'t, '_> {
    type Item = Candidate<'t>;

    fn next(&mut self) -> Option<Candidate<'t>> {
        loop {
            if let Some(candidate) = self.buffer.pop_front() {
                return Some(candidate);
            }
            let node = self.stack.pop()?;
            let mut kids = named_children(node);
            kids.reverse();
            self.stack.extend(kids);
            self.visit(node);
        }
    }
}

/// Whether a string is the module of an import/export or dynamic `import()`.
fn is_module_specifier(node: Node<'_>) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    match parent.kind() {
        "import_statement" | "export_statement" | "import_require_clause" => true,
        "arguments" => parent
            .parent()
            .and_then(|call| call.child_by_field_name("function"))
            .is_some_and(|f| f.kind() == "import"),
        _ => false,
    }
}

/// Candidate for a `host` key such as `'[dividerColor]'` or `'(onOpen)'`.
fn host_candidate<'t>(key: &str, start: usize) -> Option<Candidate<'t>> {
    let (category, inner) = if key.starts_with('[') && key.ends_with(']') {
        (RuleCategory::InputName, &key[1..key.len() - 1])
    } else if key.starts_with('(') && key.ends_with(')') {
        (RuleCategory::OutputName, &key[1..key.len() - 1])
    } else {
        return None;
    };
    if inner.is_empty() || inner.contains(['.', '[', '(', ':']) {
        return None;
    }
    Some(Candidate {
        category,
        old_name: inner.to_string(),
        span: Span::new(start + 1, start + 1 + inner.len()),
        origin: Origin::Host,
    })
}

/// Candidates of a template, with spans offset by `base`.
pub fn template_candidates(text: &str, base: usize) -> Vec<Candidate<'static>> {
    let mut out = Vec::new();
    for element in template::scan(text) {
        let origin = Origin::Template {
            tag: element.tag.clone(),
            attributes: element.attribute_names().map(str::to_string).collect(),
        };
        let mut push = |category, name: &str, span: Span| {
            out.push(Candidate {
                category,
                old_name: name.to_string(),
                span: span.offset_by(base),
                origin: origin.clone(),
            });
        };

        push(RuleCategory::ElementSelector, &element.tag, element.tag_span);
        if let Some(close) = element.close_tag_span {
            push(RuleCategory::ElementSelector, &element.tag, close);
        }

        for attr in &element.attributes {
            match attr.form {
                BindingForm::Plain if attr.name.eq_ignore_ascii_case("class") => {
                    if let (Some(value), Some(value_span)) = (&attr.value, attr.value_span) {
                        for (token, span) in template::class_tokens(value) {
                            let span = span.offset_by(value_span.start);
                            push(RuleCategory::CssSelector, &token, span);
                        }
                    }
                }
                BindingForm::Plain => {
                    push(RuleCategory::AttributeSelector, &attr.name, attr.name_span);
                    push(RuleCategory::InputName, &attr.name, attr.name_span);
                }
                BindingForm::Property | BindingForm::TwoWay => {
                    if let Some(class) = attr.name.strip_prefix("class.") {
                        let start = attr.name_span.start + "class.".len();
                        push(
                            RuleCategory::CssSelector,
                            class,
                            Span::new(start, start + class.len()),
                        );
                    } else if !attr.name.contains('.') {
                        push(RuleCategory::InputName, &attr.name, attr.name_span);
                    }
                }
                BindingForm::Event => {
                    if !attr.name.contains('.') {
                        push(RuleCategory::OutputName, &attr.name, attr.name_span);
                    }
                }
                BindingForm::Structural | BindingForm::Reference | BindingForm::Other => {}
            }
        }
    }
    out
}

/// Candidates of a stylesheet, with spans offset by `base`.
pub fn stylesheet_candidates(text: &str, scss: bool, base: usize) -> Vec<Candidate<'static>> {
    stylesheet::selector_components(text, scss)
        .into_iter()
        .map(|c| Candidate {
            category: c.kind.category(),
            old_name: c.name,
            span: c.span.offset_by(base),
            origin: Origin::Stylesheet,
        })
        .collect()
}

// ============================================================================
// Evaluation
// ============================================================================

/// What a matched candidate turns into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Edit {
        span: Span,
        text: String,
        reason: String,
    },
    Diagnostic {
        span: Span,
        severity: Severity,
        message: String,
    },
}

/// Evaluates candidates against the registry.
pub struct Matcher<'a> {
    registry: &'a RuleRegistry,
    library_modules: &'a [String],
    resolver: Option<&'a dyn TypeResolver>,
}

impl<'a> Matcher<'a> {
    /// A matcher without type information; script candidates that need a
    /// resolver never match.
    pub fn new(registry: &'a RuleRegistry, library_modules: &'a [String]) -> Self {
        Matcher {
            registry,
            library_modules,
            resolver: None,
        }
    }

    pub fn with_resolver(mut self, resolver: &'a dyn TypeResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Whether `module` is one of the library modules or a subpath of one.
    pub fn is_library_module(&self, module: &str) -> bool {
        self.library_modules.iter().any(|prefix| {
            module == prefix
                || module
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    /// Decide what a candidate becomes.
    pub fn evaluate(&self, candidate: &Candidate<'_>) -> Option<Outcome> {
        let category = candidate.category;
        match category {
            RuleCategory::AttributeSelector
            | RuleCategory::ElementSelector
            | RuleCategory::CssSelector => {
                let rule = self.registry.lookup(category, &candidate.old_name)?;
                Some(rename(candidate, rule))
            }
            RuleCategory::ClassName => {
                let rule = self.registry.lookup(category, &candidate.old_name)?;
                if !self.is_library_class(candidate) {
                    return None;
                }
                Some(match &candidate.origin {
                    // `{ Old }` keeps its key: `{ Old: New }`.
                    Origin::Syntax(node) if node.kind() == "shorthand_property_identifier" => {
                        let mut outcome = rename(candidate, rule);
                        if let Outcome::Edit { text, .. } = &mut outcome {
                            *text = format!("{}: {}", candidate.old_name, rule.new_name);
                        }
                        outcome
                    }
                    _ => rename(candidate, rule),
                })
            }
            RuleCategory::InputName | RuleCategory::OutputName => {
                let rule = self.registry.lookup(category, &candidate.old_name)?;
                let allowed = match &candidate.origin {
                    Origin::Template { tag, attributes } => rule
                        .limited_to
                        .allows_element(tag, attributes.iter().map(String::as_str)),
                    Origin::Host => {
                        rule.limited_to.elements.is_empty() && rule.limited_to.attributes.is_empty()
                    }
                    _ => false,
                };
                allowed.then(|| rename(candidate, rule))
            }
            RuleCategory::PropertyName => {
                let rule = self.registry.lookup(category, &candidate.old_name)?;
                let Origin::Syntax(member) = candidate.origin else {
                    return None;
                };
                let object = member.child_by_field_name("object")?;
                let Some(receiver) = self.resolver?.resolve_type(object) else {
                    debug!(property = %candidate.old_name, "receiver type unresolved");
                    return None;
                };
                let allowed = rule.limited_to.classes.is_empty()
                    || rule.limited_to.allows_class(receiver.as_str());
                allowed.then(|| rename(candidate, rule))
            }
            RuleCategory::MethodCall => self.evaluate_method_call(candidate),
            RuleCategory::ConstructorSignature => None,
        }
    }

    fn is_library_class(&self, candidate: &Candidate<'_>) -> bool {
        let Origin::Syntax(node) = candidate.origin else {
            return false;
        };
        let Some(resolver) = self.resolver else {
            return false;
        };

        // `ns.Name` as an expression or as a type.
        let namespace = match node.kind() {
            "member_expression" => node.child_by_field_name("object"),
            _ => node
                .parent()
                .filter(|p| p.kind() == "nested_type_identifier")
                .filter(|p| {
                    p.child_by_field_name("name")
                        .is_some_and(|n| n.id() == node.id())
                })
                .and_then(|p| p.child_by_field_name("module")),
        };
        if let Some(namespace) = namespace {
            return match resolver.resolve_declaration(namespace).map(|d| d.kind) {
                Some(DeclarationKind::NamespaceImport { module }) => {
                    self.is_library_module(&module)
                }
                _ => false,
            };
        }
        if node.kind() == "member_expression" {
            return false;
        }

        match resolver.resolve_declaration(node).map(|d| d.kind) {
            Some(DeclarationKind::Import { module, imported }) => {
                imported == candidate.old_name && self.is_library_module(&module)
            }
            _ => false,
        }
    }

    fn evaluate_method_call(&self, candidate: &Candidate<'_>) -> Option<Outcome> {
        let method = candidate.old_name.as_str();
        if !self.registry.checks_method(method) {
            return None;
        }
        let Origin::Syntax(call) = candidate.origin else {
            return None;
        };
        let object = call
            .child_by_field_name("function")?
            .child_by_field_name("object")?;
        let Some(receiver) = self.resolver?.resolve_type(object) else {
            debug!(method, "receiver type unresolved");
            return None;
        };
        let check = self.registry.method_check(receiver.as_str(), method)?;
        let count = call_arguments(call).len();
        let invalid = check.invalid_count(count)?;
        Some(Outcome::Diagnostic {
            span: candidate.span,
            severity: Severity::ActionRequired,
            message: format!(
                "{}.{} called with {} argument{}: {}",
                check.class_name,
                check.method,
                count,
                if count == 1 { "" } else { "s" },
                invalid.message
            ),
        })
    }
}

fn rename(candidate: &Candidate<'_>, rule: &IdentifierRule) -> Outcome {
    Outcome::Edit {
        span: candidate.span,
        text: rule.new_name.clone(),
        reason: format!(
            "{} `{}` renamed to `{}` ({})",
            rule.category, candidate.old_name, rule.new_name, rule.applies_from_version
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decorator::component_metadata;
    use crate::parser::{parse, Dialect};
    use crate::resolver::FileTypeResolver;
    use crate::testing::ScriptedResolver;
    use uplift_core::rules::{MajorVersion, RuleTables, VersionRange};

    fn registry() -> RuleRegistry {
        let tables = RuleTables::builtin().unwrap();
        RuleRegistry::for_upgrade(&tables, VersionRange::new(MajorVersion(5), MajorVersion(9)))
    }

    fn library() -> Vec<String> {
        vec!["@angular/material".to_string(), "@angular/cdk".to_string()]
    }

    /// Apply edit outcomes to `source` (test-only; spans must not overlap).
    fn rewrite(source: &str, outcomes: &[Outcome]) -> String {
        let mut edits: Vec<(Span, &str)> = outcomes
            .iter()
            .filter_map(|o| match o {
                Outcome::Edit { span, text, .. } => Some((*span, text.as_str())),
                _ => None,
            })
            .collect();
        edits.sort_by_key(|(s, _)| std::cmp::Reverse(s.start));
        edits.dedup();
        let mut out = source.to_string();
        for (span, text) in edits {
            out.replace_range(span.range(), text);
        }
        out
    }

    fn script_outcomes(source: &str) -> Vec<Outcome> {
        let registry = registry();
        let modules = library();
        let tree = parse(source, Dialect::TypeScript).unwrap();
        let root = tree.root_node();
        let resolver = FileTypeResolver::new(root, source);
        let metadata = component_metadata(root, source);
        let matcher = Matcher::new(&registry, &modules).with_resolver(&resolver);
        SyntaxCandidates::new(root, source, &metadata)
            .filter_map(|c| matcher.evaluate(&c))
            .collect()
    }

    mod script_tests {
        use super::*;

        #[test]
        fn selector_strings_rename_components_only() {
            let source = "const q = document.querySelector('.mat-input-placeholder, div > [cdkPortalHost]');\n";
            let out = rewrite(source, &script_outcomes(source));
            assert_eq!(
                out,
                "const q = document.querySelector('.mat-form-field-label, div > [cdkPortalOutlet]');\n"
            );
        }

        #[test]
        fn import_sources_are_not_selectors() {
            let source = "import { x } from 'mat-input-container';\n";
            assert!(script_outcomes(source).is_empty());
        }

        #[test]
        fn class_names_from_library_imports() {
            let source = "import { PortalHost } from '@angular/cdk/portal';\nlet h: PortalHost;\n";
            let out = rewrite(source, &script_outcomes(source));
            assert_eq!(
                out,
                "import { PortalOutlet } from '@angular/cdk/portal';\nlet h: PortalOutlet;\n"
            );
        }

        #[test]
        fn local_declarations_shadow_library_names() {
            let source = "class PortalHost {}\nconst p = new PortalHost();\n";
            assert!(script_outcomes(source).is_empty());

            let source = "import { PortalHost } from './local';\nconst p = new PortalHost();\n";
            assert!(script_outcomes(source).is_empty());
        }

        #[test]
        fn aliases_rename_only_the_imported_name() {
            let source = "import { PortalHost as Host } from '@angular/cdk/portal';\nlet h: Host;\n";
            let out = rewrite(source, &script_outcomes(source));
            assert_eq!(
                out,
                "import { PortalOutlet as Host } from '@angular/cdk/portal';\nlet h: Host;\n"
            );
        }

        #[test]
        fn shorthand_properties_keep_their_key() {
            let source = "import { PortalHost } from '@angular/cdk/portal';\nexport const m = { PortalHost };\n";
            let out = rewrite(source, &script_outcomes(source));
            assert_eq!(
                out,
                "import { PortalOutlet } from '@angular/cdk/portal';\nexport const m = { PortalHost: PortalOutlet };\n"
            );

            let source = "class PortalHost {}\nexport const m = { PortalHost };\n";
            assert!(script_outcomes(source).is_empty());
        }

        #[test]
        fn namespace_members() {
            let source = "import * as portal from '@angular/cdk/portal';\nlet h: portal.PortalHost = new portal.DomPortalHost();\n";
            let out = rewrite(source, &script_outcomes(source));
            assert_eq!(
                out,
                "import * as portal from '@angular/cdk/portal';\nlet h: portal.PortalOutlet = new portal.DomPortalOutlet();\n"
            );
        }

        #[test]
        fn decorator_metadata_is_not_matched_but_host_keys_are() {
            let source = r#"
@Component({
  selector: 'mat-input-container',
  inputs: ['mat-input-container'],
  host: { '[dividerColor]': 'c', '(onOpen)': 'o()' },
})
class C {}
"#;
            let out = rewrite(source, &script_outcomes(source));
            assert!(out.contains("selector: 'mat-form-field'"));
            assert!(out.contains("inputs: ['mat-input-container']"));
            // dividerColor is limited to mat-form-field, onOpen to mat-select.
            assert!(out.contains("'[dividerColor]'"));
            assert!(out.contains("'(onOpen)'"));
        }
    }

    mod property_tests {
        use super::*;

        fn outcomes_with(source: &str, resolver: &dyn TypeResolver) -> Vec<Outcome> {
            let registry = registry();
            let modules = library();
            let tree = parse(source, Dialect::TypeScript).unwrap();
            let matcher = Matcher::new(&registry, &modules).with_resolver(resolver);
            SyntaxCandidates::new(tree.root_node(), source, &[])
                .filter_map(|c| matcher.evaluate(&c))
                .collect()
        }

        #[test]
        fn renames_property_on_listed_class() {
            let source = "config.extraClasses = ['a'];\n";
            let resolver = ScriptedResolver::new(source).with_type("config", "MatSnackBarConfig");
            let out = rewrite(source, &outcomes_with(source, &resolver));
            assert_eq!(out, "config.panelClass = ['a'];\n");
        }

        #[test]
        fn other_receivers_and_unresolved_are_untouched() {
            let source = "config.extraClasses = ['a'];\nother.extraClasses = [];\n";
            let resolver = ScriptedResolver::new(source).with_type("other", "Unrelated");
            assert!(outcomes_with(source, &resolver).is_empty());
        }

        #[test]
        fn invalid_method_arity_is_action_required() {
            let source = "this.focusMonitor.monitor(el, renderer, true);\nthis.focusMonitor.monitor(el, true);\n";
            let resolver =
                ScriptedResolver::new(source).with_type("this.focusMonitor", "FocusMonitor");
            let outcomes = outcomes_with(source, &resolver);
            assert_eq!(outcomes.len(), 1);
            match &outcomes[0] {
                Outcome::Diagnostic { span, severity, message } => {
                    assert_eq!(*severity, Severity::ActionRequired);
                    assert_eq!(span.start, 0);
                    assert!(message.starts_with("FocusMonitor.monitor called with 3 arguments"));
                }
                other => panic!("unexpected outcome {:?}", other),
            }
        }
    }

    mod template_tests {
        use super::*;

        fn outcomes(text: &str) -> Vec<Outcome> {
            let registry = registry();
            let modules = library();
            let matcher = Matcher::new(&registry, &modules);
            template_candidates(text, 0)
                .iter()
                .filter_map(|c| matcher.evaluate(c))
                .collect()
        }

        #[test]
        fn tags_attributes_and_classes() {
            let text = r#"<mat-input-container class="x mat-input-wrapper"><input matInput></mat-input-container><div cdkPortalHost></div>"#;
            let out = rewrite(text, &outcomes(text));
            assert_eq!(
                out,
                r#"<mat-form-field class="x mat-form-field-wrapper"><input matInput></mat-form-field><div cdkPortalOutlet></div>"#
            );
        }

        #[test]
        fn bindings_honour_element_limits() {
            let text = r#"<mat-select (change)="a()" (onOpen)="b()"></mat-select><input (change)="c()"><mat-checkbox align="end"></mat-checkbox><div [align]="x"></div>"#;
            let out = rewrite(text, &outcomes(text));
            assert_eq!(
                out,
                r#"<mat-select (selectionChange)="a()" (opened)="b()"></mat-select><input (change)="c()"><mat-checkbox labelPosition="end"></mat-checkbox><div [align]="x"></div>"#
            );
        }

        #[test]
        fn attribute_limits() {
            let text = r#"<button mdTooltip="hi" [mdTooltipPosition]="p"></button><span [mdTooltipPosition]="p"></span>"#;
            let out = rewrite(text, &outcomes(text));
            assert_eq!(
                out,
                r#"<button mdTooltip="hi" [matTooltipPosition]="p"></button><span [mdTooltipPosition]="p"></span>"#
            );
        }

        #[test]
        fn stylesheet_selectors() {
            let registry = registry();
            let modules = library();
            let matcher = Matcher::new(&registry, &modules);
            let text = ".mat-input-placeholder, mat-input-container > .other { color: red; }";
            let outcomes: Vec<Outcome> = stylesheet_candidates(text, false, 0)
                .iter()
                .filter_map(|c| matcher.evaluate(c))
                .collect();
            assert_eq!(
                rewrite(text, &outcomes),
                ".mat-form-field-label, mat-form-field > .other { color: red; }"
            );
        }
    }

    #[test]
    fn library_module_prefixes() {
        let registry = registry();
        let modules = library();
        let matcher = Matcher::new(&registry, &modules);
        assert!(matcher.is_library_module("@angular/material"));
        assert!(matcher.is_library_module("@angular/cdk/portal"));
        assert!(!matcher.is_library_module("@angular/cdk-experimental"));
        assert!(!matcher.is_library_module("./local"));
    }
}
