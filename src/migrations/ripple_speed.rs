//! Ripple speed factor to animation duration.
//!
//! Version 7 replaced the ripple speed factor with explicit animation
//! durations. The enter duration equivalent to a factor `E` is
//! `450 / (E || 1)` milliseconds, folded to a literal when `E` is a number.
//!
//! Templates: `matRippleSpeedFactor="E"` and `[matRippleSpeedFactor]="E"`
//! become `[matRippleAnimation]="{enterDuration: D}"`.
//!
//! Scripts: `baseSpeedFactor: E` inside ripple global options becomes
//! `animation: {enterDuration: D}`. Options are recognised by a
//! `RippleGlobalOptions` annotation or assertion, or as the `useValue` of a
//! `MAT_RIPPLE_GLOBAL_OPTIONS` provider.

use std::sync::LazyLock;

use regex::Regex;
use tree_sitter::Node;

use uplift_core::rules::MajorVersion;
use uplift_ts::decorator::pair_key;
use uplift_ts::parser::{named_children, node_text, span_of, strip_expression};
use uplift_ts::template::{self, BindingForm};

use super::{Embedded, FileContext, MigrationUnit, RunContext, Script, VersionGate};

/// Enter duration of a ripple at speed factor 1, in milliseconds.
const BASE_ENTER_DURATION: f64 = 450.0;

const SPEED_ATTRIBUTE: &str = "matRippleSpeedFactor";
const ANIMATION_ATTRIBUTE: &str = "matRippleAnimation";
const SPEED_OPTION: &str = "baseSpeedFactor";
const OPTIONS_TYPE: &str = "RippleGlobalOptions";
const OPTIONS_TOKEN: &str = "MAT_RIPPLE_GLOBAL_OPTIONS";

static NUMERIC_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?\s*$").unwrap()
});

/// Rewrites ripple speed factors as animation durations.
#[derive(Debug, Clone, Copy)]
pub struct RippleSpeedFactor;

impl MigrationUnit for RippleSpeedFactor {
    fn name(&self) -> &'static str {
        "ripple-speed-factor"
    }

    fn gate(&self) -> VersionGate {
        VersionGate::Since(MajorVersion(7))
    }

    fn visit_template(&self, _cx: &RunContext<'_>, template: &Embedded<'_>, out: &mut FileContext) {
        for element in template::scan(template.text) {
            for attr in &element.attributes {
                if attr.name != SPEED_ATTRIBUTE {
                    continue;
                }
                let span = attr.full_span.offset_by(template.base);
                let value = attr.value.as_deref().unwrap_or("");
                let duration = match (attr.form, fold(value)) {
                    (BindingForm::Plain | BindingForm::Property, Some(folded)) => folded,
                    (BindingForm::Property, None) if !value.trim().is_empty() => runtime(value),
                    (BindingForm::Plain | BindingForm::Property, None) => {
                        out.action_required(
                            span,
                            format!(
                                "`{SPEED_ATTRIBUTE}` value `{value}` is not a number; \
                                 set `[{ANIMATION_ATTRIBUTE}]` by hand"
                            ),
                        );
                        continue;
                    }
                    _ => continue,
                };
                let quote = attr
                    .value_span
                    .and_then(|s| template.text.as_bytes().get(s.end))
                    .filter(|c| matches!(c, b'"' | b'\''))
                    .map(|c| *c as char)
                    .unwrap_or('"');
                out.replace(
                    span,
                    format!("[{ANIMATION_ATTRIBUTE}]={quote}{{enterDuration: {duration}}}{quote}"),
                    format!("`{SPEED_ATTRIBUTE}` replaced by `{ANIMATION_ATTRIBUTE}` (7)"),
                );
            }
        }
    }

    fn visit_script(&self, _cx: &RunContext<'_>, script: &Script<'_, '_>, out: &mut FileContext) {
        let source = script.source();
        let mut stack = vec![script.root];
        while let Some(node) = stack.pop() {
            let mut kids = named_children(node);
            kids.reverse();
            stack.extend(kids);

            if node.kind() != "pair" || pair_key(node, source) != Some(SPEED_OPTION) {
                continue;
            }
            let Some(object) = node.parent() else {
                continue;
            };
            if !is_ripple_options(object, source) {
                continue;
            }
            let Some(value) = node.child_by_field_name("value") else {
                continue;
            };
            let value_text = node_text(value, source);
            let duration = fold(value_text).unwrap_or_else(|| runtime(value_text));
            out.replace(
                span_of(node),
                format!("animation: {{enterDuration: {duration}}}"),
                format!("`{SPEED_OPTION}` replaced by `animation` (7)"),
            );
        }
    }
}

/// `450 / (E || 1)` as a literal, when `E` is a number.
fn fold(expr: &str) -> Option<String> {
    if !NUMERIC_LITERAL.is_match(expr) {
        return None;
    }
    let factor: f64 = expr.trim().parse().ok()?;
    let factor = if factor == 0.0 { 1.0 } else { factor };
    let duration = BASE_ENTER_DURATION / factor;
    if !duration.is_finite() {
        return None;
    }
    if duration.fract() == 0.0 && duration.abs() < 1e15 {
        Some(format!("{}", duration as i64))
    } else {
        Some(format!("{duration}"))
    }
}

/// The duration as an expression evaluated at runtime.
fn runtime(expr: &str) -> String {
    format!("{} / ({})", BASE_ENTER_DURATION as i64, expr.trim())
}

/// Whether a qualified or plain name ends in `name`.
fn names(text: &str, name: &str) -> bool {
    text.trim().rsplit('.').next() == Some(name)
}

/// Whether `object` is a ripple global options literal.
fn is_ripple_options(object: Node<'_>, source: &str) -> bool {
    if object.kind() != "object" {
        return false;
    }
    let mut parent = object.parent();
    while let Some(p) = parent.filter(|p| p.kind() == "parenthesized_expression") {
        parent = p.parent();
    }
    let Some(parent) = parent else {
        return false;
    };
    match parent.kind() {
        "variable_declarator" => parent
            .child_by_field_name("type")
            .and_then(|annotation| annotation.named_child(0))
            .is_some_and(|ty| names(node_text(ty, source), OPTIONS_TYPE)),
        "as_expression" | "satisfies_expression" => parent
            .named_child(1)
            .is_some_and(|ty| names(node_text(ty, source), OPTIONS_TYPE)),
        "pair" if pair_key(parent, source) == Some("useValue") => parent
            .parent()
            .map(|provider| is_options_provider(provider, source))
            .unwrap_or(false),
        _ => false,
    }
}

/// Whether a provider literal has `provide: MAT_RIPPLE_GLOBAL_OPTIONS`.
fn is_options_provider(provider: Node<'_>, source: &str) -> bool {
    named_children(provider).into_iter().any(|pair| {
        pair.kind() == "pair"
            && pair_key(pair, source) == Some("provide")
            && pair
                .child_by_field_name("value")
                .map(strip_expression)
                .is_some_and(|v| names(node_text(v, source), OPTIONS_TOKEN))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::visit_with;
    use uplift_core::patch::FilePatch;
    use uplift_core::rules::{RuleRegistry, RuleTables, VersionRange};
    use uplift_core::workspace::SourceTree;

    const NO_MODULES: &[String] = &[];

    /// Run the unit over one file and return the rewritten text.
    fn migrate(path: &str, text: &str) -> (String, FileContext) {
        let tables = RuleTables::builtin().unwrap();
        let versions = VersionRange::new(MajorVersion(6), MajorVersion(7));
        let registry = RuleRegistry::for_upgrade(&tables, versions);
        let cx = RunContext {
            registry: &registry,
            library_modules: NO_MODULES,
            bootstrap: "src/main.ts",
            versions,
        };
        let tree = SourceTree::from_files([(path, text)]);
        let file = &tree.files()[0];
        let out = visit_with(&RippleSpeedFactor, &cx, file);
        let mut patch = FilePatch::new(file.id, &file.text);
        patch.extend(out.edits().to_vec());
        (patch.commit().text, out)
    }

    mod folding_tests {
        use super::*;

        #[test]
        fn folds_numbers() {
            assert_eq!(fold("2").as_deref(), Some("225"));
            assert_eq!(fold(" 0.5 ").as_deref(), Some("900"));
            assert_eq!(fold("4").as_deref(), Some("112.5"));
        }

        #[test]
        fn zero_counts_as_one() {
            assert_eq!(fold("0").as_deref(), Some("450"));
        }

        #[test]
        fn non_numbers_do_not_fold() {
            assert_eq!(fold("speed"), None);
            assert_eq!(fold("2 * x"), None);
            assert_eq!(fold(""), None);
            assert_eq!(runtime(" speed "), "450 / (speed)");
        }
    }

    mod template_tests {
        use super::*;

        #[test]
        fn static_attribute_with_number() {
            let (text, _) = migrate("a.html", r#"<div matRipple matRippleSpeedFactor="2"></div>"#);
            assert_eq!(
                text,
                r#"<div matRipple [matRippleAnimation]="{enterDuration: 225}"></div>"#
            );
        }

        #[test]
        fn bound_attribute_with_expression() {
            let (text, _) =
                migrate("a.html", "<div matRipple [matRippleSpeedFactor]='speed'></div>");
            assert_eq!(
                text,
                "<div matRipple [matRippleAnimation]='{enterDuration: 450 / (speed)}'></div>"
            );
        }

        #[test]
        fn static_attribute_with_text_needs_action() {
            let (text, out) = migrate("a.html", r#"<div matRippleSpeedFactor="fast"></div>"#);
            assert_eq!(text, r#"<div matRippleSpeedFactor="fast"></div>"#);
            assert_eq!(out.diagnostics().len(), 1);
            assert!(out.diagnostics()[0].is_action_required());
        }

        #[test]
        fn inline_template() {
            let source = "import { Component } from '@angular/core';\n\
                          @Component({ selector: 'x', template: '<b matRipple [matRippleSpeedFactor]=\"0\"></b>' })\n\
                          export class X {}\n";
            let (text, _) = migrate("x.component.ts", source);
            assert!(text.contains(r#"[matRippleAnimation]="{enterDuration: 450}""#));
        }
    }

    mod script_tests {
        use super::*;

        #[test]
        fn annotated_options() {
            let (text, _) = migrate(
                "app.ts",
                "const options: RippleGlobalOptions = { disabled: false, baseSpeedFactor: 1.5 };\n",
            );
            assert_eq!(
                text,
                "const options: RippleGlobalOptions = { disabled: false, animation: {enterDuration: 300} };\n"
            );
        }

        #[test]
        fn provider_use_value_with_expression() {
            let (text, _) = migrate(
                "app.module.ts",
                "export const providers = [{ provide: MAT_RIPPLE_GLOBAL_OPTIONS, useValue: { baseSpeedFactor: factor } }];\n",
            );
            assert!(text.contains("useValue: { animation: {enterDuration: 450 / (factor)} }"));
        }

        #[test]
        fn unrelated_objects_are_untouched() {
            let source = "const other: Settings = { baseSpeedFactor: 2 };\nconst y = { baseSpeedFactor: 2 };\n";
            let (text, out) = migrate("app.ts", source);
            assert_eq!(text, source);
            assert!(out.edits().is_empty());
        }
    }
}
