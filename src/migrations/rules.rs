//! Rule-driven renames.
//!
//! One unit type covers every table-backed category; each instance consumes
//! a fixed set of categories and forwards the matching candidates to the
//! matcher's dispatch table.

use uplift_core::rules::RuleCategory;
use uplift_ts::matcher::{self, Candidate, Matcher, SyntaxCandidates};

use super::{Embedded, FileContext, MigrationUnit, RunContext, Script};

/// A unit that applies the registry rules of some categories.
#[derive(Debug, Clone)]
pub struct RuleMigration {
    name: &'static str,
    categories: &'static [RuleCategory],
}

impl RuleMigration {
    pub fn selectors() -> Self {
        RuleMigration {
            name: "selectors",
            categories: &[
                RuleCategory::AttributeSelector,
                RuleCategory::ElementSelector,
                RuleCategory::CssSelector,
            ],
        }
    }

    pub fn class_names() -> Self {
        RuleMigration {
            name: "class-names",
            categories: &[RuleCategory::ClassName],
        }
    }

    pub fn bindings() -> Self {
        RuleMigration {
            name: "bindings",
            categories: &[RuleCategory::InputName, RuleCategory::OutputName],
        }
    }

    pub fn property_names() -> Self {
        RuleMigration {
            name: "property-names",
            categories: &[RuleCategory::PropertyName],
        }
    }

    pub fn method_calls() -> Self {
        RuleMigration {
            name: "method-calls",
            categories: &[RuleCategory::MethodCall],
        }
    }

    fn is_active(&self, cx: &RunContext<'_>) -> bool {
        self.categories.iter().any(|c| cx.registry.has_category(*c))
    }

    fn consumes(&self, candidate: &Candidate<'_>) -> bool {
        self.categories.contains(&candidate.category)
    }

    fn record<'t>(
        &self,
        matcher: &Matcher<'_>,
        candidates: impl Iterator<Item = Candidate<'t>>,
        out: &mut FileContext,
    ) {
        for candidate in candidates.filter(|c| self.consumes(c)) {
            if let Some(outcome) = matcher.evaluate(&candidate) {
                out.apply(outcome);
            }
        }
    }
}

impl MigrationUnit for RuleMigration {
    fn name(&self) -> &'static str {
        self.name
    }

    fn categories(&self) -> &[RuleCategory] {
        self.categories
    }

    fn visit_script(&self, cx: &RunContext<'_>, script: &Script<'_, '_>, out: &mut FileContext) {
        if !self.is_active(cx) {
            return;
        }
        let matcher = Matcher::new(cx.registry, cx.library_modules).with_resolver(script.resolver);
        let candidates = SyntaxCandidates::new(script.root, script.source(), script.metadata);
        self.record(&matcher, candidates, out);
    }

    fn visit_template(&self, cx: &RunContext<'_>, template: &Embedded<'_>, out: &mut FileContext) {
        if !self.is_active(cx) {
            return;
        }
        let matcher = Matcher::new(cx.registry, cx.library_modules);
        let candidates = matcher::template_candidates(template.text, template.base);
        self.record(&matcher, candidates.into_iter(), out);
    }

    fn visit_stylesheet(
        &self,
        cx: &RunContext<'_>,
        stylesheet: &Embedded<'_>,
        out: &mut FileContext,
    ) {
        if !self.is_active(cx) {
            return;
        }
        let matcher = Matcher::new(cx.registry, cx.library_modules);
        let candidates =
            matcher::stylesheet_candidates(stylesheet.text, stylesheet.scss, stylesheet.base);
        self.record(&matcher, candidates.into_iter(), out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uplift_core::rules::{MajorVersion, RuleRegistry, RuleTables, VersionRange};
    use uplift_core::workspace::SourceTree;

    const NO_MODULES: &[String] = &[];

    fn context(registry: &RuleRegistry) -> RunContext<'_> {
        RunContext {
            registry,
            library_modules: NO_MODULES,
            bootstrap: "src/main.ts",
            versions: VersionRange::new(MajorVersion(5), MajorVersion(7)),
        }
    }

    fn registry(from: u32, to: u32) -> RuleRegistry {
        let tables = RuleTables::builtin().unwrap();
        RuleRegistry::for_upgrade(&tables, VersionRange::new(MajorVersion(from), MajorVersion(to)))
    }

    #[test]
    fn stylesheet_edits_carry_unit_and_reason() {
        let tree = SourceTree::from_files([("a.scss", ".mat-input-wrapper { a: b; }")]);
        let file = &tree.files()[0];
        let registry = registry(5, 7);
        let cx = context(&registry);
        let unit = RuleMigration::selectors();
        let mut out = FileContext::new(file);
        out.set_unit(unit.name());
        unit.visit_stylesheet(&cx, &Embedded::whole(file), &mut out);

        let edits = out.edits();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].text, "mat-form-field-wrapper");
        assert_eq!(edits[0].labels.unit.as_deref(), Some("selectors"));
        assert!(edits[0]
            .labels
            .reason
            .as_deref()
            .unwrap()
            .contains("mat-input-wrapper"));
    }

    #[test]
    fn units_only_take_their_categories() {
        let tree = SourceTree::from_files([(
            "a.html",
            r#"<mat-select (change)="x()"></mat-select>"#,
        )]);
        let file = &tree.files()[0];
        let registry = registry(5, 7);
        let cx = context(&registry);

        let mut out = FileContext::new(file);
        RuleMigration::selectors().visit_template(&cx, &Embedded::whole(file), &mut out);
        assert!(out.edits().is_empty());

        RuleMigration::bindings().visit_template(&cx, &Embedded::whole(file), &mut out);
        assert_eq!(out.edits().len(), 1);
        assert_eq!(out.edits()[0].text, "selectionChange");
    }

    #[test]
    fn inactive_when_registry_has_no_rules() {
        let tree = SourceTree::from_files([("a.css", ".mat-input-wrapper {}")]);
        let file = &tree.files()[0];
        // 7 -> 8 selects no selector renames.
        let registry = registry(7, 8);
        let cx = context(&registry);
        let mut out = FileContext::new(file);
        RuleMigration::selectors().visit_stylesheet(&cx, &Embedded::whole(file), &mut out);
        assert!(out.edits().is_empty());
    }
}
