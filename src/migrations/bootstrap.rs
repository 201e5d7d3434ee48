//! Gesture support import.
//!
//! From version 9 the library no longer loads HammerJS itself. Projects whose
//! templates bind gesture events must import it before the application is
//! bootstrapped. The per-file pass records which files bind gestures; the
//! project pass then finds the `bootstrapModule(...)` call in the bootstrap
//! file and inserts the import in front of the declaration that brings the
//! root module into scope.

use tracing::{debug, info};
use tree_sitter::Node;

use uplift_core::patch::Span;
use uplift_core::rules::MajorVersion;
use uplift_core::workspace::{SourceFile, SourceTree};
use uplift_ts::parser::{
    call_arguments, named_children, node_text, span_of, string_value, strip_expression,
};
use uplift_ts::template::{self, BindingForm};
use uplift_ts::{parse, DeclarationKind, Dialect, FileTypeResolver, TypeResolver};

use super::{
    Embedded, FileContext, MigrationUnit, ProjectFacts, RunContext, VersionGate,
    POST_ANALYSIS_ID_BASE,
};

const GESTURE_MODULE: &str = "hammerjs";
const BOOTSTRAP_METHOD: &str = "bootstrapModule";

/// Gesture event names, by family.
const GESTURE_EVENTS: &[(&str, &[&str])] = &[
    ("pan", &["", "start", "move", "end", "cancel", "left", "right", "up", "down"]),
    ("pinch", &["", "start", "move", "end", "cancel", "in", "out"]),
    ("press", &["", "up"]),
    ("rotate", &["", "start", "move", "end", "cancel"]),
    ("swipe", &["", "left", "right", "up", "down"]),
    ("tap", &[""]),
];

fn is_gesture_event(name: &str) -> bool {
    GESTURE_EVENTS.iter().any(|(family, suffixes)| {
        name.strip_prefix(family)
            .is_some_and(|rest| suffixes.contains(&rest))
    })
}

/// Adds `import 'hammerjs';` to the bootstrap file when gestures are used.
#[derive(Debug, Clone, Copy)]
pub struct GestureBootstrapImport;

impl MigrationUnit for GestureBootstrapImport {
    fn name(&self) -> &'static str {
        "gesture-bootstrap-import"
    }

    fn gate(&self) -> VersionGate {
        VersionGate::Since(MajorVersion(9))
    }

    fn visit_template(&self, _cx: &RunContext<'_>, template: &Embedded<'_>, out: &mut FileContext) {
        let binds_gesture = template::scan(template.text).iter().any(|element| {
            element
                .attributes
                .iter()
                .any(|a| a.form == BindingForm::Event && is_gesture_event(&a.name))
        });
        if binds_gesture {
            let path = out.path().to_string();
            out.facts_mut().gesture_files.insert(path);
        }
    }

    fn post_analysis(
        &self,
        cx: &RunContext<'_>,
        tree: &SourceTree,
        facts: &ProjectFacts,
    ) -> Vec<FileContext> {
        let Some(first_user) = facts.gesture_files.iter().next() else {
            return Vec::new();
        };
        debug!(files = facts.gesture_files.len(), "templates bind gesture events");

        let Some(bootstrap) = tree.file_by_path(cx.bootstrap) else {
            // Report against a file that needs the import.
            let Some(user) = tree.file_by_path(first_user) else {
                return Vec::new();
            };
            let mut out = self.context(user);
            out.action_required(
                Span::empty(0),
                format!(
                    "templates bind gesture events but the bootstrap file `{}` was not found; \
                     add `import '{GESTURE_MODULE}';` to the application entry point",
                    cx.bootstrap
                ),
            );
            return vec![out];
        };

        let mut out = self.context(bootstrap);
        self.anchor_import(bootstrap, &mut out);
        vec![out]
    }
}

impl GestureBootstrapImport {
    fn context(&self, file: &SourceFile) -> FileContext {
        let mut out = FileContext::with_first_id(file, POST_ANALYSIS_ID_BASE);
        out.set_unit(self.name());
        out
    }

    fn anchor_import(&self, file: &SourceFile, out: &mut FileContext) {
        let manual =
            format!("add `import '{GESTURE_MODULE}';` before the application is bootstrapped");
        let Some(dialect) = Dialect::for_kind(file.kind) else {
            out.action_required(
                Span::empty(0),
                format!("bootstrap file is not a script; {manual}"),
            );
            return;
        };
        let tree = match parse(&file.text, dialect) {
            Ok(tree) => tree,
            Err(err) => {
                out.action_required(
                    err.span(),
                    format!("bootstrap file could not be parsed ({err}); {manual}"),
                );
                return;
            }
        };
        let root = tree.root_node();
        let source = file.text.as_str();

        if imports_gesture_module(root, source) {
            debug!(file = %file.path, "gesture module already imported");
            return;
        }
        let Some(anchor) = bootstrap_anchor(root, source) else {
            out.action_required(
                Span::empty(0),
                format!("no `{BOOTSTRAP_METHOD}(...)` call with a root module found; {manual}"),
            );
            return;
        };

        let resolver = FileTypeResolver::new(root, source);
        let module_import = Some(strip_expression(anchor))
            .filter(|arg| arg.kind() == "identifier")
            .and_then(|arg| resolver.resolve_declaration(arg))
            .filter(|decl| matches!(decl.kind, DeclarationKind::Import { .. }))
            .and_then(|decl| enclosing_import(root, decl.span));
        let target = match module_import {
            Some(import) => import,
            None => top_level_statement(root, anchor),
        };
        info!(file = %file.path, offset = target.start_byte(), "inserting gesture module import");
        out.insert(
            target.start_byte(),
            format!("import '{GESTURE_MODULE}';\n"),
            format!("gesture events need `{GESTURE_MODULE}` loaded before bootstrap (9)"),
        );
    }
}

fn import_statements(root: Node<'_>) -> Vec<Node<'_>> {
    named_children(root)
        .into_iter()
        .filter(|n| n.kind() == "import_statement")
        .collect()
}

fn imports_gesture_module(root: Node<'_>, source: &str) -> bool {
    import_statements(root).into_iter().any(|import| {
        import
            .child_by_field_name("source")
            .and_then(|s| string_value(s, source))
            == Some(GESTURE_MODULE)
    })
}

/// First call whose callee is a property access named `bootstrapModule`.
fn find_bootstrap_call<'t>(root: Node<'t>, source: &str) -> Option<Node<'t>> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.kind() == "call_expression" {
            let is_bootstrap = node
                .child_by_field_name("function")
                .filter(|f| f.kind() == "member_expression")
                .and_then(|f| f.child_by_field_name("property"))
                .is_some_and(|p| node_text(p, source) == BOOTSTRAP_METHOD);
            if is_bootstrap {
                return Some(node);
            }
        }
        let mut kids = named_children(node);
        kids.reverse();
        stack.extend(kids);
    }
    None
}

/// First argument of the `bootstrapModule(...)` call: the root module.
fn bootstrap_anchor<'t>(root: Node<'t>, source: &str) -> Option<Node<'t>> {
    let call = find_bootstrap_call(root, source)?;
    call_arguments(call).first().copied()
}

/// The import statement declaring the name at `span`.
fn enclosing_import(root: Node<'_>, span: Span) -> Option<Node<'_>> {
    import_statements(root)
        .into_iter()
        .find(|import| span_of(*import).contains(&span))
}

/// The statement directly under `root` that contains `node`.
fn top_level_statement<'t>(root: Node<'t>, node: Node<'t>) -> Node<'t> {
    let mut current = node;
    while let Some(parent) = current.parent() {
        if parent.id() == root.id() {
            break;
        }
        current = parent;
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::visit_with;
    use uplift_core::patch::FilePatch;
    use uplift_core::rules::{RuleRegistry, RuleTables, VersionRange};

    const NO_MODULES: &[String] = &[];

    const TEMPLATE: &str = r#"<div (swipeleft)="next()" (click)="x()"></div>"#;

    /// Run both passes over `files`; returns the bootstrap file text and the
    /// project-level contexts.
    fn migrate(files: &[(&str, &str)]) -> (Option<String>, Vec<FileContext>) {
        let tables = RuleTables::builtin().unwrap();
        let versions = VersionRange::new(MajorVersion(8), MajorVersion(9));
        let registry = RuleRegistry::for_upgrade(&tables, versions);
        let cx = RunContext {
            registry: &registry,
            library_modules: NO_MODULES,
            bootstrap: "src/main.ts",
            versions,
        };
        let tree = SourceTree::from_files(files.iter().copied());
        let unit = GestureBootstrapImport;
        let mut facts = ProjectFacts::default();
        for file in tree.files() {
            let (_, _, file_facts) = visit_with(&unit, &cx, file).into_parts();
            facts.merge(file_facts);
        }
        let outputs = unit.post_analysis(&cx, &tree, &facts);
        let text = tree.file_by_path("src/main.ts").map(|file| {
            let mut patch = FilePatch::new(file.id, &file.text);
            for out in &outputs {
                patch.extend(out.edits().to_vec());
            }
            patch.commit().text
        });
        (text, outputs)
    }

    #[test]
    fn gesture_names() {
        assert!(is_gesture_event("tap"));
        assert!(is_gesture_event("panstart"));
        assert!(is_gesture_event("pinchout"));
        assert!(is_gesture_event("pressup"));
        assert!(!is_gesture_event("tapped"));
        assert!(!is_gesture_event("click"));
        assert!(!is_gesture_event("pressdown"));
    }

    #[test]
    fn inserts_before_root_module_import() {
        let main = "import { enableProdMode } from '@angular/core';\n\
                    import { platformBrowserDynamic } from '@angular/platform-browser-dynamic';\n\
                    import { AppModule } from './app/app.module';\n\
                    \n\
                    platformBrowserDynamic().bootstrapModule(AppModule);\n";
        let (text, outputs) = migrate(&[("src/app/a.html", TEMPLATE), ("src/main.ts", main)]);
        let text = text.unwrap();
        assert!(text.contains(
            "platform-browser-dynamic';\nimport 'hammerjs';\nimport { AppModule } from './app/app.module';"
        ));
        assert_eq!(outputs[0].edits()[0].id, POST_ANALYSIS_ID_BASE);
    }

    #[test]
    fn local_module_anchors_on_the_call_statement() {
        let main = "import { platformBrowserDynamic } from '@angular/platform-browser-dynamic';\n\
                    class AppModule {}\n\
                    platformBrowserDynamic().bootstrapModule(AppModule).catch(err => console.error(err));\n";
        let (text, _) = migrate(&[("src/app/a.html", TEMPLATE), ("src/main.ts", main)]);
        assert!(text
            .unwrap()
            .contains("class AppModule {}\nimport 'hammerjs';\nplatformBrowserDynamic()"));
    }

    #[test]
    fn existing_import_means_no_edit() {
        let main = "import 'hammerjs';\n\
                    import { AppModule } from './app';\n\
                    platform().bootstrapModule(AppModule);\n";
        let (text, outputs) = migrate(&[("src/app/a.html", TEMPLATE), ("src/main.ts", main)]);
        assert_eq!(text.unwrap(), main);
        assert!(outputs[0].diagnostics().is_empty());
    }

    #[test]
    fn missing_call_needs_action() {
        let main = "import { AppModule } from './app';\nconsole.log(AppModule);\n";
        let (text, outputs) = migrate(&[("src/app/a.html", TEMPLATE), ("src/main.ts", main)]);
        assert_eq!(text.unwrap(), main);
        assert_eq!(outputs[0].diagnostics().len(), 1);
        assert!(outputs[0].diagnostics()[0].is_action_required());
    }

    #[test]
    fn anchor_is_the_first_bootstrap_argument() {
        let main = "import { AppModule } from './app';\n\
                    platform().bootstrapModule(AppModule, { ngZone: 'noop' });\n";
        let tree = parse(main, Dialect::TypeScript).unwrap();
        let anchor = bootstrap_anchor(tree.root_node(), main).unwrap();
        assert_eq!(&main[span_of(anchor).range()], "AppModule");

        let without = "import { AppModule } from './app';\nconsole.log(AppModule);\n";
        let tree = parse(without, Dialect::TypeScript).unwrap();
        assert!(bootstrap_anchor(tree.root_node(), without).is_none());
        let (_, outputs) = migrate(&[("src/app/a.html", TEMPLATE), ("src/main.ts", without)]);
        let action: Vec<_> = outputs[0]
            .diagnostics()
            .iter()
            .filter(|d| d.is_action_required())
            .collect();
        assert_eq!(action.len(), 1);
    }

    #[test]
    fn missing_bootstrap_file_needs_action() {
        let (text, outputs) = migrate(&[("src/app/a.html", TEMPLATE)]);
        assert!(text.is_none());
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].path(), "src/app/a.html");
        assert!(outputs[0].diagnostics()[0].is_action_required());
    }

    #[test]
    fn nothing_without_gestures() {
        let main = "platform().bootstrapModule(AppModule);\n";
        let (text, outputs) = migrate(&[
            ("src/app/a.html", "<div (click)=\"x()\"></div>"),
            ("src/main.ts", main),
        ]);
        assert_eq!(text.unwrap(), main);
        assert!(outputs.is_empty());
    }
}
