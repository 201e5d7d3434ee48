//! Component and directive decorator metadata.
//!
//! `@Component({...})` and `@Directive({...})` carry embedded sources (inline
//! templates and styles) and binding metadata. This module locates them so
//! the driver can scan embedded text and the matcher can keep metadata
//! strings out of selector matching.

use tree_sitter::Node;

use uplift_core::patch::Span;

use crate::parser::{named_children, node_text, span_of, string_content_span, string_value};

const METADATA_DECORATORS: &[&str] = &["Component", "Directive"];

/// Metadata of one decorated class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentMetadata {
    /// Decorator name (`Component` or `Directive`).
    pub decorator: String,
    /// Span of the whole decorator.
    pub span: Span,
    /// Content span of the `selector` string.
    pub selector: Option<Span>,
    /// Content span of an inline `template`.
    pub template: Option<Span>,
    /// `templateUrl`, when the template is external.
    pub template_url: Option<String>,
    /// Content spans of inline `styles` (a string or an array of strings).
    pub styles: Vec<Span>,
    /// `styleUrls` and `styleUrl` entries.
    pub style_urls: Vec<String>,
    /// Content spans of `host` object keys.
    pub host_keys: Vec<Span>,
    /// Spans of metadata values that are not selectors.
    pub non_selector_values: Vec<Span>,
}

impl ComponentMetadata {
    /// Whether `span` lies inside metadata that must not be matched as a selector.
    pub fn excludes(&self, span: Span) -> bool {
        self.non_selector_values.iter().any(|s| s.contains(&span))
    }
}

/// Key of an object pair as written (identifier or string).
pub fn pair_key<'s>(pair: Node<'_>, source: &'s str) -> Option<&'s str> {
    let key = pair.child_by_field_name("key")?;
    match key.kind() {
        "property_identifier" | "identifier" => Some(node_text(key, source)),
        "string" => string_value(key, source),
        _ => None,
    }
}

/// Name of the decorator (`Component` for `@Component(...)` or `@core.Component(...)`).
fn decorator_call<'t>(decorator: Node<'t>, source: &str) -> Option<(String, Node<'t>)> {
    let call = named_children(decorator)
        .into_iter()
        .find(|n| n.kind() == "call_expression")?;
    let function = call.child_by_field_name("function")?;
    let name = match function.kind() {
        "identifier" => node_text(function, source),
        "member_expression" => node_text(function.child_by_field_name("property")?, source),
        _ => return None,
    };
    Some((name.to_string(), call))
}

fn strings_in(node: Node<'_>) -> Vec<Span> {
    match node.kind() {
        "string" | "template_string" => string_content_span(node).into_iter().collect(),
        "array" => named_children(node)
            .into_iter()
            .filter_map(string_content_span)
            .collect(),
        _ => Vec::new(),
    }
}

fn collect_decorators<'t>(node: Node<'t>, out: &mut Vec<Node<'t>>) {
    if node.kind() == "decorator" {
        out.push(node);
    }
    for child in named_children(node) {
        collect_decorators(child, out);
    }
}

fn read_metadata(decorator: Node<'_>, source: &str) -> Option<ComponentMetadata> {
    let (name, call) = decorator_call(decorator, source)?;
    if !METADATA_DECORATORS.contains(&name.as_str()) {
        return None;
    }
    let args = call.child_by_field_name("arguments")?;
    let object = named_children(args)
        .into_iter()
        .find(|n| n.kind() == "object")?;

    let mut meta = ComponentMetadata {
        decorator: name,
        span: span_of(decorator),
        ..ComponentMetadata::default()
    };

    for pair in named_children(object)
        .into_iter()
        .filter(|n| n.kind() == "pair")
    {
        let Some(key) = pair_key(pair, source) else {
            continue;
        };
        let Some(value) = pair.child_by_field_name("value") else {
            continue;
        };
        match key {
            "selector" => meta.selector = string_content_span(value),
            "template" => {
                meta.template = string_content_span(value);
                meta.non_selector_values.push(span_of(value));
            }
            "templateUrl" => {
                meta.template_url = string_value(value, source).map(str::to_string);
                meta.non_selector_values.push(span_of(value));
            }
            "styles" => {
                meta.styles = strings_in(value);
                meta.non_selector_values.push(span_of(value));
            }
            "styleUrls" | "styleUrl" => {
                meta.style_urls = strings_in(value)
                    .into_iter()
                    .filter_map(|s| source.get(s.range()).map(str::to_string))
                    .collect();
                meta.non_selector_values.push(span_of(value));
            }
            "host" => {
                if value.kind() == "object" {
                    for host_pair in named_children(value)
                        .into_iter()
                        .filter(|n| n.kind() == "pair")
                    {
                        if let Some(k) = host_pair.child_by_field_name("key") {
                            if let Some(span) = string_content_span(k) {
                                meta.host_keys.push(span);
                            }
                        }
                    }
                }
                meta.non_selector_values.push(span_of(value));
            }
            "inputs" | "outputs" | "exportAs" | "providers" | "changeDetection"
            | "encapsulation" | "animations" | "queries" => {
                meta.non_selector_values.push(span_of(value));
            }
            _ => {}
        }
    }
    Some(meta)
}

/// Metadata of every `@Component`/`@Directive` in the file.
pub fn component_metadata(root: Node<'_>, source: &str) -> Vec<ComponentMetadata> {
    let mut decorators = Vec::new();
    collect_decorators(root, &mut decorators);
    decorators
        .into_iter()
        .filter_map(|d| read_metadata(d, source))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse, Dialect};

    const SOURCE: &str = r#"
import { Component, Directive } from '@angular/core';

@Component({
  selector: 'app-form, mat-input-container',
  template: `<mat-input-container></mat-input-container>`,
  styles: ['.mat-input-wrapper { color: red; }', `.x {}`],
  host: { '[dividerColor]': 'color', '(onOpen)': 'open()', 'class': 'mat-input-container' },
  inputs: ['mat-input-container'],
})
export class FormComponent {}

@Directive({ selector: '[cdkPortalHost]', templateUrl: './d.html', styleUrls: ['./d.css'] })
export class PortalDirective {}

@Injectable()
export class Service {}
"#;

    fn metadata() -> Vec<ComponentMetadata> {
        let tree = parse(SOURCE, Dialect::TypeScript).unwrap();
        component_metadata(tree.root_node(), SOURCE)
    }

    #[test]
    fn finds_component_and_directive() {
        let meta = metadata();
        assert_eq!(meta.len(), 2);
        assert_eq!(meta[0].decorator, "Component");
        assert_eq!(meta[1].decorator, "Directive");
    }

    #[test]
    fn inline_sources_have_content_spans() {
        let meta = &metadata()[0];
        let template = meta.template.unwrap();
        assert_eq!(
            &SOURCE[template.range()],
            "<mat-input-container></mat-input-container>"
        );
        let styles: Vec<&str> = meta.styles.iter().map(|s| &SOURCE[s.range()]).collect();
        assert_eq!(styles, vec![".mat-input-wrapper { color: red; }", ".x {}"]);
        let selector = meta.selector.unwrap();
        assert_eq!(&SOURCE[selector.range()], "app-form, mat-input-container");
    }

    #[test]
    fn host_keys_and_exclusions() {
        let meta = &metadata()[0];
        let keys: Vec<&str> = meta.host_keys.iter().map(|s| &SOURCE[s.range()]).collect();
        assert_eq!(keys, vec!["[dividerColor]", "(onOpen)", "class"]);
        let inputs_at = SOURCE.find("['mat-input-container']").unwrap();
        assert!(meta.excludes(Span::new(inputs_at + 2, inputs_at + 21)));
        assert!(!meta.excludes(meta.selector.unwrap()));
    }

    #[test]
    fn external_urls() {
        let meta = &metadata()[1];
        assert_eq!(meta.template_url.as_deref(), Some("./d.html"));
        assert_eq!(meta.style_urls, vec!["./d.css".to_string()]);
        assert!(meta.template.is_none());
    }
}
