//! `{{ include "name" . }}` / `{{ template "name" . }}` calls.
//!
//! Lookup goes through the define index first; when the name is absent
//! there, a successful chart render proves it comes from somewhere the
//! index cannot see (a dependency chart), while a failed render confirms
//! the error. An unavailable render tool leaves the outcome unknown.

use std::sync::Arc;

use yamlref_core::{
    CompletionItem, Document, Location, Position, Reference, ReferenceKind, ResolvedReference,
};
use yamlref_index::values::chart_root_of_template;
use yamlref_index::TemplateIndex;
use yamlref_template::helm;

use crate::render::Renderer;
use crate::{Handler, Shared};

pub struct IncludeHandler {
    templates: Shared<TemplateIndex>,
    renderer: Arc<dyn Renderer>,
}

impl IncludeHandler {
    #[must_use]
    pub fn new(templates: Shared<TemplateIndex>, renderer: Arc<dyn Renderer>) -> Self {
        Self { templates, renderer }
    }

    fn render_fallback(&self, doc: &Document, name: &str) -> ResolvedReference {
        let Some(chart) = chart_root_of_template(doc.uri()) else {
            return ResolvedReference::missing(format!(
                "template {name:?} is not defined"
            ));
        };
        if !self.renderer.available() {
            return ResolvedReference::unknown();
        }
        let outcome = self.renderer.render(chart, None);
        if outcome.success {
            // defined somewhere the index cannot see, e.g. a dependency chart
            ResolvedReference::exists_without_location()
        } else {
            ResolvedReference::missing(format!("template {name:?} is not defined"))
        }
    }
}

impl Handler for IncludeHandler {
    fn name(&self) -> &'static str {
        "include"
    }

    fn detect(&self, doc: &Document, pos: Position) -> Option<Reference> {
        helm::at_position(doc, pos).filter(|r| matches!(r.kind, ReferenceKind::IncludeRef { .. }))
    }

    fn resolve(&self, doc: &Document, reference: &Reference) -> ResolvedReference {
        let ReferenceKind::IncludeRef { name } = &reference.kind else {
            return ResolvedReference::unknown();
        };
        let Ok(index) = self.templates.read() else {
            return ResolvedReference::unknown();
        };
        match index.lookup_define(name) {
            Some(def) => {
                let resolved = ResolvedReference::found(Location {
                    uri: def.uri.clone(),
                    range: def.range,
                });
                match &def.doc {
                    Some(doc_comment) => resolved.with_message(doc_comment.clone()),
                    None => resolved,
                }
            }
            None => self.render_fallback(doc, name),
        }
    }

    fn find_all(&self, doc: &Document) -> Option<Vec<Reference>> {
        Some(
            helm::find_all(doc)
                .into_iter()
                .filter(|r| matches!(r.kind, ReferenceKind::IncludeRef { .. }))
                .collect(),
        )
    }

    fn complete(&self, doc: &Document, pos: Position) -> Option<Vec<CompletionItem>> {
        // only inside the quoted name of an include/template call
        self.detect(doc, pos)?;
        let Ok(index) = self.templates.read() else {
            return Some(Vec::new());
        };
        let mut items: Vec<CompletionItem> = index
            .defines()
            .map(|def| {
                let item = CompletionItem::new(def.name.clone());
                match def.doc.as_ref().and_then(|d| d.lines().next()) {
                    Some(first) => item.with_detail(first.to_string()),
                    None => item,
                }
            })
            .collect();
        items.sort_by(|a, b| a.label.cmp(&b.label));
        Some(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{RenderOutcome, StaticRenderer, UnavailableRenderer};
    use std::sync::RwLock;
    use yamlref_core::Existence;

    fn index_with_helpers() -> Shared<TemplateIndex> {
        let mut index = TemplateIndex::new();
        index.update_source(
            "/chart/templates/_helpers.tpl",
            "{{/*\nCommon labels\n*/}}\n{{- define \"mychart.labels\" -}}\n{{- end }}\n",
        );
        Arc::new(RwLock::new(index))
    }

    fn template(text: &str) -> Document {
        Document::new("/chart/templates/deployment.yaml", text)
    }

    #[test]
    fn indexed_define_resolves_with_doc_comment() {
        let h = IncludeHandler::new(index_with_helpers(), Arc::new(UnavailableRenderer));
        let d = template(r#"labels: {{ include "mychart.labels" . }}"#);
        let r = h.detect(&d, Position::new(0, 25)).unwrap();
        let resolved = h.resolve(&d, &r);
        assert_eq!(resolved.exists, Existence::Exists);
        assert_eq!(resolved.message.as_deref(), Some("Common labels"));
        assert_eq!(
            resolved.definition.unwrap().uri,
            "/chart/templates/_helpers.tpl"
        );
    }

    #[test]
    fn unindexed_name_with_unavailable_renderer_is_unknown() {
        let h = IncludeHandler::new(index_with_helpers(), Arc::new(UnavailableRenderer));
        let d = template(r#"labels: {{ include "dependency.labels" . }}"#);
        let r = h.detect(&d, Position::new(0, 25)).unwrap();
        assert_eq!(h.resolve(&d, &r).exists, Existence::Unknown);
    }

    #[test]
    fn successful_render_upgrades_unknown_to_exists() {
        let renderer = StaticRenderer::new(RenderOutcome::succeeded(String::new()));
        let h = IncludeHandler::new(index_with_helpers(), Arc::new(renderer));
        let d = template(r#"labels: {{ include "dependency.labels" . }}"#);
        let r = h.detect(&d, Position::new(0, 25)).unwrap();
        let resolved = h.resolve(&d, &r);
        assert_eq!(resolved.exists, Existence::Exists);
        assert!(resolved.definition.is_none());
    }

    #[test]
    fn failed_render_confirms_missing() {
        let renderer = StaticRenderer::new(RenderOutcome::failed(
            "template: mychart/templates/deployment.yaml:1:12: executing ...".to_string(),
        ));
        let h = IncludeHandler::new(index_with_helpers(), Arc::new(renderer));
        let d = template(r#"labels: {{ include "no.such" . }}"#);
        let r = h.detect(&d, Position::new(0, 22)).unwrap();
        assert_eq!(h.resolve(&d, &r).exists, Existence::Missing);
    }

    #[test]
    fn completion_lists_defines() {
        let h = IncludeHandler::new(index_with_helpers(), Arc::new(UnavailableRenderer));
        let d = template(r#"labels: {{ include "my" . }}"#);
        let items = h.complete(&d, Position::new(0, 21)).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].label, "mychart.labels");
        assert_eq!(items[0].detail.as_deref(), Some("Common labels"));
    }
}
