//! Workflow template references: `templateRef:` blocks against the
//! workspace template index, plain step/task `template:` fields against the
//! templates defined in the same document.

use yamlref_core::{
    CompletionItem, Document, Location, ManifestKind, Position, Reference, ReferenceKind,
    ResolvedReference,
};
use yamlref_index::template::parse_template_definitions;
use yamlref_index::TemplateIndex;
use yamlref_template::template_ref;
use yamlref_template::yaml_scan::{block_scalars, entry_at, parent_block};

use crate::{Handler, Shared};

pub struct TemplateRefHandler {
    templates: Shared<TemplateIndex>,
}

impl TemplateRefHandler {
    #[must_use]
    pub fn new(templates: Shared<TemplateIndex>) -> Self {
        Self { templates }
    }

    fn resolve_remote(
        &self,
        workflow_template_name: &str,
        template: &str,
        cluster_scope: bool,
    ) -> ResolvedReference {
        let kind = if cluster_scope {
            ManifestKind::ClusterWorkflowTemplate
        } else {
            ManifestKind::WorkflowTemplate
        };
        let kind_name = kind_name(kind);
        let Ok(index) = self.templates.read() else {
            return ResolvedReference::unknown();
        };

        if template.is_empty() {
            // cursor on the workflow template name with no template field yet
            let mut owned: Vec<_> = index
                .templates()
                .filter(|d| d.kind == kind && d.workflow_name == workflow_template_name)
                .collect();
            owned.sort_by_key(|d| (d.uri.clone(), d.range.start));
            return match owned.first() {
                Some(def) => ResolvedReference::found(Location {
                    uri: def.uri.clone(),
                    range: def.range,
                }),
                None => ResolvedReference::missing(format!(
                    "{kind_name} {workflow_template_name:?} not found in the workspace"
                )),
            };
        }

        match index.lookup(kind, workflow_template_name, template) {
            Some(def) => ResolvedReference::found(Location {
                uri: def.uri.clone(),
                range: def.range,
            }),
            None => {
                let workflow_exists = index
                    .templates()
                    .any(|d| d.kind == kind && d.workflow_name == workflow_template_name);
                if workflow_exists {
                    ResolvedReference::missing(format!(
                        "template {template:?} not found in {kind_name} {workflow_template_name:?}"
                    ))
                } else {
                    ResolvedReference::missing(format!(
                        "{kind_name} {workflow_template_name:?} not found in the workspace"
                    ))
                }
            }
        }
    }

    fn resolve_local(&self, doc: &Document, template: &str) -> ResolvedReference {
        match parse_template_definitions(doc)
            .into_iter()
            .find(|d| d.name == template)
        {
            Some(def) => ResolvedReference::found(Location {
                uri: def.uri,
                range: def.range,
            }),
            None => ResolvedReference::missing(format!(
                "template {template:?} is not defined in this workflow"
            )),
        }
    }
}

fn kind_name(kind: ManifestKind) -> &'static str {
    match kind {
        ManifestKind::ClusterWorkflowTemplate => "ClusterWorkflowTemplate",
        _ => "WorkflowTemplate",
    }
}

impl Handler for TemplateRefHandler {
    fn name(&self) -> &'static str {
        "template-ref"
    }

    fn detect(&self, doc: &Document, pos: Position) -> Option<Reference> {
        template_ref::at_position(doc, pos)
    }

    fn resolve(&self, doc: &Document, reference: &Reference) -> ResolvedReference {
        let ReferenceKind::TemplateRef {
            workflow_template_name,
            template,
            cluster_scope,
        } = &reference.kind
        else {
            return ResolvedReference::unknown();
        };
        match workflow_template_name {
            Some(name) => self.resolve_remote(name, template, *cluster_scope),
            None => self.resolve_local(doc, template),
        }
    }

    fn find_all(&self, doc: &Document) -> Option<Vec<Reference>> {
        Some(template_ref::find_all(doc))
    }

    fn complete(&self, doc: &Document, pos: Position) -> Option<Vec<CompletionItem>> {
        let entry = entry_at(doc, pos)?;
        let parent = parent_block(doc, entry.line, entry.indent)?;

        if parent.key == "templateRef" {
            let Ok(index) = self.templates.read() else {
                return Some(Vec::new());
            };
            let fields = block_scalars(doc, parent.line, parent.indent);
            let cluster = fields
                .iter()
                .any(|f| f.key == "clusterScope" && f.value.as_ref().is_some_and(|v| v.text == "true"));
            let kind = if cluster {
                ManifestKind::ClusterWorkflowTemplate
            } else {
                ManifestKind::WorkflowTemplate
            };

            let mut items: Vec<CompletionItem> = match entry.key.as_str() {
                "name" => {
                    let mut names: Vec<_> = index
                        .templates()
                        .filter(|d| d.kind == kind)
                        .map(|d| d.workflow_name.clone())
                        .collect();
                    names.sort();
                    names.dedup();
                    names
                        .into_iter()
                        .map(|n| CompletionItem::new(n).with_detail(kind_name(kind)))
                        .collect()
                }
                "template" => {
                    let workflow = fields
                        .iter()
                        .find(|f| f.key == "name")
                        .and_then(|f| f.value.as_ref().map(|v| v.text.clone()))?;
                    index
                        .templates()
                        .filter(|d| d.kind == kind && d.workflow_name == workflow)
                        .map(|d| CompletionItem::new(d.name.clone()).with_detail(workflow.clone()))
                        .collect()
                }
                _ => return None,
            };
            items.sort_by(|a, b| a.label.cmp(&b.label));
            return Some(items);
        }

        if entry.key == "template" && matches!(parent.key.as_str(), "steps" | "tasks") {
            let mut items: Vec<CompletionItem> = parse_template_definitions(doc)
                .into_iter()
                .map(|d| CompletionItem::new(d.name))
                .collect();
            items.sort_by(|a, b| a.label.cmp(&b.label));
            return Some(items);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use std::sync::{Arc, RwLock};
    use yamlref_core::Existence;

    const WORKFLOW_TEMPLATE: &str = indoc! {"
        kind: WorkflowTemplate
        metadata:
          name: shared-tasks
        spec:
          templates:
            - name: build
            - name: test
    "};

    const CLUSTER_TEMPLATE: &str = indoc! {"
        kind: ClusterWorkflowTemplate
        metadata:
          name: cluster-tasks
        spec:
          templates:
            - name: deploy
    "};

    fn handler() -> TemplateRefHandler {
        let mut index = TemplateIndex::new();
        index.update_source("/ws/wt.yaml", WORKFLOW_TEMPLATE);
        index.update_source("/ws/cwt.yaml", CLUSTER_TEMPLATE);
        TemplateRefHandler::new(Arc::new(RwLock::new(index)))
    }

    fn reference(name: Option<&str>, template: &str, cluster: bool) -> Reference {
        Reference {
            kind: ReferenceKind::TemplateRef {
                workflow_template_name: name.map(str::to_string),
                template: template.to_string(),
                cluster_scope: cluster,
            },
            range: yamlref_core::Range::default(),
            uri: "/ws/wf.yaml".to_string(),
        }
    }

    #[test]
    fn remote_reference_resolves_through_the_index() {
        let h = handler();
        let d = Document::new("/ws/wf.yaml", "kind: Workflow\n");
        let r = h.resolve(&d, &reference(Some("shared-tasks"), "build", false));
        assert_eq!(r.exists, Existence::Exists);
        assert_eq!(r.definition.unwrap().uri, "/ws/wt.yaml");
    }

    #[test]
    fn cluster_scope_switches_the_manifest_kind() {
        let h = handler();
        let d = Document::new("/ws/wf.yaml", "kind: Workflow\n");

        let r = h.resolve(&d, &reference(Some("cluster-tasks"), "deploy", true));
        assert_eq!(r.exists, Existence::Exists);

        // same name without clusterScope must not match
        let r = h.resolve(&d, &reference(Some("cluster-tasks"), "deploy", false));
        assert_eq!(r.exists, Existence::Missing);
    }

    #[test]
    fn missing_template_names_the_workflow_template() {
        let h = handler();
        let d = Document::new("/ws/wf.yaml", "kind: Workflow\n");
        let r = h.resolve(&d, &reference(Some("shared-tasks"), "deploy", false));
        assert_eq!(r.exists, Existence::Missing);
        assert!(r.message.unwrap().contains("shared-tasks"));
    }

    #[test]
    fn local_reference_resolves_within_the_document() {
        let h = handler();
        let d = Document::new(
            "/ws/wf.yaml",
            indoc! {"
                kind: Workflow
                metadata:
                  name: local
                spec:
                  templates:
                    - name: main
                      steps:
                        - - name: say
                            template: whalesay
                    - name: whalesay
            "},
        );
        let r = h.resolve(&d, &reference(None, "whalesay", false));
        assert_eq!(r.exists, Existence::Exists);
        assert_eq!(r.definition.unwrap().range.start.line, 9);

        let r = h.resolve(&d, &reference(None, "no-such", false));
        assert_eq!(r.exists, Existence::Missing);
    }

    #[test]
    fn completion_for_template_values_in_a_template_ref() {
        let h = handler();
        let d = Document::new(
            "/ws/wf.yaml",
            indoc! {"
                steps:
                  - - name: call
                      templateRef:
                        name: shared-tasks
                        template: b
            "},
        );
        // cursor on the template value
        let items = h.complete(&d, Position::new(4, 19)).unwrap();
        let labels: Vec<_> = items.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["build", "test"]);
    }
}
