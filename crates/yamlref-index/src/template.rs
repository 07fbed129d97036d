//! The Template Index: Argo workflow template definitions (with their
//! step/task definitions) and Helm `define` blocks, across the workspace.

use std::collections::HashMap;

use vfs::VfsPath;
use yamlref_core::{Document, ManifestKind, Range};
use yamlref_template::helm;
use yamlref_template::yaml_scan::{block_scalars, document_spans, parse_entry};

use crate::{discovery, Result};

/// A named template inside a Workflow-family manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDefinition {
    pub name: String,
    pub kind: ManifestKind,
    /// `metadata.name` (or `generateName`) of the owning manifest.
    pub workflow_name: String,
    pub range: Range,
    pub uri: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Step,
    Task,
}

/// A step or DAG task defined inside a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDefinition {
    pub name: String,
    pub kind: StepKind,
    pub range: Range,
    pub uri: String,
}

/// A Helm `{{ define "name" }}` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelmDefine {
    pub name: String,
    pub doc: Option<String>,
    pub range: Range,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct TemplateKey {
    kind: ManifestKind,
    workflow_name: String,
    template_name: String,
}

#[derive(Debug, Default)]
struct Contribution {
    templates: Vec<TemplateKey>,
    defines: Vec<String>,
    steps: Vec<StepDefinition>,
}

/// Workspace-wide template definition lookup.
///
/// `(kind, workflow_name, template_name)` is the lookup key for Argo
/// definitions; the define name for Helm definitions. A re-scan of a file
/// replaces all of its prior entries atomically.
#[derive(Debug, Default)]
pub struct TemplateIndex {
    templates: HashMap<TemplateKey, TemplateDefinition>,
    defines: HashMap<String, HelmDefine>,
    by_uri: HashMap<String, Contribution>,
}

impl TemplateIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Full workspace scan.
    pub fn initialize(&mut self, roots: &[VfsPath]) -> Result<()> {
        for file in discovery::find_manifest_files(roots, &["yaml", "yml", "tpl"])? {
            if let Err(e) = self.update_file(&file) {
                tracing::warn!(file = file.as_str(), error = %e, "skipping unreadable manifest");
            }
        }
        Ok(())
    }

    /// Re-parse one file and replace its contributions.
    pub fn update_file(&mut self, file: &VfsPath) -> Result<()> {
        let text = file.read_to_string()?;
        self.update_source(file.as_str(), &text);
        Ok(())
    }

    /// Same as [`TemplateIndex::update_file`], from in-memory text.
    pub fn update_source(&mut self, uri: &str, text: &str) {
        self.remove_file(uri);
        let doc = Document::new(uri, text);

        let mut contribution = Contribution::default();
        for def in parse_template_definitions(&doc) {
            let key = TemplateKey {
                kind: def.kind,
                workflow_name: def.workflow_name.clone(),
                template_name: def.name.clone(),
            };
            contribution.templates.push(key.clone());
            self.templates.insert(key, def);
        }
        contribution.steps = parse_step_definitions(&doc);
        for block in helm::define_blocks(&doc) {
            contribution.defines.push(block.name.clone());
            self.defines.insert(
                block.name.clone(),
                HelmDefine {
                    name: block.name,
                    doc: block.doc,
                    range: block.name_range,
                    uri: uri.to_string(),
                },
            );
        }

        tracing::debug!(
            uri,
            templates = contribution.templates.len(),
            defines = contribution.defines.len(),
            "indexed manifest"
        );
        self.by_uri.insert(uri.to_string(), contribution);
    }

    /// Delete all entries owned by `uri`.
    pub fn remove_file(&mut self, uri: &str) {
        let Some(contribution) = self.by_uri.remove(uri) else {
            return;
        };
        for key in &contribution.templates {
            if self.templates.get(key).is_some_and(|d| d.uri == uri) {
                self.templates.remove(key);
            }
        }
        for name in &contribution.defines {
            if self.defines.get(name).is_some_and(|d| d.uri == uri) {
                self.defines.remove(name);
            }
        }
    }

    #[must_use]
    pub fn lookup(
        &self,
        kind: ManifestKind,
        workflow_name: &str,
        template_name: &str,
    ) -> Option<&TemplateDefinition> {
        self.templates.get(&TemplateKey {
            kind,
            workflow_name: workflow_name.to_string(),
            template_name: template_name.to_string(),
        })
    }

    #[must_use]
    pub fn lookup_define(&self, name: &str) -> Option<&HelmDefine> {
        self.defines.get(name)
    }

    pub fn defines(&self) -> impl Iterator<Item = &HelmDefine> {
        self.defines.values()
    }

    pub fn templates(&self) -> impl Iterator<Item = &TemplateDefinition> {
        self.templates.values()
    }

    #[must_use]
    pub fn templates_in(&self, uri: &str) -> Vec<&TemplateDefinition> {
        let Some(contribution) = self.by_uri.get(uri) else {
            return Vec::new();
        };
        contribution
            .templates
            .iter()
            .filter_map(|k| self.templates.get(k))
            .filter(|d| d.uri == uri)
            .collect()
    }

    #[must_use]
    pub fn steps_in(&self, uri: &str) -> &[StepDefinition] {
        self.by_uri
            .get(uri)
            .map_or(&[], |c| c.steps.as_slice())
    }
}

/// Extract template definitions from every YAML document in the buffer.
///
/// Line-oriented on purpose: a file that fails structural parsing halfway
/// through still contributes the definitions that could be read.
#[must_use]
pub fn parse_template_definitions(doc: &Document) -> Vec<TemplateDefinition> {
    let mut out = Vec::new();
    for (first, last) in document_spans(doc) {
        let mut kind = None;
        let mut workflow_name = None;
        let mut templates_blocks = Vec::new();

        for n in first..=last {
            let Some(raw) = doc.line(n) else { break };
            let Some(entry) = parse_entry(n, raw) else {
                continue;
            };
            if entry.indent == 0 && entry.key == "kind" {
                if let Some(v) = &entry.value {
                    kind = ManifestKind::from_kind_value(&v.text);
                }
            }
            if entry.indent == 0 && entry.key == "metadata" && entry.is_block() {
                let fields = block_scalars(doc, entry.line, entry.indent);
                workflow_name = fields
                    .iter()
                    .find(|e| e.key == "name")
                    .or_else(|| fields.iter().find(|e| e.key == "generateName"))
                    .and_then(|e| e.value.as_ref())
                    .map(|v| v.text.clone());
            }
            if entry.key == "templates" && entry.is_block() && !entry.list_item {
                templates_blocks.push(entry);
            }
        }

        let (Some(kind), Some(workflow_name)) = (kind, workflow_name) else {
            continue;
        };
        for block in templates_blocks {
            let fields = block_scalars(doc, block.line, block.indent);
            let Some(item_indent) = fields
                .iter()
                .filter(|e| e.list_item)
                .map(|e| e.indent)
                .min()
            else {
                continue;
            };
            for field in fields {
                if field.list_item
                    && field.indent == item_indent
                    && field.key == "name"
                {
                    if let Some(v) = &field.value {
                        out.push(TemplateDefinition {
                            name: v.text.clone(),
                            kind,
                            workflow_name: workflow_name.clone(),
                            range: v.range,
                            uri: doc.uri().to_string(),
                        });
                    }
                }
            }
        }
    }
    out
}

/// Extract step and DAG task definitions (`steps:` / `tasks:` list items).
#[must_use]
pub fn parse_step_definitions(doc: &Document) -> Vec<StepDefinition> {
    let mut out = Vec::new();
    for (n, raw) in doc.lines() {
        let Some(entry) = parse_entry(n, raw) else { continue };
        let kind = match entry.key.as_str() {
            "steps" => StepKind::Step,
            "tasks" => StepKind::Task,
            _ => continue,
        };
        if !entry.is_block() {
            continue;
        }
        let fields = block_scalars(doc, entry.line, entry.indent);
        let Some(item_indent) = fields
            .iter()
            .filter(|e| e.list_item && e.key == "name")
            .map(|e| e.indent)
            .min()
        else {
            continue;
        };
        for field in fields {
            if field.list_item && field.key == "name" && field.indent == item_indent {
                if let Some(v) = &field.value {
                    out.push(StepDefinition {
                        name: v.text.clone(),
                        kind,
                        range: v.range,
                        uri: doc.uri().to_string(),
                    });
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const WORKFLOW_TEMPLATE: &str = indoc! {"
        apiVersion: argoproj.io/v1alpha1
        kind: WorkflowTemplate
        metadata:
          name: my-templates
        spec:
          templates:
            - name: build
              container:
                image: builder:latest
            - name: test
              steps:
                - - name: unit
                    template: build
    "};

    #[test]
    fn indexes_templates_by_kind_workflow_and_name() {
        let mut idx = TemplateIndex::new();
        idx.update_source("file:///wt.yaml", WORKFLOW_TEMPLATE);

        let def = idx
            .lookup(ManifestKind::WorkflowTemplate, "my-templates", "build")
            .unwrap();
        assert_eq!(def.range.start.line, 6);
        assert!(idx
            .lookup(ManifestKind::WorkflowTemplate, "my-templates", "test")
            .is_some());
        // nested step names must not be indexed as templates
        assert!(idx
            .lookup(ManifestKind::WorkflowTemplate, "my-templates", "unit")
            .is_none());
    }

    #[test]
    fn generate_name_is_a_valid_workflow_name() {
        let mut idx = TemplateIndex::new();
        idx.update_source(
            "file:///wf.yaml",
            indoc! {"
                kind: Workflow
                metadata:
                  generateName: run-
                spec:
                  templates:
                    - name: main
            "},
        );
        assert!(idx.lookup(ManifestKind::Workflow, "run-", "main").is_some());
    }

    #[test]
    fn remove_then_update_is_idempotent() {
        let mut a = TemplateIndex::new();
        a.update_source("file:///wt.yaml", WORKFLOW_TEMPLATE);

        let mut b = TemplateIndex::new();
        b.update_source("file:///wt.yaml", WORKFLOW_TEMPLATE);
        b.remove_file("file:///wt.yaml");
        b.update_source("file:///wt.yaml", WORKFLOW_TEMPLATE);

        let names = |idx: &TemplateIndex| {
            let mut v: Vec<String> = idx.templates().map(|d| d.name.clone()).collect();
            v.sort();
            v
        };
        assert_eq!(names(&a), names(&b));
    }

    #[test]
    fn removal_does_not_steal_another_files_entry() {
        let mut idx = TemplateIndex::new();
        idx.update_source("file:///a.yaml", WORKFLOW_TEMPLATE);
        // same (kind, workflow, template) key re-contributed by another file
        idx.update_source("file:///b.yaml", WORKFLOW_TEMPLATE);
        idx.remove_file("file:///a.yaml");

        let def = idx
            .lookup(ManifestKind::WorkflowTemplate, "my-templates", "build")
            .unwrap();
        assert_eq!(def.uri, "file:///b.yaml");
    }

    #[test]
    fn helm_defines_are_indexed_with_docs() {
        let mut idx = TemplateIndex::new();
        idx.update_source(
            "file:///chart/templates/_helpers.tpl",
            indoc! {r#"
                {{/*
                Selector labels
                */}}
                {{- define "mychart.selectorLabels" -}}
                app: {{ .Chart.Name }}
                {{- end }}
            "#},
        );
        let def = idx.lookup_define("mychart.selectorLabels").unwrap();
        assert_eq!(def.doc.as_deref(), Some("Selector labels"));
        assert_eq!(def.range.start.line, 3);
    }

    #[test]
    fn malformed_yaml_contributes_nothing_but_does_not_fail() {
        let mut idx = TemplateIndex::new();
        idx.update_source("file:///bad.yaml", ": : :\n\t???\n  kind: [unclosed");
        assert_eq!(idx.templates().count(), 0);
    }

    #[test]
    fn step_definitions_are_collected() {
        let mut idx = TemplateIndex::new();
        idx.update_source("file:///wt.yaml", WORKFLOW_TEMPLATE);
        let steps = idx.steps_in("file:///wt.yaml");
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].name, "unit");
        assert_eq!(steps[0].kind, StepKind::Step);
    }
}
