//! `{{workflow.*}}` variables.

use yamlref_core::{
    byte_at_utf16, CompletionItem, Document, Location, Position, Reference, ReferenceKind,
    ResolvedReference,
};
use yamlref_template::argo;
use yamlref_template::expr::{scan_line_exprs, tokenize};
use yamlref_template::yaml_scan::{block_scalars, parent_block, parse_entry};

use crate::Handler;

/// Variables populated by the controller at runtime; they always exist but
/// have no definition site in the manifest.
const RUNTIME_VARS: &[&str] = &[
    "namespace",
    "serviceAccountName",
    "uid",
    "duration",
    "scheduledTime",
    "priority",
    "mainEntrypoint",
];

/// Prefixes whose values are only known while the workflow runs.
const RUNTIME_PREFIXES: &[&str] = &["outputs.", "status", "failures", "creationTimestamp"];

pub struct WorkflowVariableHandler;

impl Handler for WorkflowVariableHandler {
    fn name(&self) -> &'static str {
        "workflow-variable"
    }

    fn detect(&self, doc: &Document, pos: Position) -> Option<Reference> {
        argo::at_position(doc, pos)
            .filter(|r| matches!(r.kind, ReferenceKind::WorkflowVariable { .. }))
    }

    fn resolve(&self, doc: &Document, reference: &Reference) -> ResolvedReference {
        let ReferenceKind::WorkflowVariable { name } = &reference.kind else {
            return ResolvedReference::unknown();
        };

        if name == "name" {
            // resolves to metadata.name, falling back to generateName; a
            // workflow always has a name at runtime even when neither is set
            return match metadata_name(doc) {
                Some(location) => ResolvedReference::found(location),
                None => ResolvedReference::exists_without_location(),
            };
        }

        if let Some(param) = name.strip_prefix("parameters.") {
            return match workflow_parameters(doc)
                .into_iter()
                .find(|(name, _)| name == param)
            {
                Some((_, location)) => ResolvedReference::found(location),
                None => ResolvedReference::missing(format!(
                    "workflow parameter {param:?} is not defined under spec.arguments.parameters"
                )),
            };
        }

        if let Some(key) = name
            .strip_prefix("labels.")
            .map(|k| ("labels", k))
            .or_else(|| name.strip_prefix("annotations.").map(|k| ("annotations", k)))
        {
            // labels/annotations can also be attached at submit time, so an
            // absent key is not an error
            return match metadata_map_key(doc, key.0, key.1) {
                Some(location) => ResolvedReference::found(location),
                None => ResolvedReference::unknown(),
            };
        }

        if RUNTIME_VARS.contains(&name.as_str()) {
            return ResolvedReference::exists_without_location();
        }
        if RUNTIME_PREFIXES.iter().any(|p| name.starts_with(p)) {
            return ResolvedReference::unknown();
        }

        ResolvedReference::missing(format!("unknown workflow variable {name:?}"))
    }

    fn find_all(&self, doc: &Document) -> Option<Vec<Reference>> {
        Some(
            argo::find_all(doc)
                .into_iter()
                .filter(|r| matches!(r.kind, ReferenceKind::WorkflowVariable { .. }))
                .collect(),
        )
    }

    fn complete(&self, doc: &Document, pos: Position) -> Option<Vec<CompletionItem>> {
        let prefix = workflow_prefix_at(doc, pos)?;
        let mut items: Vec<CompletionItem> = ["name"]
            .iter()
            .chain(RUNTIME_VARS)
            .map(|v| CompletionItem::new(*v))
            .collect();
        for (param, _) in workflow_parameters(doc) {
            items.push(
                CompletionItem::new(format!("parameters.{param}"))
                    .with_detail("workflow parameter"),
            );
        }
        items.retain(|i| i.label.starts_with(&prefix));
        items.sort_by(|a, b| a.label.cmp(&b.label));
        Some(items)
    }
}

/// `metadata.name` (or `generateName`) of the first document in the buffer.
fn metadata_name(doc: &Document) -> Option<Location> {
    let metadata = doc.lines().find_map(|(n, raw)| {
        parse_entry(n, raw).filter(|e| e.indent == 0 && e.key == "metadata" && e.is_block())
    })?;
    let fields = block_scalars(doc, metadata.line, metadata.indent);
    let field = fields
        .iter()
        .find(|e| e.key == "name")
        .or_else(|| fields.iter().find(|e| e.key == "generateName"))?;
    field.value.as_ref().map(|v| Location {
        uri: doc.uri().to_string(),
        range: v.range,
    })
}

fn metadata_map_key(doc: &Document, map: &str, key: &str) -> Option<Location> {
    let block = doc.lines().find_map(|(n, raw)| {
        parse_entry(n, raw).filter(|e| e.key == map && e.is_block())
    })?;
    block_scalars(doc, block.line, block.indent)
        .into_iter()
        .find(|e| e.key == key)
        .map(|e| Location {
            uri: doc.uri().to_string(),
            range: e.key_range,
        })
}

/// Top-level workflow parameters (`spec.arguments.parameters`), with the
/// range of each `- name:` value.
fn workflow_parameters(doc: &Document) -> Vec<(String, Location)> {
    let mut out = Vec::new();
    for (n, raw) in doc.lines() {
        let Some(entry) = parse_entry(n, raw) else { continue };
        if entry.key != "parameters" || !entry.is_block() || entry.list_item {
            continue;
        }
        let Some(parent) = parent_block(doc, entry.line, entry.indent) else {
            continue;
        };
        if parent.key != "arguments" {
            continue;
        }
        let Some(grand) = parent_block(doc, parent.line, parent.indent) else {
            continue;
        };
        if !matches!(grand.key.as_str(), "spec" | "workflowSpec") {
            continue;
        }
        for field in block_scalars(doc, entry.line, entry.indent) {
            if field.list_item && field.key == "name" {
                if let Some(v) = &field.value {
                    out.push((
                        v.text.clone(),
                        Location {
                            uri: doc.uri().to_string(),
                            range: v.range,
                        },
                    ));
                }
            }
        }
    }
    out
}

/// The partial `workflow.` tail typed before `pos`, for completion.
fn workflow_prefix_at(doc: &Document, pos: Position) -> Option<String> {
    let line = doc.line(pos.line)?;
    let cursor = byte_at_utf16(line, pos.character)?;
    for expr in scan_line_exprs(line) {
        for tok in tokenize(line, &expr) {
            if tok.quoted || tok.start > cursor || cursor > tok.end {
                continue;
            }
            let typed = &line[tok.start..cursor];
            if let Some(rest) = typed.strip_prefix("workflow.") {
                return Some(rest.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use yamlref_core::Existence;

    const WORKFLOW: &str = indoc! {"
        apiVersion: argoproj.io/v1alpha1
        kind: Workflow
        metadata:
          name: hello
        spec:
          arguments:
            parameters:
              - name: message
                value: hi
          templates:
            - name: main
              container:
                image: alpine
                args: [\"{{workflow.parameters.message}} from {{workflow.name}}\"]
    "};

    fn doc() -> Document {
        Document::new("file:///wf.yaml", WORKFLOW)
    }

    fn resolve(name: &str) -> ResolvedReference {
        let d = doc();
        WorkflowVariableHandler.resolve(
            &d,
            &Reference {
                kind: ReferenceKind::WorkflowVariable { name: name.into() },
                range: yamlref_core::Range::default(),
                uri: d.uri().to_string(),
            },
        )
    }

    #[test]
    fn name_resolves_to_metadata_name() {
        let r = resolve("name");
        assert_eq!(r.exists, Existence::Exists);
        assert_eq!(r.definition.unwrap().range.start.line, 3);
    }

    #[test]
    fn name_without_metadata_still_exists() {
        let d = Document::new("file:///wf.yaml", "kind: Workflow\nspec: {}\n");
        let r = WorkflowVariableHandler.resolve(
            &d,
            &Reference {
                kind: ReferenceKind::WorkflowVariable { name: "name".into() },
                range: yamlref_core::Range::default(),
                uri: d.uri().to_string(),
            },
        );
        assert_eq!(r.exists, Existence::Exists);
        assert!(r.definition.is_none());
    }

    #[test]
    fn parameters_resolve_against_spec_arguments() {
        let r = resolve("parameters.message");
        assert_eq!(r.exists, Existence::Exists);
        assert_eq!(r.definition.unwrap().range.start.line, 7);

        let r = resolve("parameters.missing");
        assert_eq!(r.exists, Existence::Missing);
    }

    #[test]
    fn runtime_variables_exist_without_location() {
        let r = resolve("uid");
        assert_eq!(r.exists, Existence::Exists);
        assert!(r.definition.is_none());

        assert_eq!(resolve("outputs.parameters.x").exists, Existence::Unknown);
    }

    #[test]
    fn unknown_variables_are_missing() {
        assert_eq!(resolve("nmae").exists, Existence::Missing);
    }

    #[test]
    fn completion_offers_parameters() {
        let d = Document::new("file:///wf.yaml", "a: \"{{workflow.par}}\"\n");
        // no parameters defined in this buffer, base vars filtered out
        let items = WorkflowVariableHandler
            .complete(&d, Position::new(0, 18))
            .unwrap();
        assert!(items.is_empty());

        let d = doc();
        // inside `{{workflow.parameters.message}}`, right after `workflow.`
        let items = WorkflowVariableHandler
            .complete(&d, Position::new(13, 33))
            .unwrap();
        assert!(items.iter().any(|i| i.label == "parameters.message"));
    }
}
