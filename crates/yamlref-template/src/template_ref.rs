//! Detector for workflow template references: `templateRef:` blocks (with
//! `clusterScope` possibly several lines below the `name`/`template` pair)
//! and plain `template:` fields on steps and DAG tasks.

use yamlref_core::{Document, Position, Reference, ReferenceKind};

use crate::yaml_scan::{block_scalars, entry_at, parent_block, parse_entry, LineEntry};

fn template_ref_kind(doc: &Document, block: &LineEntry) -> ReferenceKind {
    let fields = block_scalars(doc, block.line, block.indent);
    let mut name = None;
    let mut template = String::new();
    let mut cluster_scope = false;
    for field in &fields {
        let Some(value) = &field.value else { continue };
        match field.key.as_str() {
            "name" => name = Some(value.text.clone()),
            "template" => template = value.text.clone(),
            "clusterScope" => cluster_scope = value.text == "true",
            _ => {}
        }
    }
    ReferenceKind::TemplateRef {
        workflow_template_name: name,
        template,
        cluster_scope,
    }
}

fn local_template_ref(value: &str) -> ReferenceKind {
    ReferenceKind::TemplateRef {
        workflow_template_name: None,
        template: value.to_string(),
        cluster_scope: false,
    }
}

/// The template reference at `pos`, if the cursor is on a `name:` or
/// `template:` value inside a `templateRef:` block, or on a step/task's
/// local `template:` value.
#[must_use]
pub fn at_position(doc: &Document, pos: Position) -> Option<Reference> {
    let entry = entry_at(doc, pos)?;
    let value = entry.value.as_ref()?;
    if !value.range.contains_inclusive(pos) {
        return None;
    }
    let parent = parent_block(doc, entry.line, entry.indent)?;

    if parent.key == "templateRef" && matches!(entry.key.as_str(), "name" | "template") {
        return Some(Reference {
            kind: template_ref_kind(doc, &parent),
            range: value.range,
            uri: doc.uri().to_string(),
        });
    }

    if entry.key == "template" && matches!(parent.key.as_str(), "steps" | "tasks") {
        return Some(Reference {
            kind: local_template_ref(&value.text),
            range: value.range,
            uri: doc.uri().to_string(),
        });
    }

    None
}

/// All template references in the document: one per `templateRef:` block
/// (anchored at its `template:` value, falling back to `name:`) and one per
/// local step/task `template:` field.
#[must_use]
pub fn find_all(doc: &Document) -> Vec<Reference> {
    let mut out = Vec::new();
    for (n, raw) in doc.lines() {
        let Some(entry) = parse_entry(n, raw) else { continue };

        if entry.key == "templateRef" && entry.is_block() {
            let fields = block_scalars(doc, entry.line, entry.indent);
            let anchor = fields
                .iter()
                .find(|f| f.key == "template" && f.value.is_some())
                .or_else(|| fields.iter().find(|f| f.key == "name" && f.value.is_some()));
            if let Some(anchor) = anchor {
                if let Some(value) = &anchor.value {
                    out.push(Reference {
                        kind: template_ref_kind(doc, &entry),
                        range: value.range,
                        uri: doc.uri().to_string(),
                    });
                }
            }
            continue;
        }

        if entry.key == "template" {
            if let Some(value) = &entry.value {
                if let Some(parent) = parent_block(doc, entry.line, entry.indent) {
                    if matches!(parent.key.as_str(), "steps" | "tasks") {
                        out.push(Reference {
                            kind: local_template_ref(&value.text),
                            range: value.range,
                            uri: doc.uri().to_string(),
                        });
                    }
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

    fn doc(text: &str) -> Document {
        Document::new("file:///wf.yaml", text)
    }

    #[test]
    fn cluster_scope_flag_joins_its_block_across_lines() {
        let d = doc(indoc! {"
            steps:
              - - name: call-remote
                  templateRef:
                    name: my-cluster-template
                    template: my-task

                    clusterScope: true
        "});
        let r = at_position(&d, Position::new(3, 14)).unwrap();
        assert_eq!(
            r.kind,
            ReferenceKind::TemplateRef {
                workflow_template_name: Some("my-cluster-template".into()),
                template: "my-task".into(),
                cluster_scope: true,
            }
        );
    }

    #[test]
    fn cluster_scope_does_not_leak_into_sibling_block() {
        let d = doc(indoc! {"
            tasks:
              - name: a
                templateRef:
                  name: first
                  template: one
              - name: b
                templateRef:
                  name: second
                  template: two
                  clusterScope: true
        "});
        let refs = find_all(&d);
        assert_eq!(refs.len(), 2);
        assert_eq!(
            refs[0].kind,
            ReferenceKind::TemplateRef {
                workflow_template_name: Some("first".into()),
                template: "one".into(),
                cluster_scope: false,
            }
        );
        assert!(matches!(
            &refs[1].kind,
            ReferenceKind::TemplateRef { cluster_scope: true, .. }
        ));
    }

    #[test]
    fn local_template_field_on_step() {
        let d = doc(indoc! {"
            steps:
              - - name: hello
                  template: whalesay
        "});
        let r = at_position(&d, Position::new(2, 20)).unwrap();
        assert_eq!(
            r.kind,
            ReferenceKind::TemplateRef {
                workflow_template_name: None,
                template: "whalesay".into(),
                cluster_scope: false,
            }
        );
    }

    #[test]
    fn template_definitions_are_not_references() {
        // `- name:` entries under `templates:` define templates; the
        // detector must not fire on them
        let d = doc(indoc! {"
            templates:
              - name: whalesay
                container:
                  image: docker/whalesay
        "});
        assert!(at_position(&d, Position::new(1, 12)).is_none());
        assert!(find_all(&d).is_empty());
    }
}
