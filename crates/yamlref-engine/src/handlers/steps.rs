//! `{{steps.<name>...}}` and `{{tasks.<name>...}}` references, resolved
//! against the step and task definitions of the same document.

use yamlref_core::{Document, Location, Position, Reference, ReferenceKind, ResolvedReference};
use yamlref_index::template::{parse_step_definitions, StepKind};
use yamlref_template::argo;

use crate::Handler;

pub struct StepTaskHandler;

impl Handler for StepTaskHandler {
    fn name(&self) -> &'static str {
        "step-task"
    }

    fn detect(&self, doc: &Document, pos: Position) -> Option<Reference> {
        argo::at_position(doc, pos)
            .filter(|r| matches!(r.kind, ReferenceKind::Step { .. } | ReferenceKind::Task { .. }))
    }

    fn resolve(&self, doc: &Document, reference: &Reference) -> ResolvedReference {
        let (kind, name, label) = match &reference.kind {
            ReferenceKind::Step { name } => (StepKind::Step, name, "step"),
            ReferenceKind::Task { name } => (StepKind::Task, name, "task"),
            _ => return ResolvedReference::unknown(),
        };
        match parse_step_definitions(doc)
            .into_iter()
            .find(|d| d.kind == kind && &d.name == name)
        {
            Some(def) => ResolvedReference::found(Location {
                uri: def.uri,
                range: def.range,
            }),
            None => ResolvedReference::missing(format!(
                "{label} {name:?} is not defined in this workflow"
            )),
        }
    }

    fn find_all(&self, doc: &Document) -> Option<Vec<Reference>> {
        Some(
            argo::find_all(doc)
                .into_iter()
                .filter(|r| {
                    matches!(r.kind, ReferenceKind::Step { .. } | ReferenceKind::Task { .. })
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use yamlref_core::Existence;

    const WORKFLOW: &str = indoc! {"
        kind: Workflow
        spec:
          templates:
            - name: main
              steps:
                - - name: generate
                    template: gen
                - - name: print
                    template: echo
                    arguments:
                      parameters:
                        - name: message
                          value: \"{{steps.generate.outputs.result}}\"
    "};

    #[test]
    fn step_reference_resolves_to_its_definition() {
        let d = Document::new("/ws/wf.yaml", WORKFLOW);
        let r = StepTaskHandler.detect(&d, Position::new(12, 36)).unwrap();
        assert_eq!(r.kind, ReferenceKind::Step { name: "generate".into() });
        let resolved = StepTaskHandler.resolve(&d, &r);
        assert_eq!(resolved.exists, Existence::Exists);
        assert_eq!(resolved.definition.unwrap().range.start.line, 5);
    }

    #[test]
    fn unknown_step_is_missing() {
        let d = Document::new("/ws/wf.yaml", WORKFLOW);
        let r = StepTaskHandler.resolve(
            &d,
            &Reference {
                kind: ReferenceKind::Step { name: "nope".into() },
                range: yamlref_core::Range::default(),
                uri: d.uri().to_string(),
            },
        );
        assert_eq!(r.exists, Existence::Missing);
    }

    #[test]
    fn steps_do_not_resolve_as_tasks() {
        let d = Document::new("/ws/wf.yaml", WORKFLOW);
        let r = StepTaskHandler.resolve(
            &d,
            &Reference {
                kind: ReferenceKind::Task { name: "generate".into() },
                range: yamlref_core::Range::default(),
                uri: d.uri().to_string(),
            },
        );
        assert_eq!(r.exists, Existence::Missing);
    }
}
