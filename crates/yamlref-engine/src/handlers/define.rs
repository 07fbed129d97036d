//! `{{ define "name" }}` / `{{ block "name" }}` definition sites.

use yamlref_core::{
    Document, Location, Position, Reference, ReferenceKind, ResolvedReference,
};
use yamlref_template::helm;

use crate::Handler;

/// A definition resolves to itself; hovering one shows its doc comment.
pub struct DefineHandler;

impl Handler for DefineHandler {
    fn name(&self) -> &'static str {
        "define"
    }

    fn detect(&self, doc: &Document, pos: Position) -> Option<Reference> {
        helm::at_position(doc, pos).filter(|r| matches!(r.kind, ReferenceKind::DefineBlock { .. }))
    }

    fn resolve(&self, doc: &Document, reference: &Reference) -> ResolvedReference {
        let ReferenceKind::DefineBlock { name } = &reference.kind else {
            return ResolvedReference::unknown();
        };
        let block = helm::define_blocks(doc)
            .into_iter()
            .find(|b| &b.name == name && b.name_range == reference.range);
        match block {
            Some(block) => {
                let resolved = ResolvedReference::found(Location {
                    uri: doc.uri().to_string(),
                    range: block.name_range,
                });
                match block.doc {
                    Some(comment) => resolved.with_message(comment),
                    None => resolved,
                }
            }
            None => ResolvedReference::found(Location {
                uri: doc.uri().to_string(),
                range: reference.range,
            }),
        }
    }
}
