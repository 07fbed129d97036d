//! Go-template control keywords and common template functions under the
//! cursor. These always exist; resolution attaches a short description for
//! hover display.

use yamlref_core::{Document, Position, Reference, ReferenceKind, ResolvedReference};
use yamlref_template::helm;

use crate::Handler;

const KEYWORD_DOCS: &[(&str, &str)] = &[
    ("if", "conditional block, closed by end"),
    ("else", "alternative branch of an if or with block"),
    ("end", "closes an if, range, with, define or block"),
    ("range", "iterates over a list or map"),
    ("with", "rebinds the dot to its argument when non-empty"),
    ("define", "names a reusable template block"),
    ("block", "defines a template and renders it in place"),
    ("template", "renders a named template"),
    ("include", "renders a named template into a string"),
    ("toYaml", "serializes its argument as YAML"),
    ("tpl", "renders a string as a template"),
    ("required", "fails rendering when the value is empty"),
    ("default", "fallback value when the argument is empty"),
    ("printf", "formats a string"),
    ("quote", "wraps its argument in double quotes"),
    ("nindent", "indents a block, starting with a newline"),
    ("indent", "indents every line of a block"),
];

pub struct KeywordHandler;

impl Handler for KeywordHandler {
    fn name(&self) -> &'static str {
        "keyword"
    }

    fn detect(&self, doc: &Document, pos: Position) -> Option<Reference> {
        helm::at_position(doc, pos)
            .filter(|r| matches!(r.kind, ReferenceKind::GoTemplateKeyword { .. }))
    }

    fn resolve(&self, _doc: &Document, reference: &Reference) -> ResolvedReference {
        let ReferenceKind::GoTemplateKeyword { keyword } = &reference.kind else {
            return ResolvedReference::unknown();
        };
        let resolved = ResolvedReference::exists_without_location();
        match KEYWORD_DOCS.iter().find(|(k, _)| k == keyword) {
            Some((_, doc)) => resolved.with_message(format!("{keyword}: {doc}")),
            None => resolved,
        }
    }
}
