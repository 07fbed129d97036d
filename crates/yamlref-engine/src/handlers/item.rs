//! `{{item}}` and `{{item.property}}` inside `withItems` / `withParam`
//! loops.

use std::collections::BTreeMap;

use yamlref_core::{
    Document, Location, Position, Range, Reference, ReferenceKind, ResolvedReference,
};
use yamlref_template::argo;
use yamlref_template::yaml_scan::{block_scalars, parent_block, parse_entry, LineEntry};

use crate::Handler;

pub struct ItemHandler;

impl Handler for ItemHandler {
    fn name(&self) -> &'static str {
        "item"
    }

    fn detect(&self, doc: &Document, pos: Position) -> Option<Reference> {
        argo::at_position(doc, pos)
            .filter(|r| matches!(r.kind, ReferenceKind::Item | ReferenceKind::ItemProperty { .. }))
    }

    fn resolve(&self, doc: &Document, reference: &Reference) -> ResolvedReference {
        let Some(source) = loop_source(doc, reference.range.start.line) else {
            return ResolvedReference::missing(
                "no withItems or withParam found for the enclosing step",
            );
        };

        let location = Location {
            uri: doc.uri().to_string(),
            range: source.key_range,
        };
        match &reference.kind {
            ReferenceKind::Item => ResolvedReference::found(location),
            ReferenceKind::ItemProperty { property } => {
                if source.key == "withParam" {
                    // item shape comes from a runtime JSON parameter
                    return ResolvedReference::unknown();
                }
                match item_properties(doc, &source).get(property) {
                    Some(range) => ResolvedReference::found(Location {
                        uri: doc.uri().to_string(),
                        range: *range,
                    }),
                    None => ResolvedReference::missing(format!(
                        "property {property:?} not found in withItems"
                    )),
                }
            }
            _ => ResolvedReference::unknown(),
        }
    }

    fn find_all(&self, doc: &Document) -> Option<Vec<Reference>> {
        Some(
            argo::find_all(doc)
                .into_iter()
                .filter(|r| {
                    matches!(r.kind, ReferenceKind::Item | ReferenceKind::ItemProperty { .. })
                })
                .collect(),
        )
    }
}

/// Find the `withItems:` / `withParam:` entry of the step enclosing
/// `usage_line`.
///
/// The enclosing step is delimited by walking the ancestor chain up to the
/// `steps:` / `tasks:` block; the direct-field indent reached just below
/// that block bounds the step item, and the loop source must sit at that
/// same indent between the step's boundaries.
fn loop_source(doc: &Document, usage_line: u32) -> Option<LineEntry> {
    let raw = doc.line(usage_line)?;
    let mut line = usage_line;
    let mut indent = raw.len() - raw.trim_start().len();
    let mut field_indent = indent;

    let steps = loop {
        let parent = parent_block(doc, line, indent)?;
        if matches!(parent.key.as_str(), "steps" | "tasks") && parent.is_block() {
            break parent;
        }
        field_indent = parent.indent;
        line = parent.line;
        indent = parent.indent;
    };

    let is_boundary = |n: u32| {
        doc.line(n)
            .and_then(|raw| parse_entry(n, raw))
            .is_some_and(|e| e.list_item && e.indent == field_indent && e.key == "name")
    };

    let mut start = steps.line + 1;
    for n in (steps.line + 1..=usage_line).rev() {
        if is_boundary(n) {
            start = n;
            break;
        }
    }
    let mut end = doc.line_count();
    for n in usage_line + 1..doc.line_count() {
        if is_boundary(n) {
            end = n;
            break;
        }
        if let Some(e) = doc.line(n).and_then(|raw| parse_entry(n, raw)) {
            if e.indent <= steps.indent {
                end = n;
                break;
            }
        }
    }

    (start..end).find_map(|n| {
        let entry = parse_entry(n, doc.line(n)?)?;
        (entry.indent == field_indent
            && matches!(entry.key.as_str(), "withItems" | "withParam"))
        .then_some(entry)
    })
}

/// Property names available on each item of a `withItems` list, with the
/// range of their first occurrence.
fn item_properties(doc: &Document, source: &LineEntry) -> BTreeMap<String, Range> {
    let mut out = BTreeMap::new();

    // flow style: `withItems: [{a: 1, b: 2}, ...]`
    if let Some(value) = &source.value {
        collect_flow_keys(&value.text, value.range, &mut out);
        return out;
    }

    for entry in block_scalars(doc, source.line, source.indent) {
        out.entry(entry.key.clone()).or_insert(entry.key_range);
    }
    // block items written as flow maps: `- {a: 1, b: 2}`
    for n in source.line + 1..doc.line_count() {
        let Some(raw) = doc.line(n) else { break };
        let trimmed = raw.trim_start();
        let indent = raw.len() - trimmed.len();
        if !trimmed.is_empty() && indent <= source.indent {
            break;
        }
        if let Some(rest) = trimmed.strip_prefix("- {") {
            let range = Range::on_line(n, 0, 0);
            collect_flow_keys(rest, range, &mut out);
        }
    }
    out
}

fn collect_flow_keys(text: &str, range: Range, out: &mut BTreeMap<String, Range>) {
    // `- {a: 1}` lines arrive with the opening brace already stripped
    let segments: Vec<&str> = if text.contains('{') {
        text.split('{').skip(1).collect()
    } else {
        vec![text]
    };
    for segment in segments {
        let body = segment.split('}').next().unwrap_or(segment);
        for field in body.split(',') {
            if let Some((key, _)) = field.split_once(':') {
                let key = key.trim().trim_matches('"').trim_matches('\'');
                if !key.is_empty() && !key.contains('[') {
                    out.entry(key.to_string()).or_insert(range);
                }
            }
        }
    }
}
