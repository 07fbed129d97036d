//! Detectors for Argo workflow template expressions: `{{workflow.*}}`,
//! `{{item}}` / `{{item.property}}`, and `{{steps.*}}` / `{{tasks.*}}`.

use yamlref_core::{utf16_col, Document, Position, Range, Reference, ReferenceKind};

use crate::expr::{scan_line_exprs, tokenize, ExprToken};

fn token_range(line_no: u32, line: &str, tok: &ExprToken) -> Range {
    Range::on_line(
        line_no,
        utf16_col(line, tok.start),
        utf16_col(line, tok.end),
    )
}

fn classify_token(tok: &ExprToken) -> Option<ReferenceKind> {
    if tok.quoted {
        return None;
    }
    let text = tok.text.as_str();
    if text == "item" {
        return Some(ReferenceKind::Item);
    }
    // The property-qualified form must win over bare `item`: the detector
    // only ever sees whole tokens, so `item.name` cannot fall back to
    // `item`.
    if let Some(prop) = text.strip_prefix("item.") {
        if !prop.is_empty() {
            return Some(ReferenceKind::ItemProperty {
                property: prop.to_string(),
            });
        }
        return Some(ReferenceKind::Item);
    }
    if let Some(tail) = text.strip_prefix("workflow.") {
        if !tail.is_empty() {
            return Some(ReferenceKind::WorkflowVariable {
                name: tail.to_string(),
            });
        }
    }
    if let Some(tail) = text.strip_prefix("steps.") {
        let name = tail.split('.').next().unwrap_or("");
        if !name.is_empty() {
            return Some(ReferenceKind::Step {
                name: name.to_string(),
            });
        }
    }
    if let Some(tail) = text.strip_prefix("tasks.") {
        let name = tail.split('.').next().unwrap_or("");
        if !name.is_empty() {
            return Some(ReferenceKind::Task {
                name: name.to_string(),
            });
        }
    }
    None
}

fn scan_line(uri: &str, line_no: u32, line: &str) -> Vec<Reference> {
    let mut out = Vec::new();
    for expr in scan_line_exprs(line) {
        for tok in tokenize(line, &expr) {
            if let Some(kind) = classify_token(&tok) {
                out.push(Reference {
                    kind,
                    range: token_range(line_no, line, &tok),
                    uri: uri.to_string(),
                });
            }
        }
    }
    out
}

/// All Argo expression references in the document.
#[must_use]
pub fn find_all(doc: &Document) -> Vec<Reference> {
    doc.lines()
        .flat_map(|(n, line)| scan_line(doc.uri(), n, line))
        .collect()
}

/// The Argo expression reference at `pos`, if any (boundary-inclusive).
#[must_use]
pub fn at_position(doc: &Document, pos: Position) -> Option<Reference> {
    let line = doc.line(pos.line)?;
    scan_line(doc.uri(), pos.line, line)
        .into_iter()
        .find(|r| r.range.contains_inclusive(pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document::new("file:///wf.yaml", text)
    }

    #[test]
    fn item_property_never_degrades_to_item() {
        let d = doc("          value: \"{{item.name}}\"");
        // cursor inside the `item` part of `item.name`
        let r = at_position(&d, Position::new(0, 21)).unwrap();
        assert_eq!(
            r.kind,
            ReferenceKind::ItemProperty {
                property: "name".into()
            }
        );
    }

    #[test]
    fn bare_item_is_item() {
        let d = doc("        value: \"{{item}}\"");
        let r = at_position(&d, Position::new(0, 20)).unwrap();
        assert_eq!(r.kind, ReferenceKind::Item);
    }

    #[test]
    fn workflow_variable_carries_dotted_tail() {
        let d = doc("      value: \"{{workflow.parameters.message}}\"");
        let r = at_position(&d, Position::new(0, 25)).unwrap();
        assert_eq!(
            r.kind,
            ReferenceKind::WorkflowVariable {
                name: "parameters.message".into()
            }
        );
    }

    #[test]
    fn step_reference_extracts_step_name() {
        let d = doc("        value: \"{{steps.generate.outputs.parameters.out}}\"");
        let r = at_position(&d, Position::new(0, 26)).unwrap();
        assert_eq!(
            r.kind,
            ReferenceKind::Step {
                name: "generate".into()
            }
        );
    }

    #[test]
    fn positions_outside_any_range_detect_nothing() {
        let d = doc("      value: \"{{workflow.name}}\" tail");
        assert!(at_position(&d, Position::new(0, 3)).is_none());
        assert!(at_position(&d, Position::new(0, 36)).is_none());
    }

    #[test]
    fn ranges_stay_within_their_line() {
        let d = doc("a: \"{{workflow.name}}\"\nb: \"{{item}}\"\n");
        for r in find_all(&d) {
            let line = d.line(r.range.start.line).unwrap();
            assert!(r.range.end.character <= yamlref_core::utf16_len(line));
            assert_eq!(r.range.start.line, r.range.end.line);
        }
    }
}
