//! `.Release.*` and `.Capabilities.*` built-in objects. These have no
//! definition site; validation checks the member name against the sets
//! Helm actually provides.

use yamlref_core::{
    byte_at_utf16, CompletionItem, Document, Position, Reference, ReferenceKind, ResolvedReference,
};
use yamlref_template::expr::{scan_line_exprs, tokenize};
use yamlref_template::helm;

use crate::Handler;

const RELEASE_VARS: &[&str] = &[
    "Name",
    "Namespace",
    "Revision",
    "Service",
    "IsUpgrade",
    "IsInstall",
];

/// Members with nested fields of their own; any dotted tail under them is
/// accepted.
const CAPABILITIES_ROOTS: &[&str] = &["KubeVersion", "APIVersions", "HelmVersion"];

fn member_prefix_at(doc: &Document, pos: Position, base: &str) -> Option<String> {
    let line = doc.line(pos.line)?;
    let cursor = byte_at_utf16(line, pos.character)?;
    let wanted = format!(".{base}.");
    for expr in scan_line_exprs(line) {
        for tok in tokenize(line, &expr) {
            if tok.quoted || tok.start > cursor || cursor > tok.end {
                continue;
            }
            let typed = line[tok.start..cursor].trim_start_matches('$');
            if let Some(rest) = typed.strip_prefix(wanted.as_str()) {
                return Some(rest.to_string());
            }
        }
    }
    None
}

pub struct ReleaseHandler;

impl Handler for ReleaseHandler {
    fn name(&self) -> &'static str {
        "release"
    }

    fn detect(&self, doc: &Document, pos: Position) -> Option<Reference> {
        helm::at_position(doc, pos)
            .filter(|r| matches!(r.kind, ReferenceKind::ReleaseVariable { .. }))
    }

    fn resolve(&self, _doc: &Document, reference: &Reference) -> ResolvedReference {
        let ReferenceKind::ReleaseVariable { name } = &reference.kind else {
            return ResolvedReference::unknown();
        };
        if RELEASE_VARS.contains(&name.as_str()) {
            ResolvedReference::exists_without_location()
        } else {
            ResolvedReference::missing(format!(
                ".Release has no member {name:?}; expected one of {}",
                RELEASE_VARS.join(", ")
            ))
        }
    }

    fn find_all(&self, doc: &Document) -> Option<Vec<Reference>> {
        Some(
            helm::find_all(doc)
                .into_iter()
                .filter(|r| matches!(r.kind, ReferenceKind::ReleaseVariable { .. }))
                .collect(),
        )
    }

    fn complete(&self, doc: &Document, pos: Position) -> Option<Vec<CompletionItem>> {
        let prefix = member_prefix_at(doc, pos, "Release")?;
        Some(
            RELEASE_VARS
                .iter()
                .filter(|v| v.starts_with(&prefix))
                .map(|v| CompletionItem::new(*v))
                .collect(),
        )
    }
}

pub struct CapabilitiesHandler;

impl Handler for CapabilitiesHandler {
    fn name(&self) -> &'static str {
        "capabilities"
    }

    fn detect(&self, doc: &Document, pos: Position) -> Option<Reference> {
        helm::at_position(doc, pos)
            .filter(|r| matches!(r.kind, ReferenceKind::CapabilitiesVariable { .. }))
    }

    fn resolve(&self, _doc: &Document, reference: &Reference) -> ResolvedReference {
        let ReferenceKind::CapabilitiesVariable { name } = &reference.kind else {
            return ResolvedReference::unknown();
        };
        let root = name.split('.').next().unwrap_or(name);
        if CAPABILITIES_ROOTS.contains(&root) {
            ResolvedReference::exists_without_location()
        } else {
            ResolvedReference::missing(format!(
                ".Capabilities has no member {root:?}; expected one of {}",
                CAPABILITIES_ROOTS.join(", ")
            ))
        }
    }

    fn find_all(&self, doc: &Document) -> Option<Vec<Reference>> {
        Some(
            helm::find_all(doc)
                .into_iter()
                .filter(|r| matches!(r.kind, ReferenceKind::CapabilitiesVariable { .. }))
                .collect(),
        )
    }

    fn complete(&self, doc: &Document, pos: Position) -> Option<Vec<CompletionItem>> {
        let prefix = member_prefix_at(doc, pos, "Capabilities")?;
        Some(
            CAPABILITIES_ROOTS
                .iter()
                .filter(|v| v.starts_with(&prefix))
                .map(|v| CompletionItem::new(*v))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yamlref_core::Existence;

    fn template(text: &str) -> Document {
        Document::new("/chart/templates/deployment.yaml", text)
    }

    #[test]
    fn known_release_member_exists() {
        let d = template("name: {{ .Release.Name }}");
        let r = ReleaseHandler.detect(&d, Position::new(0, 15)).unwrap();
        assert_eq!(
            ReleaseHandler.resolve(&d, &r).exists,
            Existence::Exists
        );
    }

    #[test]
    fn unknown_release_member_is_missing_with_hint() {
        let d = template("name: {{ .Release.Nmae }}");
        let r = ReleaseHandler.detect(&d, Position::new(0, 15)).unwrap();
        let resolved = ReleaseHandler.resolve(&d, &r);
        assert_eq!(resolved.exists, Existence::Missing);
        assert!(resolved.message.unwrap().contains("Name"));
    }

    #[test]
    fn capabilities_accept_nested_tails() {
        let d = template("v: {{ .Capabilities.KubeVersion.Minor }}");
        let r = CapabilitiesHandler.detect(&d, Position::new(0, 20)).unwrap();
        assert_eq!(
            CapabilitiesHandler.resolve(&d, &r).exists,
            Existence::Exists
        );

        let d = template("v: {{ .Capabilities.TillerVersion }}");
        let r = CapabilitiesHandler.detect(&d, Position::new(0, 20)).unwrap();
        assert_eq!(
            CapabilitiesHandler.resolve(&d, &r).exists,
            Existence::Missing
        );
    }

    #[test]
    fn completion_filters_by_typed_member() {
        let d = template("a: {{ .Release.Is }}");
        // cursor right after `.Release.Is`
        let items = ReleaseHandler.complete(&d, Position::new(0, 17)).unwrap();
        let labels: Vec<_> = items.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["IsUpgrade", "IsInstall"]);
    }
}
