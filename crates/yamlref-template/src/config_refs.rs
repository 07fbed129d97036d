//! Detectors for ConfigMap/Secret reference blocks: `configMapKeyRef` /
//! `secretKeyRef` (env vars), `configMapRef` / `secretRef` (envFrom), and
//! volume-sourced `configMap:` / `secret:` blocks.
//!
//! Classification hangs off the *immediate* enclosing block key, so two
//! adjacent blocks can never contaminate each other, and a `templateRef`
//! block's `name:` is never mistaken for a ConfigMap name.

use yamlref_core::{Document, Position, Range, Reference, ReferenceKind};

use crate::yaml_scan::{
    any_ancestor, block_scalars, entry_at, flow_map_entries, parent_block, LineEntry,
};

fn block_field<'a>(fields: &'a [LineEntry], key: &str) -> Option<&'a LineEntry> {
    fields.iter().find(|e| e.key == key && e.value.is_some())
}

fn field_text(fields: &[LineEntry], key: &str) -> Option<String> {
    block_field(fields, key).map(|e| e.value.as_ref().map(|v| v.text.clone()).unwrap_or_default())
}

fn is_ref_block_key(key: &str) -> bool {
    matches!(
        key,
        "configMapKeyRef" | "secretKeyRef" | "configMapRef" | "secretRef" | "configMap" | "secret"
    )
}

/// Build the reference for a cursor sitting on a `name:`, `key:` or
/// `secretName:` value inside the block opened by `parent`. `fields` holds
/// the block's scalar entries (indented siblings or flow-map fields).
fn classify(
    doc: &Document,
    parent: &LineEntry,
    fields: &[LineEntry],
    entry_key: &str,
) -> Option<ReferenceKind> {
    let name = field_text(fields, "name");
    let key = field_text(fields, "key");
    match parent.key.as_str() {
        "configMapKeyRef" => Some(ReferenceKind::ConfigMapKeyRef {
            name: name?,
            key: key.unwrap_or_default(),
        }),
        "secretKeyRef" => Some(ReferenceKind::SecretKeyRef {
            name: name?,
            key: key.unwrap_or_default(),
        }),
        "configMapRef" if entry_key == "name" => Some(ReferenceKind::ConfigMapRef { name: name? }),
        "secretRef" if entry_key == "name" => Some(ReferenceKind::SecretRef { name: name? }),
        "configMap" if any_ancestor(doc, parent.line, parent.indent, "volumes") => {
            Some(ReferenceKind::VolumeConfigMap { name: name? })
        }
        "secret" if any_ancestor(doc, parent.line, parent.indent, "volumes") => {
            Some(ReferenceKind::VolumeSecret {
                name: field_text(fields, "secretName")?,
            })
        }
        _ => None,
    }
}

/// The ConfigMap/Secret reference at `pos`, if the cursor is on a relevant
/// field value.
#[must_use]
pub fn at_position(doc: &Document, pos: Position) -> Option<Reference> {
    let entry = entry_at(doc, pos)?;
    if let Some(reference) = flow_reference(doc, &entry, pos) {
        return Some(reference);
    }
    if !matches!(entry.key.as_str(), "name" | "key" | "secretName") {
        return None;
    }
    let value = entry.value.as_ref()?;
    if !value.range.contains_inclusive(pos) {
        return None;
    }
    let parent = parent_block(doc, entry.line, entry.indent)?;
    let fields = block_scalars(doc, parent.line, parent.indent);
    let kind = classify(doc, &parent, &fields, &entry.key)?;
    Some(Reference {
        kind,
        range: value.range,
        uri: doc.uri().to_string(),
    })
}

/// Flow-style variant: the whole ref block sits on one line, as in
/// `configMapKeyRef: { name: app-config, key: database-url }`, so the
/// entry under the cursor is the block key itself.
fn flow_reference(doc: &Document, entry: &LineEntry, pos: Position) -> Option<Reference> {
    if !is_ref_block_key(&entry.key) {
        return None;
    }
    if !entry.value.as_ref().is_some_and(|v| v.text.starts_with('{')) {
        return None;
    }
    let raw = doc.line(entry.line)?;
    let fields = flow_map_entries(entry.line, raw);
    let field = fields.iter().find(|f| {
        matches!(f.key.as_str(), "name" | "key" | "secretName")
            && f.value.as_ref().is_some_and(|v| v.range.contains_inclusive(pos))
    })?;
    let kind = classify(doc, entry, &fields, &field.key)?;
    Some(Reference {
        kind,
        range: field.value.as_ref()?.range,
        uri: doc.uri().to_string(),
    })
}

/// All ConfigMap/Secret references in the document, anchored at each
/// block's `name:` value.
///
/// Volume-sourced `configMap:`/`secret:` blocks are detected at a position
/// but intentionally not emitted here; the sweep predates their detector
/// and closing that gap is tracked separately.
#[must_use]
pub fn find_all(doc: &Document) -> Vec<Reference> {
    let mut out = Vec::new();
    for (n, raw) in doc.lines() {
        let Some(entry) = crate::yaml_scan::parse_entry(n, raw) else {
            continue;
        };
        if !matches!(
            entry.key.as_str(),
            "configMapKeyRef" | "secretKeyRef" | "configMapRef" | "secretRef"
        ) {
            continue;
        }
        let fields = if entry.is_block() {
            block_scalars(doc, entry.line, entry.indent)
        } else if entry.value.as_ref().is_some_and(|v| v.text.starts_with('{')) {
            flow_map_entries(n, raw)
        } else {
            continue;
        };
        let Some(name_entry) = block_field(&fields, "name") else {
            continue;
        };
        let name = name_entry.value.as_ref().map(|v| v.text.clone()).unwrap_or_default();
        let name_range: Range = name_entry.value.as_ref().map(|v| v.range).unwrap_or_default();
        let key = field_text(&fields, "key");
        let kind = match entry.key.as_str() {
            "configMapKeyRef" => ReferenceKind::ConfigMapKeyRef {
                name,
                key: key.unwrap_or_default(),
            },
            "secretKeyRef" => ReferenceKind::SecretKeyRef {
                name,
                key: key.unwrap_or_default(),
            },
            "configMapRef" => ReferenceKind::ConfigMapRef { name },
            _ => ReferenceKind::SecretRef { name },
        };
        out.push(Reference {
            kind,
            range: name_range,
            uri: doc.uri().to_string(),
        });
    }
    out
}
