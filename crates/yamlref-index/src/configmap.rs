//! The ConfigMap/Secret Index: names and data keys of every ConfigMap and
//! Secret manifest in the workspace.

use std::collections::{BTreeMap, HashMap};

use vfs::VfsPath;
use yamlref_core::{ConfigKind, Document, Range};
use yamlref_template::yaml_scan::{block_scalars, document_spans, parse_entry};

use crate::{discovery, Result};

/// One indexed ConfigMap or Secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigMapEntry {
    pub name: String,
    pub kind: ConfigKind,
    /// Data keys (from `data:` and `stringData:`) with their ranges.
    pub keys: BTreeMap<String, Range>,
    /// Range of the `metadata.name` value.
    pub name_range: Range,
    pub uri: String,
}

/// Workspace-wide ConfigMap/Secret lookup keyed by `(kind, name)`.
#[derive(Debug, Default)]
pub struct ConfigMapIndex {
    entries: HashMap<(ConfigKind, String), ConfigMapEntry>,
    by_uri: HashMap<String, Vec<(ConfigKind, String)>>,
}

impl ConfigMapIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize(&mut self, roots: &[VfsPath]) -> Result<()> {
        for file in discovery::find_manifest_files(roots, &["yaml", "yml"])? {
            if let Err(e) = self.update_file(&file) {
                tracing::warn!(file = file.as_str(), error = %e, "skipping unreadable manifest");
            }
        }
        Ok(())
    }

    pub fn update_file(&mut self, file: &VfsPath) -> Result<()> {
        let text = file.read_to_string()?;
        self.update_source(file.as_str(), &text);
        Ok(())
    }

    pub fn update_source(&mut self, uri: &str, text: &str) {
        self.remove_file(uri);
        let doc = Document::new(uri, text);
        let mut keys = Vec::new();
        for entry in parse_config_entries(&doc) {
            let key = (entry.kind, entry.name.clone());
            keys.push(key.clone());
            self.entries.insert(key, entry);
        }
        if !keys.is_empty() {
            tracing::debug!(uri, count = keys.len(), "indexed config manifests");
        }
        self.by_uri.insert(uri.to_string(), keys);
    }

    pub fn remove_file(&mut self, uri: &str) {
        let Some(keys) = self.by_uri.remove(uri) else { return };
        for key in keys {
            if self.entries.get(&key).is_some_and(|e| e.uri == uri) {
                self.entries.remove(&key);
            }
        }
    }

    #[must_use]
    pub fn lookup(&self, kind: ConfigKind, name: &str) -> Option<&ConfigMapEntry> {
        self.entries.get(&(kind, name.to_string()))
    }

    pub fn entries(&self) -> impl Iterator<Item = &ConfigMapEntry> {
        self.entries.values()
    }
}

/// Extract ConfigMap/Secret manifests from every YAML document in the
/// buffer.
#[must_use]
pub fn parse_config_entries(doc: &Document) -> Vec<ConfigMapEntry> {
    let mut out = Vec::new();
    for (first, last) in document_spans(doc) {
        let mut kind = None;
        let mut name = None;
        let mut name_range = Range::default();
        let mut keys = BTreeMap::new();

        for n in first..=last {
            let Some(raw) = doc.line(n) else { break };
            let Some(entry) = parse_entry(n, raw) else {
                continue;
            };
            if entry.indent != 0 {
                continue;
            }
            match entry.key.as_str() {
                "kind" => {
                    kind = match entry.value.as_ref().map(|v| v.text.as_str()) {
                        Some("ConfigMap") => Some(ConfigKind::ConfigMap),
                        Some("Secret") => Some(ConfigKind::Secret),
                        _ => None,
                    };
                }
                "metadata" if entry.is_block() => {
                    let fields = block_scalars(doc, entry.line, entry.indent);
                    if let Some(v) = fields
                        .iter()
                        .filter(|e| e.key == "name")
                        .find_map(|e| e.value.as_ref())
                    {
                        name = Some(v.text.clone());
                        name_range = v.range;
                    }
                }
                "data" | "stringData" if entry.is_block() => {
                    let fields = block_scalars(doc, entry.line, entry.indent);
                    let Some(key_indent) = fields.iter().map(|e| e.indent).min() else {
                        continue;
                    };
                    for field in fields {
                        if field.indent == key_indent && !field.list_item {
                            keys.insert(field.key.clone(), field.key_range);
                        }
                    }
                }
                _ => {}
            }
        }

        if let (Some(kind), Some(name)) = (kind, name) {
            out.push(ConfigMapEntry {
                name,
                kind,
                keys,
                name_range,
                uri: doc.uri().to_string(),
            });
        }
    }
    out
}
