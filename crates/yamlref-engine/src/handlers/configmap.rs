//! ConfigMap and Secret references (`configMapKeyRef`, `secretKeyRef`,
//! `configMapRef`, `secretRef`, and volume sources), resolved against the
//! workspace config index.

use yamlref_core::{
    CompletionItem, ConfigKind, Document, Location, Position, Reference, ReferenceKind,
    ResolvedReference,
};
use yamlref_index::ConfigMapIndex;
use yamlref_template::config_refs;
use yamlref_template::yaml_scan::{block_scalars, entry_at, parent_block};

use crate::{Handler, Shared};

pub struct ConfigMapHandler {
    configmaps: Shared<ConfigMapIndex>,
}

impl ConfigMapHandler {
    #[must_use]
    pub fn new(configmaps: Shared<ConfigMapIndex>) -> Self {
        Self { configmaps }
    }

    /// Resolve a `*KeyRef` block. Whether the cursor (or sweep anchor) sits
    /// on the name or the key decides the navigation target, but both parts
    /// are checked so either error surfaces.
    fn resolve_key_ref(
        &self,
        doc: &Document,
        reference: &Reference,
        kind: ConfigKind,
        name: &str,
        key: &str,
    ) -> ResolvedReference {
        let Ok(index) = self.configmaps.read() else {
            return ResolvedReference::unknown();
        };
        let Some(entry) = index.lookup(kind, name) else {
            return ResolvedReference::missing(format!(
                "{kind} {name:?} not found in the workspace"
            ));
        };
        if !key.is_empty() && !entry.keys.contains_key(key) {
            return ResolvedReference::missing(format!(
                "key {key:?} not found in {kind} {name:?}"
            ));
        }

        let on_key_field = entry_at(doc, reference.range.start)
            .is_some_and(|e| e.key == "key");
        let range = if on_key_field {
            entry.keys.get(key).copied().unwrap_or(entry.name_range)
        } else {
            entry.name_range
        };
        ResolvedReference::found(Location {
            uri: entry.uri.clone(),
            range,
        })
    }

    fn resolve_name(&self, kind: ConfigKind, name: &str) -> ResolvedReference {
        let Ok(index) = self.configmaps.read() else {
            return ResolvedReference::unknown();
        };
        match index.lookup(kind, name) {
            Some(entry) => ResolvedReference::found(Location {
                uri: entry.uri.clone(),
                range: entry.name_range,
            }),
            None => ResolvedReference::missing(format!(
                "{kind} {name:?} not found in the workspace"
            )),
        }
    }
}

impl Handler for ConfigMapHandler {
    fn name(&self) -> &'static str {
        "configmap"
    }

    fn detect(&self, doc: &Document, pos: Position) -> Option<Reference> {
        config_refs::at_position(doc, pos)
    }

    fn resolve(&self, doc: &Document, reference: &Reference) -> ResolvedReference {
        match &reference.kind {
            ReferenceKind::ConfigMapKeyRef { name, key } => {
                self.resolve_key_ref(doc, reference, ConfigKind::ConfigMap, name, key)
            }
            ReferenceKind::SecretKeyRef { name, key } => {
                self.resolve_key_ref(doc, reference, ConfigKind::Secret, name, key)
            }
            ReferenceKind::ConfigMapRef { name } | ReferenceKind::VolumeConfigMap { name } => {
                self.resolve_name(ConfigKind::ConfigMap, name)
            }
            ReferenceKind::SecretRef { name } | ReferenceKind::VolumeSecret { name } => {
                self.resolve_name(ConfigKind::Secret, name)
            }
            _ => ResolvedReference::unknown(),
        }
    }

    fn find_all(&self, doc: &Document) -> Option<Vec<Reference>> {
        Some(config_refs::find_all(doc))
    }

    fn complete(&self, doc: &Document, pos: Position) -> Option<Vec<CompletionItem>> {
        let entry = entry_at(doc, pos)?;
        let parent = parent_block(doc, entry.line, entry.indent)?;
        let kind = match parent.key.as_str() {
            "configMapKeyRef" | "configMapRef" | "configMap" => ConfigKind::ConfigMap,
            "secretKeyRef" | "secretRef" | "secret" => ConfigKind::Secret,
            _ => return None,
        };
        let Ok(index) = self.configmaps.read() else {
            return Some(Vec::new());
        };

        let mut items = match entry.key.as_str() {
            "name" | "secretName" => index
                .entries()
                .filter(|e| e.kind == kind)
                .map(|e| CompletionItem::new(e.name.clone()).with_detail(kind.to_string()))
                .collect::<Vec<_>>(),
            "key" => {
                // keys of the ConfigMap/Secret named in the same block
                let name = block_scalars(doc, parent.line, parent.indent)
                    .into_iter()
                    .find(|e| e.key == "name")
                    .and_then(|e| e.value.map(|v| v.text))?;
                let entry = index.lookup(kind, &name)?;
                entry
                    .keys
                    .keys()
                    .map(|k| CompletionItem::new(k.clone()).with_detail(format!("{kind} {name}")))
                    .collect()
            }
            _ => return None,
        };
        items.sort_by(|a, b| a.label.cmp(&b.label));
        Some(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use std::sync::{Arc, RwLock};
    use yamlref_core::Existence;

    const MANIFESTS: &str = indoc! {"
        apiVersion: v1
        kind: ConfigMap
        metadata:
          name: app-config
        data:
          database-url: postgres://db:5432/app
          log-level: info
        ---
        apiVersion: v1
        kind: Secret
        metadata:
          name: app-secrets
        stringData:
          db-password: hunter2
    "};

    const WORKFLOW: &str = indoc! {"
        kind: Workflow
        spec:
          templates:
            - name: main
              container:
                env:
                  - name: DB_URL
                    valueFrom:
                      configMapKeyRef:
                        name: app-config
                        key: database-url
                  - name: DB_PASS
                    valueFrom:
                      secretKeyRef:
                        name: app-secrets
                        key: db-password
    "};

    fn handler() -> ConfigMapHandler {
        let mut index = ConfigMapIndex::new();
        index.update_source("/ws/config.yaml", MANIFESTS);
        ConfigMapHandler::new(Arc::new(RwLock::new(index)))
    }

    #[test]
    fn key_ref_resolves_name_and_key() {
        let h = handler();
        let d = Document::new("/ws/wf.yaml", WORKFLOW);

        // cursor on the configMapKeyRef name value
        let r = h.detect(&d, Position::new(9, 28)).unwrap();
        let resolved = h.resolve(&d, &r);
        assert_eq!(resolved.exists, Existence::Exists);
        assert_eq!(resolved.definition.as_ref().unwrap().uri, "/ws/config.yaml");

        // cursor on the key value navigates to the data key
        let r = h.detect(&d, Position::new(10, 30)).unwrap();
        let resolved = h.resolve(&d, &r);
        assert_eq!(resolved.exists, Existence::Exists);
        assert_eq!(resolved.definition.unwrap().range.start.line, 5);
    }

    #[test]
    fn unknown_key_is_missing_with_the_configmap_named() {
        let h = handler();
        let d = Document::new(
            "/ws/wf.yaml",
            indoc! {"
                spec:
                  valueFrom:
                    configMapKeyRef:
                      name: app-config
                      key: no-such-key
            "},
        );
        let r = h.detect(&d, Position::new(4, 14)).unwrap();
        let resolved = h.resolve(&d, &r);
        assert_eq!(resolved.exists, Existence::Missing);
        assert!(resolved.message.unwrap().contains("app-config"));
    }

    #[test]
    fn secret_and_configmap_namespaces_stay_separate() {
        let h = handler();
        let d = Document::new(
            "/ws/wf.yaml",
            indoc! {"
                spec:
                  valueFrom:
                    secretKeyRef:
                      name: app-config
                      key: database-url
            "},
        );
        // app-config is a ConfigMap, not a Secret
        let r = h.detect(&d, Position::new(3, 14)).unwrap();
        assert_eq!(h.resolve(&d, &r).exists, Existence::Missing);
    }

    #[test]
    fn completion_offers_names_then_keys() {
        let h = handler();
        let d = Document::new("/ws/wf.yaml", WORKFLOW);

        // on the name value
        let items = h.complete(&d, Position::new(9, 28)).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].label, "app-config");

        // on the key value
        let items = h.complete(&d, Position::new(10, 30)).unwrap();
        let labels: Vec<_> = items.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["database-url", "log-level"]);
    }
}
