//! Document classifiers.
//!
//! Registration order matters: Helm templates first (they can contain
//! text that superficially looks like Argo expressions), then manifests
//! with ConfigMap/Secret references, then plain Argo workflow manifests.

use yamlref_core::{Document, ManifestKind};
use yamlref_template::yaml_scan::parse_entry;

use crate::Guard;

fn kind_of(doc: &Document) -> Option<ManifestKind> {
    doc.lines()
        .filter_map(|(n, raw)| parse_entry(n, raw))
        .filter(|e| e.indent == 0 && e.key == "kind")
        .find_map(|e| {
            e.value
                .as_ref()
                .and_then(|v| ManifestKind::from_kind_value(&v.text))
        })
}

fn is_argo(doc: &Document) -> bool {
    doc.text().contains("argoproj.io") || kind_of(doc).is_some()
}

fn looks_like_helm(doc: &Document) -> bool {
    let text = doc.text();
    text.contains(".Values")
        || text.contains(".Release.")
        || text.contains(".Capabilities.")
        || text.contains("define \"")
        || text.contains("include \"")
}

/// Matches Helm chart templates: files under a `templates/` directory with
/// a template extension, or any document using Helm built-ins.
pub struct HelmChartGuard;

impl Guard for HelmChartGuard {
    fn check(&self, doc: &Document) -> bool {
        let uri = doc.uri();
        let in_templates_dir = uri.contains("/templates/")
            && (uri.ends_with(".yaml") || uri.ends_with(".yml") || uri.ends_with(".tpl"));
        in_templates_dir || looks_like_helm(doc)
    }
}

/// Matches manifests that reference ConfigMaps or Secrets. Ordered before
/// the plain Argo guard so its handler list (which embeds the general Argo
/// handlers after its own) still serves Argo expressions in such files.
pub struct ConfigResourceGuard;

const CONFIG_MARKERS: &[&str] = &[
    "configMapKeyRef",
    "secretKeyRef",
    "configMapRef",
    "secretRef",
    "configMap:",
    "secretName:",
];

impl Guard for ConfigResourceGuard {
    fn check(&self, doc: &Document) -> bool {
        let text = doc.text();
        CONFIG_MARKERS.iter().any(|m| text.contains(m))
    }
}

/// Matches Argo Workflow-family manifests.
pub struct ArgoWorkflowGuard;

impl Guard for ArgoWorkflowGuard {
    fn check(&self, doc: &Document) -> bool {
        is_argo(doc)
    }
}
