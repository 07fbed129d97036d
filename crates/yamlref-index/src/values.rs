//! The Values Index: dot-delimited paths into each chart's `values.yaml`.

use std::collections::{BTreeMap, HashMap};

use camino::Utf8Path;
use serde::Deserialize;
use vfs::VfsPath;
use yamlref_core::{Document, Range};
use yamlref_template::yaml_scan::parse_entry;

use crate::{discovery, Result};

/// Chart metadata from `Chart.yaml`. Unknown fields are ignored; a
/// malformed file yields the default (empty) metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChartMeta {
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Null,
    Object,
    Array,
}

/// One addressable value in a chart's `values.yaml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueDefinition {
    /// Dot-delimited path, stored case-sensitively.
    pub path: String,
    /// Scalar text as written; empty for objects and arrays.
    pub value: String,
    pub value_type: ValueType,
    pub parent_path: Option<String>,
    /// Range of the key that introduces the value.
    pub range: Range,
    pub uri: String,
}

#[derive(Debug, Default)]
struct ChartValues {
    values_uri: String,
    meta: ChartMeta,
    by_path: BTreeMap<String, ValueDefinition>,
}

/// Per-chart values lookup, keyed by chart root path.
#[derive(Debug, Default)]
pub struct ValuesIndex {
    charts: HashMap<String, ChartValues>,
}

impl ValuesIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Discover charts under `roots` and parse each `values.yaml`.
    pub fn initialize(&mut self, roots: &[VfsPath]) -> Result<()> {
        for chart in discovery::find_charts(roots)? {
            if let Err(e) = self.update_chart(&chart) {
                tracing::warn!(chart = chart.as_str(), error = %e, "skipping unreadable chart");
            }
        }
        Ok(())
    }

    /// (Re-)parse a single chart's `values.yaml` without touching other
    /// charts.
    pub fn update_chart(&mut self, chart_root: &VfsPath) -> Result<()> {
        let values = chart_root.join("values.yaml")?;
        if !values.exists()? {
            self.charts.remove(chart_root.as_str());
            return Ok(());
        }
        let text = values.read_to_string()?;
        self.update_source(chart_root.as_str(), values.as_str(), &text);

        let meta = chart_root
            .join("Chart.yaml")?
            .read_to_string()
            .ok()
            .and_then(|raw| match serde_yaml::from_str(&raw) {
                Ok(meta) => Some(meta),
                Err(e) => {
                    tracing::warn!(chart = chart_root.as_str(), error = %e, "malformed Chart.yaml");
                    None
                }
            })
            .unwrap_or_default();
        if let Some(chart) = self.charts.get_mut(chart_root.as_str()) {
            chart.meta = meta;
        }
        Ok(())
    }

    /// Same as [`ValuesIndex::update_chart`], from in-memory text.
    pub fn update_source(&mut self, chart_root: &str, values_uri: &str, text: &str) {
        let doc = Document::new(values_uri, text);
        let mut by_path = BTreeMap::new();
        for def in parse_values(&doc) {
            by_path.insert(def.path.clone(), def);
        }
        tracing::debug!(chart_root, paths = by_path.len(), "indexed chart values");
        self.charts.insert(
            chart_root.to_string(),
            ChartValues {
                values_uri: values_uri.to_string(),
                meta: ChartMeta::default(),
                by_path,
            },
        );
    }

    /// Delete the chart whose `values.yaml` is `uri`.
    pub fn remove_file(&mut self, uri: &str) {
        self.charts.retain(|_, chart| chart.values_uri != uri);
    }

    /// Delete a chart by its root path, e.g. when its `Chart.yaml` marker
    /// disappears.
    pub fn remove_chart(&mut self, chart_root: &str) {
        self.charts.remove(chart_root);
    }

    /// Exact, case-sensitive path lookup within one chart.
    #[must_use]
    pub fn lookup(&self, chart_root: &str, path: &str) -> Option<&ValueDefinition> {
        self.charts.get(chart_root)?.by_path.get(path)
    }

    /// Case-insensitive prefix lookup, used by completion.
    #[must_use]
    pub fn find_by_prefix(&self, chart_root: &str, prefix: &str) -> Vec<&ValueDefinition> {
        let Some(chart) = self.charts.get(chart_root) else {
            return Vec::new();
        };
        let prefix = prefix.to_lowercase();
        chart
            .by_path
            .values()
            .filter(|d| d.path.to_lowercase().starts_with(&prefix))
            .collect()
    }

    /// The chart root owning `uri`, by longest path-prefix match.
    #[must_use]
    pub fn chart_root_for(&self, uri: &str) -> Option<&str> {
        self.charts
            .keys()
            .filter(|root| {
                uri.strip_prefix(root.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
            })
            .max_by_key(|root| root.len())
            .map(String::as_str)
    }

    pub fn chart_roots(&self) -> impl Iterator<Item = &str> {
        self.charts.keys().map(String::as_str)
    }

    /// `Chart.yaml` metadata for an indexed chart.
    #[must_use]
    pub fn chart_meta(&self, chart_root: &str) -> Option<&ChartMeta> {
        self.charts.get(chart_root).map(|c| &c.meta)
    }

    #[must_use]
    pub fn values_in(&self, chart_root: &str) -> Vec<&ValueDefinition> {
        self.charts
            .get(chart_root)
            .map(|c| c.by_path.values().collect())
            .unwrap_or_default()
    }
}

fn infer_type(text: &str) -> ValueType {
    match text {
        "true" | "false" => ValueType::Boolean,
        "null" | "~" => ValueType::Null,
        "{}" => ValueType::Object,
        "[]" => ValueType::Array,
        _ if text.parse::<f64>().is_ok() => ValueType::Number,
        _ => ValueType::String,
    }
}

/// Walk `values.yaml` building dot paths from the indentation structure.
///
/// Sequence items are not addressable by dot path; a key whose children are
/// list items is typed `Array` and its items are skipped.
#[must_use]
pub fn parse_values(doc: &Document) -> Vec<ValueDefinition> {
    let mut out = Vec::new();
    // (indent, segment) stack of enclosing mapping keys
    let mut stack: Vec<(usize, String)> = Vec::new();
    let mut skip_deeper_than: Option<usize> = None;

    for (n, raw) in doc.lines() {
        let trimmed = raw.trim_start();
        let indent = raw.len() - trimmed.len();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(limit) = skip_deeper_than {
            if indent > limit || trimmed.starts_with('-') {
                continue;
            }
            skip_deeper_than = None;
        }

        if trimmed.starts_with('-') {
            // sequence under the innermost open key: retype it as Array
            if let Some((_, _)) = stack.last() {
                let path = join_path(&stack);
                if let Some(def) = out.iter_mut().rev().find(|d: &&mut ValueDefinition| d.path == path) {
                    def.value_type = ValueType::Array;
                }
            }
            skip_deeper_than = Some(indent);
            continue;
        }

        let Some(entry) = parse_entry(n, raw) else { continue };
        if entry.list_item {
            continue;
        }
        while stack.last().is_some_and(|(i, _)| *i >= entry.indent) {
            stack.pop();
        }
        let parent_path = (!stack.is_empty()).then(|| join_path(&stack));
        stack.push((entry.indent, entry.key.clone()));
        let path = join_path(&stack);

        match &entry.value {
            Some(v) => {
                out.push(ValueDefinition {
                    path,
                    value: v.text.clone(),
                    value_type: infer_type(&v.text),
                    parent_path,
                    range: entry.key_range,
                    uri: doc.uri().to_string(),
                });
                stack.pop();
            }
            None => {
                out.push(ValueDefinition {
                    path,
                    value: String::new(),
                    value_type: ValueType::Object,
                    parent_path,
                    range: entry.key_range,
                    uri: doc.uri().to_string(),
                });
            }
        }
    }
    out
}

fn join_path(stack: &[(usize, String)]) -> String {
    stack
        .iter()
        .map(|(_, s)| s.as_str())
        .collect::<Vec<_>>()
        .join(".")
}

/// The chart root of a template file path (the directory above
/// `templates/`), if any.
#[must_use]
pub fn chart_root_of_template(uri: &str) -> Option<&str> {
    let path = Utf8Path::new(uri);
    let mut current = path.parent();
    while let Some(dir) = current {
        if dir.file_name() == Some("templates") {
            return dir.parent().map(Utf8Path::as_str);
        }
        current = dir.parent();
    }
    None
}
