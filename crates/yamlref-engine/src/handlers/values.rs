//! `.Values.*` paths, resolved against the owning chart's values index.

use yamlref_core::{
    CompletionItem, Document, Location, Position, Reference, ReferenceKind, ResolvedReference,
};
use yamlref_index::values::{chart_root_of_template, ValueType, ValuesIndex};
use yamlref_template::helm;

use crate::{Handler, Shared};

pub struct ValuesHandler {
    values: Shared<ValuesIndex>,
}

impl ValuesHandler {
    #[must_use]
    pub fn new(values: Shared<ValuesIndex>) -> Self {
        Self { values }
    }

    fn chart_root(&self, index: &ValuesIndex, uri: &str) -> Option<String> {
        index
            .chart_root_for(uri)
            .or_else(|| chart_root_of_template(uri))
            .map(str::to_string)
    }
}

fn detail(def: &yamlref_index::values::ValueDefinition) -> String {
    match def.value_type {
        ValueType::Object => "object".to_string(),
        ValueType::Array => "array".to_string(),
        _ => def.value.clone(),
    }
}

impl Handler for ValuesHandler {
    fn name(&self) -> &'static str {
        "values"
    }

    fn detect(&self, doc: &Document, pos: Position) -> Option<Reference> {
        helm::at_position(doc, pos).filter(|r| matches!(r.kind, ReferenceKind::ValuesPath { .. }))
    }

    fn resolve(&self, doc: &Document, reference: &Reference) -> ResolvedReference {
        let ReferenceKind::ValuesPath { path } = &reference.kind else {
            return ResolvedReference::unknown();
        };
        let Ok(index) = self.values.read() else {
            return ResolvedReference::unknown();
        };
        // a template outside any indexed chart has no values.yaml to check
        let Some(chart) = self.chart_root(&index, doc.uri()) else {
            return ResolvedReference::unknown();
        };
        match index.lookup(&chart, path) {
            Some(def) => ResolvedReference::found(Location {
                uri: def.uri.clone(),
                range: def.range,
            })
            .with_message(format!("{path}: {}", detail(def))),
            None => ResolvedReference::missing(format!(
                ".Values.{path} is not defined in values.yaml"
            )),
        }
    }

    fn find_all(&self, doc: &Document) -> Option<Vec<Reference>> {
        Some(
            helm::find_all(doc)
                .into_iter()
                .filter(|r| matches!(r.kind, ReferenceKind::ValuesPath { .. }))
                .collect(),
        )
    }

    fn complete(&self, doc: &Document, pos: Position) -> Option<Vec<CompletionItem>> {
        let prefix = helm::values_prefix_at(doc, pos)?;
        let Ok(index) = self.values.read() else {
            return Some(Vec::new());
        };
        let chart = self.chart_root(&index, doc.uri())?;
        let mut items: Vec<CompletionItem> = index
            .find_by_prefix(&chart, &prefix)
            .into_iter()
            .map(|def| CompletionItem::new(def.path.clone()).with_detail(detail(def)))
            .collect();
        items.sort_by(|a, b| a.label.cmp(&b.label));
        Some(items)
    }
}
