//! Handler implementations and the standard guard/handler wiring.

pub mod builtins;
pub mod configmap;
pub mod define;
pub mod include;
pub mod item;
pub mod keywords;
pub mod steps;
pub mod template_ref;
pub mod values;
pub mod workflow;

use std::sync::Arc;

use crate::guards::{ArgoWorkflowGuard, ConfigResourceGuard, HelmChartGuard};
use crate::render::Renderer;
use crate::{GuardEntry, Handler, Registry, WorkspaceIndices};

pub use builtins::{CapabilitiesHandler, ReleaseHandler};
pub use configmap::ConfigMapHandler;
pub use define::DefineHandler;
pub use include::IncludeHandler;
pub use item::ItemHandler;
pub use keywords::KeywordHandler;
pub use steps::StepTaskHandler;
pub use template_ref::TemplateRefHandler;
pub use values::ValuesHandler;
pub use workflow::WorkflowVariableHandler;

fn argo_handlers(indices: &WorkspaceIndices) -> Vec<Box<dyn Handler>> {
    vec![
        Box::new(WorkflowVariableHandler),
        Box::new(ItemHandler),
        Box::new(TemplateRefHandler::new(indices.templates.clone())),
        Box::new(StepTaskHandler),
    ]
}

/// The standard guard ordering. The ConfigMap/Secret guard sits before the
/// plain Argo guard and embeds the general Argo handlers after its own, so
/// a workflow that mounts a ConfigMap still resolves its `{{workflow.*}}`
/// expressions.
#[must_use]
pub fn standard_registry(indices: &WorkspaceIndices, renderer: Arc<dyn Renderer>) -> Registry {
    let helm: Vec<Box<dyn Handler>> = vec![
        Box::new(ValuesHandler::new(indices.values.clone())),
        Box::new(IncludeHandler::new(indices.templates.clone(), renderer)),
        Box::new(DefineHandler),
        Box::new(ReleaseHandler),
        Box::new(CapabilitiesHandler),
        Box::new(KeywordHandler),
    ];

    let mut config: Vec<Box<dyn Handler>> =
        vec![Box::new(ConfigMapHandler::new(indices.configmaps.clone()))];
    config.extend(argo_handlers(indices));

    Registry::new(vec![
        GuardEntry::new(HelmChartGuard, helm),
        GuardEntry::new(ConfigResourceGuard, config),
        GuardEntry::new(ArgoWorkflowGuard, argo_handlers(indices)),
    ])
}
