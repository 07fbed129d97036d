use serde::{Deserialize, Serialize};

use crate::Range;

/// The manifest kinds that can own template definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ManifestKind {
    Workflow,
    WorkflowTemplate,
    ClusterWorkflowTemplate,
    CronWorkflow,
}

impl ManifestKind {
    #[must_use]
    pub fn from_kind_value(kind: &str) -> Option<Self> {
        match kind {
            "Workflow" => Some(Self::Workflow),
            "WorkflowTemplate" => Some(Self::WorkflowTemplate),
            "ClusterWorkflowTemplate" => Some(Self::ClusterWorkflowTemplate),
            "CronWorkflow" => Some(Self::CronWorkflow),
            _ => None,
        }
    }
}

/// ConfigMap vs Secret, the two key-value manifest kinds we index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConfigKind {
    ConfigMap,
    Secret,
}

impl std::fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfigMap => write!(f, "ConfigMap"),
            Self::Secret => write!(f, "Secret"),
        }
    }
}

/// A located occurrence of a recognized template expression.
///
/// The `range` is produced by the same detector that is later asked to
/// resolve the reference; detectors and resolvers are paired 1:1 inside a
/// handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub kind: ReferenceKind,
    pub range: Range,
    pub uri: String,
}

/// Tagged union over every expression kind the engine recognizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceKind {
    /// `{{workflow.name}}`, `{{workflow.parameters.x}}`, ... `name` is the
    /// dotted tail after `workflow.`.
    WorkflowVariable { name: String },
    /// Bare `{{item}}` inside `withItems` loops.
    Item,
    /// `{{item.property}}`; never cross-matches with bare `item`.
    ItemProperty { property: String },
    /// `.Values.a.b` dot path into a chart's values.yaml.
    ValuesPath { path: String },
    /// `templateRef:` block (remote) or a plain `template:` step field
    /// (local, `workflow_template_name == None`).
    TemplateRef {
        workflow_template_name: Option<String>,
        template: String,
        cluster_scope: bool,
    },
    /// `{{ include "name" . }}` or `{{ template "name" . }}`.
    IncludeRef { name: String },
    /// `{{ define "name" }}` / `{{ block "name" }}` definition site.
    DefineBlock { name: String },
    ConfigMapKeyRef { name: String, key: String },
    SecretKeyRef { name: String, key: String },
    ConfigMapRef { name: String },
    SecretRef { name: String },
    VolumeConfigMap { name: String },
    VolumeSecret { name: String },
    /// `{{steps.<name>...}}` step output reference.
    Step { name: String },
    /// `{{tasks.<name>...}}` DAG task reference.
    Task { name: String },
    /// Go-template control keyword under the cursor (`if`, `range`, ...).
    GoTemplateKeyword { keyword: String },
    /// `.Release.<name>` built-in.
    ReleaseVariable { name: String },
    /// `.Capabilities.<name>` built-in (dotted tail).
    CapabilitiesVariable { name: String },
}

impl ReferenceKind {
    /// Stable label used in diagnostics and CLI output.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::WorkflowVariable { .. } => "workflowVariable",
            Self::Item => "item",
            Self::ItemProperty { .. } => "item.property",
            Self::ValuesPath { .. } => "valuesPath",
            Self::TemplateRef { .. } => "templateRef",
            Self::IncludeRef { .. } => "includeRef",
            Self::DefineBlock { .. } => "defineBlock",
            Self::ConfigMapKeyRef { .. } => "configMapKeyRef",
            Self::SecretKeyRef { .. } => "secretKeyRef",
            Self::ConfigMapRef { .. } => "configMapRef",
            Self::SecretRef { .. } => "secretRef",
            Self::VolumeConfigMap { .. } => "volumeConfigMap",
            Self::VolumeSecret { .. } => "volumeSecret",
            Self::Step { .. } => "step",
            Self::Task { .. } => "task",
            Self::GoTemplateKeyword { .. } => "goTemplateKeyword",
            Self::ReleaseVariable { .. } => "releaseVariable",
            Self::CapabilitiesVariable { .. } => "capabilitiesVariable",
        }
    }
}

/// A definition site in the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub uri: String,
    pub range: Range,
}

/// Three-valued resolution outcome. Only `Missing` ever surfaces as a
/// diagnostic; `Unknown` (external tool unavailable, runtime-only data)
/// must never be reported as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existence {
    Exists,
    Missing,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedReference {
    pub exists: Existence,
    pub definition: Option<Location>,
    pub message: Option<String>,
}

impl ResolvedReference {
    #[must_use]
    pub fn found(definition: Location) -> Self {
        Self {
            exists: Existence::Exists,
            definition: Some(definition),
            message: None,
        }
    }

    /// Exists, but with no navigable definition site.
    #[must_use]
    pub fn exists_without_location() -> Self {
        Self {
            exists: Existence::Exists,
            definition: None,
            message: None,
        }
    }

    #[must_use]
    pub fn missing(message: impl Into<String>) -> Self {
        Self {
            exists: Existence::Missing,
            definition: None,
            message: Some(message.into()),
        }
    }

    #[must_use]
    pub fn unknown() -> Self {
        Self {
            exists: Existence::Unknown,
            definition: None,
            message: None,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// A completion offered at a cursor position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionItem {
    pub label: String,
    pub detail: Option<String>,
    pub insert_text: Option<String>,
}

impl CompletionItem {
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            detail: None,
            insert_text: None,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
