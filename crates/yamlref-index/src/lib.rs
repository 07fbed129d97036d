//! Workspace-wide indices: template definitions, ConfigMap/Secret
//! definitions, and Helm values.
//!
//! All three share the same lifecycle: `initialize` scans matching files
//! once, `update_file` re-parses a single file and atomically replaces its
//! prior contributions, `remove_file` deletes everything the file owned.
//! A malformed file contributes nothing and never aborts a scan.

pub mod configmap;
pub mod discovery;
pub mod template;
pub mod values;

pub use configmap::{ConfigMapEntry, ConfigMapIndex};
pub use discovery::{find_charts, find_manifest_files, is_chart_root, ChartMarkerCache};
pub use template::{HelmDefine, StepDefinition, StepKind, TemplateDefinition, TemplateIndex};
pub use values::{ChartMeta, ValueDefinition, ValueType, ValuesIndex};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("vfs error: {0}")]
    Vfs(#[from] vfs::VfsError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
