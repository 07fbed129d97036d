//! The reference-resolution engine: guards classify documents, handlers
//! pair a detector with a resolver, and the registry dispatches the three
//! operations the provider layer consumes (`detect_and_resolve`,
//! `validate_all`, `provide_completions`).

pub mod cache;
pub mod guards;
pub mod handlers;
pub mod registry;
pub mod render;
pub mod watch;

use std::sync::{Arc, RwLock};

use vfs::VfsPath;
use yamlref_core::{CompletionItem, Document, Position, Reference, ResolvedReference};
use yamlref_index::{ConfigMapIndex, TemplateIndex, ValuesIndex};

pub use registry::{GuardEntry, Registry};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Index(#[from] yamlref_index::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Exclusive-writer/shared-reader handle. Lookups must never observe a
/// partially-updated file's entries, so every index mutation happens under
/// the write half while handlers only ever take the read half.
pub type Shared<T> = Arc<RwLock<T>>;

/// The three workspace indices, shared between the registry's handlers and
/// the incremental maintenance protocol.
#[derive(Debug, Default, Clone)]
pub struct WorkspaceIndices {
    pub templates: Shared<TemplateIndex>,
    pub configmaps: Shared<ConfigMapIndex>,
    pub values: Shared<ValuesIndex>,
}

impl WorkspaceIndices {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Full workspace scan of all three indices.
    pub fn initialize(&self, roots: &[VfsPath]) -> Result<()> {
        if let Ok(mut templates) = self.templates.write() {
            templates.initialize(roots)?;
        }
        if let Ok(mut configmaps) = self.configmaps.write() {
            configmaps.initialize(roots)?;
        }
        if let Ok(mut values) = self.values.write() {
            values.initialize(roots)?;
        }
        Ok(())
    }
}

/// Document classifier: decides whether a handler list applies.
pub trait Guard: Send + Sync {
    fn check(&self, doc: &Document) -> bool;
}

/// Detect + resolve unit for one reference kind.
///
/// `detect` is total: it returns `None` when no matching expression covers
/// the position and never fails. `find_all` is only implemented by handlers
/// that participate in diagnostics; `complete` only by handlers that offer
/// completions (an empty vec means "nothing here", letting the registry
/// move on to the next handler).
pub trait Handler: Send + Sync {
    fn name(&self) -> &'static str;

    fn detect(&self, doc: &Document, pos: Position) -> Option<Reference>;

    fn resolve(&self, doc: &Document, reference: &Reference) -> ResolvedReference;

    fn find_all(&self, _doc: &Document) -> Option<Vec<Reference>> {
        None
    }

    fn complete(&self, _doc: &Document, _pos: Position) -> Option<Vec<CompletionItem>> {
        None
    }
}
