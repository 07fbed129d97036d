//! Guard/handler dispatch.
//!
//! Guards are checked in registration order and the first matching guard's
//! handler list is the only one consulted for the document. Within that
//! list, handlers are tried in order and the first successful detection
//! wins.

use yamlref_core::{CompletionItem, Document, Existence, Position, Reference, ResolvedReference};

use crate::{Guard, Handler};

/// One guard and the handlers that apply when it matches.
pub struct GuardEntry {
    pub guard: Box<dyn Guard>,
    pub handlers: Vec<Box<dyn Handler>>,
}

impl GuardEntry {
    #[must_use]
    pub fn new(guard: impl Guard + 'static, handlers: Vec<Box<dyn Handler>>) -> Self {
        Self {
            guard: Box::new(guard),
            handlers,
        }
    }
}

#[derive(Default)]
pub struct Registry {
    entries: Vec<GuardEntry>,
}

impl Registry {
    #[must_use]
    pub fn new(entries: Vec<GuardEntry>) -> Self {
        Self { entries }
    }

    fn matched(&self, doc: &Document) -> Option<&GuardEntry> {
        self.entries.iter().find(|e| e.guard.check(doc))
    }

    /// Detect the reference at `pos` and resolve it in one step. Returns
    /// `None` when no guard matches or no handler detects anything.
    #[must_use]
    pub fn detect_and_resolve(
        &self,
        doc: &Document,
        pos: Position,
    ) -> Option<(Reference, ResolvedReference)> {
        let entry = self.matched(doc)?;
        for handler in &entry.handlers {
            if let Some(reference) = handler.detect(doc, pos) {
                tracing::trace!(
                    handler = handler.name(),
                    kind = reference.kind.label(),
                    "detected reference"
                );
                let resolved = handler.resolve(doc, &reference);
                return Some((reference, resolved));
            }
        }
        None
    }

    /// Sweep the document and return every reference that resolved as
    /// missing. `Unknown` outcomes never surface here.
    #[must_use]
    pub fn validate_all(&self, doc: &Document) -> Vec<(Reference, ResolvedReference)> {
        let Some(entry) = self.matched(doc) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for handler in &entry.handlers {
            let Some(references) = handler.find_all(doc) else {
                continue;
            };
            for reference in references {
                let resolved = handler.resolve(doc, &reference);
                if resolved.exists == Existence::Missing {
                    out.push((reference, resolved));
                }
            }
        }
        out
    }

    /// Completions at `pos`: the first handler producing a non-empty list
    /// wins; handlers without completion support are skipped.
    #[must_use]
    pub fn provide_completions(&self, doc: &Document, pos: Position) -> Vec<CompletionItem> {
        let Some(entry) = self.matched(doc) else {
            return Vec::new();
        };
        for handler in &entry.handlers {
            if let Some(items) = handler.complete(doc, pos) {
                if !items.is_empty() {
                    return items;
                }
            }
        }
        Vec::new()
    }
}
