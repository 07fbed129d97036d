//! Incremental index maintenance from file events.
//!
//! Events are queued and applied strictly in arrival order per file, so a
//! change followed by a delete converges to the deleted state. Applying an
//! event is idempotent: removing a file's entries and re-adding them from
//! the same content always yields the same index state.

use std::collections::VecDeque;

use camino::Utf8Path;
use vfs::VfsPath;
use yamlref_index::discovery::SKIP_DIRS;
use yamlref_index::ChartMarkerCache;

use crate::WorkspaceIndices;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    Created,
    Changed,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub uri: String,
    pub kind: FileEventKind,
}

impl FileEvent {
    #[must_use]
    pub fn new(uri: impl Into<String>, kind: FileEventKind) -> Self {
        Self {
            uri: uri.into(),
            kind,
        }
    }
}

/// Applies watcher events to the three workspace indices.
pub struct Maintainer {
    root: VfsPath,
    indices: WorkspaceIndices,
    markers: ChartMarkerCache,
    queue: VecDeque<FileEvent>,
}

impl Maintainer {
    #[must_use]
    pub fn new(root: VfsPath, indices: WorkspaceIndices) -> Self {
        Self {
            root,
            indices,
            markers: ChartMarkerCache::new(),
            queue: VecDeque::new(),
        }
    }

    pub fn enqueue(&mut self, event: FileEvent) {
        self.queue.push_back(event);
    }

    /// Drain the queue, applying events in arrival order.
    pub fn pump(&mut self) {
        while let Some(event) = self.queue.pop_front() {
            self.apply(&event);
        }
    }

    pub fn process(&mut self, event: FileEvent) {
        self.enqueue(event);
        self.pump();
    }

    fn resolve(&self, uri: &str) -> Option<VfsPath> {
        self.root.join(uri.trim_start_matches('/')).ok()
    }

    fn apply(&mut self, event: &FileEvent) {
        let path = Utf8Path::new(&event.uri);
        if path
            .components()
            .any(|c| SKIP_DIRS.contains(&c.as_str()) || c.as_str().starts_with('.'))
        {
            return;
        }
        let file_name = path.file_name().unwrap_or("");
        let extension = path.extension().unwrap_or("");
        tracing::debug!(uri = event.uri, kind = ?event.kind, "applying file event");

        // chart structure markers invalidate the memoized chart-root answers
        if matches!(file_name, "Chart.yaml" | "values.yaml")
            && matches!(event.kind, FileEventKind::Created | FileEventKind::Deleted)
        {
            self.markers.clear();
        }

        if let Some(chart_root) = path.parent().map(Utf8Path::as_str) {
            if file_name == "Chart.yaml" && event.kind == FileEventKind::Deleted {
                if let Ok(mut values) = self.indices.values.write() {
                    values.remove_chart(chart_root);
                }
            }
            if file_name == "values.yaml" {
                self.apply_values(event, chart_root);
            }
            if file_name == "Chart.yaml" && event.kind == FileEventKind::Created {
                // a directory just became a chart; pick up its values
                self.apply_values(
                    &FileEvent::new(format!("{chart_root}/values.yaml"), FileEventKind::Created),
                    chart_root,
                );
            }
        }

        match event.kind {
            FileEventKind::Deleted => {
                if matches!(extension, "yaml" | "yml" | "tpl") {
                    if let Ok(mut templates) = self.indices.templates.write() {
                        templates.remove_file(&event.uri);
                    }
                }
                if matches!(extension, "yaml" | "yml") {
                    if let Ok(mut configmaps) = self.indices.configmaps.write() {
                        configmaps.remove_file(&event.uri);
                    }
                }
            }
            FileEventKind::Created | FileEventKind::Changed => {
                let Some(file) = self.resolve(&event.uri) else {
                    return;
                };
                if matches!(extension, "yaml" | "yml" | "tpl") {
                    if let Ok(mut templates) = self.indices.templates.write() {
                        // an unreadable file converges to the absent state
                        if let Err(e) = templates.update_file(&file) {
                            tracing::warn!(uri = event.uri, error = %e, "dropping unreadable file");
                            templates.remove_file(&event.uri);
                        }
                    }
                }
                if matches!(extension, "yaml" | "yml") {
                    if let Ok(mut configmaps) = self.indices.configmaps.write() {
                        if let Err(e) = configmaps.update_file(&file) {
                            tracing::warn!(uri = event.uri, error = %e, "dropping unreadable file");
                            configmaps.remove_file(&event.uri);
                        }
                    }
                }
            }
        }
    }

    fn apply_values(&mut self, event: &FileEvent, chart_root: &str) {
        let Ok(mut values) = self.indices.values.write() else {
            return;
        };
        match event.kind {
            FileEventKind::Deleted => values.remove_file(&event.uri),
            FileEventKind::Created | FileEventKind::Changed => {
                let Some(chart_dir) = self.resolve(chart_root) else {
                    return;
                };
                if self.markers.is_chart_root(&chart_dir) {
                    if let Err(e) = values.update_chart(&chart_dir) {
                        tracing::warn!(chart_root, error = %e, "skipping unreadable chart");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use color_eyre::eyre;
    use test_util::prelude::*;
    use yamlref_core::{ConfigKind, ManifestKind};

    fn setup() -> eyre::Result<(VfsPath, Maintainer)> {
        let root = VfsPath::new(vfs::MemoryFS::new());
        let indices = WorkspaceIndices::new();
        let maintainer = Maintainer::new(root.clone(), indices);
        Ok((root, maintainer))
    }

    const WORKFLOW_TEMPLATE: &str = "kind: WorkflowTemplate\nmetadata:\n  name: wt\nspec:\n  templates:\n    - name: build\n";

    #[test]
    fn created_files_are_indexed_and_deletes_remove_them() -> eyre::Result<()> {
        let (root, mut m) = setup()?;
        write(&root.join("ws/wt.yaml")?, WORKFLOW_TEMPLATE)?;

        m.process(FileEvent::new("/ws/wt.yaml", FileEventKind::Created));
        {
            let templates = m.indices.templates.read().unwrap();
            assert!(templates
                .lookup(ManifestKind::WorkflowTemplate, "wt", "build")
                .is_some());
        }

        m.process(FileEvent::new("/ws/wt.yaml", FileEventKind::Deleted));
        let templates = m.indices.templates.read().unwrap();
        assert!(templates
            .lookup(ManifestKind::WorkflowTemplate, "wt", "build")
            .is_none());
        Ok(())
    }

    #[test]
    fn events_apply_in_arrival_order() -> eyre::Result<()> {
        let (root, mut m) = setup()?;
        write(&root.join("ws/cm.yaml")?, "kind: ConfigMap\nmetadata:\n  name: cfg\ndata:\n  a: 1\n")?;

        m.enqueue(FileEvent::new("/ws/cm.yaml", FileEventKind::Created));
        m.enqueue(FileEvent::new("/ws/cm.yaml", FileEventKind::Deleted));
        m.pump();

        let configmaps = m.indices.configmaps.read().unwrap();
        assert!(configmaps.lookup(ConfigKind::ConfigMap, "cfg").is_none());
        Ok(())
    }

    #[test]
    fn values_updates_flow_into_the_values_index() -> eyre::Result<()> {
        let (root, mut m) = setup()?;
        write(&root.join("chart/Chart.yaml")?, "name: chart")?;
        write(&root.join("chart/values.yaml")?, "replicaCount: 1\n")?;

        m.process(FileEvent::new("/chart/values.yaml", FileEventKind::Created));
        {
            let values = m.indices.values.read().unwrap();
            assert!(values.lookup("/chart", "replicaCount").is_some());
        }

        write(&root.join("chart/values.yaml")?, "replicaCount: 2\nimage: nginx\n")?;
        m.process(FileEvent::new("/chart/values.yaml", FileEventKind::Changed));
        {
            let values = m.indices.values.read().unwrap();
            assert!(values.lookup("/chart", "image").is_some());
        }

        m.process(FileEvent::new("/chart/Chart.yaml", FileEventKind::Deleted));
        let values = m.indices.values.read().unwrap();
        assert!(values.lookup("/chart", "image").is_none());
        Ok(())
    }

    #[test]
    fn chart_marker_creation_invalidates_the_cache() -> eyre::Result<()> {
        let (root, mut m) = setup()?;
        // values.yaml alone is not a chart
        write(&root.join("chart/values.yaml")?, "a: 1\n")?;
        m.process(FileEvent::new("/chart/values.yaml", FileEventKind::Created));
        {
            let values = m.indices.values.read().unwrap();
            assert!(values.lookup("/chart", "a").is_none());
        }

        write(&root.join("chart/Chart.yaml")?, "name: chart")?;
        m.process(FileEvent::new("/chart/Chart.yaml", FileEventKind::Created));
        let values = m.indices.values.read().unwrap();
        assert!(values.lookup("/chart", "a").is_some());
        Ok(())
    }

    #[test]
    fn skip_listed_paths_are_ignored() -> eyre::Result<()> {
        let (root, mut m) = setup()?;
        write(&root.join("node_modules/dep/wt.yaml")?, WORKFLOW_TEMPLATE)?;

        m.process(FileEvent::new(
            "/node_modules/dep/wt.yaml",
            FileEventKind::Created,
        ));
        let templates = m.indices.templates.read().unwrap();
        assert_eq!(templates.templates().count(), 0);
        Ok(())
    }

    #[test]
    fn replaying_the_same_event_is_idempotent() -> eyre::Result<()> {
        let (root, mut m) = setup()?;
        write(&root.join("ws/wt.yaml")?, WORKFLOW_TEMPLATE)?;

        m.process(FileEvent::new("/ws/wt.yaml", FileEventKind::Created));
        m.process(FileEvent::new("/ws/wt.yaml", FileEventKind::Changed));
        m.process(FileEvent::new("/ws/wt.yaml", FileEventKind::Changed));

        let templates = m.indices.templates.read().unwrap();
        assert_eq!(templates.templates().count(), 1);
        Ok(())
    }
}
