//! Workspace walking and chart discovery.
//!
//! An explicit stack walk with eagerly collected, sorted children keeps
//! traversal deterministic. Directories on the skip-list are pruned, depth
//! is bounded, and recursion short-circuits into chart roots: a chart's own
//! tree is never scanned for further charts.

use camino::Utf8Path;
use vfs::VfsPath;

use crate::Result;

/// Build/output/vendor-style directories pruned from every walk.
pub const SKIP_DIRS: &[&str] = &[
    "node_modules",
    "target",
    "dist",
    "build",
    "out",
    "vendor",
    ".git",
    ".hg",
    ".svn",
];

/// Bound on directory nesting below each workspace root.
pub const MAX_DEPTH: usize = 8;

fn file_name(path: &VfsPath) -> &str {
    Utf8Path::new(path.as_str()).file_name().unwrap_or("")
}

fn skipped(path: &VfsPath) -> bool {
    let name = file_name(path);
    name.starts_with('.') || SKIP_DIRS.contains(&name)
}

fn sorted_children(dir: &VfsPath) -> Vec<VfsPath> {
    let mut children: Vec<VfsPath> = match dir.read_dir() {
        Ok(iter) => iter.collect(),
        // unreadable directory: treat as empty, scan continues elsewhere
        Err(e) => {
            tracing::warn!(dir = dir.as_str(), error = %e, "skipping unreadable directory");
            Vec::new()
        }
    };
    children.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    children
}

/// Whether `dir` is a valid chart root: it contains `Chart.yaml` plus
/// either `values.yaml` or a `templates/` directory.
pub fn is_chart_root(dir: &VfsPath) -> Result<bool> {
    let chart = dir.join("Chart.yaml")?;
    if !chart.exists()? {
        return Ok(false);
    }
    let values = dir.join("values.yaml")?;
    if values.exists()? {
        return Ok(true);
    }
    let templates = dir.join("templates")?;
    Ok(templates.exists()? && templates.is_dir()?)
}

/// Memoized chart-root checks.
///
/// Owned by whoever needs repeated checks (the maintenance protocol);
/// cleared when chart marker files are created or deleted.
#[derive(Debug, Default)]
pub struct ChartMarkerCache {
    known: std::collections::HashMap<String, bool>,
}

impl ChartMarkerCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_chart_root(&mut self, dir: &VfsPath) -> bool {
        if let Some(hit) = self.known.get(dir.as_str()) {
            return *hit;
        }
        let result = is_chart_root(dir).unwrap_or(false);
        self.known.insert(dir.as_str().to_string(), result);
        result
    }

    /// Drop all memoized answers. Called when a `Chart.yaml`,
    /// `values.yaml`, or `templates/` marker appears or disappears.
    pub fn clear(&mut self) {
        self.known.clear();
    }
}

/// Find chart roots under `roots`, depth-first, bounded by [`MAX_DEPTH`].
/// Recursion does not descend into a discovered chart root, so charts
/// vendored inside another chart's tree are not indexed separately.
pub fn find_charts(roots: &[VfsPath]) -> Result<Vec<VfsPath>> {
    let mut charts = Vec::new();
    for root in roots {
        let mut stack: Vec<(VfsPath, usize)> = vec![(root.clone(), 0)];
        while let Some((dir, depth)) = stack.pop() {
            if is_chart_root(&dir).unwrap_or(false) {
                charts.push(dir);
                continue;
            }
            if depth >= MAX_DEPTH {
                continue;
            }
            // reverse so the sorted order survives the LIFO stack
            for child in sorted_children(&dir).into_iter().rev() {
                if child.is_dir().unwrap_or(false) && !skipped(&child) {
                    stack.push((child, depth + 1));
                }
            }
        }
    }
    charts.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    Ok(charts)
}

/// Enumerate files under `roots` whose extension is in `extensions`,
/// honoring the skip-list and depth bound.
pub fn find_manifest_files(roots: &[VfsPath], extensions: &[&str]) -> Result<Vec<VfsPath>> {
    let mut files = Vec::new();
    for root in roots {
        let mut stack: Vec<(VfsPath, usize)> = vec![(root.clone(), 0)];
        while let Some((dir, depth)) = stack.pop() {
            for child in sorted_children(&dir).into_iter().rev() {
                if skipped(&child) {
                    continue;
                }
                if child.is_dir().unwrap_or(false) {
                    if depth < MAX_DEPTH {
                        stack.push((child, depth + 1));
                    }
                    continue;
                }
                let ext = Utf8Path::new(child.as_str())
                    .extension()
                    .unwrap_or("");
                if extensions.contains(&ext) {
                    files.push(child);
                }
            }
        }
    }
    files.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    Ok(files)
}
