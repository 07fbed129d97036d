//! Persisted render cache.
//!
//! Each (chart, template) pair maps to a JSON artifact keyed by a content
//! hash of the pair. The artifact embeds size + mtime checksums of the
//! files the render depended on; any mismatch invalidates the artifact.

use std::time::{Duration, UNIX_EPOCH};

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::render::{RenderOutcome, RenderedDocument, Renderer};
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChecksum {
    pub file: String,
    pub mtime_ms: u64,
    pub size: u64,
}

impl FileChecksum {
    /// Snapshot of a file's current size and mtime. `None` when the file
    /// cannot be inspected.
    #[must_use]
    pub fn capture(path: &Utf8Path) -> Option<Self> {
        let meta = std::fs::metadata(path).ok()?;
        let mtime_ms = meta
            .modified()
            .ok()?
            .duration_since(UNIX_EPOCH)
            .ok()
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))?;
        Some(Self {
            file: path.to_string(),
            mtime_ms,
            size: meta.len(),
        })
    }

    #[must_use]
    pub fn still_valid(&self) -> bool {
        FileChecksum::capture(Utf8Path::new(&self.file)).as_ref() == Some(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub documents: Vec<RenderedDocument>,
    pub checksums: Vec<FileChecksum>,
}

#[derive(Debug, Clone)]
pub struct RenderCache {
    dir: Utf8PathBuf,
}

impl RenderCache {
    #[must_use]
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn artifact_path(&self, chart_dir: &str, template: Option<&str>) -> Utf8PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(chart_dir.as_bytes());
        hasher.update(b"\n");
        hasher.update(template.unwrap_or("").as_bytes());
        let digest = hasher.finalize();
        let mut name = String::with_capacity(digest.len() * 2 + 5);
        for byte in digest {
            use std::fmt::Write;
            let _ = write!(name, "{byte:02x}");
        }
        name.push_str(".json");
        self.dir.join(name)
    }

    pub fn store(
        &self,
        chart_dir: &str,
        template: Option<&str>,
        entry: &CacheEntry,
    ) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.artifact_path(chart_dir, template);
        let json = serde_json::to_vec_pretty(entry)?;
        std::fs::write(&path, json)?;
        tracing::debug!(chart_dir, artifact = path.as_str(), "stored render cache entry");
        Ok(())
    }

    /// Load the cached entry for `(chart_dir, template)`, validating its
    /// checksums against the files on disk. A stale or unreadable artifact
    /// is removed and treated as absent.
    #[must_use]
    pub fn load(&self, chart_dir: &str, template: Option<&str>) -> Option<CacheEntry> {
        let path = self.artifact_path(chart_dir, template);
        let bytes = std::fs::read(&path).ok()?;
        let entry: CacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(_) => {
                let _ = std::fs::remove_file(&path);
                return None;
            }
        };
        if entry.checksums.iter().all(FileChecksum::still_valid) {
            Some(entry)
        } else {
            tracing::debug!(chart_dir, "render cache entry is stale");
            let _ = std::fs::remove_file(&path);
            None
        }
    }
}

/// Puts the persisted cache in front of a renderer: a valid artifact
/// short-circuits the render, and a successful render is stored with
/// checksums of the chart files it depended on. Charts whose files cannot
/// be inspected render straight through and are never cached.
pub struct CachingRenderer<R> {
    inner: R,
    cache: RenderCache,
}

impl<R> CachingRenderer<R> {
    #[must_use]
    pub fn new(inner: R, cache: RenderCache) -> Self {
        Self { inner, cache }
    }
}

fn chart_checksums(chart_dir: &str, template: Option<&str>) -> Vec<FileChecksum> {
    let chart = Utf8Path::new(chart_dir);
    let mut files = vec![chart.join("Chart.yaml"), chart.join("values.yaml")];
    if let Some(template) = template {
        files.push(chart.join(template));
    }
    files
        .iter()
        .filter_map(|f| FileChecksum::capture(f))
        .collect()
}

impl<R: Renderer> Renderer for CachingRenderer<R> {
    fn available(&self) -> bool {
        self.inner.available()
    }

    fn render(&self, chart_dir: &str, template: Option<&str>) -> RenderOutcome {
        if let Some(entry) = self.cache.load(chart_dir, template) {
            tracing::debug!(chart_dir, "render served from cache");
            return RenderOutcome {
                success: true,
                output: None,
                documents: entry.documents,
                error: None,
                execution_time: Duration::ZERO,
            };
        }
        let outcome = self.inner.render(chart_dir, template);
        if outcome.success {
            let checksums = chart_checksums(chart_dir, template);
            if !checksums.is_empty() {
                let entry = CacheEntry {
                    documents: outcome.documents.clone(),
                    checksums,
                };
                if let Err(e) = self.cache.store(chart_dir, template, &entry) {
                    tracing::warn!(chart_dir, error = %e, "could not persist render cache entry");
                }
            }
        }
        outcome
    }
}
