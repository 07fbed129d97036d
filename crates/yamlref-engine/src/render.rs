//! Chart rendering through the external `helm` binary.
//!
//! Rendering is strictly advisory: an absent or failing binary never
//! produces diagnostics on its own, it only leaves resolutions unknown.

use std::process::Command;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// One YAML document recovered from the rendered output, mapped back to the
/// template file that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedDocument {
    /// Chart-relative path from the `# Source:` marker.
    pub source_template_path: String,
    pub content: String,
    /// First and last line of this document within the combined output.
    pub start_line: u32,
    pub end_line: u32,
}

#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub success: bool,
    pub output: Option<String>,
    pub documents: Vec<RenderedDocument>,
    pub error: Option<String>,
    pub execution_time: Duration,
}

impl RenderOutcome {
    #[must_use]
    pub fn succeeded(output: String) -> Self {
        let documents = split_rendered_documents(&output);
        Self {
            success: true,
            output: Some(output),
            documents,
            error: None,
            execution_time: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn failed(error: String) -> Self {
        Self {
            success: false,
            output: None,
            documents: Vec::new(),
            error: Some(error),
            execution_time: Duration::ZERO,
        }
    }
}

pub trait Renderer: Send + Sync {
    /// Whether the render tool can be invoked at all.
    fn available(&self) -> bool;

    /// Render `chart_dir`, optionally restricted to a single template file
    /// (chart-relative path).
    fn render(&self, chart_dir: &str, template: Option<&str>) -> RenderOutcome;
}

/// Renders by shelling out to `helm template`.
pub struct HelmRenderer {
    binary: String,
}

impl HelmRenderer {
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for HelmRenderer {
    fn default() -> Self {
        Self::new("helm")
    }
}

impl Renderer for HelmRenderer {
    fn available(&self) -> bool {
        Command::new(&self.binary)
            .arg("version")
            .output()
            .is_ok_and(|o| o.status.success())
    }

    fn render(&self, chart_dir: &str, template: Option<&str>) -> RenderOutcome {
        let started = Instant::now();
        let mut cmd = Command::new(&self.binary);
        cmd.arg("template").arg(chart_dir);
        if let Some(template) = template {
            cmd.arg("--show-only").arg(template);
        }
        let mut outcome = match cmd.output() {
            Ok(out) if out.status.success() => {
                let stdout = String::from_utf8_lossy(&out.stdout).into_owned();
                RenderOutcome::succeeded(stdout)
            }
            Ok(out) => {
                tracing::debug!(chart_dir, "chart render failed");
                RenderOutcome::failed(String::from_utf8_lossy(&out.stderr).into_owned())
            }
            Err(e) => {
                tracing::debug!(chart_dir, error = %e, "render tool not invocable");
                RenderOutcome::failed(e.to_string())
            }
        };
        outcome.execution_time = started.elapsed();
        if outcome.success {
            tracing::debug!(
                chart_dir,
                documents = outcome.documents.len(),
                elapsed = ?outcome.execution_time,
                "rendered chart"
            );
        }
        outcome
    }
}

/// A renderer that is never available. Used where rendering is disabled;
/// every fallback through it stays unknown.
pub struct UnavailableRenderer;

impl Renderer for UnavailableRenderer {
    fn available(&self) -> bool {
        false
    }

    fn render(&self, _chart_dir: &str, _template: Option<&str>) -> RenderOutcome {
        RenderOutcome::failed("render tool unavailable".to_string())
    }
}

/// Always returns a fixed outcome.
pub struct StaticRenderer {
    outcome: RenderOutcome,
}

impl StaticRenderer {
    #[must_use]
    pub fn new(outcome: RenderOutcome) -> Self {
        Self { outcome }
    }
}

impl Renderer for StaticRenderer {
    fn available(&self) -> bool {
        true
    }

    fn render(&self, _chart_dir: &str, _template: Option<&str>) -> RenderOutcome {
        self.outcome.clone()
    }
}

/// A structured render error parsed from helm's stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderError {
    /// Chart-relative template path.
    pub file: String,
    pub line: u32,
    /// Zero when helm omits the column.
    pub column: u32,
    pub message: String,
}

fn error_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // template: <chart>/<file>:<line>[:<col>]: <message>
        Regex::new(r"template:\s+[^/\s]+/(?P<file>[^:]+):(?P<line>\d+)(?::(?P<col>\d+))?:\s*(?P<msg>.+)")
            .unwrap_or_else(|_| unreachable!("pattern is valid"))
    })
}

/// Extract structured errors from helm's stderr. Lines that do not match
/// the known shape are ignored; an unparseable stderr yields no errors
/// rather than a failure.
#[must_use]
pub fn parse_render_errors(stderr: &str) -> Vec<RenderError> {
    let pattern = error_pattern();
    stderr
        .lines()
        .filter_map(|line| {
            let caps = pattern.captures(line)?;
            Some(RenderError {
                file: caps["file"].to_string(),
                line: caps["line"].parse().ok()?,
                column: caps
                    .name("col")
                    .and_then(|c| c.as_str().parse().ok())
                    .unwrap_or(0),
                message: caps["msg"].trim().to_string(),
            })
        })
        .collect()
}

/// Split combined render output into per-template documents using the
/// `# Source:` markers helm emits after each `---`.
#[must_use]
pub fn split_rendered_documents(output: &str) -> Vec<RenderedDocument> {
    let mut out: Vec<RenderedDocument> = Vec::new();
    let mut current: Option<RenderedDocument> = None;

    for (n, line) in output.lines().enumerate() {
        let n = u32::try_from(n).unwrap_or(u32::MAX);
        if line.trim_end() == "---" {
            out.extend(current.take());
            continue;
        }
        if let Some(marker) = line.strip_prefix("# Source: ") {
            // strip the leading chart name segment
            let path = marker
                .trim()
                .split_once('/')
                .map_or_else(|| marker.trim().to_string(), |(_, rest)| rest.to_string());
            current = Some(RenderedDocument {
                source_template_path: path,
                content: String::new(),
                start_line: n + 1,
                end_line: n + 1,
            });
            continue;
        }
        if let Some(doc) = current.as_mut() {
            doc.content.push_str(line);
            doc.content.push('\n');
            doc.end_line = n;
        }
    }
    out.extend(current);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn error_lines_parse_with_and_without_column() {
        let stderr = indoc! {"
            Error: YAML parse error on mychart/templates/deployment.yaml
            template: mychart/templates/deployment.yaml:14:12: executing \"deployment\" at <.Values.missing>: nil pointer
            template: mychart/templates/service.yaml:3: undefined variable
        "};
        let errors = parse_render_errors(stderr);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].file, "templates/deployment.yaml");
        assert_eq!(errors[0].line, 14);
        assert_eq!(errors[0].column, 12);
        assert_eq!(errors[1].file, "templates/service.yaml");
        assert_eq!(errors[1].column, 0);
    }

    #[test]
    fn unrecognized_stderr_yields_no_errors() {
        assert!(parse_render_errors("Error: something exploded\n").is_empty());
    }

    #[test]
    fn rendered_output_splits_on_source_markers() {
        let output = indoc! {"
            ---
            # Source: mychart/templates/serviceaccount.yaml
            apiVersion: v1
            kind: ServiceAccount
            ---
            # Source: mychart/templates/service.yaml
            apiVersion: v1
            kind: Service
        "};
        let docs = split_rendered_documents(output);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].source_template_path, "templates/serviceaccount.yaml");
        assert!(docs[0].content.contains("kind: ServiceAccount"));
        assert_eq!(docs[0].start_line, 2);
        assert_eq!(docs[0].end_line, 3);
        assert_eq!(docs[1].source_template_path, "templates/service.yaml");
    }

    #[test]
    fn unavailable_renderer_reports_failure() {
        let outcome = UnavailableRenderer.render("/chart", None);
        assert!(!outcome.success);
        assert!(!UnavailableRenderer.available());
    }
}
