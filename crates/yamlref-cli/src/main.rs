use std::path::{Path, PathBuf};
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use color_eyre::eyre;
use color_eyre::eyre::WrapErr;
use vfs::VfsPath;
use yamlref_core::Document;
use yamlref_engine::cache::{CachingRenderer, RenderCache};
use yamlref_engine::handlers::standard_registry;
use yamlref_engine::render::{parse_render_errors, HelmRenderer, Renderer, UnavailableRenderer};
use yamlref_engine::WorkspaceIndices;
use yamlref_index::find_manifest_files;

#[derive(Parser, Debug)]
#[command(
    name = "yamlref",
    version,
    about = "Resolve template references in Argo workflows and Helm charts"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index the workspace and print the definitions found as JSON
    Scan {
        /// Workspace root
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },

    /// Validate every manifest and report unresolved references
    Check {
        /// Workspace root
        #[arg(short, long, default_value = ".")]
        path: PathBuf,

        /// Double-check unresolved includes with `helm template`
        #[arg(long, default_value_t = false)]
        render: bool,
    },
}

fn vfs_root(path: &Path) -> VfsPath {
    VfsPath::new(vfs::PhysicalFS::new(path))
}

fn initialize(path: &Path) -> eyre::Result<(VfsPath, WorkspaceIndices)> {
    let root = vfs_root(path);
    let indices = WorkspaceIndices::new();
    indices
        .initialize(std::slice::from_ref(&root))
        .wrap_err_with(|| format!("index workspace {}", path.display()))?;
    Ok((root, indices))
}

fn scan(path: &Path) -> eyre::Result<()> {
    let (_root, indices) = initialize(path)?;

    let templates = indices
        .templates
        .read()
        .map_err(|_| eyre::eyre!("template index poisoned"))?;
    let values = indices
        .values
        .read()
        .map_err(|_| eyre::eyre!("values index poisoned"))?;
    let configmaps = indices
        .configmaps
        .read()
        .map_err(|_| eyre::eyre!("config index poisoned"))?;

    let mut workflow_templates: Vec<_> = templates
        .templates()
        .map(|d| {
            serde_json::json!({
                "kind": format!("{:?}", d.kind),
                "workflow": d.workflow_name,
                "template": d.name,
                "file": d.uri,
                "line": d.range.start.line,
            })
        })
        .collect();
    workflow_templates.sort_by_key(|v| v.to_string());

    let mut defines: Vec<_> = templates
        .defines()
        .map(|d| serde_json::json!({ "name": d.name, "file": d.uri }))
        .collect();
    defines.sort_by_key(|v| v.to_string());

    let mut configs: Vec<_> = configmaps
        .entries()
        .map(|e| {
            serde_json::json!({
                "kind": e.kind.to_string(),
                "name": e.name,
                "keys": e.keys.keys().collect::<Vec<_>>(),
                "file": e.uri,
            })
        })
        .collect();
    configs.sort_by_key(|v| v.to_string());

    let mut charts: Vec<_> = values
        .chart_roots()
        .map(|root| {
            let meta = values.chart_meta(root);
            serde_json::json!({
                "chart": root,
                "name": meta.and_then(|m| m.name.clone()),
                "version": meta.and_then(|m| m.version.clone()),
                "values": values.values_in(root).len(),
            })
        })
        .collect();
    charts.sort_by_key(|v| v.to_string());

    let summary = serde_json::json!({
        "templates": workflow_templates,
        "defines": defines,
        "configMaps": configs,
        "charts": charts,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn check(path: &Path, render: bool) -> eyre::Result<()> {
    let (root, indices) = initialize(path)?;

    let renderer: Arc<dyn Renderer> = if render {
        match Utf8PathBuf::from_path_buf(path.join(".yamlref-cache")) {
            Ok(dir) => Arc::new(CachingRenderer::new(
                HelmRenderer::default(),
                RenderCache::new(dir),
            )),
            Err(_) => {
                tracing::warn!("workspace path is not UTF-8, render cache disabled");
                Arc::new(HelmRenderer::default())
            }
        }
    } else {
        Arc::new(UnavailableRenderer)
    };
    let registry = standard_registry(&indices, renderer.clone());

    let mut findings = 0usize;
    for file in find_manifest_files(std::slice::from_ref(&root), &["yaml", "yml", "tpl"])? {
        let text = match file.read_to_string() {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(file = file.as_str(), error = %e, "skipping unreadable file");
                continue;
            }
        };
        let doc = Document::new(file.as_str(), &text);
        for (reference, resolved) in registry.validate_all(&doc) {
            findings += 1;
            let message = resolved.message.unwrap_or_else(|| "unresolved".to_string());
            println!(
                "{}:{}:{}: {} ({})",
                file.as_str(),
                reference.range.start.line + 1,
                reference.range.start.character + 1,
                message,
                reference.kind.label(),
            );
        }
    }

    if render {
        let values = indices
            .values
            .read()
            .map_err(|_| eyre::eyre!("values index poisoned"))?;
        for chart in values.chart_roots() {
            let chart_dir = path.join(chart.trim_start_matches('/'));
            let outcome = renderer.render(&chart_dir.display().to_string(), None);
            let Some(stderr) = outcome.error else {
                continue;
            };
            for err in parse_render_errors(&stderr) {
                findings += 1;
                println!(
                    "{chart}/{}:{}:{}: {} (render)",
                    err.file, err.line, err.column, err.message,
                );
            }
        }
    }

    if findings > 0 {
        eprintln!("{findings} unresolved reference(s)");
        std::process::exit(1);
    }
    println!("no unresolved references");
    Ok(())
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Scan { path } => scan(&path),
        Command::Check { path, render } => check(&path, render),
    }
}
