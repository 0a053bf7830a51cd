//! CLI execution and command dispatch logic.
//!
//! This module keeps `main` minimal by providing a single entry point that
//! resolves the repository root, reads the toolchain configuration and runs
//! the selected command.

use crate::ast::BuildMode;
use crate::builder::{BuildReport, Builder};
use crate::cli::{BuildArgs, Cli, Commands};
use crate::toolchain::Toolchain;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io;
use std::process::Command;
use tracing::{debug, info, warn};

/// Default DOT output, relative to the repository root.
pub const GRAPH_DOT_FILE: &str = "build/dependency_graph.dot";

/// Program used to render DOT files.
pub const DOT_PROGRAM: &str = "dot";

/// Execute the parsed [`Cli`] command.
///
/// # Errors
///
/// Returns an error if the repository root is unusable, a declaration file
/// fails to load, the graph has a cycle, or a build command fails.
pub fn run(cli: &Cli) -> Result<()> {
    let root = resolve_root(cli.directory.as_deref())?;
    let toolchain = Toolchain::from_env();
    debug!(root = %root, cxx = %toolchain.cxx, ar = %toolchain.ar, "resolved configuration");
    match &cli.command {
        Commands::Build(args) => build(&root, BuildMode::Debug, toolchain, cli.keep_going, args),
        Commands::BuildRelease(args) => {
            build(&root, BuildMode::Release, toolchain, cli.keep_going, args)
        }
        Commands::Graph { output } => {
            let output = output.as_deref().map(utf8).transpose()?;
            graph(&root, toolchain, output.as_deref())
        }
    }
}

fn utf8(path: &std::path::Path) -> Result<Utf8PathBuf> {
    Utf8PathBuf::try_from(path.to_path_buf())
        .with_context(|| format!("path {} is not valid UTF-8", path.display()))
}

fn resolve_root(directory: Option<&std::path::Path>) -> Result<Utf8PathBuf> {
    let dir = directory.unwrap_or_else(|| std::path::Path::new("."));
    let canonical = fs::canonicalize(dir)
        .with_context(|| format!("cannot access repository root {}", dir.display()))?;
    utf8(&canonical)
}

fn build(
    root: &Utf8Path,
    mode: BuildMode,
    toolchain: Toolchain,
    keep_going: bool,
    args: &BuildArgs,
) -> Result<()> {
    let mut builder = Builder::new(root, mode, toolchain).keep_going(keep_going);
    let targets = builder.targets().context("loading BUILD files")?;
    let dump = serde_json::to_string_pretty(targets).context("serialising targets")?;
    debug!("targets:\n{dump}");

    let outcome = match args.target.as_deref() {
        Some(name) => builder
            .build_target(name)
            .with_context(|| format!("building {name} ({mode})")),
        None => builder
            .build_all()
            .with_context(|| format!("building all targets ({mode})")),
    };
    match outcome {
        Ok(report) => {
            summarise(&report);
            Ok(())
        }
        Err(err) => {
            if let Some(report) = err
                .downcast_ref::<crate::builder::BuildError>()
                .and_then(|build| build.report())
            {
                summarise(report);
            }
            Err(err)
        }
    }
}

fn summarise(report: &BuildReport) {
    for name in &report.skipped {
        warn!(target = %name, "skipped");
    }
    info!(
        built = report.built.len(),
        failed = report.failed.len(),
        skipped = report.skipped.len(),
        "build finished"
    );
}

fn graph(root: &Utf8Path, toolchain: Toolchain, output: Option<&Utf8Path>) -> Result<()> {
    let mut builder = Builder::new(root, BuildMode::Debug, toolchain);
    let graph = builder
        .dependency_graph()
        .context("building dependency graph")?;

    let dot_path = output.map_or_else(|| root.join(GRAPH_DOT_FILE), Utf8Path::to_path_buf);
    if let Some(parent) = dot_path.parent().filter(|p| !p.as_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {parent}"))?;
    }
    fs::write(&dot_path, graph.to_dot()).with_context(|| format!("writing {dot_path}"))?;
    info!(path = %dot_path, nodes = graph.len(), "wrote dependency graph");

    render_pdf(&dot_path)
}

fn render_pdf(dot_path: &Utf8Path) -> Result<()> {
    let pdf_path = dot_path.with_extension("pdf");
    match Command::new(DOT_PROGRAM)
        .arg("-Tpdf")
        .arg(dot_path)
        .arg("-o")
        .arg(&pdf_path)
        .status()
    {
        Ok(status) if status.success() => {
            info!(path = %pdf_path, "rendered dependency graph");
        }
        Ok(status) => warn!(%status, "{DOT_PROGRAM} failed; only the DOT file was written"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            warn!("{DOT_PROGRAM} not found; install Graphviz to render {pdf_path}");
        }
        Err(err) => return Err(err).with_context(|| format!("running {DOT_PROGRAM}")),
    }
    Ok(())
}
