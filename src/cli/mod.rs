//! Command line interface for the release pipeline.

mod args;
mod output;

pub use args::{Args, RuntimeConfig};
pub use output::OutputManager;

use crate::config::{BuildOptionSet, CiEnvironment, Manifest, PipelineConfig};
use crate::error::{CliError, ErrorExt, Result};
use crate::pipeline::{Pipeline, PipelineReport, Stage, StageStatus};
use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};

/// Main CLI entry point
pub async fn run(args: Args) -> Result<i32> {
    args.validate()
        .map_err(|reason| CliError::InvalidArguments { reason })?;
    let runtime = RuntimeConfig::from(&args);

    runtime
        .output()
        .progress(&format!("Loading {}", args.manifest.display()))?;
    let manifest = Manifest::load(&args.manifest)?;
    if args.list_options {
        list_options(&runtime, &manifest)?;
        return Ok(0);
    }

    let project_root = project_root(&args.manifest)?;
    let ci = CiEnvironment::from_env(&manifest.ci);
    log::debug!("CI environment: {:?}", ci);
    runtime
        .output()
        .verbose(&format!("project root: {}", project_root.display()))?;

    let options = BuildOptionSet::new(args.pipeline_options(), args.enable.iter().cloned());
    let config = PipelineConfig::new(project_root, manifest, options, ci, &args.prefix)?
        .with_skip_dependencies(args.skip_deps);

    runtime.section(&format!("Releasing {}", config.manifest().app.name))?;
    let pipeline = Pipeline::with_system_tools(config, runtime.is_verbose())?;
    let report = pipeline.run().await?;
    print_report(&runtime, &report)?;

    if args.with_dist
        && let Some(StageStatus::Skipped(reason)) = report.status(Stage::Publish)
    {
        runtime.warn(&format!("release not published: {reason}"))?;
    }

    Ok(0)
}

/// Parse arguments without executing
pub fn parse_args() -> Args {
    Args::parse_args()
}

/// Absolute directory holding the manifest; every relative path resolves against it.
fn project_root(manifest: &Path) -> Result<PathBuf> {
    let parent = match manifest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    parent
        .absolutize()
        .map(|root| root.into_owned())
        .fs_context("resolving project root", parent)
}

fn list_options(runtime: &RuntimeConfig, manifest: &Manifest) -> Result<()> {
    let output = runtime.output();
    output.section("Pipeline switches")?;
    output.indent("--debug           Debug build (enables `debug` dependency options)")?;
    output.indent("--without-app     Skip the application bundle")?;
    output.indent("--without-binary  Skip the binary install")?;
    output.indent("--with-dist       Archive and publish the bundle")?;

    for package in &manifest.dependencies.packages {
        if package.options.is_empty() {
            continue;
        }
        output.section(&format!("{} {}", package.name, package.version_label()))?;
        for (name, option) in &package.options {
            let marker = if option.default { " (default)" } else { "" };
            output.indent(&format!("--enable {name}{marker}"))?;
            if !option.description.is_empty() {
                output.indent(&format!("    {}", option.description))?;
            }
        }
    }
    Ok(())
}

fn print_report(runtime: &RuntimeConfig, report: &PipelineReport) -> Result<()> {
    runtime.section("Summary")?;
    for outcome in &report.outcomes {
        match &outcome.status {
            StageStatus::Completed(summary) => {
                runtime.success(&format!("{}: {}", outcome.stage, summary))?
            }
            StageStatus::Skipped(reason) => {
                runtime.indent(&format!("{}: skipped ({})", outcome.stage, reason))?
            }
        }
    }

    if let Some(archive) = &report.archive {
        runtime.indent(&format!("sha256 {}  {}", archive.sha256, archive.file_name))?;
    }
    if let Some(url) = report
        .release
        .as_ref()
        .and_then(|r| r.asset.browser_download_url.as_deref())
    {
        runtime.indent(&format!("download: {url}"))?;
    }
    Ok(())
}
