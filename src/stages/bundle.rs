//! Application bundle creation.
//!
//! Converts the build tree into a self-contained application directory with
//! the configured bundling tool, then runs the platform deploy tool on the
//! result so dynamic library references point inside the bundle.
//!
//! # Steps
//!
//! 1. `prepare` - make `writable_paths` user-writable (the bundler copies out
//!    of shared installed trees and fails on read-only files)
//! 2. `clean` - delete stale intermediates and any previous final bundle
//! 3. `stage` - copy `stage_files` into the build directory
//! 4. `bundle` - run the bundling tool
//! 5. `deploy` - run the deploy tool on the produced bundle
//! 6. `rename` - move the bundle to its final name
//! 7. `verify` - smoke-test the bundled executable
//!
//! A failure leaves whatever was produced in place; the next run's `clean`
//! step removes it.

use super::smoke::smoke_test;
use crate::config::{BundleSettings, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::runner::{CommandSpec, ExitResult, Runner};
use crate::utils::fs;
use std::path::{Path, PathBuf};

/// A finished application bundle.
#[derive(Debug, Clone)]
pub struct AppBundle {
    /// Bundle directory
    pub path: PathBuf,
    /// Executable inside the bundle
    pub executable: PathBuf,
}

/// Build, deploy and verify the application bundle.
pub async fn create_bundle<R: Runner>(
    runner: &R,
    config: &PipelineConfig,
    settings: &BundleSettings,
) -> Result<AppBundle> {
    let build_dir = config.build_dir();
    let output = build_dir.join(&settings.output);
    let final_path = build_dir.join(&settings.app_name);

    prepare_writable(config, settings).await?;

    let mut stale: Vec<PathBuf> = settings.clean.iter().map(|p| build_dir.join(p)).collect();
    stale.push(output.clone());
    stale.push(final_path.clone());
    if let Some(outside) = stale.iter().find(|p| !is_below(&build_dir, p)) {
        return Err(PipelineError::Bundle {
            step: "clean",
            reason: format!(
                "refusing to delete {}: not inside {}",
                outside.display(),
                build_dir.display()
            ),
        });
    }
    for path in &stale {
        fs::remove_path(path).await.map_err(|e| bundle_error("clean", e))?;
    }

    for file in &settings.stage_files {
        let source = config.resolve(file);
        let Some(name) = source.file_name() else {
            return Err(PipelineError::Bundle {
                step: "stage",
                reason: format!("stage file {} has no file name", source.display()),
            });
        };
        fs::copy_file(&source, &build_dir.join(name))
            .await
            .map_err(|e| bundle_error("stage", e))?;
    }

    let tool = CommandSpec::from_argv(&settings.tool)
        .ok_or_else(|| PipelineError::Config("[bundle].tool cannot be empty".to_string()))?
        .current_dir(&build_dir);
    let result = runner.run(&tool).await?;
    check("bundle", &tool, &result)?;

    if !output.exists() {
        return Err(PipelineError::Bundle {
            step: "bundle",
            reason: format!("`{tool}` did not produce {}", output.display()),
        });
    }

    if let Some(deploy_tool) = &settings.deploy_tool {
        let deploy = CommandSpec::new(deploy_tool.clone())
            .arg(output.display().to_string())
            .args(settings.deploy_args.iter().cloned())
            .current_dir(&build_dir);
        let result = runner.run(&deploy).await?;
        check("deploy", &deploy, &result)?;
    }

    if output != final_path {
        tokio::fs::rename(&output, &final_path).await.map_err(|e| PipelineError::Bundle {
            step: "rename",
            reason: format!("{} -> {}: {e}", output.display(), final_path.display()),
        })?;
    }

    let executable = final_path.join(&settings.executable);
    smoke_test(runner, &executable, &config.manifest().app.version_flag, Some(&build_dir))
        .await
        .map_err(|e| match e {
            PipelineError::SmokeTest { command, status, output } => PipelineError::Bundle {
                step: "verify",
                reason: format!("`{command}` {status}\n{output}"),
            },
            other => other,
        })?;

    log::info!("✓ Application bundle ready: {}", final_path.display());
    Ok(AppBundle {
        path: final_path,
        executable,
    })
}

async fn prepare_writable(config: &PipelineConfig, settings: &BundleSettings) -> Result<()> {
    for path in &settings.writable_paths {
        let path = config.resolve(path);
        let changed = fs::make_tree_writable(&path)
            .await
            .map_err(|e| bundle_error("prepare", e))?;
        log::debug!("Made {} entries writable under {}", changed, path.display());
    }
    Ok(())
}

fn is_below(base: &Path, path: &Path) -> bool {
    path.strip_prefix(base).is_ok_and(fs::is_inside_relative)
}

fn check(step: &'static str, command: &CommandSpec, result: &ExitResult) -> Result<()> {
    if result.success() {
        return Ok(());
    }
    Err(PipelineError::Bundle {
        step,
        reason: format!(
            "`{command}` {}\n{}",
            result.status_description(),
            result.combined_output()
        ),
    })
}

fn bundle_error(step: &'static str, e: PipelineError) -> PipelineError {
    PipelineError::Bundle {
        step,
        reason: e.to_string(),
    }
}

