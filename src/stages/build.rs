//! Project build via the project-provided build entry point.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::runner::{CommandSpec, Runner};
use crate::utils::fs::dir_is_populated;
use std::path::PathBuf;

/// Run the build command from the project root and check its output directory.
///
/// Success requires a zero exit status and a non-empty build directory.
pub async fn run_build<R: Runner>(runner: &R, config: &PipelineConfig) -> Result<PathBuf> {
    let app = &config.manifest().app;
    let command = CommandSpec::from_argv(&app.build_command)
        .ok_or_else(|| PipelineError::Config("[app].build_command cannot be empty".to_string()))?
        .current_dir(config.project_root());

    let result = runner.run(&command).await?;
    if !result.success() {
        return Err(PipelineError::Build {
            command: command.to_string(),
            status: result.status_description(),
            output: result.combined_output(),
        });
    }

    let build_dir = config.build_dir();
    if !dir_is_populated(&build_dir).await {
        return Err(PipelineError::Build {
            command: command.to_string(),
            status: "exited with code 0".to_string(),
            output: format!(
                "expected build output in {}, but it is missing or empty",
                build_dir.display()
            ),
        });
    }

    log::info!("Build output ready in {}", build_dir.display());
    Ok(build_dir)
}
