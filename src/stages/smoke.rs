//! Smoke test: the application must start and print its version.

use crate::error::{PipelineError, Result};
use crate::runner::{CommandSpec, Runner};
use std::path::Path;

/// Run `executable <version_flag>` and return its trimmed output.
///
/// Any non-zero exit is a [`PipelineError::SmokeTest`].
pub async fn smoke_test<R: Runner>(
    runner: &R,
    executable: &Path,
    version_flag: &str,
    cwd: Option<&Path>,
) -> Result<String> {
    let mut command = CommandSpec::new(executable.display().to_string());
    if !version_flag.is_empty() {
        command = command.arg(version_flag);
    }
    if let Some(dir) = cwd {
        command = command.current_dir(dir);
    }

    let result = runner.run(&command).await?;
    if !result.success() {
        return Err(PipelineError::SmokeTest {
            command: command.to_string(),
            status: result.status_description(),
            output: result.combined_output(),
        });
    }

    let version = result.combined_output();
    log::info!("✓ {} reports: {}", executable.display(), version.lines().next().unwrap_or(""));
    Ok(version)
}
