//! Plain binary install: build tree into `libexec`, command link into `bin`.

use crate::error::{PipelineError, Result};
use crate::utils::fs;
use std::path::{Path, PathBuf};

/// Paths created by [`install_binary`].
#[derive(Debug, Clone)]
pub struct InstalledBinary {
    /// Copy of the build tree
    pub libexec: PathBuf,
    /// `bin/<name>` link to the entry point
    pub command: PathBuf,
}

/// Copy `build_dir` to `<prefix>/libexec` and link `<prefix>/bin/<name>` to the entry point.
///
/// A previous install under the same prefix is replaced.
pub async fn install_binary(
    build_dir: &Path,
    prefix: &Path,
    name: &str,
    entry_point: &str,
) -> Result<InstalledBinary> {
    let libexec = prefix.join("libexec");
    let bin_dir = prefix.join("bin");
    let command = bin_dir.join(name);
    let target = libexec.join(entry_point);

    fs::remove_dir_all(&libexec).await.map_err(install_error)?;
    fs::remove_path(&command).await.map_err(install_error)?;

    fs::copy_dir(build_dir, &libexec).await.map_err(install_error)?;
    if !target.exists() {
        return Err(PipelineError::Install(format!(
            "entry point {} missing from build output",
            target.display()
        )));
    }

    tokio::fs::create_dir_all(&bin_dir)
        .await
        .map_err(|e| PipelineError::Install(format!("creating {}: {e}", bin_dir.display())))?;
    fs::symlink(&target, &command).map_err(|e| {
        PipelineError::Install(format!(
            "linking {} -> {}: {e}",
            command.display(),
            target.display()
        ))
    })?;

    log::info!("Installed {} -> {}", command.display(), target.display());
    Ok(InstalledBinary { libexec, command })
}

fn install_error(e: PipelineError) -> PipelineError {
    PipelineError::Install(e.to_string())
}
