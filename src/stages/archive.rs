//! Gzip tarball of the application bundle.

use super::dependencies::sha256_file;
use crate::error::{PipelineError, Result};
use crate::publish::short_commit;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::path::{Path, PathBuf};

/// A compressed bundle ready for upload.
#[derive(Debug, Clone)]
pub struct ArchiveArtifact {
    /// Archive path
    pub path: PathBuf,
    /// File name, also used as the uploaded asset name
    pub file_name: String,
    /// Size in bytes
    pub size: u64,
    /// SHA-256 of the archive
    pub sha256: String,
}

/// Deterministic archive name: `<app>[-<short commit>][-<suffix>].tar.gz`.
pub fn archive_name(app_name: &str, commit: Option<&str>, suffix: Option<&str>) -> String {
    let mut name = app_name.to_string();
    if let Some(commit) = commit {
        name.push('-');
        name.push_str(short_commit(commit));
    }
    if let Some(suffix) = suffix.filter(|s| !s.is_empty()) {
        name.push('-');
        name.push_str(suffix);
    }
    name.push_str(".tar.gz");
    name
}

/// Write `bundle` as a gzip tarball named `file_name` inside `output_dir`.
///
/// The bundle directory becomes the single top-level entry of the archive.
/// Symlinks inside the bundle are stored as symlinks.
pub async fn create_archive(
    bundle: &Path,
    output_dir: &Path,
    file_name: &str,
) -> Result<ArchiveArtifact> {
    let entry_name = bundle
        .file_name()
        .ok_or_else(|| PipelineError::Archive(format!("{} has no file name", bundle.display())))?
        .to_os_string();
    let path = output_dir.join(file_name);

    let source = bundle.to_path_buf();
    let target = path.clone();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let file = std::fs::File::create(&target)?;
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        builder.follow_symlinks(false);
        builder.append_dir_all(&entry_name, &source)?;
        builder.into_inner()?.finish()?;
        Ok(())
    })
    .await
    .map_err(|e| PipelineError::Archive(format!("archive task panicked: {e}")))?
    .map_err(|e| PipelineError::Archive(format!("writing {}: {e}", path.display())))?;

    let size = tokio::fs::metadata(&path)
        .await
        .map_err(|e| PipelineError::Archive(format!("reading {}: {e}", path.display())))?
        .len();
    let sha256 = sha256_file(&path).await?;

    log::info!("Archived {} ({} bytes, sha256 {})", file_name, size, sha256);
    Ok(ArchiveArtifact {
        path,
        file_name: file_name.to_string(),
        size,
        sha256,
    })
}
