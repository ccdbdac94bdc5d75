//! File system utilities for staging, installing and bundling.
//!
//! Provides idempotent removal, recursive copies with symlink preservation,
//! and permission relaxation for shared dependency trees.

use crate::error::{ErrorExt, PipelineError, Result};
use std::io;
use std::path::{Component, Path};
use tokio::fs;

/// Relative path that names something strictly below its base directory.
pub fn is_inside_relative(path: &Path) -> bool {
    let mut named = false;
    for component in path.components() {
        match component {
            Component::Normal(_) => named = true,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    named
}

/// Removes the directory and its contents if it exists.
pub async fn remove_dir_all(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).fs_context("removing directory", path),
    }
}

/// Removes a file or a directory tree, whichever `path` is.
pub async fn remove_path(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => remove_dir_all(path).await,
        Ok(_) => fs::remove_file(path).await.fs_context("removing file", path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).fs_context("inspecting", path),
    }
}

/// Returns true when `path` is a directory with at least one entry.
pub async fn dir_is_populated(path: &Path) -> bool {
    match fs::read_dir(path).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(Some(_))),
        Err(_) => false,
    }
}

/// Makes a symbolic link.
#[cfg(unix)]
pub fn symlink(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

/// Makes a symbolic link.
#[cfg(windows)]
pub fn symlink(src: &Path, dst: &Path) -> io::Result<()> {
    if src.is_dir() {
        std::os::windows::fs::symlink_dir(src, dst)
    } else {
        std::os::windows::fs::symlink_file(src, dst)
    }
}

/// Copies a regular file from one path to another, creating any parent
/// directories of the destination path as necessary.
///
/// Fails if the source path is a directory or doesn't exist.
pub async fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if !from.is_file() {
        crate::bail!("{} does not exist or is not a file", from.display());
    }
    if let Some(dest_dir) = to.parent() {
        fs::create_dir_all(dest_dir)
            .await
            .fs_context("creating directory", dest_dir)?;
    }
    fs::copy(from, to).await.fs_context("copying file", from)?;
    Ok(())
}

/// Recursively copies a directory from one path to another, creating any
/// parent directories of the destination path as necessary.
///
/// Preserves symlinks. Fails if the source path is not a directory.
pub async fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    if !from.is_dir() {
        crate::bail!("{} does not exist or is not a directory", from.display());
    }

    let from = from.to_path_buf();
    let to = to.to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<()> {
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent).fs_context("creating directory", parent)?;
        }

        for entry in walkdir::WalkDir::new(&from) {
            let entry = entry.map_err(io::Error::from)?;
            let rel_path = entry
                .path()
                .strip_prefix(&from)
                .map_err(|e| PipelineError::Generic(e.to_string()))?;
            let dest_path = to.join(rel_path);

            if entry.file_type().is_symlink() {
                let target = std::fs::read_link(entry.path())
                    .fs_context("reading symlink", entry.path())?;
                symlink(&target, &dest_path).fs_context("creating symlink", &dest_path)?;
            } else if entry.file_type().is_dir() {
                std::fs::create_dir_all(&dest_path).fs_context("creating directory", &dest_path)?;
            } else {
                std::fs::copy(entry.path(), &dest_path).fs_context("copying file", entry.path())?;
            }
        }

        Ok(())
    })
    .await
    .map_err(|e| PipelineError::Generic(format!("Directory copy task panicked: {e}")))?
}

/// Grants the owner write permission on every entry under `root` (`chmod -R u+w`).
///
/// Symlinks are not followed. Returns the number of entries changed.
pub async fn make_tree_writable(root: &Path) -> Result<usize> {
    if !root.exists() {
        return Err(PipelineError::Fs {
            context: "relaxing permissions".to_string(),
            path: root.to_path_buf(),
            source: io::Error::new(io::ErrorKind::NotFound, "path does not exist"),
        });
    }

    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<usize> {
        let mut changed = 0;
        for entry in walkdir::WalkDir::new(&root).follow_links(false) {
            let entry = entry.map_err(io::Error::from)?;
            if entry.file_type().is_symlink() {
                continue;
            }
            let metadata = entry.metadata().map_err(io::Error::from)?;
            let mut permissions = metadata.permissions();
            if grant_owner_write(&mut permissions) {
                std::fs::set_permissions(entry.path(), permissions)
                    .fs_context("setting permissions", entry.path())?;
                changed += 1;
            }
        }
        Ok(changed)
    })
    .await
    .map_err(|e| PipelineError::Generic(format!("Permission task panicked: {e}")))?
}

#[cfg(unix)]
fn grant_owner_write(permissions: &mut std::fs::Permissions) -> bool {
    use std::os::unix::fs::PermissionsExt;

    let mode = permissions.mode();
    if mode & 0o200 != 0 {
        return false;
    }
    permissions.set_mode(mode | 0o200);
    true
}

#[cfg(not(unix))]
#[allow(clippy::permissions_set_readonly_false)]
fn grant_owner_write(permissions: &mut std::fs::Permissions) -> bool {
    if !permissions.readonly() {
        return false;
    }
    permissions.set_readonly(false);
    true
}
