//! Advisory lock guarding a project's output tree against concurrent runs.

use crate::error::{ErrorExt, PipelineError, Result};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Lock file name placed in the project root
pub const LOCK_FILE: &str = ".release-pipeline.lock";

/// Exclusive lock held for the lifetime of a pipeline run.
///
/// On Unix this is a non-blocking `flock`, released by the kernel even if the
/// process dies. Elsewhere the lock file is created exclusively and removed
/// on drop.
pub struct OutputLock {
    path: PathBuf,
    #[cfg(unix)]
    _lock: nix::fcntl::Flock<File>,
    #[cfg(not(unix))]
    _file: File,
}

impl std::fmt::Debug for OutputLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputLock").field("path", &self.path).finish()
    }
}

impl OutputLock {
    /// Take the lock in `dir`, failing with [`PipelineError::Locked`] if held.
    pub fn acquire(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).fs_context("creating lock directory", dir)?;
        let path = dir.join(LOCK_FILE);
        Self::acquire_at(path)
    }

    /// Lock file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(unix)]
    fn acquire_at(path: PathBuf) -> Result<Self> {
        use nix::errno::Errno;
        use nix::fcntl::{Flock, FlockArg};
        use std::io::Write;

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .fs_context("opening lock file", &path)?;

        let lock = match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => lock,
            Err((_, errno)) if errno == Errno::EWOULDBLOCK => {
                return Err(PipelineError::Locked { path });
            }
            Err((_, errno)) => {
                return Err(PipelineError::Fs {
                    context: "locking".to_string(),
                    path,
                    source: std::io::Error::from(errno),
                });
            }
        };

        let mut holder: &File = &lock;
        holder.set_len(0).fs_context("writing lock file", &path)?;
        writeln!(holder, "{}", std::process::id()).fs_context("writing lock file", &path)?;

        log::debug!("Acquired output lock {}", path.display());
        Ok(Self { path, _lock: lock })
    }

    #[cfg(not(unix))]
    fn acquire_at(path: PathBuf) -> Result<Self> {
        use std::io::Write;

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(PipelineError::Locked { path });
            }
            Err(e) => return Err(e).fs_context("creating lock file", &path),
        };
        writeln!(file, "{}", std::process::id()).fs_context("writing lock file", &path)?;

        Ok(Self { path, _file: file })
    }
}

#[cfg(not(unix))]
impl Drop for OutputLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            log::warn!("Failed to remove lock file {}: {}", self.path.display(), e);
        }
    }
}
