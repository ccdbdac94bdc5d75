//! External tool lookup on `PATH`.

use std::path::{Path, PathBuf};

/// Resolve a program to an executable path.
///
/// Programs given with a directory component (`./starcheat.py`,
/// `/usr/local/opt/qt5/bin/macdeployqt`) are returned as-is if they exist;
/// bare names are searched on `search_path` when given (a `PATH` override
/// carried by the command), otherwise on the process `PATH`.
pub fn locate_tool(
    program: &str,
    cwd: Option<&Path>,
    search_path: Option<&str>,
) -> Option<PathBuf> {
    let as_path = Path::new(program);
    if as_path.components().count() > 1 || as_path.is_absolute() {
        let candidate = match cwd {
            Some(dir) if as_path.is_relative() => dir.join(as_path),
            _ => as_path.to_path_buf(),
        };
        return candidate.exists().then_some(candidate);
    }

    let found = match search_path {
        Some(paths) => {
            let cwd = cwd.map_or_else(|| PathBuf::from("."), Path::to_path_buf);
            which::which_in(program, Some(paths), cwd)
        }
        None => which::which(program),
    };

    match found {
        Ok(path) => {
            log::debug!("Found {} at: {}", program, path.display());
            Some(path)
        }
        Err(e) => {
            log::debug!("{} not found in PATH: {}", program, e);
            None
        }
    }
}
