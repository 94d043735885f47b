// Filesystem helpers for the temp work area and downloaded artifacts.

use crate::{log_debug, log_warn};
use colored::Colorize;
use std::fs;
use std::io;
use std::path::Path;

/// Creates `dir` and any missing parents. An existing directory is fine.
pub fn ensure_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    log_debug!("[Files] Directory ready: {}", dir.display().to_string().cyan());
    Ok(())
}

/// Removes `dir` and everything under it. Returns `false` if it was already gone.
pub fn remove_dir_tree(dir: &Path) -> io::Result<bool> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {
            log_debug!("[Files] Removed {}", dir.display().to_string().cyan());
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log_warn!("[Files] {} was already removed", dir.display());
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Sets rwxr-xr-x so a downloaded installer can be executed directly.
#[cfg(unix)]
pub fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)?;
    log_debug!("[Files] {} is now executable", path.display().to_string().green());
    Ok(())
}

// Windows decides executability by extension.
#[cfg(not(unix))]
pub fn make_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}
