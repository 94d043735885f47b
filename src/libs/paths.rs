// Resolves where ubersetup works: the base directory (requirement files, config,
// temp area) and the configuration file.

use crate::libs::errors::{BootstrapError, Result};
use crate::{log_debug, log_info};
use colored::Colorize;
use std::env;
use std::path::{self, Path, PathBuf};

/// Name of the work area created under the base directory for one setup run.
pub const TEMP_DIR_NAME: &str = "temp";
/// Configuration file picked up from the base directory when `--config` is not given.
pub const DEFAULT_CONFIG_NAME: &str = "ubersetup.yaml";

/// Expands `~` and `$VARS` in a user-supplied path.
pub fn expand_path(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path).map_err(|e| BootstrapError::Config {
        path: PathBuf::from(path),
        reason: e.to_string(),
    })?;
    Ok(PathBuf::from(expanded.into_owned()))
}

/// Base directory: `--base-dir` if given, otherwise the directory holding the executable.
///
/// # Arguments
/// * `base_dir` - The `--base-dir` value, if any. `~` and `$VARS` are expanded.
///
/// # Returns
/// An absolute path. A relative `--base-dir` is resolved against the current
/// directory, since child processes run with their own working directory.
pub fn resolve_base_dir(base_dir: Option<&str>) -> Result<PathBuf> {
    let resolved = match base_dir {
        Some(dir) => path::absolute(expand_path(dir)?)?,
        None => {
            let exe = env::current_exe()?;
            let exe = exe.canonicalize().unwrap_or(exe);
            exe.parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| BootstrapError::Platform("executable has no parent directory".into()))?
        }
    };
    log_debug!("[Paths] Base directory: {}", resolved.display().to_string().cyan());
    Ok(resolved)
}

/// Configuration path: `--config` if given (it must exist), otherwise
/// `<base_dir>/ubersetup.yaml` if present, otherwise `None` for built-in defaults.
pub fn resolve_config_path(config: Option<&str>, base_dir: &Path) -> Result<Option<PathBuf>> {
    if let Some(path) = config {
        let path = expand_path(path)?;
        if !path.is_file() {
            return Err(BootstrapError::Config {
                path,
                reason: "file does not exist".to_string(),
            });
        }
        log_info!("Using configuration file: {}", path.display().to_string().cyan());
        return Ok(Some(path));
    }

    let candidate = base_dir.join(DEFAULT_CONFIG_NAME);
    if candidate.is_file() {
        log_info!("Using configuration file: {}", candidate.display().to_string().cyan());
        Ok(Some(candidate))
    } else {
        log_debug!("[Paths] No {} in base directory, using built-in defaults", DEFAULT_CONFIG_NAME);
        Ok(None)
    }
}

pub fn temp_dir(base_dir: &Path) -> PathBuf {
    base_dir.join(TEMP_DIR_NAME)
}
