use crate::libs::errors::{BootstrapError, Result};
use crate::log_debug;
use crate::schemas::bootstrap_config::SetupConfig;
use colored::Colorize;
use std::fs;
use std::path::Path;

/// Loads the setup configuration, or the built-in defaults when `path` is `None`.
/// A file that exists but does not parse is an error, not a silent fallback.
pub fn load_setup_config(path: Option<&Path>) -> Result<SetupConfig> {
    let Some(path) = path else {
        return Ok(SetupConfig::default());
    };

    let contents = fs::read_to_string(path)?;
    let config: SetupConfig =
        serde_yaml::from_str(&contents).map_err(|e| BootstrapError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    log_debug!(
        "[Config] Loaded {} ({} platform packages, {} remote requirement files)",
        path.display().to_string().green(),
        config.platform_packages.len(),
        config.remote_requirement_files.len()
    );
    Ok(config)
}
