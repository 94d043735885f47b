// `ubersetup --mode clear`: uninstalls every package the package manager lists,
// except the package manager itself. Best effort: a failed uninstall is logged and
// the loop moves on.

use crate::libs::command_runner::{CommandRunner, SystemCommandRunner};
use crate::libs::config_loading::load_setup_config;
use crate::libs::errors::{BootstrapError, Result};
use crate::libs::package_manager::{PackageManager, installed_name};
use crate::libs::paths;
use crate::schemas::bootstrap_config::PackageManagerConfig;
use crate::{log_debug, log_info, log_section, log_warn};
use anyhow::Context;
use colored::Colorize;
use std::path::Path;

/// Outcome of one clear run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ClearReport {
    pub removed: Vec<String>,
    pub failed: Vec<String>,
}

/// Entry point for `--mode clear`.
pub fn run(base_dir: Option<&str>, config: Option<&str>) -> anyhow::Result<()> {
    let base_dir = paths::resolve_base_dir(base_dir).context("resolving base directory")?;
    let config_path =
        paths::resolve_config_path(config, &base_dir).context("resolving configuration")?;
    let config = load_setup_config(config_path.as_deref()).context("loading configuration")?;

    let report = clear_packages(&SystemCommandRunner, &config.package_manager, &base_dir)
        .context("listing installed packages")?;

    log_info!(
        "Removed {} packages, {} failed",
        report.removed.len().to_string().green(),
        report.failed.len().to_string().red()
    );
    if !report.failed.is_empty() {
        log_warn!("Could not uninstall: {}", report.failed.join(", "));
    }
    Ok(())
}

/// Uninstalls every listed package except the package manager itself.
///
/// # Arguments
/// * `runner` - Executes the package manager commands.
/// * `config` - Names the package manager program to list and uninstall with.
/// * `working_dir` - Directory the commands run in.
///
/// # Returns
/// A [`ClearReport`] of removed and failed packages. A missing package manager
/// yields an empty report; only a failed listing is an error.
pub fn clear_packages(
    runner: &dyn CommandRunner,
    config: &PackageManagerConfig,
    working_dir: &Path,
) -> Result<ClearReport> {
    log_section!("Clearing installed packages");
    let pm = PackageManager::new(runner, config, working_dir);

    let lines = match pm.list_installed(true) {
        Ok(lines) => lines,
        Err(BootstrapError::ProgramNotFound { program }) => {
            log_warn!("'{}' is not installed, nothing to clear", program);
            return Ok(ClearReport::default());
        }
        Err(e) => return Err(e),
    };

    let mut report = ClearReport::default();
    for line in &lines {
        let Some(name) = installed_name(line) else {
            continue;
        };
        if name.eq_ignore_ascii_case(pm.name()) {
            log_debug!("[Clear] Keeping {}", name);
            continue;
        }
        match pm.uninstall(name) {
            Ok(()) => {
                log_info!("Uninstalled {}", name.bold());
                report.removed.push(name.to_string());
            }
            Err(e) => {
                log_warn!("Failed to uninstall {}: {}", name.yellow(), e);
                report.failed.push(name.to_string());
            }
        }
    }

    // TODO: uninstall the package manager itself (`python -m pip uninstall -y pip`) once
    // clear can fall back to listing without it.
    log_warn!("{} itself was left installed", pm.name().bold());
    Ok(report)
}
