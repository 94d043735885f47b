// Thin wrapper over the package manager CLI (pip by default).
// Every operation is a typed `CommandSpec` run from the base directory.

use crate::libs::command_runner::{CommandOutcome, CommandRunner, CommandSpec};
use crate::libs::errors::{BootstrapError, Result};
use crate::log_debug;
use crate::schemas::bootstrap_config::PackageManagerConfig;
use colored::Colorize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

pub struct PackageManager<'a> {
    runner: &'a dyn CommandRunner,
    config: &'a PackageManagerConfig,
    working_dir: PathBuf,
}

impl<'a> PackageManager<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        config: &'a PackageManagerConfig,
        working_dir: &Path,
    ) -> Self {
        PackageManager {
            runner,
            config,
            working_dir: working_dir.to_path_buf(),
        }
    }

    /// Package name of the package manager itself (`pip`).
    pub fn name(&self) -> &str {
        &self.config.program
    }

    fn command(&self) -> CommandSpec {
        // Keeps the "new version available" notice out of parsed listings.
        CommandSpec::new(&self.config.program, &self.working_dir)
            .env("PIP_DISABLE_PIP_VERSION_CHECK", "1")
    }

    fn run_checked(&self, spec: CommandSpec, suppress_output: bool) -> Result<CommandOutcome> {
        self.runner.run(&spec, suppress_output)?.ensure_success(&spec)
    }

    /// Raw lines of `<pm> list`.
    pub fn list_installed(&self, suppress_output: bool) -> Result<Vec<String>> {
        let outcome = self.run_checked(self.command().arg("list"), suppress_output)?;
        Ok(outcome.lines)
    }

    /// True if any listed line contains `package` as a case-insensitive substring.
    ///
    /// This is a substring test, so `pip` also matches a line for `pip-tools`.
    /// A missing package manager means nothing is installed.
    pub fn is_installed(&self, package: &str) -> Result<bool> {
        let lines = match self.list_installed(true) {
            Ok(lines) => lines,
            Err(BootstrapError::ProgramNotFound { program }) => {
                log_debug!(
                    "[{}] '{}' is not available, treating '{}' as not installed",
                    self.name(),
                    program,
                    package
                );
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        let needle = package.to_lowercase();
        Ok(lines
            .iter()
            .any(|line| line.to_lowercase().contains(&needle)))
    }

    /// `<pm> install -r <file or URL>`.
    pub fn install_requirements(&self, source: impl AsRef<OsStr>) -> Result<()> {
        let source = source.as_ref();
        log_debug!(
            "[{}] Installing requirements from {}",
            self.name(),
            source.to_string_lossy().blue()
        );
        self.run_checked(self.command().args(["install", "-r"]).arg(source), false)?;
        Ok(())
    }

    /// `<pm> uninstall -y <package>`.
    pub fn uninstall(&self, package: &str) -> Result<()> {
        self.run_checked(self.command().args(["uninstall", "-y", package]), false)?;
        Ok(())
    }

    /// Installs a downloaded wheel with the configured wheel command (`wheel install <file>`).
    pub fn install_wheel(&self, wheel: &Path) -> Result<()> {
        let (program, prefix) = self
            .config
            .wheel_command
            .split_first()
            .ok_or_else(|| BootstrapError::Config {
                path: PathBuf::from("package_manager.wheel_command"),
                reason: "wheel command must not be empty".to_string(),
            })?;
        let spec = CommandSpec::new(program, &self.working_dir)
            .args(prefix)
            .arg(wheel);
        self.run_checked(spec, false)?;
        Ok(())
    }
}

/// Package name from one line of `<pm> list` output.
///
/// Handles both the legacy `name (1.0)` format and the columnar `name  1.0` format,
/// and returns `None` for the columnar header and its dashed separator.
pub fn installed_name(line: &str) -> Option<&str> {
    let first = line.split_whitespace().next()?;
    if first.chars().all(|c| c == '-') {
        return None;
    }
    if first == "Package" && line.split_whitespace().nth(1) == Some("Version") {
        return None;
    }
    Some(first)
}
