// Snapshot of the machine the packages are being installed on.
// Built once per setup run, before the stages start, and passed by reference to
// everything that gates on OS, bitness or interpreter version.

use crate::libs::command_runner::{CommandRunner, CommandSpec};
use crate::libs::errors::{BootstrapError, Result};
use crate::{log_debug, log_warn};
use colored::Colorize;
use semver::Version;
use std::fmt;
use std::path::Path;

/// Asks the interpreter for its own version and the bitness of its build, one per line.
/// The interpreter's bitness decides which binary packages apply, not the host's.
const INTERPRETER_QUERY: &str =
    "import platform; print(platform.python_version()); print(platform.architecture()[0])";

/// Operating system family, displayed the way the gate compares it: lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OsFamily {
    Windows,
    Linux,
    Darwin,
    Other(String),
}

impl OsFamily {
    /// Maps an OS identifier (`std::env::consts::OS` or a user-facing alias) to a family.
    pub fn from_os_name(os: &str) -> Self {
        match os.to_lowercase().as_str() {
            "windows" | "win32" | "win64" => OsFamily::Windows,
            "linux" => OsFamily::Linux,
            "macos" | "darwin" | "apple-darwin" | "macosx" => OsFamily::Darwin,
            other => {
                log_warn!(
                    "[Platform] Unknown OS '{}', using it as-is for package gating.",
                    other.purple()
                );
                OsFamily::Other(other.to_string())
            }
        }
    }

    pub fn current() -> Self {
        Self::from_os_name(std::env::consts::OS)
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OsFamily::Windows => write!(f, "windows"),
            OsFamily::Linux => write!(f, "linux"),
            OsFamily::Darwin => write!(f, "darwin"),
            OsFamily::Other(name) => write!(f, "{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformDescriptor {
    pub os_family: OsFamily,
    pub interpreter_version: Version,
    /// `"32bit"` or `"64bit"`, as reported by the interpreter.
    pub pointer_width: String,
}

impl PlatformDescriptor {
    pub fn new(os_family: OsFamily, interpreter_version: Version, pointer_width: &str) -> Self {
        PlatformDescriptor {
            os_family,
            interpreter_version,
            pointer_width: pointer_width.to_string(),
        }
    }

    /// Asks `interpreter` for its version and bitness and pairs them with the host OS.
    ///
    /// # Arguments
    /// * `runner` - Executes the interpreter.
    /// * `interpreter` - Program name or path, e.g. `python`.
    /// * `working_dir` - Directory the interpreter runs in.
    ///
    /// # Returns
    /// The descriptor, or `BootstrapError::Platform` if the interpreter printed
    /// anything other than a version line and a bitness line.
    pub fn detect(
        runner: &dyn CommandRunner,
        interpreter: &str,
        working_dir: &Path,
    ) -> Result<Self> {
        let spec = CommandSpec::new(interpreter, working_dir)
            .arg("-c")
            .arg(INTERPRETER_QUERY);
        let outcome = runner.run(&spec, true)?.ensure_success(&spec)?;
        log_debug!("[Platform] Interpreter query returned {:?}", outcome.lines);

        let [version_line, bitness_line] = outcome.lines.as_slice() else {
            return Err(BootstrapError::Platform(format!(
                "unexpected output from '{}': {:?}",
                spec, outcome.lines
            )));
        };

        Ok(PlatformDescriptor::new(
            OsFamily::current(),
            parse_interpreter_version(version_line)?,
            bitness_line,
        ))
    }
}

impl fmt::Display for PlatformDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "OS type: {}\nPython version: {}\nPython bitness: {}",
            self.os_family, self.interpreter_version, self.pointer_width
        )
    }
}

/// Parses interpreter version strings. Pre-release builds such as `3.13.0rc1` or
/// two-component versions such as `2.7` are accepted; only the numeric
/// major.minor.patch prefix is kept.
pub fn parse_interpreter_version(raw: &str) -> Result<Version> {
    let raw = raw.trim();
    if let Ok(version) = Version::parse(raw) {
        return Ok(Version::new(version.major, version.minor, version.patch));
    }

    let mut parts = raw.split('.').map(|part| {
        let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse::<u64>().ok()
    });
    let major = parts
        .next()
        .flatten()
        .ok_or_else(|| BootstrapError::InvalidVersion(raw.to_string()))?;
    let minor = parts
        .next()
        .flatten()
        .ok_or_else(|| BootstrapError::InvalidVersion(raw.to_string()))?;
    let patch = parts.next().flatten().unwrap_or(0);
    Ok(Version::new(major, minor, patch))
}
