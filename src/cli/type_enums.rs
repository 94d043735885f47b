use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// What `--mode` asks ubersetup to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Setup, // Install pip, the toolbox, platform packages and requirement files
    Clear, // Uninstall everything pip lists, except pip itself
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "setup" => Ok(Mode::Setup),
            "clear" => Ok(Mode::Clear),
            _ => Err(format!("Invalid mode '{s}'. Must be one of: setup, clear")),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Mode::Setup => write!(f, "setup"),
            Mode::Clear => write!(f, "clear"),
        }
    }
}

/// How a downloaded platform package gets installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMechanism {
    Wheel,     // Handed to the wheel-install command
    Installer, // Executed directly
}

/// Parses a mechanism name. `install` is accepted as an older spelling of `installer`.
impl FromStr for InstallMechanism {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "wheel" => Ok(InstallMechanism::Wheel),
            "installer" | "install" => Ok(InstallMechanism::Installer),
            _ => Err(format!(
                "Invalid install mechanism '{s}'. Must be one of: wheel, installer"
            )),
        }
    }
}

impl fmt::Display for InstallMechanism {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InstallMechanism::Wheel => write!(f, "wheel"),
            InstallMechanism::Installer => write!(f, "installer"),
        }
    }
}

/// How the interpreter version is compared against a package's minimum version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionComparison {
    /// (major, minor) compared as a tuple: 3.0 satisfies 2.7.
    #[default]
    Lexicographic,
    /// major and minor checked independently (`major >= req && minor >= req`).
    /// Reproduces the legacy gate, which rejects 3.0 against 2.7.
    ComponentWise,
}

impl fmt::Display for VersionComparison {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VersionComparison::Lexicographic => write!(f, "lexicographic"),
            VersionComparison::ComponentWise => write!(f, "component_wise"),
        }
    }
}
