//! Configuration schema for `ubersetup.yaml`.
//!
//! Every section is optional; anything left out falls back to the built-in defaults,
//! which reproduce the stock bootstrap (pip from get-pip.py, Basti's python toolbox,
//! the Windows 32-bit binary packages for Python 2.7, and the two upstream
//! requirement files).
//!
//! ```yaml
//! version_gate: lexicographic
//! platform_packages:
//!   - name: numpy
//!     required_os: windows
//!     required_bitness: "32"
//!     minimum_version: "2.7"
//!     install_mechanism: installer
//!     source_url: http://sourceforge.net/projects/numpy/files/NumPy/1.9.0/numpy-1.9.0-win32-superpack-python2.7.exe
//! ```

use crate::cli::type_enums::VersionComparison;
use crate::libs::errors::BootstrapError;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Minimum interpreter version a package needs, as `<major>.<minor>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "String")]
pub struct MinimumVersion {
    pub major: u64,
    pub minor: u64,
}

impl MinimumVersion {
    pub const fn new(major: u64, minor: u64) -> Self {
        MinimumVersion { major, minor }
    }
}

impl FromStr for MinimumVersion {
    type Err = BootstrapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BootstrapError::InvalidVersion(s.to_string());
        let mut parts = s.trim().split('.');
        let major = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(invalid)?;
        let minor = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(invalid)?;
        Ok(MinimumVersion { major, minor })
    }
}

impl TryFrom<String> for MinimumVersion {
    type Error = BootstrapError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for MinimumVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// A package that is only installed on matching machines.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PackageRequirement {
    /// Name as it appears in the package manager's listing.
    pub name: String,
    /// Matches when this value (case-insensitive) is a substring of the current OS family.
    /// Empty matches every platform.
    pub required_os: String,
    /// Matches when this value is a substring of the interpreter's pointer width ("32bit"/"64bit").
    pub required_bitness: String,
    pub minimum_version: MinimumVersion,
    /// `wheel` or `installer`. Kept as text: anything else is skipped, not rejected.
    pub install_mechanism: String,
    pub source_url: String,
}

impl PackageRequirement {
    pub fn new(
        name: &str,
        required_os: &str,
        required_bitness: &str,
        minimum_version: MinimumVersion,
        install_mechanism: &str,
        source_url: &str,
    ) -> Self {
        PackageRequirement {
            name: name.to_string(),
            required_os: required_os.to_string(),
            required_bitness: required_bitness.to_string(),
            minimum_version,
            install_mechanism: install_mechanism.to_string(),
            source_url: source_url.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PackageManagerConfig {
    /// Executable and package name of the package manager.
    pub program: String,
    /// Script that installs the package manager when it is missing.
    pub bootstrap_url: String,
    /// Command prefix used to install a downloaded wheel; the file path is appended.
    pub wheel_command: Vec<String>,
}

impl Default for PackageManagerConfig {
    fn default() -> Self {
        PackageManagerConfig {
            program: "pip".to_string(),
            bootstrap_url: "https://bootstrap.pypa.io/get-pip.py".to_string(),
            wheel_command: vec!["wheel".to_string(), "install".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ToolboxConfig {
    /// Package name used to decide whether the toolbox is already installed.
    pub package: String,
    pub archive_url: String,
    /// Directory the archive unpacks into; searched for `setup.py` when absent.
    pub source_dir: String,
}

impl Default for ToolboxConfig {
    fn default() -> Self {
        ToolboxConfig {
            package: "bptbx".to_string(),
            archive_url: "https://github.com/BastiTee/bastis-python-toolbox/archive/master.zip"
                .to_string(),
            source_dir: "bastis-python-toolbox-master".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RequirementFiles {
    /// Installed right after the package manager, relative to the base directory.
    pub setup: String,
    /// Installed after the platform packages, relative to the base directory.
    pub packages: String,
}

impl Default for RequirementFiles {
    fn default() -> Self {
        RequirementFiles {
            setup: "setup-requirements.txt".to_string(),
            packages: "package-requirements.txt".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SetupConfig {
    pub interpreter: String,
    pub version_gate: VersionComparison,
    pub package_manager: PackageManagerConfig,
    pub toolbox: ToolboxConfig,
    pub platform_packages: Vec<PackageRequirement>,
    pub requirement_files: RequirementFiles,
    pub remote_requirement_files: Vec<String>,
}

impl Default for SetupConfig {
    fn default() -> Self {
        SetupConfig {
            interpreter: "python".to_string(),
            version_gate: VersionComparison::default(),
            package_manager: PackageManagerConfig::default(),
            toolbox: ToolboxConfig::default(),
            platform_packages: default_platform_packages(),
            requirement_files: RequirementFiles::default(),
            remote_requirement_files: vec![
                "https://raw.githubusercontent.com/BastiTee/pyntrest/master/requirements.txt"
                    .to_string(),
                "https://raw.githubusercontent.com/BastiTee/bastis-python-toolbox/master/requirements.txt"
                    .to_string(),
            ],
        }
    }
}

/// Binary packages that have no usable source build on 32-bit Windows Python 2.7.
pub fn default_platform_packages() -> Vec<PackageRequirement> {
    const PY27: MinimumVersion = MinimumVersion::new(2, 7);
    vec![
        PackageRequirement::new(
            "numpy",
            "windows",
            "32",
            PY27,
            "installer",
            "http://sourceforge.net/projects/numpy/files/NumPy/1.9.0/numpy-1.9.0-win32-superpack-python2.7.exe",
        ),
        PackageRequirement::new(
            "twain",
            "windows",
            "32",
            PY27,
            "installer",
            "https://pypi.python.org/packages/2.7/t/twain/twain-1.0.5.win32-py2.7.exe",
        ),
        PackageRequirement::new(
            "pycrypto",
            "windows",
            "32",
            PY27,
            "installer",
            "http://www.voidspace.org.uk/downloads/pycrypto26/pycrypto-2.6.win32-py2.7.exe",
        ),
        PackageRequirement::new(
            "reportlab",
            "windows",
            "32",
            PY27,
            "wheel",
            "https://pypi.python.org/packages/2.7/r/reportlab/reportlab-3.1.8-cp27-none-win32.whl",
        ),
        PackageRequirement::new(
            "matplotlib",
            "windows",
            "32",
            PY27,
            "wheel",
            "https://downloads.sourceforge.net/project/matplotlib/matplotlib/matplotlib-1.4.0/matplotlib-1.4.0-cp27-none-win32.whl",
        ),
    ]
}
