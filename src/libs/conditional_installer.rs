//! Platform-gated installation of single packages.
//!
//! A [`PackageRequirement`] is either installed completely or skipped completely.
//! The gate checks, in order and stopping at the first failure:
//!
//! 1. the package is not already listed by the package manager,
//! 2. the OS family name contains `required_os` (case-insensitive; empty matches all),
//! 3. `required_bitness` appears in the interpreter's pointer width,
//! 4. the interpreter is at least `minimum_version`,
//! 5. the install mechanism is one we know.
//!
//! Only then is the artifact downloaded into the temp directory and installed.
//! Nothing touches the network before all five checks pass.

use crate::cli::type_enums::{InstallMechanism, VersionComparison};
use crate::libs::command_runner::{CommandRunner, CommandSpec};
use crate::libs::downloader::{Downloader, download_into};
use crate::libs::errors::Result;
use crate::libs::file_operations::make_executable;
use crate::libs::package_manager::PackageManager;
use crate::libs::platform::PlatformDescriptor;
use crate::{log_debug, log_info};
use crate::schemas::bootstrap_config::{MinimumVersion, PackageRequirement};
use colored::Colorize;
use semver::Version;
use std::path::{Path, PathBuf};

pub struct ConditionalInstaller<'a> {
    pub package_manager: &'a PackageManager<'a>,
    pub runner: &'a dyn CommandRunner,
    pub downloader: &'a dyn Downloader,
    pub platform: &'a PlatformDescriptor,
    pub version_gate: VersionComparison,
    pub temp_dir: PathBuf,
}

impl ConditionalInstaller<'_> {
    /// Installs `requirement` if it applies to this machine.
    ///
    /// # Arguments
    /// * `requirement` - The package and the platform conditions it installs under.
    ///
    /// # Returns
    /// * `Ok(true)` if the package was downloaded and installed by this call.
    /// * `Ok(false)` if it was already installed or a gate check skipped it.
    /// * `Err` if listing, downloading or the install command failed.
    pub fn install_if_applicable(&self, requirement: &PackageRequirement) -> Result<bool> {
        if self.package_manager.is_installed(&requirement.name)? {
            log_info!("Package {} already installed", requirement.name.bold());
            return Ok(false);
        }
        log_info!("Package {} will be installed", requirement.name.bold());

        let Some(mechanism) = self.applicable_mechanism(requirement) else {
            return Ok(false);
        };

        let artifact = download_into(self.downloader, &requirement.source_url, &self.temp_dir)?;
        self.dispatch(mechanism, &artifact)?;
        log_info!(
            "Package {} installed from {}",
            requirement.name.bold().green(),
            artifact.display()
        );
        Ok(true)
    }

    /// Gate steps 2-5. `None` means skip; the reason has been logged.
    fn applicable_mechanism(&self, requirement: &PackageRequirement) -> Option<InstallMechanism> {
        let os = self.platform.os_family.to_string().to_lowercase();
        if !os.contains(&requirement.required_os.to_lowercase()) {
            skip(requirement, "required OS", &requirement.required_os);
            return None;
        }

        if !self
            .platform
            .pointer_width
            .contains(&requirement.required_bitness)
        {
            skip(requirement, "required bitness", &requirement.required_bitness);
            return None;
        }

        if !version_satisfies(
            &self.platform.interpreter_version,
            requirement.minimum_version,
            self.version_gate,
        ) {
            skip(
                requirement,
                "minimum interpreter version",
                &requirement.minimum_version.to_string(),
            );
            return None;
        }

        match requirement.install_mechanism.parse::<InstallMechanism>() {
            Ok(mechanism) => Some(mechanism),
            Err(_) => {
                skip(
                    requirement,
                    "install mechanism",
                    &requirement.install_mechanism,
                );
                None
            }
        }
    }

    fn dispatch(&self, mechanism: InstallMechanism, artifact: &Path) -> Result<()> {
        log_debug!("Installing {} as {}", artifact.display(), mechanism.to_string().cyan());
        match mechanism {
            InstallMechanism::Wheel => self.package_manager.install_wheel(artifact),
            InstallMechanism::Installer => {
                make_executable(artifact)?;
                let spec = CommandSpec::new(artifact, &self.temp_dir);
                self.runner.run(&spec, false)?.ensure_success(&spec)?;
                Ok(())
            }
        }
    }
}

fn skip(requirement: &PackageRequirement, what: &str, value: &str) {
    log_info!(
        "Package {} skipped because of {} '{}'",
        requirement.source_url.dimmed(),
        what,
        value.yellow()
    );
}

/// Whether `running` satisfies `minimum` under the chosen comparison.
pub fn version_satisfies(
    running: &Version,
    minimum: MinimumVersion,
    comparison: VersionComparison,
) -> bool {
    match comparison {
        VersionComparison::Lexicographic => {
            (running.major, running.minor) >= (minimum.major, minimum.minor)
        }
        VersionComparison::ComponentWise => {
            running.major >= minimum.major && running.minor >= minimum.minor
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::command_runner::CommandOutcome;
    use crate::libs::platform::OsFamily;
    use crate::schemas::bootstrap_config::PackageManagerConfig;
    use std::cell::RefCell;

    #[derive(Default)]
    struct FakeRunner {
        installed: Vec<String>,
        calls: RefCell<Vec<CommandSpec>>,
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, spec: &CommandSpec, _suppress_output: bool) -> Result<CommandOutcome> {
            self.calls.borrow_mut().push(spec.clone());
            if spec.arg_strings() == ["list"] {
                return Ok(CommandOutcome::succeeded(self.installed.clone()));
            }
            Ok(CommandOutcome::succeeded(Vec::new()))
        }
    }

    #[derive(Default)]
    struct FakeDownloader {
        urls: RefCell<Vec<String>>,
    }

    impl Downloader for FakeDownloader {
        fn download(&self, url: &str, dest: &Path) -> Result<()> {
            self.urls.borrow_mut().push(url.to_string());
            std::fs::write(dest, b"artifact")?;
            Ok(())
        }
    }

    fn windows_py27_32bit() -> PlatformDescriptor {
        PlatformDescriptor::new(OsFamily::Windows, Version::new(2, 7, 18), "32bit")
    }

    fn numpy(mechanism: &str) -> PackageRequirement {
        PackageRequirement::new(
            "numpy",
            "windows",
            "32",
            MinimumVersion::new(2, 7),
            mechanism,
            "http://example.org/dl/numpy-1.9.0-win32-superpack-python2.7.exe",
        )
    }

    struct Harness {
        runner: FakeRunner,
        downloader: FakeDownloader,
        config: PackageManagerConfig,
        temp: tempfile::TempDir,
    }

    impl Harness {
        fn new(installed: &[&str]) -> Self {
            Harness {
                runner: FakeRunner {
                    installed: installed.iter().map(|s| s.to_string()).collect(),
                    calls: RefCell::new(Vec::new()),
                },
                downloader: FakeDownloader::default(),
                config: PackageManagerConfig::default(),
                temp: tempfile::tempdir().unwrap(),
            }
        }

        fn temp_path(&self, name: &str) -> PathBuf {
            self.temp.path().join(name)
        }

        fn install(
            &self,
            platform: &PlatformDescriptor,
            gate: VersionComparison,
            requirement: &PackageRequirement,
        ) -> bool {
            let pm = PackageManager::new(&self.runner, &self.config, Path::new("/base"));
            let installer = ConditionalInstaller {
                package_manager: &pm,
                runner: &self.runner,
                downloader: &self.downloader,
                platform,
                version_gate: gate,
                temp_dir: self.temp.path().to_path_buf(),
            };
            installer.install_if_applicable(requirement).unwrap()
        }

        fn non_list_calls(&self) -> Vec<CommandSpec> {
            self.runner
                .calls
                .borrow()
                .iter()
                .filter(|c| c.arg_strings() != ["list"])
                .cloned()
                .collect()
        }
    }

    #[test]
    fn already_installed_skips_without_download() {
        let h = Harness::new(&["pip (9.0.1)", "numpy (1.9.0)"]);
        let installed = h.install(
            &windows_py27_32bit(),
            VersionComparison::Lexicographic,
            &numpy("installer"),
        );
        assert!(!installed);
        assert!(h.downloader.urls.borrow().is_empty());
        assert!(h.non_list_calls().is_empty());
    }

    #[test]
    fn os_mismatch_never_touches_network() {
        let h = Harness::new(&["pip (9.0.1)"]);
        let linux = PlatformDescriptor::new(OsFamily::Linux, Version::new(2, 7, 18), "32bit");
        assert!(!h.install(&linux, VersionComparison::Lexicographic, &numpy("installer")));
        assert!(h.downloader.urls.borrow().is_empty());
    }

    #[test]
    fn required_os_is_a_case_insensitive_substring_of_the_family() {
        for required_os in ["win", "WINDOWS", "Windows", ""] {
            let h = Harness::new(&[]);
            let mut requirement = numpy("wheel");
            requirement.required_os = required_os.to_string();
            assert!(
                h.install(&windows_py27_32bit(), VersionComparison::Lexicographic, &requirement),
                "required_os {required_os:?} must match windows"
            );
            assert_eq!(h.downloader.urls.borrow().len(), 1);
        }
    }

    #[test]
    fn required_os_longer_than_family_does_not_match() {
        let h = Harness::new(&[]);
        let mut requirement = numpy("installer");
        requirement.required_os = "windows, linux".to_string();
        let linux = PlatformDescriptor::new(OsFamily::Linux, Version::new(2, 7, 0), "32bit");
        assert!(!h.install(&linux, VersionComparison::Lexicographic, &requirement));
        assert!(h.downloader.urls.borrow().is_empty());
    }

    #[test]
    fn bitness_mismatch_skips() {
        let h = Harness::new(&[]);
        let win64 = PlatformDescriptor::new(OsFamily::Windows, Version::new(2, 7, 18), "64bit");
        assert!(!h.install(&win64, VersionComparison::Lexicographic, &numpy("installer")));
        assert!(h.downloader.urls.borrow().is_empty());
    }

    #[test]
    fn version_boundary_under_both_comparisons() {
        for gate in [VersionComparison::Lexicographic, VersionComparison::ComponentWise] {
            let h = Harness::new(&[]);
            let py26 = PlatformDescriptor::new(OsFamily::Windows, Version::new(2, 6, 9), "32bit");
            assert!(!h.install(&py26, gate, &numpy("installer")), "{gate}: 2.6 must skip");
            assert!(h.downloader.urls.borrow().is_empty());

            let h = Harness::new(&[]);
            assert!(
                h.install(&windows_py27_32bit(), gate, &numpy("installer")),
                "{gate}: 2.7 must proceed"
            );
        }
    }

    #[test]
    fn newer_major_with_lower_minor_depends_on_comparison() {
        let minimum = MinimumVersion::new(2, 7);
        let py30 = Version::new(3, 0, 1);
        assert!(version_satisfies(&py30, minimum, VersionComparison::Lexicographic));
        assert!(!version_satisfies(&py30, minimum, VersionComparison::ComponentWise));
        assert!(version_satisfies(
            &Version::new(3, 11, 0),
            minimum,
            VersionComparison::ComponentWise
        ));
        assert!(!version_satisfies(
            &Version::new(1, 9, 0),
            minimum,
            VersionComparison::Lexicographic
        ));
    }

    #[test]
    fn unknown_mechanism_is_a_silent_skip() {
        let h = Harness::new(&[]);
        assert!(!h.install(
            &windows_py27_32bit(),
            VersionComparison::Lexicographic,
            &numpy("msi")
        ));
        assert!(h.downloader.urls.borrow().is_empty());
    }

    #[test]
    fn installer_runs_downloaded_file_from_temp_dir() {
        let h = Harness::new(&["pip (9.0.1)"]);
        assert!(h.install(
            &windows_py27_32bit(),
            VersionComparison::Lexicographic,
            &numpy("install")
        ));
        assert_eq!(h.downloader.urls.borrow().len(), 1);
        let calls = h.non_list_calls();
        assert_eq!(calls.len(), 1);
        let artifact = h.temp_path("numpy-1.9.0-win32-superpack-python2.7.exe");
        assert_eq!(PathBuf::from(&calls[0].program), artifact);
        assert_eq!(calls[0].working_dir, h.temp.path());
        assert!(calls[0].args.is_empty());
        assert!(artifact.is_file());
    }

    #[test]
    fn wheel_goes_through_wheel_command() {
        let h = Harness::new(&[]);
        let mut requirement = numpy("wheel");
        requirement.name = "reportlab".to_string();
        requirement.source_url =
            "https://example.org/r/reportlab-3.1.8-cp27-none-win32.whl".to_string();
        assert!(h.install(
            &windows_py27_32bit(),
            VersionComparison::Lexicographic,
            &requirement
        ));
        let calls = h.non_list_calls();
        assert_eq!(calls[0].program_name(), "wheel");
        let wheel = h.temp_path("reportlab-3.1.8-cp27-none-win32.whl");
        assert_eq!(
            calls[0].arg_strings(),
            ["install".to_string(), wheel.display().to_string()]
        );
    }
}
