// `ubersetup --mode setup`: installs pip, the toolbox, the platform-gated binary
// packages and the requirement files, in that order.
//
// Stages run strictly in sequence and the first error ends the run. The temp
// directory is only removed by the final stage, so a failed run leaves its
// downloads behind for inspection.

use crate::libs::command_runner::{CommandRunner, CommandSpec, SystemCommandRunner};
use crate::libs::compression::{extract_zip, find_source_dir};
use crate::libs::conditional_installer::ConditionalInstaller;
use crate::libs::config_loading::load_setup_config;
use crate::libs::downloader::{Downloader, HttpDownloader, download_into};
use crate::libs::errors::{BootstrapError, Result};
use crate::libs::file_operations::{ensure_dir, remove_dir_tree};
use crate::libs::package_manager::PackageManager;
use crate::libs::paths;
use crate::libs::platform::PlatformDescriptor;
use crate::schemas::bootstrap_config::SetupConfig;
use crate::{log_debug, log_info, log_section, log_warn};
use anyhow::Context;
use colored::Colorize;
use std::fmt;
use std::path::{self, Path, PathBuf};

/// File the toolbox archive's source tree is recognised by.
const TOOLBOX_SETUP_SCRIPT: &str = "setup.py";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStage {
    PrepareEnv,
    InstallPackageManager,
    InstallToolbox,
    InstallPlatformPackages,
    InstallFromRequirementFiles,
    Finalize,
}

impl SetupStage {
    pub const ALL: [SetupStage; 6] = [
        SetupStage::PrepareEnv,
        SetupStage::InstallPackageManager,
        SetupStage::InstallToolbox,
        SetupStage::InstallPlatformPackages,
        SetupStage::InstallFromRequirementFiles,
        SetupStage::Finalize,
    ];
}

impl fmt::Display for SetupStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SetupStage::PrepareEnv => write!(f, "prepare environment"),
            SetupStage::InstallPackageManager => write!(f, "install package manager"),
            SetupStage::InstallToolbox => write!(f, "install toolbox"),
            SetupStage::InstallPlatformPackages => write!(f, "install platform packages"),
            SetupStage::InstallFromRequirementFiles => write!(f, "install requirement files"),
            SetupStage::Finalize => write!(f, "finalize"),
        }
    }
}

/// Entry point for `--mode setup`.
///
/// # Arguments
/// * `base_dir` - `--base-dir`, or `None` for the executable's directory.
/// * `config` - `--config`, or `None` to look for `ubersetup.yaml` in the base directory.
///
/// # Returns
/// * `Ok(())` once all stages have completed.
/// * `Err` with the failing stage and its cause as context.
pub fn run(base_dir: Option<&str>, config: Option<&str>) -> anyhow::Result<()> {
    log_debug!("Entered setup::run()");

    let base_dir = paths::resolve_base_dir(base_dir).context("resolving base directory")?;
    let config_path =
        paths::resolve_config_path(config, &base_dir).context("resolving configuration")?;
    let config = load_setup_config(config_path.as_deref()).context("loading configuration")?;

    let runner = SystemCommandRunner;
    let platform = PlatformDescriptor::detect(&runner, &config.interpreter, &base_dir)
        .with_context(|| format!("probing interpreter '{}'", config.interpreter))?;

    SetupOrchestrator::new(&runner, &HttpDownloader, &platform, &config, &base_dir)?.run()?;

    log_info!("'ubersetup --mode setup' completed!");
    Ok(())
}

pub struct SetupOrchestrator<'a> {
    runner: &'a dyn CommandRunner,
    downloader: &'a dyn Downloader,
    platform: &'a PlatformDescriptor,
    config: &'a SetupConfig,
    base_dir: PathBuf,
}

impl<'a> SetupOrchestrator<'a> {
    /// `base_dir` is made absolute here: the paths derived from it are handed to
    /// processes running in other working directories.
    pub fn new(
        runner: &'a dyn CommandRunner,
        downloader: &'a dyn Downloader,
        platform: &'a PlatformDescriptor,
        config: &'a SetupConfig,
        base_dir: &Path,
    ) -> Result<Self> {
        Ok(SetupOrchestrator {
            runner,
            downloader,
            platform,
            config,
            base_dir: path::absolute(base_dir)?,
        })
    }

    /// Runs every [`SetupStage`] in order.
    ///
    /// # Returns
    /// * `Ok(())` if every stage succeeded; the temp directory has been removed.
    /// * `Err` naming the first failed stage. Later stages did not run and the
    ///   temp directory is left in place.
    pub fn run(&self) -> anyhow::Result<()> {
        let package_manager =
            PackageManager::new(self.runner, &self.config.package_manager, &self.base_dir);
        for stage in SetupStage::ALL {
            log_debug!("[Setup] Entering stage '{}'", stage);
            self.run_stage(stage, &package_manager)
                .with_context(|| format!("setup stage '{stage}' failed"))?;
        }
        Ok(())
    }

    fn temp_dir(&self) -> PathBuf {
        paths::temp_dir(&self.base_dir)
    }

    fn run_stage(&self, stage: SetupStage, pm: &PackageManager) -> Result<()> {
        match stage {
            SetupStage::PrepareEnv => self.prepare_env(),
            SetupStage::InstallPackageManager => self.install_package_manager(pm),
            SetupStage::InstallToolbox => self.install_toolbox(pm),
            SetupStage::InstallPlatformPackages => self.install_platform_packages(pm),
            SetupStage::InstallFromRequirementFiles => self.install_requirement_files(pm),
            SetupStage::Finalize => self.finalize(pm),
        }
    }

    fn prepare_env(&self) -> Result<()> {
        log_section!("Preparing environment");
        log_info!("You're running on\n{}", self.platform);
        ensure_dir(&self.temp_dir())?;
        Ok(())
    }

    fn install_package_manager(&self, pm: &PackageManager) -> Result<()> {
        log_section!("Installing {} using {}", pm.name(), self.config.interpreter);
        if pm.is_installed(pm.name())? {
            log_info!("Package {} already installed.", pm.name().bold());
        } else {
            let temp = self.temp_dir();
            let script = download_into(
                self.downloader,
                &self.config.package_manager.bootstrap_url,
                &temp,
            )?;
            let spec = CommandSpec::new(&self.config.interpreter, &temp).arg(&script);
            self.runner.run(&spec, false)?.ensure_success(&spec)?;
            log_info!("Package {} installed.", pm.name().bold().green());
        }

        self.install_local_requirements(pm, &self.config.requirement_files.setup)
    }

    fn install_toolbox(&self, pm: &PackageManager) -> Result<()> {
        let toolbox = &self.config.toolbox;
        log_section!("Installing toolbox {}", toolbox.package);
        if pm.is_installed(&toolbox.package)? {
            log_info!("Package {} already installed.", toolbox.package.bold());
            return Ok(());
        }

        let work_dir = self.temp_dir().join(&toolbox.package);
        ensure_dir(&work_dir)?;
        let archive = work_dir.join(format!("{}.zip", toolbox.package));
        self.downloader.download(&toolbox.archive_url, &archive)?;
        extract_zip(&archive, &work_dir)?;

        let source_dir =
            find_source_dir(&work_dir, Some(toolbox.source_dir.as_str()), TOOLBOX_SETUP_SCRIPT)
                .ok_or_else(|| BootstrapError::Archive {
                    path: archive.clone(),
                    reason: format!("no {TOOLBOX_SETUP_SCRIPT} found in extracted archive"),
                })?;
        let spec = CommandSpec::new(&self.config.interpreter, &source_dir)
            .args([TOOLBOX_SETUP_SCRIPT, "install"]);
        self.runner.run(&spec, false)?.ensure_success(&spec)?;
        log_info!("Package {} installed.", toolbox.package.bold().green());
        Ok(())
    }

    fn install_platform_packages(&self, pm: &PackageManager) -> Result<()> {
        log_section!("Installing os specific dependencies");
        log_debug!("[Setup] Version gate: {}", self.config.version_gate);
        let installer = ConditionalInstaller {
            package_manager: pm,
            runner: self.runner,
            downloader: self.downloader,
            platform: self.platform,
            version_gate: self.config.version_gate,
            temp_dir: self.temp_dir(),
        };

        let mut installed = 0;
        for requirement in &self.config.platform_packages {
            if installer.install_if_applicable(requirement)? {
                installed += 1;
            }
        }
        log_info!(
            "{} of {} platform packages installed",
            installed,
            self.config.platform_packages.len()
        );
        Ok(())
    }

    fn install_requirement_files(&self, pm: &PackageManager) -> Result<()> {
        log_section!("Installing local dependencies");
        self.install_local_requirements(pm, &self.config.requirement_files.packages)?;

        log_section!("Resolving necessary packages from remote requirement files");
        for url in &self.config.remote_requirement_files {
            pm.install_requirements(url)?;
        }
        Ok(())
    }

    fn finalize(&self, pm: &PackageManager) -> Result<()> {
        log_section!("Finalize setup");
        remove_dir_tree(&self.temp_dir())?;
        pm.list_installed(false)?;
        Ok(())
    }

    /// Installs a requirement file from the base directory. A missing file is skipped.
    fn install_local_requirements(&self, pm: &PackageManager, file: &str) -> Result<()> {
        let path = self.base_dir.join(file);
        if !path.is_file() {
            log_warn!(
                "Requirement file {} not found, skipping",
                path.display().to_string().yellow()
            );
            return Ok(());
        }
        pm.install_requirements(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::command_runner::CommandOutcome;
    use crate::libs::platform::OsFamily;
    use semver::Version;
    use std::cell::RefCell;
    use std::fs::{self, File};
    use std::io::Write;

    fn temp_dir_left_behind(base_dir: &Path) -> bool {
        paths::temp_dir(base_dir).exists()
    }

    struct FakeRunner {
        installed: Vec<String>,
        fail_on: Option<String>,
        calls: RefCell<Vec<CommandSpec>>,
    }

    impl FakeRunner {
        fn new(installed: &[&str]) -> Self {
            FakeRunner {
                installed: installed.iter().map(|s| s.to_string()).collect(),
                fail_on: None,
                calls: RefCell::new(Vec::new()),
            }
        }

        fn rendered(&self) -> Vec<String> {
            self.calls.borrow().iter().map(|c| c.to_string()).collect()
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, spec: &CommandSpec, _suppress_output: bool) -> Result<CommandOutcome> {
            self.calls.borrow_mut().push(spec.clone());
            if let Some(needle) = &self.fail_on {
                if spec.to_string().contains(needle.as_str()) {
                    return Ok(CommandOutcome::failed(1, vec!["ERROR: boom".into()]));
                }
            }
            if spec.arg_strings() == ["list"] {
                return Ok(CommandOutcome::succeeded(self.installed.clone()));
            }
            Ok(CommandOutcome::succeeded(Vec::new()))
        }
    }

    /// Writes a placeholder for every URL, or a real zip for the toolbox archive.
    #[derive(Default)]
    struct FakeDownloader {
        urls: RefCell<Vec<String>>,
    }

    impl Downloader for FakeDownloader {
        fn download(&self, url: &str, dest: &Path) -> Result<()> {
            self.urls.borrow_mut().push(url.to_string());
            if url.ends_with(".zip") {
                let mut zip = zip::ZipWriter::new(File::create(dest)?);
                zip.start_file(
                    "bastis-python-toolbox-master/setup.py",
                    zip::write::FileOptions::default(),
                )
                .unwrap();
                zip.write_all(b"from setuptools import setup").unwrap();
                zip.finish().unwrap();
            } else {
                fs::write(dest, b"payload")?;
            }
            Ok(())
        }
    }

    fn linux_py3() -> PlatformDescriptor {
        PlatformDescriptor::new(OsFamily::Linux, Version::new(3, 11, 4), "64bit")
    }

    fn base_with_requirement_files() -> tempfile::TempDir {
        let base = tempfile::tempdir().unwrap();
        fs::write(base.path().join("setup-requirements.txt"), "wheel\n").unwrap();
        fs::write(base.path().join("package-requirements.txt"), "six\n").unwrap();
        base
    }

    fn orchestrator<'a>(
        runner: &'a FakeRunner,
        downloader: &'a FakeDownloader,
        platform: &'a PlatformDescriptor,
        config: &'a SetupConfig,
        base: &Path,
    ) -> SetupOrchestrator<'a> {
        SetupOrchestrator::new(runner, downloader, platform, config, base).unwrap()
    }

    #[test]
    fn successful_run_removes_temp_dir() {
        let base = base_with_requirement_files();
        let runner = FakeRunner::new(&["pip (9.0.1)", "bptbx (0.1.0)"]);
        let downloader = FakeDownloader::default();
        let platform = linux_py3();
        let config = SetupConfig::default();

        orchestrator(&runner, &downloader, &platform, &config, base.path())
            .run()
            .unwrap();

        assert!(!temp_dir_left_behind(base.path()));
        // Windows-only packages never reach the network on Linux.
        assert!(downloader.urls.borrow().is_empty());

        let calls = runner.rendered();
        let setup_reqs = base.path().join("setup-requirements.txt");
        let package_reqs = base.path().join("package-requirements.txt");
        let installs: Vec<_> = calls.iter().filter(|c| c.starts_with("pip install -r")).collect();
        assert_eq!(
            installs,
            vec![
                &format!("pip install -r {}", setup_reqs.display()),
                &format!("pip install -r {}", package_reqs.display()),
                &format!("pip install -r {}", config.remote_requirement_files[0]),
                &format!("pip install -r {}", config.remote_requirement_files[1]),
            ]
        );
        assert_eq!(calls.last().map(String::as_str), Some("pip list"));
    }

    #[test]
    fn failing_stage_leaves_temp_dir_behind() {
        let base = base_with_requirement_files();
        let mut runner = FakeRunner::new(&["pip (9.0.1)", "bptbx (0.1.0)"]);
        runner.fail_on = Some("pyntrest".to_string());
        let downloader = FakeDownloader::default();
        let platform = linux_py3();
        let config = SetupConfig::default();

        let err = orchestrator(&runner, &downloader, &platform, &config, base.path())
            .run()
            .unwrap_err();

        assert!(format!("{err:#}").contains("install requirement files"));
        assert!(temp_dir_left_behind(base.path()));
        // Nothing after the failing command ran.
        assert!(!runner.rendered().iter().any(|c| c.contains("bastis-python-toolbox/master")));
    }

    #[test]
    fn bootstraps_missing_package_manager_and_toolbox() {
        let base = base_with_requirement_files();
        let runner = FakeRunner::new(&["six (1.16.0)"]);
        let downloader = FakeDownloader::default();
        let platform = linux_py3();
        let mut config = SetupConfig::default();
        config.remote_requirement_files.clear();

        orchestrator(&runner, &downloader, &platform, &config, base.path())
            .run()
            .unwrap();

        assert_eq!(
            *downloader.urls.borrow(),
            vec![
                config.package_manager.bootstrap_url.clone(),
                config.toolbox.archive_url.clone(),
            ]
        );

        let calls = runner.calls.borrow();
        let temp = paths::temp_dir(base.path());
        let get_pip = calls
            .iter()
            .find(|c| c.program_name() == "python" && c.arg_strings().len() == 1)
            .expect("get-pip.py was not run");
        assert_eq!(get_pip.working_dir, temp);
        assert_eq!(
            get_pip.arg_strings(),
            [temp.join("get-pip.py").display().to_string()]
        );

        let setup_py = calls
            .iter()
            .find(|c| c.arg_strings() == ["setup.py", "install"])
            .expect("toolbox setup.py was not run");
        assert_eq!(
            setup_py.working_dir,
            temp.join("bptbx").join("bastis-python-toolbox-master")
        );
        assert!(!temp.exists());
    }

    #[test]
    fn applicable_platform_package_is_downloaded_and_installed() {
        let base = base_with_requirement_files();
        let runner = FakeRunner::new(&["pip (9.0.1)", "bptbx (0.1.0)"]);
        let downloader = FakeDownloader::default();
        let platform = PlatformDescriptor::new(OsFamily::Windows, Version::new(2, 7, 18), "32bit");
        let mut config = SetupConfig::default();
        config.remote_requirement_files.clear();
        config.platform_packages.truncate(1);

        orchestrator(&runner, &downloader, &platform, &config, base.path())
            .run()
            .unwrap();

        assert_eq!(
            *downloader.urls.borrow(),
            vec![config.platform_packages[0].source_url.clone()]
        );
        assert!(
            runner
                .rendered()
                .iter()
                .any(|c| c.ends_with("numpy-1.9.0-win32-superpack-python2.7.exe"))
        );
        assert!(!temp_dir_left_behind(base.path()));
    }

    #[test]
    fn missing_local_requirement_files_are_skipped() {
        let base = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new(&["pip (9.0.1)", "bptbx (0.1.0)"]);
        let downloader = FakeDownloader::default();
        let platform = linux_py3();
        let mut config = SetupConfig::default();
        config.remote_requirement_files.clear();

        orchestrator(&runner, &downloader, &platform, &config, base.path())
            .run()
            .unwrap();

        assert!(!runner.rendered().iter().any(|c| c.contains("install -r")));
    }

    #[test]
    fn relative_base_dir_yields_absolute_paths_for_child_processes() {
        let base = tempfile::Builder::new()
            .prefix("ubersetup-rel-base")
            .tempdir_in(".")
            .unwrap();
        let relative = PathBuf::from(base.path().file_name().unwrap());
        assert!(relative.is_relative());
        fs::write(relative.join("setup-requirements.txt"), "wheel\n").unwrap();

        let runner = FakeRunner::new(&["six (1.16.0)", "bptbx (0.1.0)"]);
        let downloader = FakeDownloader::default();
        let platform = linux_py3();
        let mut config = SetupConfig::default();
        config.remote_requirement_files.clear();

        orchestrator(&runner, &downloader, &platform, &config, &relative)
            .run()
            .unwrap();

        let absolute_base = std::env::current_dir().unwrap().join(&relative);
        let calls = runner.calls.borrow();
        let get_pip = calls
            .iter()
            .find(|c| c.program_name() == "python" && c.arg_strings().len() == 1)
            .expect("get-pip.py was not run");
        let script = PathBuf::from(&get_pip.args[0]);
        assert!(script.is_absolute());
        assert_eq!(script, absolute_base.join("temp").join("get-pip.py"));
        assert_eq!(get_pip.working_dir, absolute_base.join("temp"));

        let requirements = calls
            .iter()
            .find(|c| c.arg_strings().first().map(String::as_str) == Some("install"))
            .expect("setup requirements were not installed");
        assert_eq!(
            PathBuf::from(&requirements.args[2]),
            absolute_base.join("setup-requirements.txt")
        );
    }

    #[test]
    fn stages_run_in_fixed_order() {
        assert_eq!(SetupStage::ALL.first(), Some(&SetupStage::PrepareEnv));
        assert_eq!(SetupStage::ALL.last(), Some(&SetupStage::Finalize));
    }
}
