// Building blocks shared by the setup and clear modes.

pub mod command_runner;
pub mod compression;
pub mod conditional_installer;
pub mod config_loading;
pub mod downloader;
pub mod errors;
pub mod file_operations;
pub mod package_manager;
pub mod paths;
pub mod platform;
