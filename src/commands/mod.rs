// One module per `--mode`.

// Installs pip, the toolbox, platform packages and requirement files.
pub mod setup;
// Uninstalls everything except the package manager.
pub mod clear;
