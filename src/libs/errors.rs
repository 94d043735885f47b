// Error type shared by the runner, the package manager wrapper, the downloader
// and the installers. Command modules wrap it in `anyhow` with stage context.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The program could not be spawned because it does not exist on PATH.
    #[error("program '{program}' was not found")]
    ProgramNotFound { program: String },

    /// The process ran but exited unsuccessfully. `tail` holds the last captured lines.
    #[error("command '{command}' failed with exit code {code}{tail}")]
    CommandFailed {
        command: String,
        code: String,
        tail: String,
    },

    #[error("download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    #[error("could not extract archive {path}: {reason}")]
    Archive { path: PathBuf, reason: String },

    #[error("configuration error in {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("invalid version '{0}', expected <major>.<minor>")]
    InvalidVersion(String),

    #[error("could not determine platform: {0}")]
    Platform(String),

    #[error("URL '{0}' has no file name to download into")]
    MissingFileName(String),
}

pub type Result<T> = std::result::Result<T, BootstrapError>;
