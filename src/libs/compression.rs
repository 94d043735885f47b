// Archive handling for the toolbox source download.

use crate::libs::errors::{BootstrapError, Result};
use crate::log_debug;
use colored::Colorize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::ZipArchive;

/// Extracts the zip archive at `src` into `dest`, creating `dest` if needed.
pub fn extract_zip(src: &Path, dest: &Path) -> Result<()> {
    log_debug!(
        "[Archive] Extracting {} into {}",
        src.display().to_string().blue(),
        dest.display().to_string().cyan()
    );
    fs::create_dir_all(dest)?;

    let archive_error = |reason: String| BootstrapError::Archive {
        path: src.to_path_buf(),
        reason,
    };
    let file = File::open(src)?;
    let mut archive = ZipArchive::new(file).map_err(|e| archive_error(e.to_string()))?;
    archive
        .extract(dest)
        .map_err(|e| archive_error(e.to_string()))?;

    log_debug!("[Archive] Extracted {} entries", archive.len());
    Ok(())
}

/// Finds the directory holding `marker` (e.g. `setup.py`) inside an extracted tree.
/// Prefers `preferred` when it exists and contains the marker, otherwise takes the
/// shallowest match.
pub fn find_source_dir(root: &Path, preferred: Option<&str>, marker: &str) -> Option<PathBuf> {
    if let Some(name) = preferred {
        let candidate = root.join(name);
        if candidate.join(marker).is_file() {
            return Some(candidate);
        }
        log_debug!(
            "[Archive] Expected source dir {} has no {}, searching",
            candidate.display(),
            marker
        );
    }

    WalkDir::new(root)
        .max_depth(3)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name() == marker)
        .min_by_key(|e| e.depth())
        .and_then(|e| e.path().parent().map(Path::to_path_buf))
}
