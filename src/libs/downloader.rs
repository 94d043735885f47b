// Fetches remote artifacts (bootstrap scripts, archives, installers, wheels) to disk.

use crate::libs::errors::{BootstrapError, Result};
use crate::{log_debug, log_info};
use colored::Colorize;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// URL → local file. The setup stages only ever see this trait, which keeps the
/// network out of their tests.
pub trait Downloader {
    fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Blocking HTTP(S) downloader backed by `ureq`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpDownloader;

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        log_info!("[Download] Fetching {}", url.blue());

        let response = ureq::get(url).call().map_err(|e| BootstrapError::Download {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let mut file = File::create(dest)?;
        let mut reader = response.into_reader();
        io::copy(&mut reader, &mut file).map_err(|e| BootstrapError::Download {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        log_debug!("[Download] Saved to {}", dest.display().to_string().green());
        Ok(())
    }
}

/// Last path segment of `url`, without query string or fragment.
pub fn url_file_name(url: &str) -> Result<String> {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let without_query = without_fragment.split('?').next().unwrap_or(without_fragment);
    let path = without_query
        .split_once("://")
        .map(|(_, rest)| rest.split_once('/').map(|(_, path)| path).unwrap_or(""))
        .unwrap_or(without_query);

    match path.rsplit('/').next() {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(BootstrapError::MissingFileName(url.to_string())),
    }
}

/// Downloads `url` into `dir`, keeping the URL's file name. Returns the local path.
pub fn download_into(downloader: &dyn Downloader, url: &str, dir: &Path) -> Result<PathBuf> {
    let target = dir.join(url_file_name(url)?);
    downloader.download(url, &target)?;
    Ok(target)
}
