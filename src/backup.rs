//! Zip snapshots of the catalog and history files.

use anyhow::{Context, Result};
use chrono::Local;
use log::{debug, info};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// `backup_<YYYYMMDD_HHMMSS>.zip`
#[must_use]
pub fn backup_file_name(stamp: chrono::NaiveDateTime) -> String {
    format!("backup_{}.zip", stamp.format("%Y%m%d_%H%M%S"))
}

/// Bundles every existing file of `files` into a timestamped archive inside
/// `backup_dir`. Missing files are skipped. Returns the archive path.
///
/// # Errors
///
/// Returns an error if the backup directory or archive cannot be written.
pub fn create_backup(backup_dir: &Path, files: &[&Path]) -> Result<PathBuf> {
    fs::create_dir_all(backup_dir)
        .with_context(|| format!("Failed to create backup directory {}", backup_dir.display()))?;

    let archive_path = backup_dir.join(backup_file_name(Local::now().naive_local()));
    let archive = File::create(&archive_path)
        .with_context(|| format!("Failed to create backup archive {}", archive_path.display()))?;

    let mut zip = ZipWriter::new(archive);
    let options = SimpleFileOptions::default();

    for path in files.iter().filter(|p| p.exists()) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("Cannot archive {} without a file name", path.display()))?;

        zip.start_file(name.as_str(), options)
            .with_context(|| format!("Failed to add {name} to backup"))?;
        let mut source = File::open(path)
            .with_context(|| format!("Failed to open {} for backup", path.display()))?;
        io::copy(&mut source, &mut zip)
            .with_context(|| format!("Failed to copy {} into backup", path.display()))?;
        debug!("Archived {}", path.display());
    }

    zip.finish().context("Failed to finalize backup archive")?;
    info!("Backup written to {}", archive_path.display());
    Ok(archive_path)
}
