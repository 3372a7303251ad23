//! # Configuration Module
//!
//! This module handles the data directory, the file layout inside it and the
//! persisted user settings.
//!
//! ## Data Storage
//!
//! Unless a directory is passed explicitly (`--data-dir` or
//! `SONGPICKER_DATA_DIR`), everything lives in the platform data directory:
//! - Linux: `~/.local/share/songpicker/`
//! - macOS: `~/Library/Application Support/songpicker/`
//! - Windows: `%APPDATA%\songpicker\`
//!
//! ## Settings
//!
//! `app_settings.json` stores the selection weights and defaults. A missing
//! or unreadable settings file falls back to [`AppConfig::default`].

use anyhow::{bail, Context, Result};
use log::{debug, warn};
use path_absolutize::Absolutize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SONGS_FILE: &str = "songliste.csv";
pub const HISTORY_FILE: &str = "spielhistorie.csv";
pub const BACKUP_DIR: &str = "backups";
pub const SETTINGS_FILE: &str = "app_settings.json";
pub const DRAFT_FILE: &str = "auswahl.txt";
pub const UNDO_FILE: &str = "undo.json";

/// Returns the default data directory, creating it if needed.
///
/// # Errors
///
/// This function will return an error if:
/// - The system data directory cannot be determined
/// - The songpicker subdirectory cannot be created due to permissions
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| anyhow::anyhow!(
            "Could not determine system data directory. Use --data-dir to choose one explicitly."
        ))?;

    ensure_dir(&data_dir.join("songpicker"))
}

/// Makes `dir` absolute and creates it.
fn ensure_dir(dir: &Path) -> Result<PathBuf> {
    let dir = dir
        .absolutize()
        .with_context(|| format!("Failed to resolve data directory {}", dir.display()))?
        .into_owned();

    fs::create_dir_all(&dir)
        .with_context(|| format!(
            "Failed to create data directory at {}. Please check file permissions.",
            dir.display()
        ))?;

    Ok(dir)
}

/// Locations of every file the application reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub root: PathBuf,
    pub songs: PathBuf,
    pub history: PathBuf,
    pub backup_dir: PathBuf,
    pub settings: PathBuf,
    pub draft: PathBuf,
    pub undo: PathBuf,
}

impl DataPaths {
    /// Standard layout below `root`. Does not touch the filesystem.
    #[must_use]
    pub fn in_dir(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            songs: root.join(SONGS_FILE),
            history: root.join(HISTORY_FILE),
            backup_dir: root.join(BACKUP_DIR),
            settings: root.join(SETTINGS_FILE),
            draft: root.join(DRAFT_FILE),
            undo: root.join(UNDO_FILE),
            root,
        }
    }

    /// Resolves the data directory: explicit path if given, platform default
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be resolved or created.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let root = match explicit {
            Some(dir) => ensure_dir(dir)?,
            None => get_data_dir()?,
        };
        debug!("Using data directory {}", root.display());
        Ok(Self::in_dir(root))
    }
}

/// User tunable settings, persisted as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Extra weight for songs flagged must-play.
    pub must_play_weight: f64,
    /// Multiplier for the `(10 - maturity)` term.
    pub maturity_weight: f64,
    /// How many songs `pick` draws when no count is given.
    pub default_count: usize,
    /// Lifetime of cached catalog/history reads.
    pub cache_ttl_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            must_play_weight: 2.0,
            maturity_weight: 1.0,
            default_count: 5,
            cache_ttl_secs: 300,
        }
    }
}

impl AppConfig {
    /// Loads settings, falling back to defaults when the file is missing or
    /// malformed.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        let parsed = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings {}", path.display()))
            .and_then(|text| {
                serde_json::from_str::<Self>(&text)
                    .with_context(|| format!("Invalid settings in {}", path.display()))
            })
            .and_then(|config| config.validated());

        match parsed {
            Ok(config) => config,
            Err(e) => {
                warn!("{e:#}; using default settings");
                Self::default()
            }
        }
    }

    /// Writes settings as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid or the file cannot be
    /// written.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.clone().validated()?;
        let text = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, text)
            .with_context(|| format!("Failed to write settings {}", path.display()))
    }

    /// Rejects values the weight model cannot work with.
    ///
    /// # Errors
    ///
    /// Returns an error for negative or non-finite weights and a zero count.
    pub fn validated(self) -> Result<Self> {
        for (name, value) in [
            ("must_play_weight", self.must_play_weight),
            ("maturity_weight", self.maturity_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                bail!("{name} must be a non-negative number, got {value}");
            }
        }
        if self.default_count == 0 {
            bail!("default_count must be at least 1");
        }
        Ok(self)
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Updates one setting from its textual key and value.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown keys or unparseable values.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        let mut next = self.clone();
        match key {
            "must_play_weight" => {
                next.must_play_weight = value.parse().with_context(|| format!("Not a number: {value}"))?;
            }
            "maturity_weight" => {
                next.maturity_weight = value.parse().with_context(|| format!("Not a number: {value}"))?;
            }
            "default_count" => {
                next.default_count = value.parse().with_context(|| format!("Not a count: {value}"))?;
            }
            "cache_ttl_secs" => {
                next.cache_ttl_secs = value.parse().with_context(|| format!("Not a duration: {value}"))?;
            }
            other => bail!("Unknown setting '{other}'"),
        }
        *self = next.validated()?;
        Ok(())
    }
}
