//! Song catalog and play history records.
//!
//! The on-disk column names are German because that is what the band's
//! spreadsheets have always used; the Rust side uses English field names.
//! Every value read from disk passes through the normalizers in this module
//! exactly once, so the rest of the crate can rely on the invariants:
//!
//! - titles are unique and non-blank
//! - `maturity` is within `0..=10`
//! - `play_count` is non-negative

use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

pub const COL_TITLE: &str = "Songtitel";
pub const COL_LAST_PLAYED: &str = "Zuletzt_gespielt";
pub const COL_MATURITY: &str = "Reifegrad";
pub const COL_PLAY_COUNT: &str = "Anzahl_gespielt";
pub const COL_COMMENT: &str = "Kommentar";
pub const COL_TAGS: &str = "Tags";
pub const COL_MUST_PLAY: &str = "Must_Play";
pub const COL_FAVORITE: &str = "Favorit";
pub const COL_NOTE: &str = "Notiz";
pub const COL_PLAYED_ON: &str = "Gespielt_am";

/// Column order of the catalog file.
pub const SONG_COLUMNS: [&str; 9] = [
    COL_TITLE,
    COL_LAST_PLAYED,
    COL_MATURITY,
    COL_PLAY_COUNT,
    COL_COMMENT,
    COL_TAGS,
    COL_MUST_PLAY,
    COL_FAVORITE,
    COL_NOTE,
];

/// Column order of the history file.
pub const HISTORY_COLUMNS: [&str; 2] = [COL_TITLE, COL_PLAYED_ON];

pub const MATURITY_MIN: u8 = 0;
pub const MATURITY_MAX: u8 = 10;
pub const DEFAULT_MATURITY: u8 = 5;

/// Date format used when writing dates back to disk.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// "Never played" marker for songs without a recorded rehearsal.
#[must_use]
pub fn never_played() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// One entry of the song catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    pub title: String,
    pub last_played: NaiveDate,
    /// Readiness from 0 (needs a lot of work) to 10 (stage ready).
    pub maturity: u8,
    pub play_count: u32,
    pub comment: String,
    /// Comma separated labels, kept verbatim.
    pub tags: String,
    pub must_play: bool,
    pub favorite: bool,
    pub note: String,
}

impl Song {
    /// A fresh song with every field at its documented default.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            last_played: never_played(),
            maturity: DEFAULT_MATURITY,
            play_count: 0,
            comment: String::new(),
            tags: String::new(),
            must_play: false,
            favorite: false,
            note: String::new(),
        }
    }

    #[must_use]
    pub fn with_maturity(mut self, maturity: i64) -> Self {
        self.maturity = clamp_maturity(maturity);
        self
    }

    #[must_use]
    pub fn with_last_played(mut self, date: NaiveDate) -> Self {
        self.last_played = date;
        self
    }

    #[must_use]
    pub fn with_must_play(mut self, must_play: bool) -> Self {
        self.must_play = must_play;
        self
    }

    #[must_use]
    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = tags.into();
        self
    }

    /// Whether the song has ever been committed to a rehearsal.
    #[must_use]
    pub fn was_played(&self) -> bool {
        self.last_played > never_played()
    }

    /// Trimmed, non-empty tags in file order.
    pub fn tag_list(&self) -> impl Iterator<Item = &str> {
        self.tags.split(',').map(str::trim).filter(|t| !t.is_empty())
    }

    /// True when the song carries at least one of `wanted`.
    #[must_use]
    pub fn has_any_tag(&self, wanted: &[String]) -> bool {
        self.tag_list().any(|tag| wanted.iter().any(|w| w.trim() == tag))
    }
}

/// One rehearsal occurrence of a song.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub title: String,
    /// `None` when the stored date could not be parsed.
    pub played_on: Option<NaiveDate>,
}

impl HistoryEntry {
    #[must_use]
    pub fn new(title: impl Into<String>, played_on: NaiveDate) -> Self {
        Self {
            title: title.into(),
            played_on: Some(played_on),
        }
    }

    #[must_use]
    pub fn matches(&self, title: &str, date: NaiveDate) -> bool {
        self.title == title && self.played_on == Some(date)
    }
}

/// The song catalog. Titles are unique; insertion order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    songs: Vec<Song>,
}

impl Catalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from raw rows, dropping blank titles and later
    /// duplicates.
    #[must_use]
    pub fn from_songs(songs: impl IntoIterator<Item = Song>) -> Self {
        let mut seen = HashSet::new();
        let mut kept = Vec::new();
        for mut song in songs {
            song.title = song.title.trim().to_string();
            if song.title.is_empty() {
                continue;
            }
            if !seen.insert(song.title.clone()) {
                warn!("Dropping duplicate catalog row for '{}'", song.title);
                continue;
            }
            kept.push(song);
        }
        Self { songs: kept }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.songs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    #[must_use]
    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn iter(&self) -> impl Iterator<Item = &Song> {
        self.songs.iter()
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.songs.iter().map(|s| s.title.as_str())
    }

    #[must_use]
    pub fn contains(&self, title: &str) -> bool {
        self.get(title).is_some()
    }

    #[must_use]
    pub fn get(&self, title: &str) -> Option<&Song> {
        self.songs.iter().find(|s| s.title == title)
    }

    pub fn get_mut(&mut self, title: &str) -> Option<&mut Song> {
        self.songs.iter_mut().find(|s| s.title == title)
    }

    /// Adds a new song.
    ///
    /// # Errors
    ///
    /// Fails for blank titles and titles already in the catalog.
    pub fn add(&mut self, mut song: Song) -> Result<()> {
        song.title = song.title.trim().to_string();
        if song.title.is_empty() {
            bail!("Song title must not be empty");
        }
        if self.contains(&song.title) {
            bail!("'{}' is already in the song list", song.title);
        }
        self.songs.push(song);
        Ok(())
    }

    /// Removes a song by title, returning it if it existed.
    pub fn remove(&mut self, title: &str) -> Option<Song> {
        let index = self.songs.iter().position(|s| s.title == title)?;
        Some(self.songs.remove(index))
    }

    /// Songs carrying any of `tags`. An empty filter keeps everything.
    #[must_use]
    pub fn filter_by_tags(&self, tags: &[String]) -> Self {
        if tags.is_empty() {
            return self.clone();
        }
        Self {
            songs: self
                .songs
                .iter()
                .filter(|s| s.has_any_tag(tags))
                .cloned()
                .collect(),
        }
    }

    /// Sorted set of every tag used in the catalog.
    #[must_use]
    pub fn all_tags(&self) -> Vec<String> {
        self.songs
            .iter()
            .flat_map(Song::tag_list)
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl IntoIterator for Catalog {
    type Item = Song;
    type IntoIter = std::vec::IntoIter<Song>;

    fn into_iter(self) -> Self::IntoIter {
        self.songs.into_iter()
    }
}

#[must_use]
pub fn clamp_maturity(value: i64) -> u8 {
    // Clamped into 0..=10 first, so the cast cannot truncate.
    value.clamp(i64::from(MATURITY_MIN), i64::from(MATURITY_MAX)) as u8
}

/// Parses a stored maturity; blanks and garbage become the default.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn parse_maturity(raw: &str) -> u8 {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => clamp_maturity(value.trunc() as i64),
        _ => DEFAULT_MATURITY,
    }
}

/// Parses a stored play count; blanks, garbage and negatives become 0.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn parse_play_count(raw: &str) -> u32 {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => value.trunc().min(f64::from(u32::MAX)) as u32,
        _ => 0,
    }
}

/// Lenient boolean parsing. Anything unrecognised is `false`.
#[must_use]
pub fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "ja" | "wahr" | "x"
    )
}

/// Accepts the date shapes found in older exports.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| NaiveDate::parse_from_str(raw, "%d.%m.%Y").ok())
}

#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}
