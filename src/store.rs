//! Record store for the song catalog and the play history.
//!
//! Both datasets are `;` separated text files encoded as UTF-8 with a byte
//! order mark, the format the band's spreadsheet tools open without asking.
//! Reads are forgiving: a missing file is an empty dataset and malformed
//! fields fall back to their defaults. Writes are whole-file overwrites
//! through a temporary file, except history appends.
//!
//! The store keeps a short-lived read cache for display code. Every write
//! made through the store drops that cache, so a read after a write always
//! sees the file.

use crate::backup;
use crate::config::DataPaths;
use crate::song::{
    self, Catalog, HistoryEntry, Song, COL_COMMENT, COL_FAVORITE, COL_LAST_PLAYED,
    COL_MATURITY, COL_MUST_PLAY, COL_NOTE, COL_PLAYED_ON, COL_PLAY_COUNT, COL_TAGS, COL_TITLE,
    HISTORY_COLUMNS, SONG_COLUMNS,
};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use csv::{ByteRecord, ReaderBuilder, WriterBuilder};
use log::{debug, error, info, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

pub const DELIMITER: u8 = b';';
const BOM: &[u8] = b"\xEF\xBB\xBF";

/// A delimited file as read from disk, headers trimmed. Fields that are not
/// valid UTF-8 are decoded lossily so one bad byte only affects its field.
struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

fn field(record: &[String], column: Option<usize>) -> &str {
    column.and_then(|i| record.get(i)).map_or("", String::as_str)
}

fn decode(record: &ByteRecord) -> Vec<String> {
    record
        .iter()
        .map(|raw| String::from_utf8_lossy(raw).into_owned())
        .collect()
}

fn read_table(path: &Path) -> Result<Table> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let bytes = bytes.strip_prefix(BOM).unwrap_or(&bytes);

    let mut reader = ReaderBuilder::new()
        .delimiter(DELIMITER)
        .flexible(true)
        .has_headers(true)
        .from_reader(bytes);

    let headers = decode(
        reader
            .byte_headers()
            .with_context(|| format!("Failed to read header of {}", path.display()))?,
    )
    .into_iter()
    .map(|h| h.trim().to_string())
    .collect();

    let mut rows = Vec::new();
    for (line, record) in reader.byte_records().enumerate() {
        match record {
            Ok(record) => rows.push(decode(&record)),
            Err(e) => warn!("Skipping unreadable row {} in {}: {e}", line + 2, path.display()),
        }
    }

    Ok(Table { headers, rows })
}

/// Overwrites `path` with a BOM, the header and `rows`.
fn write_table<I>(path: &Path, headers: &[&str], rows: I) -> Result<()>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;

    temp.write_all(BOM)?;
    {
        let mut writer = WriterBuilder::new()
            .delimiter(DELIMITER)
            .from_writer(&mut temp);
        writer.write_record(headers)?;
        for row in rows {
            writer.write_record(&row)?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    temp.persist(path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

fn song_from_record(table: &Table, record: &[String]) -> Song {
    let get = |name: &str| field(record, table.column(name));

    Song {
        title: get(COL_TITLE).trim().to_string(),
        last_played: song::parse_date(get(COL_LAST_PLAYED)).unwrap_or_else(song::never_played),
        maturity: song::parse_maturity(get(COL_MATURITY)),
        play_count: song::parse_play_count(get(COL_PLAY_COUNT)),
        comment: get(COL_COMMENT).to_string(),
        tags: get(COL_TAGS).to_string(),
        must_play: song::parse_flag(get(COL_MUST_PLAY)),
        favorite: song::parse_flag(get(COL_FAVORITE)),
        note: get(COL_NOTE).to_string(),
    }
}

fn song_to_row(song: &Song) -> Vec<String> {
    vec![
        song.title.clone(),
        song::format_date(song.last_played),
        song.maturity.to_string(),
        song.play_count.to_string(),
        song.comment.clone(),
        song.tags.clone(),
        song.must_play.to_string(),
        song.favorite.to_string(),
        song.note.clone(),
    ]
}

fn history_to_row(entry: &HistoryEntry) -> Vec<String> {
    vec![
        entry.title.clone(),
        entry.played_on.map(song::format_date).unwrap_or_default(),
    ]
}

/// Strict read of a song list file.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or decoded.
pub fn read_songs(path: &Path) -> Result<Catalog> {
    let table = read_table(path)?;
    for column in SONG_COLUMNS {
        if table.column(column).is_none() {
            debug!("Column {column} missing in {}, using defaults", path.display());
        }
    }
    Ok(Catalog::from_songs(
        table.rows.iter().map(|record| song_from_record(&table, record)),
    ))
}

/// Strict read of a history file.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or decoded.
pub fn read_history(path: &Path) -> Result<Vec<HistoryEntry>> {
    let table = read_table(path)?;
    let title_col = table.column(COL_TITLE);
    let date_col = table.column(COL_PLAYED_ON);

    Ok(table
        .rows
        .iter()
        .filter_map(|record| history_entry(record, title_col, date_col))
        .collect())
}

fn history_entry(record: &[String], title_col: Option<usize>, date_col: Option<usize>) -> Option<HistoryEntry> {
    let title = field(record, title_col).trim();
    if title.is_empty() {
        return None;
    }
    Some(HistoryEntry {
        title: title.to_string(),
        played_on: song::parse_date(field(record, date_col)),
    })
}

fn ends_with_newline(path: &Path) -> Result<bool> {
    let mut file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    if file.seek(SeekFrom::End(0))? == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

#[derive(Debug)]
struct Cached<T> {
    value: T,
    loaded_at: Instant,
}

impl<T: Clone> Cached<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            loaded_at: Instant::now(),
        }
    }

    fn fresh(&self, ttl: Duration) -> Option<T> {
        (self.loaded_at.elapsed() < ttl).then(|| self.value.clone())
    }
}

/// Owns the durable song and history files.
#[derive(Debug)]
pub struct RecordStore {
    paths: DataPaths,
    cache_ttl: Duration,
    songs_cache: Option<Cached<Catalog>>,
    history_cache: Option<Cached<Vec<HistoryEntry>>>,
}

impl RecordStore {
    #[must_use]
    pub fn new(paths: DataPaths, cache_ttl: Duration) -> Self {
        Self {
            paths,
            cache_ttl,
            songs_cache: None,
            history_cache: None,
        }
    }

    #[must_use]
    pub fn paths(&self) -> &DataPaths {
        &self.paths
    }

    /// Loads the catalog. A missing file is created empty; any read error
    /// is logged and yields an empty catalog.
    pub fn load_songs(&self) -> Catalog {
        let path = &self.paths.songs;
        if !path.exists() {
            info!("No song list at {}, creating an empty one", path.display());
            if let Err(e) = write_table(path, &SONG_COLUMNS, Vec::<Vec<String>>::new()) {
                error!("Could not create empty song list: {e:#}");
            }
            return Catalog::new();
        }

        match read_songs(path) {
            Ok(catalog) => {
                debug!("Loaded {} songs from {}", catalog.len(), path.display());
                catalog
            }
            Err(e) => {
                error!("Error loading song list: {e:#}");
                Catalog::new()
            }
        }
    }

    /// Loads the catalog for a read-modify-write. A missing file is an empty
    /// catalog, but unlike [`Self::load_songs`] a read error is returned, so
    /// callers never save an empty catalog over a file they could not read.
    ///
    /// # Errors
    ///
    /// Returns an error if the song file exists but cannot be read.
    pub fn load_songs_for_update(&self) -> Result<Catalog> {
        let path = &self.paths.songs;
        if !path.exists() {
            return Ok(Catalog::new());
        }
        read_songs(path).context("Song list could not be read; refusing to overwrite it")
    }

    /// Writes the catalog after a best-effort backup of the current files.
    /// Rows with blank titles are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the song file cannot be written. A failed backup
    /// is only logged.
    pub fn save_songs(&mut self, songs: &[Song]) -> Result<()> {
        if self.paths.songs.exists() {
            if let Err(e) = self.backup() {
                warn!("Backup before saving failed, saving anyway: {e:#}");
            }
        }

        let catalog = Catalog::from_songs(songs.iter().cloned());
        self.invalidate();
        write_table(&self.paths.songs, &SONG_COLUMNS, catalog.iter().map(song_to_row))
            .context("Error saving song list")?;
        info!("Saved {} songs", catalog.len());
        Ok(())
    }

    /// Loads the play history. A missing file is an empty history; any read
    /// error is logged and yields an empty history.
    pub fn load_history(&self) -> Vec<HistoryEntry> {
        let path = &self.paths.history;
        if !path.exists() {
            return Vec::new();
        }

        match read_history(path) {
            Ok(history) => history,
            Err(e) => {
                error!("Error loading history: {e:#}");
                Vec::new()
            }
        }
    }

    /// Appends one history row per title, dated `date`.
    ///
    /// # Errors
    ///
    /// Returns an error if the history file cannot be written.
    pub fn append_history(&mut self, titles: &[String], date: NaiveDate) -> Result<()> {
        let entries: Vec<HistoryEntry> = titles
            .iter()
            .map(|title| HistoryEntry::new(title.as_str(), date))
            .collect();
        self.append_entries(&entries)
    }

    /// Appends rows to the history file, writing the header first when the
    /// file is new.
    ///
    /// # Errors
    ///
    /// Returns an error if the history file cannot be written.
    pub fn append_entries(&mut self, entries: &[HistoryEntry]) -> Result<()> {
        self.invalidate();
        let path = &self.paths.history;
        let is_new = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        if is_new {
            file.write_all(BOM)?;
        } else if !ends_with_newline(path)? {
            file.write_all(b"\n")?;
        }
        let mut writer = WriterBuilder::new()
            .delimiter(DELIMITER)
            .has_headers(false)
            .from_writer(file);
        if is_new {
            writer.write_record(HISTORY_COLUMNS)?;
        }
        for entry in entries {
            writer.write_record(history_to_row(entry))?;
        }
        writer
            .flush()
            .with_context(|| format!("Error updating history {}", path.display()))?;

        debug!("Appended {} history rows", entries.len());
        Ok(())
    }

    /// Deletes every history row for `title` on `date` and returns them.
    /// The file is only rewritten when something matched. Every other row is
    /// written back with its original title and date text, including rows
    /// whose date does not parse; columns beyond the two history columns are
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the history cannot be read or rewritten.
    pub fn remove_history(&mut self, title: &str, date: NaiveDate) -> Result<Vec<HistoryEntry>> {
        let path = self.paths.history.clone();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let table = read_table(&path)?;
        let title_col = table.column(COL_TITLE);
        let date_col = table.column(COL_PLAYED_ON);

        let mut removed = Vec::new();
        let mut kept = Vec::new();
        for record in &table.rows {
            match history_entry(record, title_col, date_col) {
                Some(entry) if entry.matches(title, date) => removed.push(entry),
                _ => kept.push(vec![
                    field(record, title_col).to_string(),
                    field(record, date_col).to_string(),
                ]),
            }
        }

        if !removed.is_empty() {
            self.invalidate();
            write_table(&path, &HISTORY_COLUMNS, kept).context("Error rewriting history")?;
            info!("Removed {} history rows for '{title}' on {date}", removed.len());
        }
        Ok(removed)
    }

    /// Copies the catalog in the store's file format to `dest`.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read or `dest` written.
    pub fn export_songs(&self, dest: &Path) -> Result<usize> {
        let catalog = if self.paths.songs.exists() {
            read_songs(&self.paths.songs)?
        } else {
            Catalog::new()
        };
        write_table(dest, &SONG_COLUMNS, catalog.iter().map(song_to_row))?;
        Ok(catalog.len())
    }

    /// Copies the history in the store's file format to `dest`.
    ///
    /// # Errors
    ///
    /// Returns an error if the history cannot be read or `dest` written.
    pub fn export_history(&self, dest: &Path) -> Result<usize> {
        let history = if self.paths.history.exists() {
            read_history(&self.paths.history)?
        } else {
            Vec::new()
        };
        write_table(dest, &HISTORY_COLUMNS, history.iter().map(history_to_row))?;
        Ok(history.len())
    }

    /// Zips the current song and history files into the backup directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive cannot be written.
    pub fn backup(&self) -> Result<std::path::PathBuf> {
        backup::create_backup(
            &self.paths.backup_dir,
            &[self.paths.songs.as_path(), self.paths.history.as_path()],
        )
    }

    /// Catalog from the read cache, reloaded once the cache is stale.
    pub fn cached_songs(&mut self) -> Catalog {
        if let Some(catalog) = self.songs_cache.as_ref().and_then(|c| c.fresh(self.cache_ttl)) {
            return catalog;
        }
        let catalog = self.load_songs();
        self.songs_cache = Some(Cached::new(catalog.clone()));
        catalog
    }

    /// History from the read cache, reloaded once the cache is stale.
    pub fn cached_history(&mut self) -> Vec<HistoryEntry> {
        if let Some(history) = self.history_cache.as_ref().and_then(|c| c.fresh(self.cache_ttl)) {
            return history;
        }
        let history = self.load_history();
        self.history_cache = Some(Cached::new(history.clone()));
        history
    }

    /// Drops both cached datasets.
    pub fn invalidate(&mut self) {
        self.songs_cache = None;
        self.history_cache = None;
    }
}
