//! # Command Handlers
//!
//! One function per CLI subcommand. Each handler loads what it needs through
//! an [`App`], applies the change via the library modules and prints a short
//! report to stdout. Draft and undo stack are reloaded and saved around every
//! command that touches them, so consecutive invocations behave like one
//! editing session.

use crate::algorithm::{self, statistics, SelectionWeights, WeightContext};
use crate::analysis;
use crate::config::{AppConfig, DataPaths};
use crate::presentation;
use crate::session::{self, RemovalOutcome, SessionState, UndoOutcome};
use crate::song::{self, Song};
use crate::store::RecordStore;
use anyhow::{anyhow, bail, Result};
use chrono::{Local, NaiveDate};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

/// Resolved data directory, settings and store for one invocation.
pub struct App {
    pub paths: DataPaths,
    pub config: AppConfig,
    pub store: RecordStore,
}

impl App {
    /// Opens the data directory given on the command line, or the default one.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be created.
    pub fn open(data_dir: Option<&Path>) -> Result<Self> {
        Ok(Self::from_paths(DataPaths::resolve(data_dir)?))
    }

    #[must_use]
    pub fn from_paths(paths: DataPaths) -> Self {
        let config = AppConfig::load(&paths.settings);
        let store = RecordStore::new(paths.clone(), config.cache_ttl());
        Self {
            paths,
            config,
            store,
        }
    }

    fn session_state(&self) -> Result<SessionState> {
        SessionState::load(&self.paths)
    }
}

/// Today's date in local time.
#[must_use]
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Options of the `pick` command.
#[derive(Debug, Clone, Default)]
pub struct PickOptions {
    pub count: Option<usize>,
    pub must_play_weight: Option<f64>,
    pub maturity_weight: Option<f64>,
    pub tags: Vec<String>,
    pub seed: Option<u64>,
    pub verbose: bool,
}

impl PickOptions {
    /// Configured weights with the per-draw overrides applied.
    ///
    /// # Errors
    ///
    /// Returns an error for negative or non-finite overrides.
    pub fn weights(&self, config: &AppConfig) -> Result<SelectionWeights> {
        let mut weights = SelectionWeights::from(config);
        for (name, value, slot) in [
            ("must-play-weight", self.must_play_weight, &mut weights.must_play_weight),
            ("maturity-weight", self.maturity_weight, &mut weights.maturity_weight),
        ] {
            if let Some(value) = value {
                if !value.is_finite() || value < 0.0 {
                    bail!("--{name} must be a non-negative number, got {value}");
                }
                *slot = value;
            }
        }
        Ok(weights)
    }
}

/// Colors `line` by the song's maturity when stdout is a terminal.
fn tint(maturity: i64, line: String) -> String {
    if io::stdout().is_terminal() {
        presentation::maturity_color(maturity).paint(&line)
    } else {
        line
    }
}

/// One line of song output: title, maturity, play statistics and flags.
#[must_use]
pub fn format_song_line(song: &Song) -> String {
    let last = if song.was_played() {
        song::format_date(song.last_played)
    } else {
        "never".to_string()
    };
    let mut line = format!(
        "{:<32} {:>2}/10 {:<14} played {:>3}x, last {}",
        song.title,
        song.maturity,
        presentation::maturity_label(i64::from(song.maturity)),
        song.play_count,
        last
    );
    if song.must_play {
        line.push_str(" [must play]");
    }
    if song.favorite {
        line.push_str(" [favorite]");
    }
    if !song.tags.trim().is_empty() {
        line.push_str(&format!(" tags: {}", song.tags.trim()));
    }
    line
}

/// Draws a new draft.
///
/// # Errors
///
/// Returns an error for invalid weight overrides or when the draft cannot be
/// saved.
pub fn pick(app: &mut App, options: &PickOptions, today: NaiveDate) -> Result<()> {
    let weights = options.weights(&app.config)?;
    let count = options.count.unwrap_or(app.config.default_count);
    let catalog = app.store.cached_songs().filter_by_tags(&options.tags);
    if catalog.is_empty() {
        println!("No songs to choose from. Add some with `songpicker songs add`.");
        return Ok(());
    }

    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut state = app.session_state()?;
    state.draft.draw(&catalog, count, weights, today, &mut rng)?;
    state.save(&app.paths)?;

    println!("Selection for the next rehearsal:");
    for (position, title) in state.draft.titles().iter().enumerate() {
        let maturity = catalog.get(title).map_or(0, |s| i64::from(s.maturity));
        let line = format!(
            "{:>2}. {title} ({maturity}/10) {}",
            position + 1,
            presentation::maturity_label(maturity)
        );
        println!("{}", tint(maturity, line));
    }

    if options.verbose {
        println!();
        println!("{:<32} {:>8} {:>8}", "Song", "Weight", "Chance");
        for entry in algorithm::probabilities(catalog.songs(), today, weights) {
            println!(
                "{:<32} {:>8.2} {:>7.1}%",
                entry.title,
                entry.weight,
                entry.probability * 100.0
            );
        }
        let context = WeightContext::for_songs(catalog.songs(), today, weights);
        if let Some(stats) = statistics::analyze_weight_distribution(catalog.songs(), &context) {
            println!(
                "Weights over {} songs: mean {:.2}, std dev {:.2}, min {:.2}, max {:.2}",
                stats.count, stats.mean, stats.std_deviation, stats.min, stats.max
            );
        }
    }
    Ok(())
}

/// Prints the drafted songs.
///
/// # Errors
///
/// Returns an error if the draft file cannot be read.
pub fn draft_show(app: &App) -> Result<()> {
    let state = app.session_state()?;
    if state.draft.is_empty() {
        println!("The selection is empty. Run `songpicker pick` to draw songs.");
    } else {
        for (position, title) in state.draft.titles().iter().enumerate() {
            println!("{:>2}. {title}", position + 1);
        }
    }
    Ok(())
}

/// # Errors
///
/// Returns an error for titles outside the song list.
pub fn draft_add(app: &mut App, title: &str) -> Result<()> {
    let catalog = app.store.cached_songs();
    let mut state = app.session_state()?;
    if state.draft.add_manual(title, &catalog)? {
        state.save(&app.paths)?;
        println!("Added '{}' to the selection", title.trim());
    } else {
        println!("'{}' is already selected", title.trim());
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if the draft cannot be saved.
pub fn draft_remove(app: &App, title: &str) -> Result<()> {
    let mut state = app.session_state()?;
    if state.draft.remove(title.trim()) {
        state.save(&app.paths)?;
        println!("Removed '{}' from the selection", title.trim());
    } else {
        println!("'{}' is not selected", title.trim());
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if the draft cannot be saved.
pub fn draft_clear(app: &App) -> Result<()> {
    let mut state = app.session_state()?;
    state.draft.clear();
    state.save(&app.paths)?;
    println!("Selection cleared");
    Ok(())
}

/// Commits the draft as a rehearsal.
///
/// # Errors
///
/// Fails for an empty draft or when the song list or history cannot be
/// written.
pub fn commit(app: &mut App, date: NaiveDate) -> Result<()> {
    let mut state = app.session_state()?;
    let result = session::commit_selection(&mut app.store, &mut state, date);
    // The draft may already be cleared when only the history append failed.
    state.save(&app.paths)?;
    let report = result?;

    println!(
        "Recorded {} songs for {}",
        report.committed.len(),
        song::format_date(report.date)
    );
    for title in &report.unknown {
        println!("  '{title}' is no longer in the song list; only the history was updated");
    }
    Ok(())
}

pub fn session_dates(app: &mut App) {
    let history = app.store.cached_history();
    let dates = session::session_dates(&history);
    if dates.is_empty() {
        println!("No rehearsals recorded yet");
    }
    for date in dates {
        let count = history.iter().filter(|e| e.played_on == Some(date)).count();
        println!("{}  {count} songs", song::format_date(date));
    }
}

pub fn session_show(app: &mut App, date: NaiveDate) {
    let entries = session::session_entries(&mut app.store, date);
    if entries.is_empty() {
        println!("No songs recorded for {}", song::format_date(date));
        return;
    }
    for entry in entries {
        match entry.maturity {
            Some(maturity) => {
                let comment = entry.comment.unwrap_or_default();
                println!("{:<32} {maturity:>2}/10 {comment}", entry.title);
            }
            None => println!("{:<32}  (not in song list)", entry.title),
        }
    }
}

/// # Errors
///
/// Stops at the first title outside the song list.
pub fn session_add(app: &mut App, date: NaiveDate, titles: &[String]) -> Result<()> {
    for title in titles {
        if session::add_to_session(&mut app.store, title, date)? {
            println!("Added '{title}' to {}", song::format_date(date));
        } else {
            println!("'{title}' is already recorded for {}", song::format_date(date));
        }
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if the history cannot be rewritten. Removals that
/// already happened keep their undo slots.
pub fn session_remove(app: &mut App, date: NaiveDate, titles: &[String]) -> Result<()> {
    let mut state = app.session_state()?;
    let mut result = Ok(());
    for title in titles {
        match session::remove_from_session(&mut app.store, &mut state, title, date) {
            Ok(RemovalOutcome::Removed(count)) => {
                println!("Removed '{title}' from {} ({count} rows)", song::format_date(date));
            }
            Ok(RemovalOutcome::NotInSession) => {
                println!("'{title}' was not played on {}", song::format_date(date));
            }
            Err(e) => {
                result = Err(e);
                break;
            }
        }
    }
    state.save(&app.paths)?;
    result
}

/// # Errors
///
/// Returns an error if the history cannot be written.
pub fn session_undo(app: &mut App) -> Result<()> {
    let mut state = app.session_state()?;
    let outcome = session::undo_last_removal(&mut app.store, &mut state)?;
    state.save(&app.paths)?;
    match outcome {
        UndoOutcome::Restored(entries) => {
            for entry in entries {
                let date = entry.played_on.map(song::format_date).unwrap_or_default();
                println!("Restored '{}' on {date}", entry.title);
            }
        }
        UndoOutcome::NothingToUndo => println!("Nothing to undo"),
    }
    Ok(())
}

/// # Errors
///
/// Returns an error for unknown titles or when the song list cannot be
/// saved.
pub fn session_review(app: &mut App, title: &str, maturity: Option<i64>, comment: Option<&str>) -> Result<()> {
    if maturity.is_none() && comment.is_none() {
        bail!("Nothing to review: pass --maturity and/or --comment");
    }
    let mut catalog = app.store.load_songs_for_update()?;
    session::review_song(&mut catalog, title, maturity, comment)?;
    app.store.save_songs(catalog.songs())?;
    if let Some(song) = catalog.get(title) {
        println!("{}", format_song_line(song));
    }
    Ok(())
}

pub fn songs_list(app: &mut App, tags: &[String]) {
    let catalog = app.store.cached_songs().filter_by_tags(tags);
    if catalog.is_empty() {
        println!("No songs found");
    }
    for song in catalog.iter() {
        println!("{}", tint(i64::from(song.maturity), format_song_line(song)));
    }
}

/// Fields of a new song beyond its title.
#[derive(Debug, Clone, Default)]
pub struct NewSong {
    pub maturity: Option<i64>,
    pub tags: Option<String>,
    pub comment: Option<String>,
    pub must_play: bool,
}

/// # Errors
///
/// Returns an error for blank or duplicate titles and when the song list
/// cannot be saved.
pub fn songs_add(app: &mut App, title: &str, new: NewSong) -> Result<()> {
    let mut song = Song::new(title).with_must_play(new.must_play);
    if let Some(maturity) = new.maturity {
        song = song.with_maturity(maturity);
    }
    if let Some(tags) = new.tags {
        song = song.with_tags(tags);
    }
    if let Some(comment) = new.comment {
        song.comment = comment;
    }

    let mut catalog = app.store.load_songs_for_update()?;
    catalog.add(song)?;
    app.store.save_songs(catalog.songs())?;
    info!("Added song '{}'", title.trim());
    println!("Added '{}'", title.trim());
    Ok(())
}

/// # Errors
///
/// Returns an error for unknown titles and when the song list cannot be
/// saved.
pub fn songs_remove(app: &mut App, title: &str) -> Result<()> {
    let mut catalog = app.store.load_songs_for_update()?;
    catalog
        .remove(title)
        .ok_or_else(|| anyhow!("'{title}' is not in the song list"))?;
    app.store.save_songs(catalog.songs())?;
    println!("Removed '{title}'. Its history is kept.");
    Ok(())
}

/// Field changes for `songs set`; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SongUpdate {
    pub maturity: Option<i64>,
    pub comment: Option<String>,
    pub tags: Option<String>,
    pub must_play: Option<bool>,
    pub favorite: Option<bool>,
    pub note: Option<String>,
    pub play_count: Option<u32>,
    pub last_played: Option<NaiveDate>,
}

impl SongUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(self, song: &mut Song) {
        if let Some(maturity) = self.maturity {
            song.maturity = song::clamp_maturity(maturity);
        }
        if let Some(comment) = self.comment {
            song.comment = comment;
        }
        if let Some(tags) = self.tags {
            song.tags = tags;
        }
        if let Some(must_play) = self.must_play {
            song.must_play = must_play;
        }
        if let Some(favorite) = self.favorite {
            song.favorite = favorite;
        }
        if let Some(note) = self.note {
            song.note = note;
        }
        if let Some(play_count) = self.play_count {
            song.play_count = play_count;
        }
        if let Some(last_played) = self.last_played {
            song.last_played = last_played;
        }
    }
}

/// # Errors
///
/// Returns an error for unknown titles, empty updates and when the song list
/// cannot be saved.
pub fn songs_set(app: &mut App, title: &str, update: SongUpdate) -> Result<()> {
    if update.is_empty() {
        bail!("Nothing to change for '{title}'");
    }
    let mut catalog = app.store.load_songs_for_update()?;
    let song = catalog
        .get_mut(title)
        .ok_or_else(|| anyhow!("'{title}' is not in the song list"))?;
    update.apply(song);
    let line = format_song_line(song);

    app.store.save_songs(catalog.songs())?;
    println!("{line}");
    Ok(())
}

pub fn songs_tags(app: &mut App) {
    for tag in app.store.cached_songs().all_tags() {
        println!("{tag}");
    }
}

pub fn history(app: &mut App, year: Option<i32>, month: Option<u32>) {
    let entries = app.store.cached_history();
    if year.is_none() && month.is_none() {
        let years: Vec<String> = analysis::history_years(&entries).iter().map(i32::to_string).collect();
        if !years.is_empty() {
            println!("Years: {}", years.join(", "));
        }
    }
    let rows = analysis::filter_history(&entries, year, month);
    if rows.is_empty() {
        println!("No matching rehearsals");
    }
    for entry in rows {
        let date = entry.played_on.map_or_else(|| "????-??-??".to_string(), song::format_date);
        println!("{date}  {}", entry.title);
    }
}

pub fn stats(app: &mut App, top: usize) {
    let catalog = app.store.cached_songs();
    let history = app.store.cached_history();
    let summary = analysis::summarize(&catalog, &history);

    println!("Songs:              {}", summary.song_count);
    println!("Rehearsals:         {}", summary.session_count);
    println!("Songs played:       {}", summary.total_plays);
    match summary.average_maturity {
        Some(avg) => println!("Average maturity:   {avg:.1}"),
        None => println!("Average maturity:   -"),
    }

    println!();
    println!("Maturity distribution:");
    for (maturity, count) in analysis::maturity_histogram(&catalog).iter().enumerate() {
        if *count > 0 {
            println!("{maturity:>3} {}", "#".repeat(*count));
        }
    }
    for (band, count) in analysis::band_counts(&catalog) {
        println!("{:<22} {count}", band.label());
    }

    let ranked = analysis::top_played(&history, top);
    if !ranked.is_empty() {
        println!();
        println!("Most played:");
        for (title, plays) in ranked {
            println!("{plays:>4}  {title}");
        }
    }
}

/// # Errors
///
/// Fails when neither destination is given or a file cannot be written.
pub fn export(app: &App, songs: Option<&PathBuf>, history: Option<&PathBuf>) -> Result<()> {
    if songs.is_none() && history.is_none() {
        bail!("Nothing to export: pass --songs and/or --history");
    }
    if let Some(dest) = songs {
        let rows = app.store.export_songs(dest)?;
        println!("Exported {rows} songs to {}", dest.display());
    }
    if let Some(dest) = history {
        let rows = app.store.export_history(dest)?;
        println!("Exported {rows} history rows to {}", dest.display());
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if the archive cannot be written.
pub fn backup(app: &App) -> Result<()> {
    let archive = app.store.backup()?;
    println!("Backup written to {}", archive.display());
    Ok(())
}

pub fn config_show(app: &App) {
    println!("Settings file: {}", app.paths.settings.display());
    println!("must_play_weight = {}", app.config.must_play_weight);
    println!("maturity_weight  = {}", app.config.maturity_weight);
    println!("default_count    = {}", app.config.default_count);
    println!("cache_ttl_secs   = {}", app.config.cache_ttl_secs);
}

/// # Errors
///
/// Returns an error for unknown keys, invalid values and when the settings
/// cannot be written.
pub fn config_set(app: &mut App, key: &str, value: &str) -> Result<()> {
    app.config.set(key, value)?;
    app.config.save(&app.paths.settings)?;
    debug!("Saved settings to {}", app.paths.settings.display());
    println!("{key} updated");
    Ok(())
}
