//! Applying rehearsal outcomes to the catalog and the history.
//!
//! Two flows write through the [`RecordStore`]:
//!
//! - **commit**: a drafted selection becomes a rehearsal. Every drafted song
//!   gets its `last_played` date and play count bumped, and one history row
//!   per song is appended.
//! - **revise**: a past rehearsal is corrected by adding or removing history
//!   rows for that date. Removals can be undone, newest first.
//!
//! Catalog save and history append are separate writes. The draft is
//! cleared as soon as the catalog is saved, so a failed history append is
//! reported with the titles to add by hand and a second commit cannot count
//! the same rehearsal twice.

use crate::config::DataPaths;
use crate::selection::Draft;
use crate::song::{Catalog, HistoryEntry};
use crate::store::RecordStore;
use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use log::{info, warn};
use std::collections::BTreeSet;
use std::fs;

/// Interactive state of one editing session: the draft and the undo stack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub draft: Draft,
    /// One slot per removal, newest last.
    undo: Vec<Vec<HistoryEntry>>,
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    /// Restores the state a previous CLI invocation left behind. A corrupt
    /// undo file is logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the draft file exists but cannot be read.
    pub fn load(paths: &DataPaths) -> Result<Self> {
        let draft = Draft::load(&paths.draft)?;
        let undo = if paths.undo.exists() {
            fs::read_to_string(&paths.undo)
                .map_err(anyhow::Error::from)
                .and_then(|text| serde_json::from_str(&text).map_err(anyhow::Error::from))
                .unwrap_or_else(|e| {
                    warn!("Ignoring unreadable undo stack {}: {e}", paths.undo.display());
                    Vec::new()
                })
        } else {
            Vec::new()
        };
        Ok(Self { draft, undo })
    }

    /// Persists draft and undo stack for the next invocation.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be written.
    pub fn save(&self, paths: &DataPaths) -> Result<()> {
        self.draft.save(&paths.draft)?;
        let text = serde_json::to_string_pretty(&self.undo).context("Failed to serialize undo stack")?;
        fs::write(&paths.undo, text)
            .with_context(|| format!("Failed to write undo stack {}", paths.undo.display()))
    }
}

/// What a commit changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReport {
    pub date: NaiveDate,
    pub committed: Vec<String>,
    /// Drafted titles no longer in the catalog. They still get history rows.
    pub unknown: Vec<String>,
}

/// Marks `titles` as played on `date`. Returns titles missing from the
/// catalog.
pub fn apply_commit(catalog: &mut Catalog, titles: &[String], date: NaiveDate) -> Vec<String> {
    let mut unknown = Vec::new();
    for title in titles {
        match catalog.get_mut(title) {
            Some(song) => {
                song.last_played = date;
                song.play_count = song.play_count.saturating_add(1);
            }
            None => unknown.push(title.clone()),
        }
    }
    unknown
}

/// Commits the drafted selection as a rehearsal on `date` and clears the
/// draft.
///
/// # Errors
///
/// Fails for an empty draft and when either write fails. If the song list
/// cannot be read or saved nothing changes and the draft is kept. Once the
/// song list is saved the draft is cleared even if the history append fails,
/// so committing again cannot bump play counts twice; the error names the
/// titles to add with `session add`.
pub fn commit_selection(store: &mut RecordStore, state: &mut SessionState, date: NaiveDate) -> Result<CommitReport> {
    if state.draft.is_empty() {
        bail!("Nothing to commit: the selection is empty");
    }
    let titles = state.draft.titles().to_vec();

    let mut catalog = store
        .load_songs_for_update()
        .context("Selection not committed")?;
    let unknown = apply_commit(&mut catalog, &titles, date);
    for title in &unknown {
        warn!("'{title}' is drafted but no longer in the song list");
    }

    store
        .save_songs(catalog.songs())
        .context("Selection not committed: saving the song list failed")?;
    state.draft.clear();

    store.append_history(&titles, date).with_context(|| {
        format!(
            "Play counts were updated for {date} but the history could not be written; \
             add the songs with `session add {date}`: {}",
            titles.join(", ")
        )
    })?;

    info!("Committed {} songs for {date}", titles.len());
    Ok(CommitReport {
        date,
        committed: titles,
        unknown,
    })
}

/// One played song of a session, with catalog context for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    pub title: String,
    /// `None` when the song is no longer in the catalog.
    pub maturity: Option<u8>,
    pub comment: Option<String>,
}

/// Distinct dated sessions, newest first.
#[must_use]
pub fn session_dates(history: &[HistoryEntry]) -> Vec<NaiveDate> {
    history
        .iter()
        .filter_map(|entry| entry.played_on)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .rev()
        .collect()
}

/// Joins the history rows of `date` with their catalog records.
#[must_use]
pub fn join_session(history: &[HistoryEntry], catalog: &Catalog, date: NaiveDate) -> Vec<SessionEntry> {
    history
        .iter()
        .filter(|entry| entry.played_on == Some(date))
        .map(|entry| {
            let song = catalog.get(&entry.title);
            SessionEntry {
                title: entry.title.clone(),
                maturity: song.map(|s| s.maturity),
                comment: song.map(|s| s.comment.clone()),
            }
        })
        .collect()
}

/// Songs played on `date`, read through the store cache.
pub fn session_entries(store: &mut RecordStore, date: NaiveDate) -> Vec<SessionEntry> {
    let history = store.cached_history();
    let catalog = store.cached_songs();
    join_session(&history, &catalog, date)
}

/// Adds a catalog song to the session on `date`. Play count and
/// `last_played` are left alone. Returns `false` if the song was already
/// listed for that date.
///
/// # Errors
///
/// Fails for titles outside the catalog and when the history cannot be
/// written.
pub fn add_to_session(store: &mut RecordStore, title: &str, date: NaiveDate) -> Result<bool> {
    let title = title.trim();
    if !store.cached_songs().contains(title) {
        bail!("'{title}' is not in the song list");
    }
    if store.cached_history().iter().any(|entry| entry.matches(title, date)) {
        return Ok(false);
    }

    store.append_history(&[title.to_string()], date)?;
    info!("Added '{title}' to the session on {date}");
    Ok(true)
}

/// Result of removing a song from a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalOutcome {
    /// This many rows were deleted and can be restored with undo.
    Removed(usize),
    NotInSession,
}

/// Deletes the rows for `title` on `date`. The removed rows are pushed onto
/// the undo stack as one slot before the file is rewritten.
///
/// # Errors
///
/// Returns an error if the history cannot be rewritten; the undo slot is
/// dropped again in that case.
pub fn remove_from_session(
    store: &mut RecordStore,
    state: &mut SessionState,
    title: &str,
    date: NaiveDate,
) -> Result<RemovalOutcome> {
    let matching: Vec<HistoryEntry> = store
        .load_history()
        .into_iter()
        .filter(|entry| entry.matches(title, date))
        .collect();
    if matching.is_empty() {
        return Ok(RemovalOutcome::NotInSession);
    }

    state.undo.push(matching);
    match store.remove_history(title, date) {
        Ok(removed) => {
            let count = removed.len();
            if let Some(slot) = state.undo.last_mut() {
                *slot = removed;
            }
            Ok(RemovalOutcome::Removed(count))
        }
        Err(e) => {
            state.undo.pop();
            Err(e)
        }
    }
}

/// Result of an undo request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoOutcome {
    Restored(Vec<HistoryEntry>),
    NothingToUndo,
}

/// Re-appends the most recently removed rows.
///
/// # Errors
///
/// Returns an error if the history cannot be written; the slot stays on the
/// stack so the undo can be retried.
pub fn undo_last_removal(store: &mut RecordStore, state: &mut SessionState) -> Result<UndoOutcome> {
    let Some(slot) = state.undo.pop() else {
        return Ok(UndoOutcome::NothingToUndo);
    };

    if let Err(e) = store.append_entries(&slot) {
        state.undo.push(slot);
        return Err(e);
    }
    info!("Restored {} history rows", slot.len());
    Ok(UndoOutcome::Restored(slot))
}

/// Post-rehearsal edit of a song's maturity and comment. Changes only the
/// in-memory catalog; call [`RecordStore::save_songs`] to persist.
///
/// # Errors
///
/// Returns an error if `title` is not in the catalog.
pub fn review_song(catalog: &mut Catalog, title: &str, maturity: Option<i64>, comment: Option<&str>) -> Result<()> {
    let song = catalog
        .get_mut(title)
        .ok_or_else(|| anyhow!("'{title}' is not in the song list"))?;
    if let Some(maturity) = maturity {
        song.maturity = crate::song::clamp_maturity(maturity);
    }
    if let Some(comment) = comment {
        song.comment = comment.to_string();
    }
    Ok(())
}

/// Applies `adds`, then `removes` to the session on `date` and returns the
/// updated session.
///
/// # Errors
///
/// Stops at the first failing add or remove. Earlier changes stay applied.
pub fn revise_session(
    store: &mut RecordStore,
    state: &mut SessionState,
    date: NaiveDate,
    adds: &[String],
    removes: &[String],
) -> Result<Vec<SessionEntry>> {
    for title in adds {
        add_to_session(store, title, date)?;
    }
    for title in removes {
        if remove_from_session(store, state, title, date)? == RemovalOutcome::NotInSession {
            warn!("'{title}' was not played on {date}");
        }
    }
    Ok(session_entries(store, date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::song::Song;
    use std::time::Duration;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup(temp: &TempDir) -> RecordStore {
        let mut store = RecordStore::new(DataPaths::in_dir(temp.path()), Duration::from_secs(300));
        let mut comment = Song::new("B").with_maturity(8);
        comment.comment = "Intro zu schnell".to_string();
        store
            .save_songs(&[Song::new("A").with_maturity(3), comment, Song::new("C")])
            .unwrap();
        store
    }

    #[test]
    fn test_commit_updates_catalog_and_history() {
        let temp = TempDir::new().unwrap();
        let mut store = setup(&temp);
        let catalog = store.load_songs();
        let mut state = SessionState::new();
        state.draft.add_manual("A", &catalog).unwrap();
        state.draft.add_manual("C", &catalog).unwrap();

        let report = commit_selection(&mut store, &mut state, date(2024, 3, 1)).unwrap();
        assert_eq!(report.committed, vec!["A", "C"]);
        assert!(report.unknown.is_empty());
        assert!(state.draft.is_empty());

        let catalog = store.load_songs();
        assert_eq!(catalog.get("A").unwrap().play_count, 1);
        assert_eq!(catalog.get("A").unwrap().last_played, date(2024, 3, 1));
        assert_eq!(catalog.get("B").unwrap().play_count, 0);
        assert_eq!(catalog.get("C").unwrap().play_count, 1);

        assert_eq!(
            store.load_history(),
            vec![
                HistoryEntry::new("A", date(2024, 3, 1)),
                HistoryEntry::new("C", date(2024, 3, 1)),
            ]
        );
    }

    #[test]
    fn test_commit_rejects_empty_draft() {
        let temp = TempDir::new().unwrap();
        let mut store = setup(&temp);
        let mut state = SessionState::new();
        assert!(commit_selection(&mut store, &mut state, date(2024, 3, 1)).is_err());
        assert!(store.load_history().is_empty());
    }

    #[test]
    fn test_commit_keeps_draft_when_song_list_is_unreadable() {
        let temp = TempDir::new().unwrap();
        let mut store = setup(&temp);
        let catalog = store.load_songs();
        let mut state = SessionState::new();
        state.draft.add_manual("A", &catalog).unwrap();

        let songs = store.paths().songs.clone();
        fs::remove_file(&songs).unwrap();
        fs::create_dir(&songs).unwrap();

        assert!(commit_selection(&mut store, &mut state, date(2024, 3, 1)).is_err());
        assert_eq!(state.draft.titles(), ["A".to_string()]);
        assert!(songs.is_dir());
        assert!(store.load_history().is_empty());
    }

    #[test]
    fn test_history_failure_after_save_clears_draft() {
        let temp = TempDir::new().unwrap();
        let mut store = setup(&temp);
        let catalog = store.load_songs();
        let mut state = SessionState::new();
        state.draft.add_manual("A", &catalog).unwrap();
        fs::create_dir(&store.paths().history).unwrap();

        let err = commit_selection(&mut store, &mut state, date(2024, 3, 1)).unwrap_err();
        assert!(format!("{err:#}").contains("session add 2024-03-01"));
        assert!(state.draft.is_empty());
        assert_eq!(store.load_songs().get("A").unwrap().play_count, 1);
    }

    #[test]
    fn test_commit_twice_increments_twice() {
        let temp = TempDir::new().unwrap();
        let mut store = setup(&temp);
        let catalog = store.load_songs();
        let mut state = SessionState::new();

        for day in [1, 8] {
            state.draft.add_manual("B", &catalog).unwrap();
            commit_selection(&mut store, &mut state, date(2024, 3, day)).unwrap();
        }

        let b = store.load_songs().get("B").cloned().unwrap();
        assert_eq!(b.play_count, 2);
        assert_eq!(b.last_played, date(2024, 3, 8));
        assert_eq!(b.maturity, 8);
        assert_eq!(store.load_history().len(), 2);
    }

    #[test]
    fn test_session_view_joins_catalog() {
        let temp = TempDir::new().unwrap();
        let mut store = setup(&temp);
        store
            .append_history(&["B".to_string(), "Gone".to_string()], date(2024, 3, 1))
            .unwrap();
        store.append_history(&["A".to_string()], date(2024, 3, 8)).unwrap();

        let entries = session_entries(&mut store, date(2024, 3, 1));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].maturity, Some(8));
        assert_eq!(entries[0].comment.as_deref(), Some("Intro zu schnell"));
        assert_eq!(entries[1].maturity, None);

        assert_eq!(
            session_dates(&store.load_history()),
            vec![date(2024, 3, 8), date(2024, 3, 1)]
        );
    }

    #[test]
    fn test_add_to_session_leaves_counters_alone() {
        let temp = TempDir::new().unwrap();
        let mut store = setup(&temp);
        assert!(add_to_session(&mut store, "A", date(2024, 2, 2)).unwrap());
        assert!(!add_to_session(&mut store, "A", date(2024, 2, 2)).unwrap());
        assert!(add_to_session(&mut store, "Unknown", date(2024, 2, 2)).is_err());

        let a = store.load_songs().get("A").cloned().unwrap();
        assert_eq!(a.play_count, 0);
        assert!(!a.was_played());
        assert_eq!(store.load_history(), vec![HistoryEntry::new("A", date(2024, 2, 2))]);
    }

    #[test]
    fn test_remove_then_undo_restores_exactly_that_row() {
        let temp = TempDir::new().unwrap();
        let mut store = setup(&temp);
        store
            .append_history(&["A".to_string(), "B".to_string()], date(2024, 3, 1))
            .unwrap();
        store.append_history(&["A".to_string()], date(2024, 3, 8)).unwrap();
        let mut state = SessionState::new();

        let outcome = remove_from_session(&mut store, &mut state, "A", date(2024, 3, 1)).unwrap();
        assert_eq!(outcome, RemovalOutcome::Removed(1));
        assert_eq!(store.load_history().len(), 2);
        assert!(state.can_undo());

        let restored = undo_last_removal(&mut store, &mut state).unwrap();
        assert_eq!(
            restored,
            UndoOutcome::Restored(vec![HistoryEntry::new("A", date(2024, 3, 1))])
        );

        let history = store.load_history();
        assert_eq!(history.len(), 3);
        assert_eq!(
            history.iter().filter(|e| e.matches("A", date(2024, 3, 1))).count(),
            1
        );
        assert_eq!(undo_last_removal(&mut store, &mut state).unwrap(), UndoOutcome::NothingToUndo);
    }

    #[test]
    fn test_undo_is_most_recent_first() {
        let temp = TempDir::new().unwrap();
        let mut store = setup(&temp);
        store
            .append_history(&["A".to_string(), "B".to_string()], date(2024, 3, 1))
            .unwrap();
        let mut state = SessionState::new();

        remove_from_session(&mut store, &mut state, "A", date(2024, 3, 1)).unwrap();
        remove_from_session(&mut store, &mut state, "B", date(2024, 3, 1)).unwrap();
        assert_eq!(state.undo_depth(), 2);

        match undo_last_removal(&mut store, &mut state).unwrap() {
            UndoOutcome::Restored(rows) => assert_eq!(rows[0].title, "B"),
            UndoOutcome::NothingToUndo => panic!("expected a restore"),
        }
        assert_eq!(store.load_history(), vec![HistoryEntry::new("B", date(2024, 3, 1))]);
    }

    #[test]
    fn test_remove_missing_row_pushes_nothing() {
        let temp = TempDir::new().unwrap();
        let mut store = setup(&temp);
        let mut state = SessionState::new();
        let outcome = remove_from_session(&mut store, &mut state, "A", date(2024, 3, 1)).unwrap();
        assert_eq!(outcome, RemovalOutcome::NotInSession);
        assert!(!state.can_undo());
    }

    #[test]
    fn test_review_requires_explicit_save() {
        let temp = TempDir::new().unwrap();
        let mut store = setup(&temp);
        let mut catalog = store.load_songs();

        review_song(&mut catalog, "A", Some(12), Some("sitzt")).unwrap();
        assert!(review_song(&mut catalog, "Nope", Some(1), None).is_err());
        assert_eq!(catalog.get("A").unwrap().maturity, 10);
        assert_eq!(store.load_songs().get("A").unwrap().maturity, 3);

        store.save_songs(catalog.songs()).unwrap();
        let a = store.load_songs().get("A").cloned().unwrap();
        assert_eq!(a.maturity, 10);
        assert_eq!(a.comment, "sitzt");
    }

    #[test]
    fn test_revise_session_adds_and_removes() {
        let temp = TempDir::new().unwrap();
        let mut store = setup(&temp);
        store.append_history(&["A".to_string()], date(2024, 3, 1)).unwrap();
        let mut state = SessionState::new();

        let view = revise_session(
            &mut store,
            &mut state,
            date(2024, 3, 1),
            &["B".to_string(), "C".to_string()],
            &["A".to_string()],
        )
        .unwrap();
        let titles: Vec<&str> = view.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "C"]);
        assert_eq!(state.undo_depth(), 1);
    }

    #[test]
    fn test_state_persists_between_invocations() {
        let temp = TempDir::new().unwrap();
        let mut store = setup(&temp);
        store.append_history(&["A".to_string()], date(2024, 3, 1)).unwrap();
        let paths = store.paths().clone();

        let mut state = SessionState::new();
        state.draft.add_manual("C", &store.load_songs()).unwrap();
        remove_from_session(&mut store, &mut state, "A", date(2024, 3, 1)).unwrap();
        state.save(&paths).unwrap();

        let mut reloaded = SessionState::load(&paths).unwrap();
        assert_eq!(reloaded, state);
        undo_last_removal(&mut store, &mut reloaded).unwrap();
        assert_eq!(store.load_history(), vec![HistoryEntry::new("A", date(2024, 3, 1))]);
    }
}
