//! Rehearsal statistics over the catalog and the play history.

use crate::presentation::MaturityBand;
use crate::song::{Catalog, HistoryEntry, MATURITY_MAX};
use chrono::Datelike;
use std::collections::{BTreeSet, HashMap};

/// Headline numbers for the analysis view.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub average_maturity: Option<f64>,
    /// Number of history rows, i.e. song plays across all rehearsals.
    pub total_plays: usize,
    pub song_count: usize,
    pub session_count: usize,
}

#[must_use]
pub fn summarize(catalog: &Catalog, history: &[HistoryEntry]) -> Summary {
    let sessions: BTreeSet<_> = history.iter().filter_map(|e| e.played_on).collect();
    Summary {
        average_maturity: average_maturity(catalog),
        total_plays: history.len(),
        song_count: catalog.len(),
        session_count: sessions.len(),
    }
}

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn average_maturity(catalog: &Catalog) -> Option<f64> {
    if catalog.is_empty() {
        return None;
    }
    let total: u32 = catalog.iter().map(|s| u32::from(s.maturity)).sum();
    Some(f64::from(total) / catalog.len() as f64)
}

/// Number of songs at each maturity value `0..=10`.
#[must_use]
pub fn maturity_histogram(catalog: &Catalog) -> [usize; MATURITY_MAX as usize + 1] {
    let mut bins = [0; MATURITY_MAX as usize + 1];
    for song in catalog.iter() {
        bins[usize::from(song.maturity.min(MATURITY_MAX))] += 1;
    }
    bins
}

/// Most played titles by history rows, ties broken alphabetically.
#[must_use]
pub fn top_played(history: &[HistoryEntry], limit: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for entry in history {
        *counts.entry(entry.title.as_str()).or_default() += 1;
    }

    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(title, count)| (title.to_string(), count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(limit);
    ranked
}

/// Songs per readiness band, lowest band first.
#[must_use]
pub fn band_counts(catalog: &Catalog) -> [(MaturityBand, usize); 3] {
    let mut counts = [(MaturityBand::Low, 0), (MaturityBand::Medium, 0), (MaturityBand::High, 0)];
    for song in catalog.iter() {
        let band = MaturityBand::of(i64::from(song.maturity));
        if let Some(slot) = counts.iter_mut().find(|(b, _)| *b == band) {
            slot.1 += 1;
        }
    }
    counts
}

/// Years that appear in the history, ascending.
#[must_use]
pub fn history_years(history: &[HistoryEntry]) -> Vec<i32> {
    history
        .iter()
        .filter_map(|e| e.played_on.map(|d| d.year()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// History rows matching the optional year and month, newest first. Rows
/// without a date only survive when no filter is set.
#[must_use]
pub fn filter_history(history: &[HistoryEntry], year: Option<i32>, month: Option<u32>) -> Vec<&HistoryEntry> {
    let mut rows: Vec<&HistoryEntry> = history
        .iter()
        .filter(|entry| match entry.played_on {
            Some(date) => {
                year.map_or(true, |y| date.year() == y) && month.map_or(true, |m| date.month() == m)
            }
            None => year.is_none() && month.is_none(),
        })
        .collect();
    // `None` sorts before `Some`, so undated rows end up last.
    rows.sort_by(|a, b| b.played_on.cmp(&a.played_on));
    rows
}
