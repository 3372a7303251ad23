//! Weighted song draws and the selection draft.
//!
//! A draw picks songs one after another without replacement: each pick is
//! proportional to the weights of the songs still left in the pool. The
//! random source is passed in, so callers decide between `thread_rng()` and a
//! seeded generator.

use crate::algorithm::{self, SelectionWeights, WeightContext};
use crate::song::Catalog;
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use log::{debug, info};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use std::fs;
use std::path::Path;

/// Draws `min(n, catalog.len())` distinct titles, favouring heavy songs.
///
/// # Errors
///
/// Returns an error if the weights cannot form a distribution, which only
/// happens for non-finite weight coefficients.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
/// use songpicker::algorithm::SelectionWeights;
/// use songpicker::selection::select_weighted;
/// use songpicker::song::{Catalog, Song};
///
/// let catalog = Catalog::from_songs(vec![Song::new("A"), Song::new("B"), Song::new("C")]);
/// let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
/// let mut rng = StdRng::seed_from_u64(7);
///
/// let picked = select_weighted(&catalog, 2, SelectionWeights::default(), today, &mut rng)?;
/// assert_eq!(picked.len(), 2);
/// assert_ne!(picked[0], picked[1]);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn select_weighted<R: Rng + ?Sized>(
    catalog: &Catalog,
    n: usize,
    weights: SelectionWeights,
    today: NaiveDate,
    rng: &mut R,
) -> Result<Vec<String>> {
    let songs = catalog.songs();
    let count = n.min(songs.len());
    if count == 0 {
        return Ok(Vec::new());
    }

    let context = WeightContext::for_songs(songs, today, weights);
    let song_weights: Vec<f64> = algorithm::batch_calculate_weights(songs, &context)
        .map(|(_, weight)| weight)
        .collect();
    let mut distribution = WeightedIndex::new(&song_weights)
        .context("Song weights do not form a valid distribution")?;

    let mut picked = Vec::with_capacity(count);
    for round in 0..count {
        let index = distribution.sample(rng);
        picked.push(songs[index].title.clone());
        // Drop the pick from the pool; skipped after the last round since an
        // all-zero distribution is rejected.
        if round + 1 < count {
            distribution
                .update_weights(&[(index, &0.0)])
                .context("Failed to remove drawn song from the pool")?;
        }
    }

    debug!("Drew {count} of {} songs: {picked:?}", songs.len());
    Ok(picked)
}

/// Lifecycle state of a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftState {
    Empty,
    Drafted,
}

/// Songs chosen for the next rehearsal but not yet committed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    titles: Vec<String>,
}

impl Draft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> DraftState {
        if self.titles.is_empty() {
            DraftState::Empty
        } else {
            DraftState::Drafted
        }
    }

    #[must_use]
    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.titles.len()
    }

    #[must_use]
    pub fn contains(&self, title: &str) -> bool {
        self.titles.iter().any(|t| t == title)
    }

    /// Replaces the draft with a fresh weighted draw.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`select_weighted`].
    pub fn draw<R: Rng + ?Sized>(
        &mut self,
        catalog: &Catalog,
        n: usize,
        weights: SelectionWeights,
        today: NaiveDate,
        rng: &mut R,
    ) -> Result<&[String]> {
        self.titles = select_weighted(catalog, n, weights, today, rng)?;
        info!("Drafted {} songs", self.titles.len());
        Ok(&self.titles)
    }

    /// Appends a catalog song by hand. Returns `false` if it was already
    /// drafted.
    ///
    /// # Errors
    ///
    /// Returns an error if `title` is not in the catalog.
    pub fn add_manual(&mut self, title: &str, catalog: &Catalog) -> Result<bool> {
        let title = title.trim();
        if !catalog.contains(title) {
            bail!("'{title}' is not in the song list");
        }
        if self.contains(title) {
            return Ok(false);
        }
        self.titles.push(title.to_string());
        Ok(true)
    }

    /// Drops one title from the draft.
    pub fn remove(&mut self, title: &str) -> bool {
        let before = self.titles.len();
        self.titles.retain(|t| t != title);
        self.titles.len() != before
    }

    pub fn clear(&mut self) {
        self.titles.clear();
    }

    /// Reads a newline separated draft file. A missing file is an empty draft.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read draft {}", path.display()))?;

        let mut draft = Self::new();
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if !draft.contains(line) {
                draft.titles.push(line.to_string());
            }
        }
        Ok(draft)
    }

    /// Rewrites the draft file with one title per line.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut text = self.titles.join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        fs::write(path, text).with_context(|| format!("Failed to write draft {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::song::Song;
    use chrono::Duration;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::{HashMap, HashSet};
    use tempfile::TempDir;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn band_catalog(size: usize) -> Catalog {
        Catalog::from_songs((0..size).map(|i| {
            Song::new(format!("Song {i}"))
                .with_maturity((i % 11) as i64)
                .with_must_play(i % 4 == 0)
                .with_last_played(today() - Duration::days((i * 7) as i64))
        }))
    }

    #[test]
    fn test_returns_min_of_n_and_catalog_size_distinct() {
        let mut rng = StdRng::seed_from_u64(42);
        for size in [0, 1, 3, 12] {
            let catalog = band_catalog(size);
            for n in [0, 1, 5, 20] {
                let picked =
                    select_weighted(&catalog, n, SelectionWeights::default(), today(), &mut rng).unwrap();
                assert_eq!(picked.len(), n.min(size));

                let unique: HashSet<&String> = picked.iter().collect();
                assert_eq!(unique.len(), picked.len(), "draw must not repeat songs");
                assert!(picked.iter().all(|t| catalog.contains(t)));
            }
        }
    }

    #[test]
    fn test_empty_catalog_returns_empty() {
        let mut rng = StdRng::seed_from_u64(1);
        let picked =
            select_weighted(&Catalog::new(), 5, SelectionWeights::default(), today(), &mut rng).unwrap();
        assert!(picked.is_empty());
    }

    #[test]
    fn test_same_seed_same_draw() {
        let catalog = band_catalog(20);
        let first = select_weighted(
            &catalog,
            5,
            SelectionWeights::default(),
            today(),
            &mut StdRng::seed_from_u64(99),
        )
        .unwrap();
        let second = select_weighted(
            &catalog,
            5,
            SelectionWeights::default(),
            today(),
            &mut StdRng::seed_from_u64(99),
        )
        .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_heavy_song_dominates_first_pick() {
        // weight(A) = 15, weight(B) = 2.05, so A leads ~88% of draws.
        let catalog = Catalog::from_songs(vec![
            Song::new("A")
                .with_maturity(2)
                .with_must_play(true)
                .with_last_played(today() - Duration::days(100)),
            Song::new("B")
                .with_maturity(8)
                .with_last_played(today() - Duration::days(1)),
        ]);
        let mut rng = StdRng::seed_from_u64(2024);
        let mut first_picks: HashMap<String, usize> = HashMap::new();
        for _ in 0..2000 {
            let picked =
                select_weighted(&catalog, 1, SelectionWeights::default(), today(), &mut rng).unwrap();
            *first_picks.entry(picked[0].clone()).or_default() += 1;
        }

        let a = first_picks.get("A").copied().unwrap_or(0);
        let b = first_picks.get("B").copied().unwrap_or(0);
        assert!(a > 1600 && a < 1900, "A picked {a} times");
        assert!(b > 0, "B must stay selectable");
    }

    #[test]
    fn test_draft_lifecycle_and_manual_add() {
        let catalog = band_catalog(6);
        let mut draft = Draft::new();
        assert_eq!(draft.state(), DraftState::Empty);

        let mut rng = StdRng::seed_from_u64(5);
        draft
            .draw(&catalog, 3, SelectionWeights::default(), today(), &mut rng)
            .unwrap();
        assert_eq!(draft.state(), DraftState::Drafted);
        assert_eq!(draft.len(), 3);

        let extra = catalog
            .titles()
            .find(|t| !draft.contains(t))
            .unwrap()
            .to_string();
        assert!(draft.add_manual(&extra, &catalog).unwrap());
        assert!(!draft.add_manual(&extra, &catalog).unwrap());
        assert!(draft.add_manual("Not A Song", &catalog).is_err());
        assert_eq!(draft.len(), 4);

        assert!(draft.remove(&extra));
        draft.clear();
        assert_eq!(draft.state(), DraftState::Empty);
    }

    #[test]
    fn test_draft_file_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("auswahl.txt");
        assert!(Draft::load(&path).unwrap().is_empty());

        let catalog = Catalog::from_songs(vec![Song::new("Für Elise"), Song::new("Jump")]);
        let mut draft = Draft::new();
        draft.add_manual("Jump", &catalog).unwrap();
        draft.add_manual("Für Elise", &catalog).unwrap();
        draft.save(&path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "Jump\nFür Elise\n");
        assert_eq!(Draft::load(&path).unwrap(), draft);
    }
}
