//! Selection weights for rehearsal planning.
//!
//! Each song's weight grows with how unready it is, how long it has not been
//! played and whether it is flagged must-play:
//!
//! ```text
//! weight = (10 - maturity) * maturity_weight
//!        + (recency_days / max_recency) * 5
//!        + must_play * must_play_weight
//! weight = max(weight, 0.1)
//! ```
//!
//! `max_recency` is the largest recency in the candidate set (1 if all songs
//! were played today), so the recency term is always within `0..=5`.

use crate::config::AppConfig;
use crate::song::{Song, MATURITY_MAX};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Floor applied to every weight; no song is ever unselectable.
pub const MIN_WEIGHT: f64 = 0.1;

/// Upper bound of the recency term.
pub const RECENCY_SCALE: f64 = 5.0;

/// The two tunable coefficients of the weight model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionWeights {
    pub must_play_weight: f64,
    pub maturity_weight: f64,
}

impl Default for SelectionWeights {
    fn default() -> Self {
        Self {
            must_play_weight: 2.0,
            maturity_weight: 1.0,
        }
    }
}

impl From<&AppConfig> for SelectionWeights {
    fn from(config: &AppConfig) -> Self {
        Self {
            must_play_weight: config.must_play_weight,
            maturity_weight: config.maturity_weight,
        }
    }
}

/// Everything a weight depends on besides the song itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightContext {
    pub today: NaiveDate,
    /// Largest recency in the candidate set, never below 1.
    pub max_recency: i64,
    pub weights: SelectionWeights,
}

impl WeightContext {
    /// Builds the context for weighing `songs` against each other.
    #[must_use]
    pub fn for_songs(songs: &[Song], today: NaiveDate, weights: SelectionWeights) -> Self {
        let max_recency = songs
            .iter()
            .map(|song| recency_days(song, today))
            .max()
            .unwrap_or(0)
            .max(1);

        Self {
            today,
            max_recency,
            weights,
        }
    }
}

/// Days since the song was last played; songs dated in the future count as 0.
#[must_use]
pub fn recency_days(song: &Song, today: NaiveDate) -> i64 {
    (today - song.last_played).num_days().max(0)
}

/// Selection weight of one song.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use songpicker::algorithm::{calculate_weight, SelectionWeights, WeightContext};
/// use songpicker::song::Song;
///
/// let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
/// let song = Song::new("Whole Lotta Love").with_maturity(2).with_must_play(true);
/// let context = WeightContext {
///     today,
///     max_recency: 1,
///     weights: SelectionWeights::default(),
/// };
///
/// assert!(calculate_weight(&song, &context) > 10.0);
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn calculate_weight(song: &Song, context: &WeightContext) -> f64 {
    let unreadiness = f64::from(MATURITY_MAX.saturating_sub(song.maturity));
    let recency = recency_days(song, context.today) as f64 / context.max_recency as f64;
    let must_play = if song.must_play { 1.0 } else { 0.0 };

    (unreadiness * context.weights.maturity_weight
        + recency * RECENCY_SCALE
        + must_play * context.weights.must_play_weight)
        .pipe(apply_floor)
}

#[inline]
fn apply_floor(weight: f64) -> f64 {
    weight.max(MIN_WEIGHT)
}

trait PipelineExt<T> {
    fn pipe<U>(self, f: impl FnOnce(T) -> U) -> U;
}

impl<T> PipelineExt<T> for T {
    #[inline]
    fn pipe<U>(self, f: impl FnOnce(T) -> U) -> U {
        f(self)
    }
}

/// Weights for a whole candidate set, in input order.
#[must_use = "Iterator should be consumed to calculate weights"]
pub fn batch_calculate_weights<'a>(
    songs: &'a [Song],
    context: &'a WeightContext,
) -> impl Iterator<Item = (&'a Song, f64)> + 'a {
    songs
        .iter()
        .map(move |song| (song, calculate_weight(song, context)))
}

/// Weight and probability of each song being drawn first.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedSong {
    pub title: String,
    pub weight: f64,
    pub probability: f64,
}

/// Weights normalized into a probability distribution, highest first.
#[must_use]
pub fn probabilities(songs: &[Song], today: NaiveDate, weights: SelectionWeights) -> Vec<WeightedSong> {
    let context = WeightContext::for_songs(songs, today, weights);
    let weighted: Vec<(&Song, f64)> = batch_calculate_weights(songs, &context).collect();
    let total: f64 = weighted.iter().map(|(_, w)| w).sum();

    let mut ranked: Vec<WeightedSong> = weighted
        .into_iter()
        .map(|(song, weight)| WeightedSong {
            title: song.title.clone(),
            weight,
            probability: weight / total,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.weight
            .partial_cmp(&a.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.title.cmp(&b.title))
    });
    ranked
}

/// Summary statistics of a weight distribution, for tuning the coefficients.
pub mod statistics {
    use super::*;

    /// Describes the spread of weights over a candidate set.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn analyze_weight_distribution(songs: &[Song], context: &WeightContext) -> Option<WeightStatistics> {
        if songs.is_empty() {
            return None;
        }

        let weights: Vec<f64> = batch_calculate_weights(songs, context)
            .map(|(_, weight)| weight)
            .collect();

        let mean = weights.iter().sum::<f64>() / weights.len() as f64;
        let variance = weights
            .iter()
            .map(|&weight| (weight - mean).powi(2))
            .sum::<f64>() / weights.len() as f64;

        Some(WeightStatistics {
            mean,
            std_deviation: variance.sqrt(),
            min: weights.iter().fold(f64::INFINITY, |a, &b| a.min(b)),
            max: weights.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b)),
            count: weights.len(),
        })
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct WeightStatistics {
        pub mean: f64,
        pub std_deviation: f64,
        pub min: f64,
        pub max: f64,
        pub count: usize,
    }
}
