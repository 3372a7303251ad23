//! # Command-Line Interface Module
//!
//! This module defines the command-line interface for Songpicker using Clap
//! derive macros.
//!
//! ## Commands
//!
//! - `pick`: Draw songs for the next rehearsal into the draft
//! - `draft`: Inspect or hand-edit the draft
//! - `commit`: Record the draft as played on a date
//! - `session`: Revise a past rehearsal (add, remove, undo, review)
//! - `songs`: Maintain the song list
//! - `history`, `stats`: Look back at past rehearsals
//! - `export`, `backup`: Copy the data files elsewhere
//!
//! ## Examples
//!
//! ```bash
//! songpicker pick -n 6 --tag cover
//! songpicker draft add "Highway Star"
//! songpicker commit --date 2024-05-17
//! songpicker session remove 2024-05-17 "Highway Star"
//! songpicker session undo
//! ```

use crate::song;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Parses dates given on the command line (`2024-05-17`, `17.05.2024`, ...).
pub fn parse_date_arg(raw: &str) -> Result<NaiveDate, String> {
    song::parse_date(raw).ok_or_else(|| format!("'{raw}' is not a date, expected YYYY-MM-DD"))
}

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "songpicker")]
#[command(about = "Songpicker: weighted rehearsal song selection with maturity and play history")]
#[command(version)]
pub struct Args {
    /// Directory holding the song list, history, settings and backups
    #[arg(long, global = true, env = "SONGPICKER_DATA_DIR", value_hint = clap::ValueHint::DirPath)]
    pub data_dir: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Enumeration of all available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Draw songs for the next rehearsal
    ///
    /// Replaces the current draft with a weighted random draw. Songs with low
    /// maturity, songs not played for a long time and must-play songs are
    /// favoured, but every song keeps a chance.
    Pick {
        /// Number of songs to draw (defaults to the configured count)
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Override the must-play weight for this draw
        #[arg(long)]
        must_play_weight: Option<f64>,

        /// Override the maturity weight for this draw
        #[arg(long)]
        maturity_weight: Option<f64>,

        /// Only draw songs carrying one of these tags (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Seed for a reproducible draw
        #[arg(long)]
        seed: Option<u64>,

        /// Show each song's weight and probability
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show or edit the current draft
    Draft {
        #[command(subcommand)]
        action: DraftAction,
    },

    /// Record the draft as a rehearsal
    ///
    /// Sets the last-played date and bumps the play count of every drafted
    /// song, appends the songs to the history and clears the draft.
    Commit {
        /// Rehearsal date (defaults to today)
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
    },

    /// Revise a past rehearsal
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Maintain the song list
    Songs {
        #[command(subcommand)]
        action: SongsAction,
    },

    /// List played songs, newest first
    History {
        /// Only rehearsals in this year
        #[arg(long)]
        year: Option<i32>,

        /// Only rehearsals in this month (1-12)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,
    },

    /// Show rehearsal statistics
    Stats {
        /// How many of the most played songs to list
        #[arg(long, default_value = "10")]
        top: usize,
    },

    /// Export song list and/or history in the storage format
    Export {
        /// Destination for the song list
        #[arg(long, value_hint = clap::ValueHint::FilePath)]
        songs: Option<PathBuf>,

        /// Destination for the history
        #[arg(long, value_hint = clap::ValueHint::FilePath)]
        history: Option<PathBuf>,
    },

    /// Zip the song list and history into the backup directory
    Backup,

    /// Show or change persisted settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    ///
    /// Usage: songpicker completion bash > ~/.local/share/bash-completion/completions/songpicker
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },

    /// List song titles for completion (hidden command)
    #[command(hide = true)]
    CompleteSongs,
}

/// Draft actions
#[derive(Subcommand, Debug)]
pub enum DraftAction {
    /// Show the drafted songs
    Show,

    /// Add a song by hand
    Add {
        #[arg(value_hint = clap::ValueHint::Other)]
        title: String,
    },

    /// Drop a song from the draft
    Remove {
        #[arg(value_hint = clap::ValueHint::Other)]
        title: String,
    },

    /// Empty the draft
    Clear,
}

/// Session revision actions
#[derive(Subcommand, Debug)]
pub enum SessionAction {
    /// List rehearsal dates, newest first
    Dates,

    /// Show the songs played on a date
    Show {
        #[arg(value_parser = parse_date_arg)]
        date: NaiveDate,
    },

    /// Add songs to a past rehearsal (play counts stay unchanged)
    Add {
        #[arg(value_parser = parse_date_arg)]
        date: NaiveDate,

        #[arg(required = true)]
        titles: Vec<String>,
    },

    /// Remove songs from a past rehearsal
    Remove {
        #[arg(value_parser = parse_date_arg)]
        date: NaiveDate,

        #[arg(required = true)]
        titles: Vec<String>,
    },

    /// Restore the most recently removed songs
    Undo,

    /// Update a song's maturity and comment after a rehearsal
    Review {
        title: String,

        /// New maturity (0-10)
        #[arg(long, value_parser = clap::value_parser!(i64).range(0..=10))]
        maturity: Option<i64>,

        /// New comment
        #[arg(long)]
        comment: Option<String>,
    },
}

/// Song list actions
#[derive(Subcommand, Debug)]
pub enum SongsAction {
    /// List songs with maturity and play statistics
    List {
        /// Only songs carrying one of these tags (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },

    /// Add a new song
    Add {
        title: String,

        #[arg(long, value_parser = clap::value_parser!(i64).range(0..=10))]
        maturity: Option<i64>,

        /// Comma separated tags
        #[arg(long)]
        tags: Option<String>,

        #[arg(long)]
        comment: Option<String>,

        #[arg(long)]
        must_play: bool,
    },

    /// Delete a song from the list (its history stays)
    Remove { title: String },

    /// Change fields of an existing song
    Set {
        title: String,

        #[arg(long, value_parser = clap::value_parser!(i64).range(0..=10))]
        maturity: Option<i64>,

        #[arg(long)]
        comment: Option<String>,

        /// Comma separated tags
        #[arg(long)]
        tags: Option<String>,

        #[arg(long)]
        must_play: Option<bool>,

        #[arg(long)]
        favorite: Option<bool>,

        #[arg(long)]
        note: Option<String>,

        #[arg(long)]
        play_count: Option<u32>,

        #[arg(long, value_parser = parse_date_arg)]
        last_played: Option<NaiveDate>,
    },

    /// List every tag in use
    Tags,
}

/// Settings actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the current settings
    Show,

    /// Change a setting (must_play_weight, maturity_weight, default_count, cache_ttl_secs)
    Set { key: String, value: String },
}
