//! Rehearsal song picker that learns which songs need practice.
//!
//! Core modules:
//! - [`algorithm`] - Song weight model
//! - [`selection`] - Weighted draws and the selection draft
//! - [`session`] - Committing rehearsals and revising past ones
//! - [`store`] - CSV record store for songs and history
//! - [`song`] - Song, history and catalog types
//!
//! ### Supporting Modules
//!
//! - [`config`] - Data directory layout and persisted settings
//! - [`backup`] - Timestamped zip archives of the data files
//! - [`analysis`] - Statistics over the catalog and history
//! - [`presentation`] - Maturity colors and labels
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`commands`] - Handlers behind each subcommand
//! - [`completion`] - Shell completion generation
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use rand::thread_rng;
//! use songpicker::config::{AppConfig, DataPaths};
//! use songpicker::session::{self, SessionState};
//! use songpicker::store::RecordStore;
//! use songpicker::algorithm::SelectionWeights;
//!
//! let paths = DataPaths::in_dir("/srv/band");
//! let config = AppConfig::load(&paths.settings);
//! let mut store = RecordStore::new(paths.clone(), config.cache_ttl());
//!
//! // Draw five songs for the next rehearsal
//! let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
//! let mut state = SessionState::load(&paths)?;
//! let catalog = store.cached_songs();
//! state.draft.draw(&catalog, 5, SelectionWeights::from(&config), today, &mut thread_rng())?;
//!
//! // After the rehearsal, record what was played
//! let report = session::commit_selection(&mut store, &mut state, today)?;
//! println!("Recorded {} songs", report.committed.len());
//! state.save(&paths)?;
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Weight Model
//!
//! Each song gets
//!
//! ```text
//! (10 - maturity) * maturity_weight
//!   + days_since_played / max_days_since_played * 5
//!   + must_play * must_play_weight
//! ```
//!
//! floored at 0.1 so no song ever drops out of the draw. Songs are then drawn
//! one by one without replacement, proportional to the remaining weights.
//!
//! ## Error Handling
//!
//! Fallible operations return `anyhow::Result`. Reads of the song list and
//! history are fail-soft: a broken file is logged and treated as empty, while
//! writes always report their errors. Commands that rewrite the song list read
//! it strictly and refuse to save when that read fails.

pub mod algorithm;
pub mod analysis;
pub mod backup;
pub mod cli;
pub mod commands;
pub mod completion;
pub mod config;
pub mod presentation;
pub mod selection;
pub mod session;
pub mod song;
pub mod store;
