//! # Songpicker
//!
//! Picks songs for band rehearsals. Songs that are not stage ready yet, songs
//! that have not been played for a while and must-play songs come up more
//! often. After a rehearsal the selection is committed, which updates play
//! counts and the history the next draw learns from.
//!
//! ## Usage
//!
//! ```bash
//! # Draw the next rehearsal's songs
//! songpicker pick -n 6
//!
//! # Record them as played today
//! songpicker commit
//!
//! # Rate a song after the rehearsal
//! songpicker session review "Highway Star" --maturity 7 --comment "solo sits"
//! ```

use anyhow::Result;
use clap::{CommandFactory, Parser};
use log::debug;
use songpicker::cli::{self, Command, ConfigAction, DraftAction, SessionAction, SongsAction};
use songpicker::commands::{self, App, NewSong, PickOptions, SongUpdate};
use songpicker::completion;
use songpicker::config::DataPaths;

/// Main entry point for Songpicker.
///
/// Initializes logging, parses command-line arguments and routes commands to
/// the handlers in [`songpicker::commands`].
///
/// # Logging
///
/// Controlled via `RUST_LOG`:
/// - `RUST_LOG=debug songpicker pick` - Enable debug logging
/// - `RUST_LOG=songpicker::store=trace songpicker stats` - Module-specific logging
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();
    debug!("Parsed arguments: {args:?}");

    match args.command {
        Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(shell), &mut cmd);
            return Ok(());
        }
        Command::CompleteSongs => {
            // Completion output must never turn into an error.
            if let Ok(paths) = match args.data_dir.as_deref() {
                Some(dir) => Ok(DataPaths::in_dir(dir)),
                None => songpicker::config::get_data_dir().map(DataPaths::in_dir),
            } {
                completion::print_song_completions(&paths);
            }
            return Ok(());
        }
        _ => {}
    }

    let mut app = App::open(args.data_dir.as_deref())?;

    match args.command {
        Command::Pick {
            count,
            must_play_weight,
            maturity_weight,
            tags,
            seed,
            verbose,
        } => {
            let options = PickOptions {
                count,
                must_play_weight,
                maturity_weight,
                tags,
                seed,
                verbose,
            };
            commands::pick(&mut app, &options, commands::today())?;
        }
        Command::Draft { action } => match action {
            DraftAction::Show => commands::draft_show(&app)?,
            DraftAction::Add { title } => commands::draft_add(&mut app, &title)?,
            DraftAction::Remove { title } => commands::draft_remove(&app, &title)?,
            DraftAction::Clear => commands::draft_clear(&app)?,
        },
        Command::Commit { date } => {
            commands::commit(&mut app, date.unwrap_or_else(commands::today))?;
        }
        Command::Session { action } => match action {
            SessionAction::Dates => commands::session_dates(&mut app),
            SessionAction::Show { date } => commands::session_show(&mut app, date),
            SessionAction::Add { date, titles } => commands::session_add(&mut app, date, &titles)?,
            SessionAction::Remove { date, titles } => commands::session_remove(&mut app, date, &titles)?,
            SessionAction::Undo => commands::session_undo(&mut app)?,
            SessionAction::Review {
                title,
                maturity,
                comment,
            } => commands::session_review(&mut app, &title, maturity, comment.as_deref())?,
        },
        Command::Songs { action } => match action {
            SongsAction::List { tags } => commands::songs_list(&mut app, &tags),
            SongsAction::Add {
                title,
                maturity,
                tags,
                comment,
                must_play,
            } => {
                let new = NewSong {
                    maturity,
                    tags,
                    comment,
                    must_play,
                };
                commands::songs_add(&mut app, &title, new)?;
            }
            SongsAction::Remove { title } => commands::songs_remove(&mut app, &title)?,
            SongsAction::Set {
                title,
                maturity,
                comment,
                tags,
                must_play,
                favorite,
                note,
                play_count,
                last_played,
            } => {
                let update = SongUpdate {
                    maturity,
                    comment,
                    tags,
                    must_play,
                    favorite,
                    note,
                    play_count,
                    last_played,
                };
                commands::songs_set(&mut app, &title, update)?;
            }
            SongsAction::Tags => commands::songs_tags(&mut app),
        },
        Command::History { year, month } => commands::history(&mut app, year, month),
        Command::Stats { top } => commands::stats(&mut app, top),
        Command::Export { songs, history } => {
            commands::export(&app, songs.as_ref(), history.as_ref())?;
        }
        Command::Backup => commands::backup(&app)?,
        Command::Config { action } => match action {
            ConfigAction::Show => commands::config_show(&app),
            ConfigAction::Set { key, value } => commands::config_set(&mut app, &key, &value)?,
        },
        Command::Completion { .. } | Command::CompleteSongs => {}
    }

    Ok(())
}
