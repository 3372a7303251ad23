//! # Integration Tests for Songpicker
//!
//! End-to-end tests from a user perspective: the CLI binary run against a
//! temporary data directory, and full rehearsal workflows through the library.

use anyhow::Result;
use chrono::NaiveDate;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const SONG_HEADER: &str =
    "Songtitel;Zuletzt_gespielt;Reifegrad;Anzahl_gespielt;Kommentar;Tags;Must_Play;Favorit;Notiz";

/// Test helper to create a data directory with a small song list.
fn create_test_data_dir() -> Result<TempDir> {
    let temp_dir = TempDir::new()?;
    let content = format!(
        "\u{feff}{SONG_HEADER}\n\
         Highway Star;2024-05-01;3;12;solo;rock,cover;True;False;\n\
         Jump;2024-04-12;8;30;;rock;False;True;keys\n\
         Für Elise;1900-01-01;1;0;;classic;False;False;\n\
         Smoke on the Water;2023-12-24;10;55;;rock,cover;False;False;\n"
    );
    fs::write(temp_dir.path().join("songliste.csv"), content)?;
    Ok(temp_dir)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    fn run(data_dir: &Path, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_songpicker"))
            .arg("--data-dir")
            .arg(data_dir)
            .args(args)
            .output()
            .expect("Failed to run songpicker")
    }

    fn stdout(output: &Output) -> String {
        String::from_utf8_lossy(&output.stdout).into_owned()
    }

    #[test]
    fn test_cli_help_displays_correctly() {
        let output = Command::new(env!("CARGO_BIN_EXE_songpicker"))
            .arg("--help")
            .output()
            .expect("Failed to run help command");

        let text = stdout(&output);
        assert!(output.status.success());
        assert!(text.contains("songpicker"));
        assert!(text.contains("pick"));
        assert!(text.contains("session"));
    }

    #[test]
    fn test_songs_list_shows_catalog() {
        let data = create_test_data_dir().unwrap();
        let output = run(data.path(), &["songs", "list", "--tag", "cover"]);
        assert!(output.status.success());

        let text = stdout(&output);
        assert!(text.contains("Highway Star"));
        assert!(text.contains("Smoke on the Water"));
        assert!(!text.contains("Jump"));
    }

    #[test]
    fn test_pick_commit_cycle() {
        let data = create_test_data_dir().unwrap();

        let picked = run(data.path(), &["pick", "-n", "2", "--seed", "3"]);
        assert!(picked.status.success(), "{}", String::from_utf8_lossy(&picked.stderr));
        let draft = fs::read_to_string(data.path().join("auswahl.txt")).unwrap();
        assert_eq!(draft.lines().count(), 2);

        let committed = run(data.path(), &["commit", "--date", "2024-06-01"]);
        assert!(committed.status.success(), "{}", String::from_utf8_lossy(&committed.stderr));
        assert!(stdout(&committed).contains("Recorded 2 songs for 2024-06-01"));

        let history = fs::read_to_string(data.path().join("spielhistorie.csv")).unwrap();
        assert!(history.starts_with('\u{feff}'));
        assert_eq!(history.matches("2024-06-01").count(), 2);
        assert!(fs::read_to_string(data.path().join("auswahl.txt")).unwrap().is_empty());

        // A second commit has nothing to record.
        assert!(!run(data.path(), &["commit"]).status.success());
    }

    #[test]
    fn test_session_remove_then_undo() {
        let data = create_test_data_dir().unwrap();
        assert!(run(data.path(), &["session", "add", "2024-06-07", "Jump", "Für Elise"]).status.success());
        assert!(run(data.path(), &["session", "remove", "2024-06-07", "Jump"]).status.success());

        let shown = stdout(&run(data.path(), &["session", "show", "2024-06-07"]));
        assert!(shown.contains("Für Elise"));
        assert!(!shown.contains("Jump"));

        let undone = stdout(&run(data.path(), &["session", "undo"]));
        assert!(undone.contains("Restored 'Jump'"));
        assert!(stdout(&run(data.path(), &["session", "undo"])).contains("Nothing to undo"));
    }

    #[test]
    fn test_unknown_song_is_rejected() {
        let data = create_test_data_dir().unwrap();
        let output = run(data.path(), &["draft", "add", "Stairway"]);
        assert!(!output.status.success());
        assert!(String::from_utf8_lossy(&output.stderr).contains("not in the song list"));
    }

    #[test]
    fn test_completion_generation() {
        let output = Command::new(env!("CARGO_BIN_EXE_songpicker"))
            .args(["completion", "bash"])
            .output()
            .expect("Failed to run completion command");
        assert!(output.status.success());
        assert!(stdout(&output).contains("songpicker"));
    }

    #[test]
    fn test_complete_songs_lists_titles() {
        let data = create_test_data_dir().unwrap();
        let text = stdout(&run(data.path(), &["complete-songs"]));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines.contains(&"\"Highway Star\""));
        assert!(lines.contains(&"Jump"));
    }
}

#[cfg(test)]
mod workflow_tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use songpicker::algorithm::SelectionWeights;
    use songpicker::config::DataPaths;
    use songpicker::session::{self, SessionState, UndoOutcome};
    use songpicker::store::RecordStore;
    use std::time::Duration;

    fn open_store(dir: &Path) -> RecordStore {
        RecordStore::new(DataPaths::in_dir(dir), Duration::from_secs(300))
    }

    #[test]
    fn test_missing_columns_get_defaults() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("songliste.csv"),
            "Songtitel;Reifegrad\nJump;7\n;4\nHighway Star;oops\n",
        )
        .unwrap();

        let catalog = open_store(temp.path()).load_songs();
        assert_eq!(catalog.len(), 2, "blank titles are dropped");
        let jump = catalog.get("Jump").unwrap();
        assert_eq!(jump.maturity, 7);
        assert!(!jump.must_play);
        assert_eq!(jump.play_count, 0);
        assert!(!jump.was_played());
        assert_eq!(catalog.get("Highway Star").unwrap().maturity, 5);
    }

    #[test]
    fn test_save_writes_all_columns_and_reloads() {
        let temp = create_test_data_dir().unwrap();
        let mut store = open_store(temp.path());
        let catalog = store.load_songs();
        store.save_songs(catalog.songs()).unwrap();

        let text = fs::read_to_string(temp.path().join("songliste.csv")).unwrap();
        assert!(text.starts_with(&format!("\u{feff}{SONG_HEADER}")));
        assert_eq!(open_store(temp.path()).load_songs(), catalog);

        // The previous file went into a backup archive first.
        let backups = fs::read_dir(temp.path().join("backups")).unwrap().count();
        assert_eq!(backups, 1);
    }

    #[test]
    fn test_full_rehearsal_cycle() {
        let temp = create_test_data_dir().unwrap();
        let paths = DataPaths::in_dir(temp.path());
        let mut store = open_store(temp.path());
        let mut state = SessionState::load(&paths).unwrap();
        let rehearsal = date(2024, 6, 1);

        let catalog = store.cached_songs();
        let mut rng = StdRng::seed_from_u64(8);
        state
            .draft
            .draw(&catalog, 3, SelectionWeights::default(), rehearsal, &mut rng)
            .unwrap();
        let drafted = state.draft.titles().to_vec();

        let report = session::commit_selection(&mut store, &mut state, rehearsal).unwrap();
        assert_eq!(report.committed, drafted);
        assert!(report.unknown.is_empty());
        assert!(state.draft.is_empty());

        let after = store.load_songs();
        for title in &drafted {
            let before = catalog.get(title).unwrap();
            let now = after.get(title).unwrap();
            assert_eq!(now.play_count, before.play_count + 1);
            assert_eq!(now.last_played, rehearsal);
        }

        // Revise: drop one song, add one that was not drawn, then undo.
        let dropped = drafted[0].clone();
        let extra = catalog
            .titles()
            .find(|t| !drafted.iter().any(|d| d == t))
            .unwrap()
            .to_string();
        let entries = session::revise_session(
            &mut store,
            &mut state,
            rehearsal,
            std::slice::from_ref(&extra),
            std::slice::from_ref(&dropped),
        )
        .unwrap();
        let titles: Vec<&str> = entries.iter().map(|e| e.title.as_str()).collect();
        assert!(titles.contains(&extra.as_str()));
        assert!(!titles.contains(&dropped.as_str()));
        assert_eq!(state.undo_depth(), 1);

        match session::undo_last_removal(&mut store, &mut state).unwrap() {
            UndoOutcome::Restored(rows) => assert_eq!(rows.len(), 1),
            UndoOutcome::NothingToUndo => panic!("expected a restore"),
        }
        assert_eq!(session::session_entries(&mut store, rehearsal).len(), 4);

        // Revising never touches play counts.
        assert_eq!(store.load_songs().get(&extra), after.get(&extra));
    }

    #[test]
    fn test_history_with_unknown_titles_is_kept() {
        let temp = create_test_data_dir().unwrap();
        let paths = DataPaths::in_dir(temp.path());
        fs::write(
            &paths.draft,
            "Jump\nRetired Song\n",
        )
        .unwrap();

        let mut store = open_store(temp.path());
        let mut state = SessionState::load(&paths).unwrap();
        let report = session::commit_selection(&mut store, &mut state, date(2024, 6, 8)).unwrap();
        assert_eq!(report.unknown, vec!["Retired Song".to_string()]);

        let entries = session::session_entries(&mut store, date(2024, 6, 8));
        let retired = entries.iter().find(|e| e.title == "Retired Song").unwrap();
        assert_eq!(retired.maturity, None);
    }
}
