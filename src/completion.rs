//! # Shell Completion Module
//!
//! Generates completion scripts through clap_complete and lists song titles
//! for dynamic completion of commands like `draft add` and `session remove`.
//!
//! ## Usage
//!
//! ```bash
//! # Generate bash completions
//! songpicker completion bash > ~/.local/share/bash-completion/completions/songpicker
//!
//! # Generate zsh completions
//! songpicker completion zsh > ~/.config/zsh/completions/_songpicker
//! ```

use crate::config::DataPaths;
use crate::store;
use clap::Command;
use clap_complete::{generate, Generator, Shell as CompletionShell};
use log::debug;
use std::io;

/// Generate shell completions for the given shell
pub fn generate_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
}

/// Convert our Shell enum to clap_complete's Shell enum
#[must_use]
pub fn shell_to_completion_shell(shell: crate::cli::Shell) -> CompletionShell {
    match shell {
        crate::cli::Shell::Bash => CompletionShell::Bash,
        crate::cli::Shell::Zsh => CompletionShell::Zsh,
        crate::cli::Shell::Fish => CompletionShell::Fish,
        crate::cli::Shell::PowerShell => CompletionShell::PowerShell,
        crate::cli::Shell::Elvish => CompletionShell::Elvish,
    }
}

/// Song titles available for completion, sorted. Completion must never fail,
/// so a missing or unreadable song list yields no titles.
#[must_use]
pub fn get_song_completions(paths: &DataPaths) -> Vec<String> {
    if !paths.songs.exists() {
        return Vec::new();
    }

    match store::read_songs(&paths.songs) {
        Ok(catalog) => {
            let mut titles: Vec<String> = catalog.titles().map(str::to_string).collect();
            titles.sort();
            titles
        }
        Err(e) => {
            debug!("No completions: {e:#}");
            Vec::new()
        }
    }
}

/// Quotes a title for shells that split on whitespace.
#[must_use]
pub fn quote_for_shell(title: &str) -> String {
    if title.contains(' ') || title.contains('\t') || title.contains('"') {
        format!("\"{}\"", title.replace('"', "\\\""))
    } else {
        title.to_string()
    }
}

/// Print available song titles, one per line
pub fn print_song_completions(paths: &DataPaths) {
    for title in get_song_completions(paths) {
        println!("{}", quote_for_shell(&title));
    }
}
