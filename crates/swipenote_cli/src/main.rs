//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `swipenote_core` linkage and storage bootstrap from a shell.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `swipenote_cli [DB_PATH]` (in-memory when omitted).

use std::process::ExitCode;
use swipenote_core::{CoreConfig, NoteQuery, NoteService};

fn main() -> ExitCode {
    println!("swipenote_core ping={}", swipenote_core::ping());
    println!("swipenote_core version={}", swipenote_core::core_version());

    let config = match std::env::args_os().nth(1) {
        Some(path) => CoreConfig::with_db_path(path),
        None => CoreConfig::default(),
    };
    let service = match NoteService::open(&config) {
        Ok(service) => service,
        Err(err) => {
            eprintln!("swipenote_core open_error={err}");
            return ExitCode::FAILURE;
        }
    };

    match service.list(&NoteQuery::all()) {
        Ok(notes) => {
            println!("swipenote_core notes={}", notes.len());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("swipenote_core list_error={err}");
            ExitCode::FAILURE
        }
    }
}
