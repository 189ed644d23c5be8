//! CLI probe over a StickyNote database.
//!
//! # Responsibility
//! - Open (and migrate) a note database, optionally importing legacy JSON.
//! - Print the note a new window would open plus the notes list.
//!
//! Usage: `stickynote_cli <db-path> [--import <notes.json>] [--log-dir <abs-dir>]`

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use stickynote_core::model::summary::summarize;
use stickynote_core::store::legacy::import_legacy_file;
use stickynote_core::{init_logging, LogLevel, Note, NoteStore, SqliteNoteStore, StoreResult};

#[derive(Parser, Debug)]
#[command(name = "stickynote_cli")]
#[command(about = "Inspect a StickyNote database")]
struct Args {
    /// SQLite database file, created and migrated when missing
    db_path: PathBuf,

    /// Legacy `notes.json` to import before listing
    #[arg(long)]
    import: Option<PathBuf>,

    /// Absolute directory for rolling log files
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

/// Most recently updated note, or a fresh one for an empty database.
async fn startup_note(store: &SqliteNoteStore) -> StoreResult<Note> {
    match store.list().await?.into_iter().next() {
        Some(note) => Ok(note),
        None => store.create().await,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    println!("stickynote_core ping={}", stickynote_core::ping());
    println!("stickynote_core version={}", stickynote_core::core_version());

    let args = Args::parse();

    if let Some(log_dir) = &args.log_dir {
        let log_dir = log_dir.to_string_lossy();
        if let Err(err) = init_logging(LogLevel::build_default().as_str(), &log_dir) {
            eprintln!("warning: logging disabled: {err}");
        }
    }

    let store = match SqliteNoteStore::open(&args.db_path) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(path) = &args.import {
        match import_legacy_file(&store, path) {
            Ok(report) => println!(
                "legacy import imported={} skipped={}",
                report.imported, report.skipped
            ),
            Err(err) => {
                eprintln!("error: {err}");
                return ExitCode::FAILURE;
            }
        }
    }

    let note = match startup_note(&store).await {
        Ok(note) => note,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    println!(
        "open note id={} level={:?} geometry={}x{}@{},{}",
        note.id,
        note.window_level,
        note.geometry.width,
        note.geometry.height,
        note.geometry.x,
        note.geometry.y
    );

    match store.list().await {
        Ok(notes) => {
            for summary in summarize(&notes) {
                println!("{}  {}", summary.id, summary.preview);
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
