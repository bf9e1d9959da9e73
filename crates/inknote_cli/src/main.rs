//! CLI smoke entry point.
//!
//! # Responsibility
//! - Compose config, logging, note store and editing service the way a host
//!   would, against the reference engine.
//! - Run one keyboard/ink round trip and print deterministic results.
//!
//! Usage: `inknote_cli [note-id] [text]`

use inknote_core::db::{open_db, open_db_in_memory};
use inknote_core::{
    core_version, init_logging, EditingService, InkNoteConfig, Note, NoteService,
    PlainTextEngine, SqliteNoteRepository, SyncContext,
};
use log::info;
use std::error::Error;
use std::process::ExitCode;

const DEFAULT_NOTE_ID: &str = "smoke";
const DEFAULT_TEXT: &str = "Buy milk";

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("inknote_cli error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let note_id = args.next().unwrap_or_else(|| DEFAULT_NOTE_ID.to_string());
    let text = args.next().unwrap_or_else(|| DEFAULT_TEXT.to_string());

    let config = InkNoteConfig::from_env()?;
    let log_dir = config.notes_dir.join("logs");
    init_logging(&config.log_level, &log_dir.to_string_lossy())?;
    println!("inknote_core version={}", core_version());

    let conn = match &config.db_path {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };
    let notes = NoteService::new(SqliteNoteRepository::try_new(&conn)?);
    let ctx = SyncContext::new(PlainTextEngine::new(), config.clone());
    let mut editing = EditingService::new(&ctx);

    let note = match notes.get_note(&note_id)? {
        Some(record) => record.note,
        None => notes
            .create_note(&Note::in_directory(note_id.as_str(), &config.notes_dir))?
            .note,
    };

    let handle = editing.attach(note)?;
    let before = editing.switch_to_keyboard(handle)?;
    editing.on_keyboard_input(handle, &text)?;
    let committed = editing.force_save(handle)?;
    editing.switch_to_ink(handle, Some(&committed))?;
    let exported = editing.force_save(handle)?;
    let note = editing.detach(handle, true)?;
    notes.save_note(&note)?;

    info!(
        "event=cli_smoke module=cli status=ok note_id={} len={}",
        note.id,
        exported.len()
    );
    println!("note id={} path={}", note.id, note.ink_file_path.display());
    println!("keyboard before={before:?} committed={committed:?}");
    println!("ink exported={exported:?} round_trip={}", exported == committed);
    Ok(())
}
