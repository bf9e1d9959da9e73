//! Note record repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist note identity, cached text and package path.
//!
//! # Invariants
//! - Listing is ordered by `updated_at DESC, id ASC`.
//! - `ink_file_path` is stored as UTF-8 text; other paths are rejected.
//! - Read paths reject invalid persisted rows instead of masking them.

use crate::db::DbError;
use crate::model::note::{Note, NoteValidationError};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

const NOTES_DEFAULT_LIMIT: u32 = 50;
const NOTES_LIMIT_MAX: u32 = 500;

const NOTE_SELECT_SQL: &str = "SELECT
    id,
    text,
    ink_file_path,
    updated_at
FROM notes";

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    Validation(NoteValidationError),
    Db(DbError),
    NotFound(String),
    Duplicate(String),
    InvalidData(String),
    MissingRequiredTable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "note not found: {id}"),
            Self::Duplicate(id) => write!(f, "note already exists: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted note data: {message}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "note store is not migrated: missing table `{table}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<NoteValidationError> for RepoError {
    fn from(value: NoteValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Stored note plus store metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteRecord {
    pub note: Note,
    /// Update timestamp in epoch milliseconds.
    pub updated_at: i64,
}

/// Pagination for note listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoteListQuery {
    /// Defaults to 50 and clamps to 500.
    pub limit: Option<u32>,
    pub offset: u32,
}

pub trait NoteRepository {
    /// Inserts a new note; fails with `Duplicate` when the id exists.
    fn insert_note(&self, note: &Note) -> RepoResult<()>;
    /// Replaces cached text and path of an existing note.
    fn update_note(&self, note: &Note) -> RepoResult<()>;
    fn get_note(&self, id: &str) -> RepoResult<Option<NoteRecord>>;
    fn list_notes(&self, query: &NoteListQuery) -> RepoResult<Vec<NoteRecord>>;
    /// Removes the record; fails with `NotFound` when absent.
    fn delete_note(&self, id: &str) -> RepoResult<()>;
}

pub struct SqliteNoteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNoteRepository<'conn> {
    /// Wraps a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'notes'
            );",
            [],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(RepoError::MissingRequiredTable("notes"));
        }
        Ok(Self { conn })
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn insert_note(&self, note: &Note) -> RepoResult<()> {
        note.validate()?;
        let path = path_to_db(note)?;
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO notes (id, text, ink_file_path, updated_at)
             VALUES (?1, ?2, ?3, (strftime('%s', 'now') * 1000));",
            params![note.id.as_str(), note.text.as_deref(), path],
        )?;
        if inserted == 0 {
            return Err(RepoError::Duplicate(note.id.clone()));
        }
        Ok(())
    }

    fn update_note(&self, note: &Note) -> RepoResult<()> {
        note.validate()?;
        let path = path_to_db(note)?;
        let changed = self.conn.execute(
            "UPDATE notes
             SET
                text = ?2,
                ink_file_path = ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![note.id.as_str(), note.text.as_deref(), path],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(note.id.clone()));
        }
        Ok(())
    }

    fn get_note(&self, id: &str) -> RepoResult<Option<NoteRecord>> {
        let sql = format!("{NOTE_SELECT_SQL} WHERE id = ?1;");
        let record = self
            .conn
            .query_row(&sql, [id], |row| Ok(parse_note_row(row)))
            .optional()?;
        record.transpose()
    }

    fn list_notes(&self, query: &NoteListQuery) -> RepoResult<Vec<NoteRecord>> {
        let sql = format!("{NOTE_SELECT_SQL} ORDER BY updated_at DESC, id ASC LIMIT ?1 OFFSET ?2;");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![
            i64::from(normalize_note_limit(query.limit)),
            i64::from(query.offset)
        ])?;

        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(row)?);
        }
        Ok(notes)
    }

    fn delete_note(&self, id: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM notes WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

/// Applies list defaults and the upper clamp.
pub fn normalize_note_limit(limit: Option<u32>) -> u32 {
    match limit {
        None | Some(0) => NOTES_DEFAULT_LIMIT,
        Some(value) => value.min(NOTES_LIMIT_MAX),
    }
}

fn path_to_db(note: &Note) -> RepoResult<&str> {
    note.ink_file_path.to_str().ok_or_else(|| {
        RepoError::InvalidData(format!(
            "ink_file_path of note `{}` is not valid UTF-8",
            note.id
        ))
    })
}

fn parse_note_row(row: &Row<'_>) -> RepoResult<NoteRecord> {
    let note = Note {
        id: row.get("id")?,
        text: row.get("text")?,
        ink_file_path: PathBuf::from(row.get::<_, String>("ink_file_path")?),
    };
    note.validate().map_err(|err| {
        RepoError::InvalidData(format!("row `{}` failed validation: {err}", note.id))
    })?;
    Ok(NoteRecord {
        note,
        updated_at: row.get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::normalize_note_limit;

    #[test]
    fn limit_defaults_and_clamps() {
        assert_eq!(normalize_note_limit(None), 50);
        assert_eq!(normalize_note_limit(Some(0)), 50);
        assert_eq!(normalize_note_limit(Some(7)), 7);
        assert_eq!(normalize_note_limit(Some(10_000)), 500);
    }
}
