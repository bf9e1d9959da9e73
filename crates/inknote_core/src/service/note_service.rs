//! Note store use-case service.
//!
//! # Responsibility
//! - Create, read, save and list note records.
//! - Delete a note together with its backing package.
//!
//! # Invariants
//! - A note record is only removed after its package is gone.
//! - Every write is read back so callers see the stored `updated_at`.

use crate::engine::InkEngine;
use crate::model::note::Note;
use crate::repo::note_repo::{
    normalize_note_limit, NoteListQuery, NoteRecord, NoteRepository, RepoError, RepoResult,
};
use crate::service::editing_service::EditingService;
use crate::sync::SyncError;
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum NoteServiceError {
    NoteNotFound(String),
    DuplicateNote(String),
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Package erase or removal failed; the record is kept.
    Sync(SyncError),
    /// Write succeeded but the read-back did not find the row.
    InconsistentState(&'static str),
}

impl Display for NoteServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::DuplicateNote(id) => write!(f, "note already exists: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Sync(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent note state: {details}"),
        }
    }
}

impl Error for NoteServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Sync(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for NoteServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NoteNotFound(id),
            RepoError::Duplicate(id) => Self::DuplicateNote(id),
            other => Self::Repo(other),
        }
    }
}

impl From<SyncError> for NoteServiceError {
    fn from(value: SyncError) -> Self {
        Self::Sync(value)
    }
}

/// List result envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotesListResult {
    /// Sorted by `updated_at DESC, id ASC`.
    pub items: Vec<NoteRecord>,
    pub applied_limit: u32,
}

pub struct NoteService<R: NoteRepository> {
    repo: R,
}

impl<R: NoteRepository> NoteService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn create_note(&self, note: &Note) -> Result<NoteRecord, NoteServiceError> {
        self.repo.insert_note(note)?;
        info!("event=note_create module=service status=ok note_id={}", note.id);
        self.read_back(&note.id, "created note not found in read-back")
    }

    pub fn get_note(&self, id: &str) -> RepoResult<Option<NoteRecord>> {
        self.repo.get_note(id)
    }

    /// Stores the note's cached text and package path.
    pub fn save_note(&self, note: &Note) -> Result<NoteRecord, NoteServiceError> {
        self.repo.update_note(note)?;
        self.read_back(&note.id, "saved note not found in read-back")
    }

    pub fn list_notes(
        &self,
        limit: Option<u32>,
        offset: u32,
    ) -> Result<NotesListResult, NoteServiceError> {
        let applied_limit = normalize_note_limit(limit);
        let items = self.repo.list_notes(&NoteListQuery {
            limit: Some(applied_limit),
            offset,
        })?;
        Ok(NotesListResult {
            items,
            applied_limit,
        })
    }

    /// Deletes the package through `editing` (releasing any attached session
    /// first), then the record.
    pub fn delete_note<E: InkEngine>(
        &self,
        editing: &mut EditingService<'_, E>,
        id: &str,
    ) -> Result<(), NoteServiceError> {
        let record = self
            .repo
            .get_note(id)?
            .ok_or_else(|| NoteServiceError::NoteNotFound(id.to_string()))?;

        if let Err(err) = editing.delete_note(&record.note) {
            error!(
                "event=note_delete module=service status=error error_code=package_delete_failed note_id={} error={}",
                id, err
            );
            return Err(err.into());
        }
        self.repo.delete_note(id)?;
        info!("event=note_delete module=service status=ok note_id={id}");
        Ok(())
    }

    fn read_back(&self, id: &str, details: &'static str) -> Result<NoteRecord, NoteServiceError> {
        self.repo
            .get_note(id)?
            .ok_or(NoteServiceError::InconsistentState(details))
    }
}
