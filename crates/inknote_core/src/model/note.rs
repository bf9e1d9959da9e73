//! Note domain model.
//!
//! # Responsibility
//! - Define the note record shared by the sync engine and the note store.
//! - Validate caller-assigned identity before it is used to derive paths.
//!
//! # Invariants
//! - `id` is stable and caller-assigned.
//! - `text` is a cache only; the package at `ink_file_path` is authoritative
//!   once ink has been edited.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// File extension of note content packages.
pub const INK_FILE_EXTENSION: &str = "iink";

static NOTE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]{0,127}$").expect("valid note id regex"));

/// A note with two interchangeable representations: ink and plain text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    /// Cached plain-text mirror of the ink document.
    pub text: Option<String>,
    pub ink_file_path: PathBuf,
}

/// Validation failures for note identity and paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteValidationError {
    InvalidId(String),
    EmptyInkPath,
}

impl Display for NoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidId(id) => write!(f, "invalid note id: `{id}`"),
            Self::EmptyInkPath => write!(f, "note ink_file_path cannot be empty"),
        }
    }
}

impl Error for NoteValidationError {}

impl Note {
    pub fn new(id: impl Into<String>, text: Option<String>, ink_file_path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            text,
            ink_file_path: ink_file_path.into(),
        }
    }

    /// Creates a note whose package lives at `dir/<id>.iink`.
    pub fn in_directory(id: impl Into<String>, dir: impl AsRef<Path>) -> Self {
        let id = id.into();
        let ink_file_path = dir
            .as_ref()
            .join(format!("{id}.{INK_FILE_EXTENSION}"));
        Self {
            id,
            text: None,
            ink_file_path,
        }
    }

    /// Checks identity and path shape.
    pub fn validate(&self) -> Result<(), NoteValidationError> {
        if !NOTE_ID_RE.is_match(&self.id) {
            return Err(NoteValidationError::InvalidId(self.id.clone()));
        }
        if self.ink_file_path.as_os_str().is_empty() {
            return Err(NoteValidationError::EmptyInkPath);
        }
        Ok(())
    }

    /// Cached text, or empty when never cached.
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::{Note, NoteValidationError};

    #[test]
    fn in_directory_derives_package_path() {
        let note = Note::in_directory("note_1", "/tmp/notes");
        assert_eq!(
            note.ink_file_path,
            std::path::PathBuf::from("/tmp/notes/note_1.iink")
        );
        assert!(note.text.is_none());
        assert!(note.validate().is_ok());
    }

    #[test]
    fn validate_rejects_path_like_ids() {
        for id in ["", "../escape", "a/b", " lead"] {
            let note = Note::new(id, None, "/tmp/x.iink");
            assert_eq!(
                note.validate(),
                Err(NoteValidationError::InvalidId(id.to_string()))
            );
        }
    }

    #[test]
    fn validate_rejects_empty_ink_path() {
        let note = Note::new("ok", None, "");
        assert_eq!(note.validate(), Err(NoteValidationError::EmptyInkPath));
    }
}
