//! Note synchronization and editor-lifecycle engine.
//!
//! # Responsibility
//! - Reconcile a note's text and ink representations (`persistence`).
//! - Debounce keyboard input into committed values (`debounce`).
//! - Decide which representation is live and sequence switches (`mode`).
//!
//! # Invariants
//! - At most one editing surface of a note is live at a time.
//! - Every failure reaches the caller as a typed `SyncError`; nothing is
//!   replaced with default content on failure.

use crate::engine::EngineError;
use crate::model::note::NoteValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod context;
pub mod debounce;
pub mod mode;
pub mod persistence;

pub use context::SyncContext;
pub use debounce::{Commit, DebounceScheduler, DedupePolicy, FlushOutcome};
pub use mode::{AttachOptions, ModeCoordinator, ModeState, SessionHandle, Surface, TimerOutcome};
pub use persistence::PersistenceCoordinator;

pub type SyncResult<T> = Result<T, SyncError>;

/// Typed failures of the sync engine.
#[derive(Debug)]
pub enum SyncError {
    /// Package could not be opened or created.
    PackageOpen { path: PathBuf, source: EngineError },
    /// Expected document part is missing.
    PartNotFound {
        path: PathBuf,
        index: usize,
        source: EngineError,
    },
    /// Save or save-to-temp failed.
    Persistence { path: PathBuf, source: EngineError },
    /// Engine rejected an import, export or clear.
    ImportExport {
        operation: &'static str,
        source: EngineError,
    },
    /// Content was erased but the package file could not be removed.
    Deletion {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Operation is not valid in the current mode state.
    InvalidState {
        operation: &'static str,
        state: mode::ModeState,
    },
    /// Another session already owns this package.
    PackageInUse(PathBuf),
    /// Handle does not name an attached session.
    UnknownSession(SessionHandle),
    InvalidNote(NoteValidationError),
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PackageOpen { path, source } => {
                write!(f, "cannot open package `{}`: {source}", path.display())
            }
            Self::PartNotFound {
                path,
                index,
                source,
            } => write!(
                f,
                "part {index} not found in package `{}`: {source}",
                path.display()
            ),
            Self::Persistence { path, source } => {
                write!(f, "cannot persist package `{}`: {source}", path.display())
            }
            Self::ImportExport { operation, source } => {
                write!(f, "ink {operation} failed: {source}")
            }
            Self::Deletion { path, source } => write!(
                f,
                "package `{}` was erased but could not be removed: {source}",
                path.display()
            ),
            Self::InvalidState { operation, state } => {
                write!(f, "`{operation}` is not allowed in state {state:?}")
            }
            Self::PackageInUse(path) => {
                write!(f, "package `{}` is attached to another session", path.display())
            }
            Self::UnknownSession(handle) => write!(f, "unknown editing session: {handle}"),
            Self::InvalidNote(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::PackageOpen { source, .. } => Some(source),
            Self::PartNotFound { source, .. } => Some(source),
            Self::Persistence { source, .. } => Some(source),
            Self::ImportExport { source, .. } => Some(source),
            Self::Deletion { source, .. } => Some(source),
            Self::InvalidNote(err) => Some(err),
            Self::InvalidState { .. } | Self::PackageInUse(_) | Self::UnknownSession(_) => None,
        }
    }
}

impl From<NoteValidationError> for SyncError {
    fn from(value: NoteValidationError) -> Self {
        Self::InvalidNote(value)
    }
}
