//! Core of inknote: keeps a note's ink and plain-text representations in
//! sync while exactly one of them is being edited.
//! This crate is the single source of truth for sync invariants.

pub mod clock;
pub mod config;
pub mod db;
pub mod editor;
pub mod engine;
pub mod logging;
pub mod model;
pub mod package;
pub mod repo;
pub mod service;
pub mod sync;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, InkNoteConfig};
pub use editor::{BoundEditor, EditorSession, SessionState};
pub use engine::{
    Block, ContentPackage, EngineError, EngineErrorKind, FaultPoint, InkEditor, InkEngine,
    OpenOption, Part, PlainTextEngine,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::note::{Note, NoteValidationError};
pub use package::{normalize_package_path, PackageGateway};
pub use repo::note_repo::{
    NoteListQuery, NoteRecord, NoteRepository, RepoError, RepoResult, SqliteNoteRepository,
};
pub use service::editing_service::EditingService;
pub use service::note_service::{NoteService, NoteServiceError, NotesListResult};
pub use sync::{
    AttachOptions, Commit, DebounceScheduler, DedupePolicy, FlushOutcome, ModeCoordinator,
    ModeState, PersistenceCoordinator, SessionHandle, Surface, SyncContext, SyncError, SyncResult,
    TimerOutcome,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
