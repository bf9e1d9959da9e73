//! Text/ink reconciliation protocol.
//!
//! # Responsibility
//! - Load a note's package into an editor session.
//! - Import text into and export text out of the ink document.
//! - Erase and delete backing packages.
//!
//! # Invariants
//! - Every non-empty import ends with temp-save then save.
//! - Export saves first and never waits for the engine to become idle.
//! - Erasing without an editor leaves the package with zero parts.
//! - The only silent no-ops are the "no backing package" cases of empty
//!   import, erase and delete.

use crate::editor::{EditorSession, SessionState};
use crate::engine::{ContentPackage, EngineError, EngineErrorKind, InkEngine};
use crate::model::note::Note;
use crate::sync::context::SyncContext;
use crate::sync::{SyncError, SyncResult};
use log::{debug, error, info};
use std::time::Instant;

/// Implements load/import/export/erase/delete for one context.
pub struct PersistenceCoordinator<'ctx, E: InkEngine> {
    ctx: &'ctx SyncContext<E>,
}

impl<'ctx, E: InkEngine> PersistenceCoordinator<'ctx, E> {
    pub fn new(ctx: &'ctx SyncContext<E>) -> Self {
        Self { ctx }
    }

    /// Binds part 0 of the note's package to `session`, then imports
    /// `pending_import` if text was queued before the editor existed.
    pub fn load(
        &self,
        note: &mut Note,
        session: &mut EditorSession<E>,
        pending_import: Option<&str>,
    ) -> SyncResult<()> {
        note.validate()?;
        let gateway = self.ctx.gateway();
        let package = gateway.open_or_create(&note.ink_file_path)?;
        let part = gateway.part(&package, 0)?;
        session.bind(package, part)?;
        info!(
            "event=note_load module=sync status=ok note_id={} session_id={}",
            note.id,
            session.id()
        );

        if let Some(text) = pending_import {
            self.import_text(note, text, Some(session))?;
        }
        Ok(())
    }

    /// Writes `text` into the note's ink document and updates the cached
    /// text on success.
    ///
    /// With no session, a transient one is opened and closed within the call.
    pub fn import_text(
        &self,
        note: &mut Note,
        text: &str,
        session: Option<&mut EditorSession<E>>,
    ) -> SyncResult<()> {
        let started_at = Instant::now();

        if text.is_empty() {
            if self.ctx.gateway().package_exists(&note.ink_file_path) {
                self.erase(note, session)?;
            } else {
                debug!(
                    "event=ink_import module=sync status=skip reason=empty_without_package note_id={}",
                    note.id
                );
            }
            note.text = Some(String::new());
            return Ok(());
        }

        let result = match session {
            Some(session) => self.import_into_session(note, text, session),
            None => {
                let mut transient = EditorSession::open(self.ctx.engine())?;
                let imported = self.import_into_session(note, text, &mut transient);
                let closed = transient.close();
                imported.and(closed)
            }
        };

        match result {
            Ok(()) => {
                note.text = Some(text.to_string());
                info!(
                    "event=ink_import module=sync status=ok note_id={} len={} duration_ms={}",
                    note.id,
                    text.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=ink_import module=sync status=error note_id={} duration_ms={} error={}",
                    note.id,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Saves and reads the plain text of the bound part.
    ///
    /// # Errors
    /// - `ImportExport` when the session has no bound part.
    pub fn export_text(&self, session: &mut EditorSession<E>) -> SyncResult<String> {
        let gateway = self.ctx.gateway();
        let session_id = session.id();
        let mut bound = session.bound().ok_or_else(|| no_bound_part("export"))?;
        bound.save_all(&gateway)?;

        // Exporting while busy may return stale text; waiting can stall.
        if !bound.is_idle() {
            debug!(
                "event=ink_export module=sync status=busy session_id={session_id}"
            );
        }

        let text = bound.export_text()?;
        debug!(
            "event=ink_export module=sync status=ok session_id={} len={}",
            session_id,
            text.len()
        );
        Ok(text)
    }

    /// Reads the text stored in the note's package without saving it.
    ///
    /// Returns `None` when no package exists.
    pub fn stored_text(&self, note: &Note) -> SyncResult<Option<String>> {
        let gateway = self.ctx.gateway();
        if !gateway.package_exists(&note.ink_file_path) {
            return Ok(None);
        }
        let mut session = EditorSession::open(self.ctx.engine())?;
        let read = self.read_bound_text(note, &mut session);
        let closed = session.close();
        let text = read?;
        closed?;
        Ok(Some(text))
    }

    /// Binds part 0 of the note's package and reads its text.
    fn read_bound_text(&self, note: &Note, session: &mut EditorSession<E>) -> SyncResult<String> {
        let gateway = self.ctx.gateway();
        let package = gateway.open_or_create(&note.ink_file_path)?;
        let part = gateway.part(&package, 0)?;
        session.bind(package, part)?;
        let bound = session.bound().ok_or_else(|| no_bound_part("read"))?;
        bound.export_text()
    }

    /// Clears the note's ink content.
    pub fn erase(&self, note: &Note, session: Option<&mut EditorSession<E>>) -> SyncResult<()> {
        let gateway = self.ctx.gateway();

        if let Some(mut bound) = session.and_then(|session| session.bound()) {
            bound.clear()?;
            bound.save_all(&gateway)?;
            info!(
                "event=ink_erase module=sync status=ok mode=editor note_id={}",
                note.id
            );
            return Ok(());
        }

        if !gateway.package_exists(&note.ink_file_path) {
            debug!(
                "event=ink_erase module=sync status=skip reason=no_package note_id={}",
                note.id
            );
            return Ok(());
        }

        let mut package = gateway.open_existing(&note.ink_file_path)?;
        if package.part_count() == 0 {
            debug!(
                "event=ink_erase module=sync status=skip reason=no_parts note_id={}",
                note.id
            );
            return Ok(());
        }
        let part = gateway.part(&package, 0)?;
        gateway.remove_part(&mut package, &part)?;
        gateway.save(&mut package)?;
        info!(
            "event=ink_erase module=sync status=ok mode=package note_id={}",
            note.id
        );
        Ok(())
    }

    /// Erases the package and removes its file.
    ///
    /// A session bound to the package is unbound before the file goes away.
    ///
    /// # Errors
    /// - `Deletion` when the content was erased but the file remains.
    pub fn delete(&self, note: &Note, session: Option<&mut EditorSession<E>>) -> SyncResult<()> {
        let gateway = self.ctx.gateway();
        if !gateway.package_exists(&note.ink_file_path) {
            debug!(
                "event=note_delete module=sync status=skip reason=no_package note_id={}",
                note.id
            );
            return Ok(());
        }

        match session {
            Some(session) => {
                self.erase(note, Some(&mut *session))?;
                session.unbind()?;
            }
            None => self.erase(note, None)?,
        }

        gateway
            .remove_package_file(&note.ink_file_path)
            .map_err(|source| {
                error!(
                    "event=note_delete module=sync status=error error_code=file_remove_failed note_id={} error={}",
                    note.id, source
                );
                SyncError::Deletion {
                    path: note.ink_file_path.clone(),
                    source,
                }
            })?;
        info!("event=note_delete module=sync status=ok note_id={}", note.id);
        Ok(())
    }

    fn import_into_session(
        &self,
        note: &Note,
        text: &str,
        session: &mut EditorSession<E>,
    ) -> SyncResult<()> {
        let gateway = self.ctx.gateway();

        if session.state() != SessionState::Bound {
            let package = gateway.open_or_create(&note.ink_file_path)?;
            let part = gateway.part(&package, 0)?;
            session.bind(package, part)?;
        }

        let mut bound = session.bound().ok_or_else(|| no_bound_part("import"))?;
        let selection = bound.root_block();
        debug!(
            "event=ink_import module=sync status=start note_id={} mode={}",
            note.id,
            if selection.is_some() { "replace" } else { "create" }
        );
        bound.import_text(text, selection.as_ref())?;
        bound.save_all(&gateway)
    }
}

fn no_bound_part(operation: &'static str) -> SyncError {
    SyncError::ImportExport {
        operation,
        source: EngineError::new(EngineErrorKind::NoPart, "editor has no bound part"),
    }
}
