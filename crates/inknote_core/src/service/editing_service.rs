//! Handle-based editing facade.
//!
//! # Responsibility
//! - Own every attached `ModeCoordinator` behind an opaque `SessionHandle`.
//! - Keep one attached session per content package.
//! - Fan timer polling out to all attached sessions.
//!
//! # Invariants
//! - Two sessions never share a normalized package path.
//! - A session whose coordinator reaches `Detached` is forgotten; its handle
//!   then fails with `UnknownSession`.

use crate::engine::InkEngine;
use crate::model::note::Note;
use crate::package::normalize_package_path;
use crate::sync::{
    AttachOptions, ModeCoordinator, ModeState, PersistenceCoordinator, SessionHandle, Surface,
    SyncContext, SyncError, SyncResult, TimerOutcome,
};
use log::{info, warn};
use std::collections::HashMap;

pub struct EditingService<'ctx, E: InkEngine> {
    ctx: &'ctx SyncContext<E>,
    sessions: HashMap<SessionHandle, ModeCoordinator<'ctx, E>>,
}

impl<'ctx, E: InkEngine> EditingService<'ctx, E> {
    pub fn new(ctx: &'ctx SyncContext<E>) -> Self {
        Self {
            ctx,
            sessions: HashMap::new(),
        }
    }

    /// Attaches `note` with the ink surface live and auto-save enabled.
    pub fn attach(&mut self, note: Note) -> SyncResult<SessionHandle> {
        self.attach_with(note, AttachOptions::default())
    }

    pub fn attach_with(&mut self, note: Note, options: AttachOptions) -> SyncResult<SessionHandle> {
        self.ensure_package_free(&note)?;
        let coordinator = ModeCoordinator::attach_ink(self.ctx, note, options)?;
        Ok(self.register(coordinator))
    }

    /// Modal text edit: keyboard surface live, saved only by
    /// `commit_text_edit`.
    pub fn attach_for_text_edit(&mut self, note: Note) -> SyncResult<SessionHandle> {
        self.ensure_package_free(&note)?;
        let coordinator = ModeCoordinator::attach_keyboard(self.ctx, note, AttachOptions::modal())?;
        Ok(self.register(coordinator))
    }

    /// Detaches a session and returns its final note.
    ///
    /// The session is released and forgotten even when the commit fails.
    pub fn detach(&mut self, handle: SessionHandle, commit: bool) -> SyncResult<Note> {
        let mut coordinator = self.take(handle)?;
        coordinator.detach(commit)?;
        Ok(coordinator.note().clone())
    }

    /// Detaches as if the owning screen disappeared, honoring auto-save.
    pub fn on_disappear(&mut self, handle: SessionHandle) -> SyncResult<Note> {
        let mut coordinator = self.take(handle)?;
        coordinator.on_disappear()?;
        Ok(coordinator.note().clone())
    }

    pub fn switch_to_keyboard(&mut self, handle: SessionHandle) -> SyncResult<String> {
        self.coordinator_mut(handle)?.switch_to_keyboard()
    }

    pub fn switch_to_ink(&mut self, handle: SessionHandle, text: Option<&str>) -> SyncResult<()> {
        self.coordinator_mut(handle)?.switch_to_ink(text)
    }

    pub fn on_keyboard_input(&mut self, handle: SessionHandle, text: &str) -> SyncResult<()> {
        self.coordinator_mut(handle)?.on_keyboard_input(text)
    }

    pub fn on_ink_input_ended(&mut self, handle: SessionHandle) -> SyncResult<()> {
        self.coordinator_mut(handle)?.on_ink_input_ended()
    }

    pub fn force_save(&mut self, handle: SessionHandle) -> SyncResult<String> {
        self.coordinator_mut(handle)?.force_save()
    }

    /// Persists the modal edit and ends the session.
    pub fn commit_text_edit(&mut self, handle: SessionHandle) -> SyncResult<Note> {
        let result = self.coordinator_mut(handle)?.commit_text_edit();
        self.finish_modal(handle, result)
    }

    /// Discards the modal edit and ends the session.
    pub fn cancel_text_edit(&mut self, handle: SessionHandle) -> SyncResult<Note> {
        let result = self.coordinator_mut(handle)?.cancel_text_edit();
        self.finish_modal(handle, result)
    }

    /// Fires due timers of every attached session.
    ///
    /// A failed timer commit is reported for its handle and does not stop
    /// the other sessions from being polled.
    pub fn poll(&mut self) -> Vec<(SessionHandle, SyncResult<TimerOutcome>)> {
        let mut fired = Vec::new();
        for (handle, coordinator) in &mut self.sessions {
            match coordinator.poll() {
                Ok(Some(outcome)) => fired.push((*handle, Ok(outcome))),
                Ok(None) => {}
                Err(err) => {
                    warn!(
                        "event=timer_fire module=service status=error handle={} error={}",
                        handle, err
                    );
                    fired.push((*handle, Err(err)));
                }
            }
        }
        fired
    }

    /// Erases and removes the note's package. An attached session for the
    /// same package is released first, without committing.
    pub fn delete_note(&mut self, note: &Note) -> SyncResult<()> {
        note.validate()?;
        if let Some(handle) = self.handle_for(note) {
            if let Some(mut coordinator) = self.sessions.remove(&handle) {
                coordinator.release();
                info!(
                    "event=session_release module=service status=ok reason=delete handle={}",
                    handle
                );
            }
        }
        PersistenceCoordinator::new(self.ctx).delete(note, None)
    }

    /// Detaches every session. Returns one result per released session.
    pub fn detach_all(&mut self, commit: bool) -> Vec<(SessionHandle, SyncResult<Note>)> {
        let handles: Vec<SessionHandle> = self.sessions.keys().copied().collect();
        handles
            .into_iter()
            .map(|handle| (handle, self.detach(handle, commit)))
            .collect()
    }

    pub fn note(&self, handle: SessionHandle) -> SyncResult<&Note> {
        self.coordinator(handle).map(ModeCoordinator::note)
    }

    pub fn state(&self, handle: SessionHandle) -> SyncResult<ModeState> {
        self.coordinator(handle).map(ModeCoordinator::state)
    }

    pub fn live_surface(&self, handle: SessionHandle) -> SyncResult<Option<Surface>> {
        self.coordinator(handle).map(ModeCoordinator::live_surface)
    }

    pub fn keyboard_text(&self, handle: SessionHandle) -> SyncResult<Option<&str>> {
        self.coordinator(handle).map(ModeCoordinator::keyboard_text)
    }

    pub fn is_attached(&self, handle: SessionHandle) -> bool {
        self.sessions.contains_key(&handle)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn register(&mut self, coordinator: ModeCoordinator<'ctx, E>) -> SessionHandle {
        let handle = coordinator.handle();
        info!(
            "event=session_attach module=service status=ok handle={} note_id={} active={}",
            handle,
            coordinator.note().id,
            self.sessions.len() + 1
        );
        self.sessions.insert(handle, coordinator);
        handle
    }

    fn finish_modal(&mut self, handle: SessionHandle, result: SyncResult<()>) -> SyncResult<Note> {
        let note = match self.sessions.get(&handle) {
            Some(coordinator) if coordinator.state() == ModeState::Detached => {
                self.sessions.remove(&handle).map(|c| c.note().clone())
            }
            _ => None,
        };
        result?;
        note.ok_or(SyncError::UnknownSession(handle))
    }

    fn ensure_package_free(&self, note: &Note) -> SyncResult<()> {
        match self.handle_for(note) {
            Some(_) => {
                let path = normalize_package_path(&note.ink_file_path);
                warn!(
                    "event=session_attach module=service status=error error_code=package_in_use note_id={}",
                    note.id
                );
                Err(SyncError::PackageInUse(path))
            }
            None => Ok(()),
        }
    }

    fn handle_for(&self, note: &Note) -> Option<SessionHandle> {
        let wanted = normalize_package_path(&note.ink_file_path);
        self.sessions
            .iter()
            .find(|(_, coordinator)| {
                normalize_package_path(&coordinator.note().ink_file_path) == wanted
            })
            .map(|(handle, _)| *handle)
    }

    fn take(&mut self, handle: SessionHandle) -> SyncResult<ModeCoordinator<'ctx, E>> {
        self.sessions
            .remove(&handle)
            .ok_or(SyncError::UnknownSession(handle))
    }

    fn coordinator(&self, handle: SessionHandle) -> SyncResult<&ModeCoordinator<'ctx, E>> {
        self.sessions
            .get(&handle)
            .ok_or(SyncError::UnknownSession(handle))
    }

    fn coordinator_mut(
        &mut self,
        handle: SessionHandle,
    ) -> SyncResult<&mut ModeCoordinator<'ctx, E>> {
        self.sessions
            .get_mut(&handle)
            .ok_or(SyncError::UnknownSession(handle))
    }
}

impl<E: InkEngine> Drop for EditingService<'_, E> {
    fn drop(&mut self) {
        if !self.sessions.is_empty() {
            warn!(
                "event=service_drop module=service status=skip reason=sessions_attached count={}",
                self.sessions.len()
            );
        }
        for (_, mut coordinator) in self.sessions.drain() {
            coordinator.release();
        }
    }
}
