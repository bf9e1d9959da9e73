//! Ink/keyboard mode state machine.
//!
//! # Responsibility
//! - Own the live editing surface of one note: an ink `EditorSession` or a
//!   keyboard `DebounceScheduler`, never both.
//! - Sequence export/import/teardown across mode switches and detach.
//! - Drive the keyboard quiet-period timer and the ink idle-save timer.
//!
//! # Invariants
//! - Outside `Transitioning`, an attached coordinator has exactly one live
//!   surface and `Detached` has none.
//! - A failed export or import aborts the switch and leaves the previous
//!   surface attached.
//! - Release cancels timers before closing the editor and is idempotent.
//! - A keyboard commit whose persistence failed is buffered again, never
//!   dropped and never retried automatically.

use crate::editor::{EditorSession, SessionState};
use crate::engine::InkEngine;
use crate::model::note::Note;
use crate::sync::context::SyncContext;
use crate::sync::debounce::{Commit, DebounceScheduler};
use crate::sync::persistence::PersistenceCoordinator;
use crate::sync::{SyncError, SyncResult};
use log::{debug, info, warn};
use std::fmt::{Display, Formatter};
use std::time::Instant;
use uuid::Uuid;

/// Stable identity of an attached note-editing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(Uuid);

impl SessionHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SessionHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeState {
    Detached,
    InkActive,
    KeyboardActive,
    Transitioning,
}

/// Editing surface kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Ink,
    Keyboard,
}

/// Options for attaching a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachOptions {
    /// Commit the live surface when the owning screen disappears.
    pub auto_save: bool,
    /// Text queued for import as soon as the ink editor is bound.
    pub pending_import: Option<String>,
}

impl Default for AttachOptions {
    fn default() -> Self {
        Self {
            auto_save: true,
            pending_import: None,
        }
    }
}

impl AttachOptions {
    /// Options of the modal "edit as text" flow: saving is deferred to an
    /// explicit commit.
    pub fn modal() -> Self {
        Self {
            auto_save: false,
            pending_import: None,
        }
    }
}

/// What a `poll` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerOutcome {
    /// Keyboard quiet period elapsed and the value was persisted.
    KeyboardCommitted(Commit),
    /// Ink idle-save exported and cached the text.
    InkSaved { text: String },
    /// Ink idle-save found the engine busy and skipped.
    InkSaveSkipped,
}

/// Mode coordinator for one note.
pub struct ModeCoordinator<'ctx, E: InkEngine> {
    ctx: &'ctx SyncContext<E>,
    handle: SessionHandle,
    note: Note,
    state: ModeState,
    auto_save: bool,
    ink: Option<EditorSession<E>>,
    keyboard: Option<DebounceScheduler>,
    ink_save_deadline: Option<Instant>,
}

impl<'ctx, E: InkEngine> ModeCoordinator<'ctx, E> {
    /// `Detached -> InkActive`: binds an editor to the note's package.
    pub fn attach_ink(
        ctx: &'ctx SyncContext<E>,
        note: Note,
        options: AttachOptions,
    ) -> SyncResult<Self> {
        note.validate()?;
        let mut session = EditorSession::open(ctx.engine())?;
        let mut coordinator = Self::detached(ctx, note, options.auto_save);
        coordinator.state = ModeState::Transitioning;

        let loaded = PersistenceCoordinator::new(ctx).load(
            &mut coordinator.note,
            &mut session,
            options.pending_import.as_deref(),
        );
        if let Err(err) = loaded {
            close_quietly(&mut session, coordinator.handle);
            coordinator.state = ModeState::Detached;
            return Err(err);
        }

        coordinator.ink = Some(session);
        coordinator.state = ModeState::InkActive;
        info!(
            "event=mode_attach module=sync status=ok handle={} note_id={} surface=ink auto_save={}",
            coordinator.handle, coordinator.note.id, coordinator.auto_save
        );
        Ok(coordinator)
    }

    /// `Detached -> KeyboardActive`: seeds a keyboard surface from the cached
    /// text without touching the package.
    pub fn attach_keyboard(
        ctx: &'ctx SyncContext<E>,
        note: Note,
        options: AttachOptions,
    ) -> SyncResult<Self> {
        note.validate()?;
        let mut coordinator = Self::detached(ctx, note, options.auto_save);
        coordinator.keyboard = Some(coordinator.new_keyboard(coordinator.note.text_or_empty()));
        coordinator.state = ModeState::KeyboardActive;
        info!(
            "event=mode_attach module=sync status=ok handle={} note_id={} surface=keyboard auto_save={}",
            coordinator.handle, coordinator.note.id, coordinator.auto_save
        );
        Ok(coordinator)
    }

    fn detached(ctx: &'ctx SyncContext<E>, note: Note, auto_save: bool) -> Self {
        Self {
            ctx,
            handle: SessionHandle::new(),
            note,
            state: ModeState::Detached,
            auto_save,
            ink: None,
            keyboard: None,
            ink_save_deadline: None,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle
    }

    pub fn state(&self) -> ModeState {
        self.state
    }

    pub fn note(&self) -> &Note {
        &self.note
    }

    pub fn auto_save(&self) -> bool {
        self.auto_save
    }

    /// The single live surface, or `None` when detached.
    pub fn live_surface(&self) -> Option<Surface> {
        match (self.ink.is_some(), self.keyboard.is_some()) {
            (true, false) => Some(Surface::Ink),
            (false, true) => Some(Surface::Keyboard),
            _ => None,
        }
    }

    pub fn ink_session_state(&self) -> Option<SessionState> {
        self.ink.as_ref().map(EditorSession::state)
    }

    /// Keyboard text including uncommitted input.
    pub fn keyboard_text(&self) -> Option<&str> {
        self.keyboard.as_ref().map(DebounceScheduler::text)
    }

    pub fn has_pending_timers(&self) -> bool {
        self.ink_save_deadline.is_some()
            || self
                .keyboard
                .as_ref()
                .is_some_and(DebounceScheduler::has_pending_timer)
    }

    /// `InkActive -> KeyboardActive`. Returns the text the keyboard starts
    /// from.
    pub fn switch_to_keyboard(&mut self) -> SyncResult<String> {
        self.require(ModeState::InkActive, "switch_to_keyboard")?;
        let text = self.export_ink()?;

        self.state = ModeState::Transitioning;
        self.ink_save_deadline = None;
        self.note.text = Some(text.clone());
        if let Some(mut session) = self.ink.take() {
            close_quietly(&mut session, self.handle);
        }
        self.keyboard = Some(self.new_keyboard(&text));
        self.state = ModeState::KeyboardActive;

        info!(
            "event=mode_switch module=sync status=ok handle={} to=keyboard len={}",
            self.handle,
            text.len()
        );
        Ok(text)
    }

    /// `KeyboardActive -> InkActive`. `text`, when given, is the current
    /// keyboard content and is submitted before the flush.
    pub fn switch_to_ink(&mut self, text: Option<&str>) -> SyncResult<()> {
        self.require(ModeState::KeyboardActive, "switch_to_ink")?;
        let now = self.ctx.now();
        let Some(keyboard) = self.keyboard.as_mut() else {
            return Err(self.invalid("switch_to_ink"));
        };
        if let Some(text) = text {
            keyboard.submit(text, now);
        }
        let previous_baseline = keyboard.baseline().to_string();
        let flushed = keyboard.force_flush();

        self.state = ModeState::Transitioning;
        let session = match self.open_ink_session(&flushed.text) {
            Ok(session) => session,
            Err(err) => {
                if let (Some(keyboard), Some(commit)) = (self.keyboard.as_mut(), flushed.commit) {
                    keyboard.reject(commit, previous_baseline);
                }
                self.state = ModeState::KeyboardActive;
                warn!(
                    "event=mode_switch module=sync status=error handle={} to=ink error={}",
                    self.handle, err
                );
                return Err(err);
            }
        };

        if let Some(mut keyboard) = self.keyboard.take() {
            keyboard.cancel();
        }
        self.ink = Some(session);
        self.state = ModeState::InkActive;
        info!(
            "event=mode_switch module=sync status=ok handle={} to=ink len={}",
            self.handle,
            flushed.text.len()
        );
        Ok(())
    }

    /// Records keyboard input and restarts the quiet period.
    pub fn on_keyboard_input(&mut self, text: &str) -> SyncResult<()> {
        self.require(ModeState::KeyboardActive, "on_keyboard_input")?;
        let now = self.ctx.now();
        match self.keyboard.as_mut() {
            Some(keyboard) => {
                keyboard.submit(text, now);
                Ok(())
            }
            None => Err(self.invalid("on_keyboard_input")),
        }
    }

    /// Arms the ink idle-save timer after a stroke ends.
    pub fn on_ink_input_ended(&mut self) -> SyncResult<()> {
        self.require(ModeState::InkActive, "on_ink_input_ended")?;
        self.ink_save_deadline = Some(self.ctx.now() + self.ctx.config().ink_idle_save_period());
        Ok(())
    }

    /// Commits the live surface now and returns its text.
    pub fn force_save(&mut self) -> SyncResult<String> {
        match self.state {
            ModeState::InkActive => {
                self.ink_save_deadline = None;
                let text = self.export_ink()?;
                self.note.text = Some(text.clone());
                Ok(text)
            }
            ModeState::KeyboardActive => self.flush_keyboard(),
            _ => Err(self.invalid("force_save")),
        }
    }

    /// Fires due timers: the keyboard quiet period or the ink idle-save.
    pub fn poll(&mut self) -> SyncResult<Option<TimerOutcome>> {
        let now = self.ctx.now();
        match self.state {
            ModeState::KeyboardActive => self.poll_keyboard(now),
            ModeState::InkActive => self.poll_ink(now),
            ModeState::Detached | ModeState::Transitioning => Ok(None),
        }
    }

    /// `Any -> Detached`. With `commit`, the live surface is committed first;
    /// the surface is released even when that commit fails.
    pub fn detach(&mut self, commit: bool) -> SyncResult<()> {
        if self.state == ModeState::Detached {
            return Ok(());
        }
        let committed = if commit {
            self.commit_live_surface()
        } else {
            Ok(())
        };
        self.release();
        info!(
            "event=mode_detach module=sync status={} handle={} commit={}",
            if committed.is_ok() { "ok" } else { "error" },
            self.handle,
            commit
        );
        committed
    }

    /// Screen disappearance: commits only when auto-save is enabled.
    pub fn on_disappear(&mut self) -> SyncResult<()> {
        self.detach(self.auto_save)
    }

    /// Modal commit: flush, make the package hold the text, then detach.
    pub fn commit_text_edit(&mut self) -> SyncResult<()> {
        self.require(ModeState::KeyboardActive, "commit_text_edit")?;
        let committed = self.flush_keyboard().and_then(|text| {
            let persistence = PersistenceCoordinator::new(self.ctx);
            let stored = persistence.stored_text(&self.note)?;
            if stored.as_deref().unwrap_or_default() == text {
                self.note.text = Some(text);
                Ok(())
            } else {
                persistence.import_text(&mut self.note, &text, None)
            }
        });
        self.release();
        committed
    }

    /// Modal cancel: discards keyboard input and detaches.
    pub fn cancel_text_edit(&mut self) -> SyncResult<()> {
        self.require(ModeState::KeyboardActive, "cancel_text_edit")?;
        if let Some(keyboard) = self.keyboard.as_mut() {
            keyboard.cancel();
        }
        self.release();
        debug!(
            "event=mode_cancel module=sync status=ok handle={}",
            self.handle
        );
        Ok(())
    }

    /// Cancels timers and releases both surfaces. Safe to call repeatedly.
    pub fn release(&mut self) {
        self.ink_save_deadline = None;
        if let Some(mut keyboard) = self.keyboard.take() {
            keyboard.cancel();
        }
        if let Some(mut session) = self.ink.take() {
            close_quietly(&mut session, self.handle);
        }
        self.state = ModeState::Detached;
    }

    fn commit_live_surface(&mut self) -> SyncResult<()> {
        match self.state {
            ModeState::InkActive => {
                let text = self.export_ink()?;
                self.note.text = Some(text);
                Ok(())
            }
            ModeState::KeyboardActive => self.flush_keyboard().map(|_| ()),
            _ => Ok(()),
        }
    }

    fn export_ink(&mut self) -> SyncResult<String> {
        let persistence = PersistenceCoordinator::new(self.ctx);
        match self.ink.as_mut() {
            Some(session) => persistence.export_text(session),
            None => Err(self.invalid("export")),
        }
    }

    /// Force-flushes the keyboard and persists a resulting commit.
    fn flush_keyboard(&mut self) -> SyncResult<String> {
        let Some(keyboard) = self.keyboard.as_mut() else {
            return Err(self.invalid("flush_keyboard"));
        };
        let previous_baseline = keyboard.baseline().to_string();
        let flushed = keyboard.force_flush();
        if let Some(commit) = flushed.commit {
            self.persist_keyboard_commit(commit, previous_baseline)?;
        }
        Ok(flushed.text)
    }

    fn poll_keyboard(&mut self, now: Instant) -> SyncResult<Option<TimerOutcome>> {
        let Some(keyboard) = self.keyboard.as_mut() else {
            return Ok(None);
        };
        let previous_baseline = keyboard.baseline().to_string();
        match keyboard.poll(now) {
            Some(commit) => {
                self.persist_keyboard_commit(commit.clone(), previous_baseline)?;
                Ok(Some(TimerOutcome::KeyboardCommitted(commit)))
            }
            None => Ok(None),
        }
    }

    fn poll_ink(&mut self, now: Instant) -> SyncResult<Option<TimerOutcome>> {
        match self.ink_save_deadline {
            Some(deadline) if deadline <= now => self.ink_save_deadline = None,
            _ => return Ok(None),
        }

        let idle = self
            .ink
            .as_mut()
            .and_then(|session| session.bound().map(|bound| bound.is_idle()))
            .unwrap_or(false);
        if !idle {
            debug!(
                "event=ink_idle_save module=sync status=skip reason=busy handle={}",
                self.handle
            );
            return Ok(Some(TimerOutcome::InkSaveSkipped));
        }

        let text = self.export_ink()?;
        self.note.text = Some(text.clone());
        Ok(Some(TimerOutcome::InkSaved { text }))
    }

    /// Keyboard mode has no bound ink editor, so commits go through a
    /// transient session.
    fn persist_keyboard_commit(
        &mut self,
        commit: Commit,
        previous_baseline: String,
    ) -> SyncResult<()> {
        let persisted = PersistenceCoordinator::new(self.ctx).import_text(
            &mut self.note,
            &commit.text,
            None,
        );
        if let Err(err) = persisted {
            if let Some(keyboard) = self.keyboard.as_mut() {
                keyboard.reject(commit, previous_baseline);
            }
            return Err(err);
        }
        Ok(())
    }

    /// Attaches a fresh ink session whose part holds `text`. The text is
    /// imported only when the stored part differs from it.
    fn open_ink_session(&mut self, text: &str) -> SyncResult<EditorSession<E>> {
        let mut session = EditorSession::open(self.ctx.engine())?;
        let persistence = PersistenceCoordinator::new(self.ctx);
        let loaded = persistence
            .load(&mut self.note, &mut session, None)
            .and_then(|()| {
                let stored = match session.bound() {
                    Some(bound) => bound.export_text()?,
                    None => String::new(),
                };
                if stored == text {
                    self.note.text = Some(stored);
                    Ok(())
                } else {
                    persistence.import_text(&mut self.note, text, Some(&mut session))
                }
            });
        match loaded {
            Ok(()) => Ok(session),
            Err(err) => {
                close_quietly(&mut session, self.handle);
                Err(err)
            }
        }
    }

    fn new_keyboard(&self, text: &str) -> DebounceScheduler {
        let config = self.ctx.config();
        DebounceScheduler::new(config.quiet_period(), config.dedupe_policy, text)
    }

    fn require(&self, expected: ModeState, operation: &'static str) -> SyncResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.invalid(operation))
        }
    }

    fn invalid(&self, operation: &'static str) -> SyncError {
        SyncError::InvalidState {
            operation,
            state: self.state,
        }
    }
}

impl<E: InkEngine> Drop for ModeCoordinator<'_, E> {
    fn drop(&mut self) {
        if self.state != ModeState::Detached {
            warn!(
                "event=mode_drop module=sync status=skip reason=not_detached handle={} state={:?}",
                self.handle, self.state
            );
            self.release();
        }
    }
}

fn close_quietly<E: InkEngine>(session: &mut EditorSession<E>, handle: SessionHandle) {
    if let Err(err) = session.close() {
        warn!(
            "event=session_release module=sync status=error handle={} error={}",
            handle, err
        );
    }
}
