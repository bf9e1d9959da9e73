use inknote_core::{
    EditingService, FaultPoint, InkNoteConfig, ManualClock, ModeState, Note, PlainTextEngine,
    Surface, SyncContext, SyncError, TimerOutcome,
};
use std::path::PathBuf;
use std::time::Duration;

fn context(clock: &ManualClock) -> SyncContext<PlainTextEngine> {
    SyncContext::with_clock(
        PlainTextEngine::new(),
        InkNoteConfig::default(),
        clock.clone(),
    )
}

#[test]
fn second_attach_to_same_package_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new();
    let ctx = context(&clock);
    let mut service = EditingService::new(&ctx);

    let first = service.attach(Note::in_directory("shared", dir.path())).unwrap();
    let err = service
        .attach_for_text_edit(Note::in_directory("shared", dir.path()))
        .unwrap_err();
    assert!(matches!(err, SyncError::PackageInUse(_)));
    assert_eq!(service.session_count(), 1);

    service.detach(first, false).unwrap();
    let again = service.attach(Note::in_directory("shared", dir.path())).unwrap();
    service.detach(again, false).unwrap();
}

#[test]
fn composed_and_decomposed_paths_name_the_same_package() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new();
    let ctx = context(&clock);
    let mut service = EditingService::new(&ctx);

    let composed = Note::new("cafe", None, dir.path().join("caf\u{e9}.iink"));
    let decomposed = Note::new("cafe2", None, dir.path().join("cafe\u{301}.iink"));
    let handle = service.attach(composed).unwrap();
    assert!(matches!(
        service.attach(decomposed),
        Err(SyncError::PackageInUse(_))
    ));
    service.detach(handle, false).unwrap();
}

#[test]
fn stale_handle_reports_unknown_session() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new();
    let ctx = context(&clock);
    let mut service = EditingService::new(&ctx);
    let handle = service.attach(Note::in_directory("stale", dir.path())).unwrap();
    service.detach(handle, true).unwrap();

    assert!(matches!(
        service.switch_to_keyboard(handle),
        Err(SyncError::UnknownSession(h)) if h == handle
    ));
    assert!(matches!(
        service.on_ink_input_ended(handle),
        Err(SyncError::UnknownSession(_))
    ));
}

#[test]
fn detach_returns_note_with_committed_text() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new();
    let ctx = context(&clock);
    let mut service = EditingService::new(&ctx);
    let handle = service.attach(Note::in_directory("detach", dir.path())).unwrap();

    service.switch_to_keyboard(handle).unwrap();
    service.on_keyboard_input(handle, "unsaved draft").unwrap();
    assert_eq!(service.live_surface(handle).unwrap(), Some(Surface::Keyboard));

    let note = service.detach(handle, true).unwrap();
    assert_eq!(note.text.as_deref(), Some("unsaved draft"));
    assert_eq!(service.session_count(), 0);
}

#[test]
fn poll_reports_outcomes_per_session() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new();
    let ctx = context(&clock);
    let mut service = EditingService::new(&ctx);
    let typing = service.attach(Note::in_directory("typing", dir.path())).unwrap();
    let drawing = service.attach(Note::in_directory("drawing", dir.path())).unwrap();

    service.switch_to_keyboard(typing).unwrap();
    service.on_keyboard_input(typing, "hello").unwrap();
    service.on_ink_input_ended(drawing).unwrap();

    clock.advance(Duration::from_millis(1_000));
    let fired = service.poll();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].0, typing);
    assert!(matches!(
        &fired[0].1,
        Ok(TimerOutcome::KeyboardCommitted(commit)) if commit.text == "hello"
    ));

    clock.advance(Duration::from_millis(1_000));
    let fired = service.poll();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].0, drawing);
    assert!(matches!(&fired[0].1, Ok(TimerOutcome::InkSaved { .. })));

    for (_, result) in service.detach_all(false) {
        result.unwrap();
    }
}

#[test]
fn failed_timer_commit_is_reported_and_retried_by_flush() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new();
    let ctx = context(&clock);
    let mut service = EditingService::new(&ctx);
    let handle = service.attach(Note::in_directory("flaky", dir.path())).unwrap();
    service.switch_to_keyboard(handle).unwrap();
    service.on_keyboard_input(handle, "keep me").unwrap();

    ctx.engine().inject_fault(FaultPoint::Save);
    clock.advance(Duration::from_millis(1_000));
    let fired = service.poll();
    assert!(matches!(
        fired.as_slice(),
        [(h, Err(SyncError::Persistence { .. }))] if *h == handle
    ));
    assert_eq!(service.keyboard_text(handle).unwrap(), Some("keep me"));

    assert_eq!(service.force_save(handle).unwrap(), "keep me");
    let note = service.detach(handle, false).unwrap();
    assert_eq!(note.text.as_deref(), Some("keep me"));
}

#[test]
fn modal_commit_and_cancel_end_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new();
    let ctx = context(&clock);
    let mut service = EditingService::new(&ctx);

    let handle = service
        .attach_for_text_edit(Note::in_directory("modal", dir.path()))
        .unwrap();
    assert_eq!(service.state(handle).unwrap(), ModeState::KeyboardActive);
    service.on_keyboard_input(handle, "typed").unwrap();
    let note = service.commit_text_edit(handle).unwrap();
    assert_eq!(note.text.as_deref(), Some("typed"));
    assert!(!service.is_attached(handle));

    let handle = service.attach_for_text_edit(note).unwrap();
    service.on_keyboard_input(handle, "thrown away").unwrap();
    let note = service.cancel_text_edit(handle).unwrap();
    assert_eq!(note.text.as_deref(), Some("typed"));
}

#[test]
fn delete_note_releases_attached_session_first() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new();
    let ctx = context(&clock);
    let mut service = EditingService::new(&ctx);
    let note = Note::in_directory("doomed", dir.path());
    let handle = service.attach(note.clone()).unwrap();
    service.force_save(handle).unwrap();
    assert!(note.ink_file_path.exists());

    service.delete_note(&note).unwrap();
    assert!(!service.is_attached(handle));
    assert!(!note.ink_file_path.exists());
}

#[test]
fn delete_note_without_package_is_noop() {
    let clock = ManualClock::new();
    let ctx = context(&clock);
    let mut service = EditingService::new(&ctx);
    let note = Note::new("nothing", None, PathBuf::from("/nonexistent/inknote/nothing.iink"));
    service.delete_note(&note).unwrap();
}
