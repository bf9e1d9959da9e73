use inknote_core::{
    ContentPackage, EditorSession, FaultPoint, InkEngine, InkNoteConfig, Note, OpenOption,
    PersistenceCoordinator, PlainTextEngine, SyncContext, SyncError,
};

fn context() -> SyncContext<PlainTextEngine> {
    SyncContext::new(PlainTextEngine::new(), InkNoteConfig::default())
}

#[test]
fn empty_import_without_package_is_idempotent_noop() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context();
    let persistence = PersistenceCoordinator::new(&ctx);
    let mut note = Note::in_directory("empty", dir.path());

    persistence.import_text(&mut note, "", None).unwrap();
    persistence.import_text(&mut note, "", None).unwrap();

    assert!(!note.ink_file_path.exists());
    assert_eq!(note.text.as_deref(), Some(""));
}

#[test]
fn import_then_export_round_trips_text() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context();
    let persistence = PersistenceCoordinator::new(&ctx);
    let mut note = Note::in_directory("round", dir.path());

    persistence
        .import_text(&mut note, "Buy milk\nand eggs", None)
        .unwrap();
    assert_eq!(note.text.as_deref(), Some("Buy milk\nand eggs"));

    let mut session = EditorSession::open(ctx.engine()).unwrap();
    persistence.load(&mut note, &mut session, None).unwrap();
    assert_eq!(
        persistence.export_text(&mut session).unwrap(),
        "Buy milk\nand eggs"
    );
    session.close().unwrap();
}

#[test]
fn second_import_replaces_root_block() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context();
    let persistence = PersistenceCoordinator::new(&ctx);
    let mut note = Note::in_directory("replace", dir.path());
    let mut session = EditorSession::open(ctx.engine()).unwrap();
    persistence.load(&mut note, &mut session, None).unwrap();

    persistence
        .import_text(&mut note, "first", Some(&mut session))
        .unwrap();
    persistence
        .import_text(&mut note, "second", Some(&mut session))
        .unwrap();
    assert_eq!(persistence.export_text(&mut session).unwrap(), "second");
    session.close().unwrap();
}

#[test]
fn empty_import_with_package_erases_content() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context();
    let persistence = PersistenceCoordinator::new(&ctx);
    let mut note = Note::in_directory("wipe", dir.path());
    persistence.import_text(&mut note, "scribble", None).unwrap();

    persistence.import_text(&mut note, "", None).unwrap();
    assert_eq!(note.text.as_deref(), Some(""));

    let mut session = EditorSession::open(ctx.engine()).unwrap();
    persistence.load(&mut note, &mut session, None).unwrap();
    assert_eq!(persistence.export_text(&mut session).unwrap(), "");
    session.close().unwrap();
}

#[test]
fn failed_import_keeps_cached_text() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context();
    let persistence = PersistenceCoordinator::new(&ctx);
    let mut note = Note::in_directory("keep", dir.path());
    persistence.import_text(&mut note, "stable", None).unwrap();

    ctx.engine().inject_fault(FaultPoint::Import);
    let err = persistence
        .import_text(&mut note, "lost", None)
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::ImportExport {
            operation: "import",
            ..
        }
    ));
    assert_eq!(note.text.as_deref(), Some("stable"));
}

#[test]
fn save_failure_is_persistence_error() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context();
    let persistence = PersistenceCoordinator::new(&ctx);
    let mut note = Note::in_directory("disk", dir.path());

    ctx.engine().inject_fault(FaultPoint::Save);
    let err = persistence.import_text(&mut note, "text", None).unwrap_err();
    assert!(matches!(err, SyncError::Persistence { .. }));
    assert_eq!(note.text, None);
}

#[test]
fn load_failure_is_package_open_error() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context();
    let persistence = PersistenceCoordinator::new(&ctx);
    let mut note = Note::in_directory("broken", dir.path());
    std::fs::write(&note.ink_file_path, "not a package").unwrap();

    let mut session = EditorSession::open(ctx.engine()).unwrap();
    let err = persistence.load(&mut note, &mut session, None).unwrap_err();
    assert!(matches!(err, SyncError::PackageOpen { .. }));
    session.close().unwrap();
}

#[test]
fn delete_without_backing_file_succeeds_without_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context();
    let persistence = PersistenceCoordinator::new(&ctx);
    let note = Note::in_directory("ghost", dir.path());

    persistence.delete(&note, None).unwrap();
    assert!(!note.ink_file_path.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn delete_erases_and_removes_package() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context();
    let persistence = PersistenceCoordinator::new(&ctx);
    let mut note = Note::in_directory("gone", dir.path());
    persistence.import_text(&mut note, "bye", None).unwrap();
    assert!(note.ink_file_path.exists());

    persistence.delete(&note, None).unwrap();
    assert!(!note.ink_file_path.exists());
}

#[test]
fn failed_file_removal_reports_deletion_after_erase() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context();
    let persistence = PersistenceCoordinator::new(&ctx);
    let mut note = Note::in_directory("stuck", dir.path());
    persistence.import_text(&mut note, "content", None).unwrap();

    ctx.engine().inject_fault(FaultPoint::Remove);
    let err = persistence.delete(&note, None).unwrap_err();
    assert!(matches!(err, SyncError::Deletion { .. }));

    let package = ctx
        .engine()
        .open_package(&note.ink_file_path, OpenOption::Existing)
        .unwrap();
    assert_eq!(package.part_count(), 0);
}

#[test]
fn delete_unbinds_attached_session() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context();
    let persistence = PersistenceCoordinator::new(&ctx);
    let mut note = Note::in_directory("bound", dir.path());
    let mut session = EditorSession::open(ctx.engine()).unwrap();
    persistence
        .load(&mut note, &mut session, Some("inked"))
        .unwrap();

    persistence.delete(&note, Some(&mut session)).unwrap();
    assert!(!note.ink_file_path.exists());
    assert!(session.bound().is_none());
    session.close().unwrap();
}

#[test]
fn invalid_note_id_is_rejected_before_touching_storage() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context();
    let persistence = PersistenceCoordinator::new(&ctx);
    let mut note = Note::in_directory("../escape", dir.path());
    let mut session = EditorSession::open(ctx.engine()).unwrap();

    let err = persistence.load(&mut note, &mut session, None).unwrap_err();
    assert!(matches!(err, SyncError::InvalidNote(_)));
    session.close().unwrap();
}
