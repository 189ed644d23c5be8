use std::io::Write;
use stickynote_core::store::legacy::{
    import_legacy_file, import_legacy_notes, parse_legacy_notes, LegacyImportError,
    LegacyImportReport,
};
use stickynote_core::{NoteId, NoteStore, SqliteNoteStore, WindowLevel};

const LEGACY_JSON: &str = r##"[
  {
    "id": "9b2f6c1e-0000-4000-8000-000000000001",
    "content": "<p>buy milk</p>",
    "bg_color": "#fff3a0",
    "fg_color": "#5a4520",
    "x": 120.4,
    "y": 80.6,
    "width": 320.0,
    "height": 280.0,
    "window_level": "alwaysOnTop",
    "created_at": "2024-05-01T08:00:00Z",
    "updated_at": "2024-05-02T09:30:00.250Z"
  },
  {
    "id": "9b2f6c1e-0000-4000-8000-000000000002",
    "content": "",
    "bg_color": "#0a0e14",
    "fg_color": "#00ff88",
    "x": -15.5,
    "y": 0.0,
    "width": 300.0,
    "height": 240.0,
    "created_at": "2024-05-03T10:00:00+02:00",
    "updated_at": "2024-05-03T10:00:00+02:00"
  }
]"##;

#[tokio::test]
async fn legacy_notes_import_with_identity_and_rounded_geometry() {
    let store = SqliteNoteStore::open_in_memory().unwrap();

    let report = import_legacy_notes(&store, parse_legacy_notes(LEGACY_JSON).unwrap()).unwrap();
    assert_eq!(
        report,
        LegacyImportReport {
            imported: 2,
            skipped: 0
        }
    );

    let first = store
        .get(&NoteId::from("9b2f6c1e-0000-4000-8000-000000000001"))
        .await
        .unwrap();
    assert_eq!((first.geometry.x, first.geometry.y), (120, 81));
    assert_eq!(first.window_level, WindowLevel::AlwaysOnTop);
    assert_eq!(first.updated_at.to_rfc3339(), "2024-05-02T09:30:00.250+00:00");

    let second = store
        .get(&NoteId::from("9b2f6c1e-0000-4000-8000-000000000002"))
        .await
        .unwrap();
    assert_eq!(second.window_level, WindowLevel::Normal);
    assert_eq!(second.created_at.to_rfc3339(), "2024-05-03T08:00:00+00:00");
    assert!(second.is_untouched());
}

#[tokio::test]
async fn importing_twice_skips_known_ids() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.json");
    std::fs::File::create(&path)
        .unwrap()
        .write_all(LEGACY_JSON.as_bytes())
        .unwrap();
    let store = SqliteNoteStore::open_in_memory().unwrap();

    import_legacy_file(&store, &path).unwrap();
    let again = import_legacy_file(&store, &path).unwrap();

    assert_eq!(again.imported, 0);
    assert_eq!(again.skipped, 2);
    assert_eq!(store.list().await.unwrap().len(), 2);
}

#[test]
fn missing_legacy_file_imports_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteNoteStore::open_in_memory().unwrap();

    let report = import_legacy_file(&store, dir.path().join("notes.json")).unwrap();
    assert_eq!(report, LegacyImportReport::default());
}

#[test]
fn malformed_legacy_document_is_a_parse_error() {
    let err = parse_legacy_notes(r#"[{"id": "x"}]"#).unwrap_err();
    assert!(matches!(err, LegacyImportError::Parse(_)));
}
