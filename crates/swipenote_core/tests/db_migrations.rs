use rusqlite::Connection;
use swipenote_core::db::migrations::latest_version;
use swipenote_core::db::{open_db, open_db_in_memory, DbError};
use swipenote_core::{NoteDraft, NoteQuery, NoteStore, Priority, RepoError, SqliteNoteStore};

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_eq!(latest_version(), 2);
    assert_sqlite_object_exists(&conn, "table", "notes");
    assert_sqlite_object_exists(&conn, "index", "idx_notes_priority_modified");
}

#[test]
fn reopening_file_database_keeps_notes_and_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("swipenote.db");

    let id = {
        let mut store = SqliteNoteStore::try_new(open_db(&path).unwrap()).unwrap();
        store
            .insert(&NoteDraft::new("Groceries", "milk", Priority::High))
            .unwrap()
            .id
    };

    let conn = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn), latest_version());
    let store = SqliteNoteStore::try_new(conn).unwrap();
    let notes = store.query(&NoteQuery::all()).unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].id, id);
    assert_eq!(notes[0].priority, Priority::High);
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn failing_schema_step_is_named_and_rolled_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("CREATE TABLE notes (uuid TEXT NOT NULL);")
        .unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::MigrationFailed { version, name, .. } => {
            assert_eq!(version, 2);
            assert_eq!(name, "sort_indexes");
        }
        other => panic!("unexpected error: {other}"),
    }
    let conn = Connection::open(&path).unwrap();
    assert_eq!(schema_version(&conn), 0);
}

#[test]
fn store_rejects_connection_missing_columns() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TABLE notes (uuid TEXT NOT NULL);")
        .unwrap();

    let err = SqliteNoteStore::try_new(conn).err().unwrap();
    assert!(matches!(
        err,
        RepoError::MissingRequiredColumn {
            table: "notes",
            column: "seq"
        }
    ));
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_sqlite_object_exists(conn: &Connection, kind: &str, name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = ?1 AND name = ?2);",
            [kind, name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "{kind} `{name}` should exist");
}
