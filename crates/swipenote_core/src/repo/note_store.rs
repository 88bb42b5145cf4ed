//! Note store contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist note records keyed by store-assigned identity.
//! - Evaluate one-shot list queries in the order the query engine defines.
//!
//! # Invariants
//! - Identity is generated here, never accepted from callers.
//! - Every mutation is one statement or one transaction: a failed call
//!   leaves no partial change behind.
//! - `update`/`delete` of an absent id fail with `RepoError::NotFound`;
//!   `delete_all` never does.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::clock::{Clock, SystemClock};
use crate::db::DbError;
use crate::model::note::{Note, NoteDraft, NoteId, NotePatch, Priority};
use crate::search::query::NoteQuery;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

const NOTE_SELECT_SQL: &str = "SELECT
    uuid,
    title,
    content,
    priority,
    created_at,
    modified_at
FROM notes";

const REQUIRED_COLUMNS: [&str; 7] = [
    "seq",
    "uuid",
    "title",
    "content",
    "priority",
    "created_at",
    "modified_at",
];

pub type RepoResult<T> = Result<T, RepoError>;

/// Store-level error for note persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound(NoteId),
    InvalidData(String),
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// The mutation committed at `revision`, but `failed` live queries could
    /// not be re-evaluated and still show their previous result.
    NotifyFailed {
        revision: u64,
        failed: usize,
        source: Box<RepoError>,
    },
}

impl RepoError {
    /// Whether this error comes from durable storage rather than caller input.
    pub fn is_persistence(&self) -> bool {
        !matches!(self, Self::NotFound(_))
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "note not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted note data: {message}"),
            Self::MissingRequiredTable(table) => write!(f, "required table missing: {table}"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column missing: {table}.{column}")
            }
            Self::NotifyFailed {
                revision,
                failed,
                source,
            } => write!(
                f,
                "revision {revision} committed but {failed} live queries failed to refresh: {source}"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotifyFailed { source, .. } => Some(&**source),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Durable note persistence.
///
/// Mutations take `&mut self`; callers sharing a store across threads wrap
/// it in one mutex (see `NoteRepository`).
pub trait NoteStore: Send {
    /// Persists a draft under a freshly generated id.
    fn insert(&mut self, draft: &NoteDraft) -> RepoResult<Note>;
    /// Applies `patch` and returns the updated record.
    fn update(&mut self, id: NoteId, patch: &NotePatch) -> RepoResult<Note>;
    /// Removes one note and returns the removed payload.
    fn delete(&mut self, id: NoteId) -> RepoResult<Note>;
    /// Removes every note and returns how many were removed.
    fn delete_all(&mut self) -> RepoResult<usize>;
    fn get(&self, id: NoteId) -> RepoResult<Option<Note>>;
    /// Evaluates `query` once.
    fn query(&self, query: &NoteQuery) -> RepoResult<Vec<Note>>;
}

/// SQLite-backed note store.
pub struct SqliteNoteStore {
    conn: Connection,
    clock: Arc<dyn Clock>,
}

impl SqliteNoteStore {
    /// Constructs a store from a migrated connection, using the system clock.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        Self::with_clock(conn, Arc::new(SystemClock))
    }

    /// Constructs a store with a caller-provided timestamp source.
    pub fn with_clock(conn: Connection, clock: Arc<dyn Clock>) -> RepoResult<Self> {
        ensure_note_connection_ready(&conn)?;
        Ok(Self { conn, clock })
    }

    /// Read access to the underlying connection for diagnostics.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl NoteStore for SqliteNoteStore {
    fn insert(&mut self, draft: &NoteDraft) -> RepoResult<Note> {
        let now = self.clock.now_ms();
        let note = Note {
            id: Uuid::new_v4(),
            title: draft.title.clone(),
            content: draft.content.clone(),
            priority: draft.priority,
            created_at: now,
            modified_at: now,
        };

        self.conn.execute(
            "INSERT INTO notes (
                uuid,
                title,
                content,
                priority,
                created_at,
                modified_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                note.id.to_string(),
                note.title.as_str(),
                note.content.as_str(),
                note.priority.rank(),
                note.created_at,
                note.modified_at,
            ],
        )?;

        Ok(note)
    }

    fn update(&mut self, id: NoteId, patch: &NotePatch) -> RepoResult<Note> {
        let now = self.clock.now_ms();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut note = load_note(&tx, id)?.ok_or(RepoError::NotFound(id))?;
        if !note.apply(patch, now) {
            return Ok(note);
        }

        tx.execute(
            "UPDATE notes
             SET
                title = ?2,
                content = ?3,
                priority = ?4,
                modified_at = ?5
             WHERE uuid = ?1;",
            params![
                id.to_string(),
                note.title.as_str(),
                note.content.as_str(),
                note.priority.rank(),
                note.modified_at,
            ],
        )?;
        tx.commit()?;

        Ok(note)
    }

    fn delete(&mut self, id: NoteId) -> RepoResult<Note> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let note = load_note(&tx, id)?.ok_or(RepoError::NotFound(id))?;
        tx.execute("DELETE FROM notes WHERE uuid = ?1;", [id.to_string()])?;
        tx.commit()?;
        Ok(note)
    }

    fn delete_all(&mut self) -> RepoResult<usize> {
        let removed = self.conn.execute("DELETE FROM notes;", [])?;
        Ok(removed)
    }

    fn get(&self, id: NoteId) -> RepoResult<Option<Note>> {
        load_note(&self.conn, id)
    }

    fn query(&self, query: &NoteQuery) -> RepoResult<Vec<Note>> {
        let sql = format!(
            "{NOTE_SELECT_SQL} ORDER BY {};",
            query.order.order_by_sql()
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let mut rows = stmt.query([])?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            let note = parse_note_row(row)?;
            if query.matches(&note) {
                notes.push(note);
            }
        }
        Ok(notes)
    }
}

fn load_note(conn: &Connection, id: NoteId) -> RepoResult<Option<Note>> {
    let mut stmt = conn.prepare_cached(&format!("{NOTE_SELECT_SQL} WHERE uuid = ?1;"))?;
    let row = stmt
        .query_row([id.to_string()], |row| Ok(parse_note_row(row)))
        .optional()?;
    row.transpose()
}

fn parse_note_row(row: &Row<'_>) -> RepoResult<Note> {
    let uuid_text: String = row.get("uuid")?;
    let id = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{uuid_text}` in notes.uuid"))
    })?;

    let rank: i64 = row.get("priority")?;
    let priority = Priority::from_rank(rank).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid priority `{rank}` in notes.priority"))
    })?;

    Ok(Note {
        id,
        title: row.get("title")?,
        content: row.get("content")?,
        priority,
        created_at: row.get("created_at")?,
        modified_at: row.get("modified_at")?,
    })
}

fn ensure_note_connection_ready(conn: &Connection) -> RepoResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = 'notes'
        );",
        [],
        |row| row.get(0),
    )?;
    if exists != 1 {
        return Err(RepoError::MissingRequiredTable("notes"));
    }

    let mut stmt = conn.prepare("PRAGMA table_info(notes);")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    for column in REQUIRED_COLUMNS {
        if !columns.iter().any(|current| current == column) {
            return Err(RepoError::MissingRequiredColumn {
                table: "notes",
                column,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{NoteStore, RepoError, SqliteNoteStore};
    use crate::db::open_db_in_memory;
    use crate::model::note::{NoteDraft, Priority};
    use rusqlite::Connection;

    #[test]
    fn try_new_rejects_unmigrated_connection() {
        let conn = Connection::open_in_memory().unwrap();
        let err = SqliteNoteStore::try_new(conn).err().unwrap();
        assert!(matches!(err, RepoError::MissingRequiredTable("notes")));
    }

    #[test]
    fn invalid_persisted_priority_is_rejected() {
        let mut store = SqliteNoteStore::try_new(open_db_in_memory().unwrap()).unwrap();
        let note = store
            .insert(&NoteDraft::new("t", "c", Priority::High))
            .unwrap();
        store
            .connection()
            .execute_batch("PRAGMA ignore_check_constraints = ON; UPDATE notes SET priority = 9;")
            .unwrap();

        let err = store.get(note.id).unwrap_err();
        assert!(matches!(err, RepoError::InvalidData(_)));
        assert!(err.is_persistence());
    }

    #[test]
    fn notify_failure_chains_the_read_error() {
        let err = RepoError::NotifyFailed {
            revision: 7,
            failed: 1,
            source: Box::new(RepoError::InvalidData("bad row".to_string())),
        };
        assert!(err.is_persistence());
        assert!(err.to_string().starts_with("revision 7 committed"));
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(
            source.as_deref(),
            Some("invalid persisted note data: bad row")
        );
    }
}
