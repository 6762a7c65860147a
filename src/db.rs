mod schema;

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use time::OffsetDateTime;
use tracing::debug;

use crate::error::StoreResult;
use crate::models::{Color, ColorId, Note, NoteBuilder, NoteId, Tag, TagId};

use schema::{INITIAL_SCHEMA, SEED_COLOR};

/// How long a writer waits for another connection's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const NOTE_COLUMNS: &str = "id, title, content, tag_id, color_id, created_at, updated_at";

/// Database wrapper providing connection management, schema initialization
/// and the note, tag and color queries.
///
/// All methods are synchronous. Callers that must not block (view-models)
/// go through [`SqliteRepository`](crate::repository::SqliteRepository),
/// which moves each call onto a worker thread.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens an in-memory SQLite database.
    ///
    /// Automatically initializes the schema on connection open.
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize_schema()?;
        Ok(db)
    }

    /// Opens a file-based SQLite database at the given path.
    ///
    /// Creates the database file if it does not exist. Other connections to
    /// the same file are waited on for up to five seconds.
    /// Automatically initializes the schema on connection open.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Self { conn };
        db.initialize_schema()?;
        Ok(db)
    }

    /// Initializes the database schema and seeds the color palette.
    ///
    /// Uses IF NOT EXISTS / INSERT OR IGNORE for idempotent execution.
    fn initialize_schema(&self) -> StoreResult<()> {
        self.conn.execute("PRAGMA foreign_keys = ON", [])?;
        self.conn.execute_batch(INITIAL_SCHEMA)?;

        let mut stmt = self.conn.prepare(SEED_COLOR)?;
        for (index, (name, hex)) in Color::PALETTE.iter().enumerate() {
            stmt.execute(params![index as i64 + 1, name, hex])?;
        }

        Ok(())
    }

    /// Returns a reference to the underlying connection.
    ///
    /// Useful for executing custom queries in tests.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Runs `f` inside a transaction, committing on success and rolling back
    /// on error.
    ///
    /// `BEGIN IMMEDIATE` takes the write lock up front so a read-then-write
    /// sequence cannot interleave with another writer. A failed `COMMIT`
    /// (e.g. a reader outlasting the busy timeout) is rolled back too, so
    /// the connection is always back in autocommit mode afterwards.
    fn in_transaction<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        self.conn.execute("BEGIN IMMEDIATE", [])?;

        let result = f(&self.conn).and_then(|value| {
            self.conn.execute("COMMIT", [])?;
            Ok(value)
        });
        if result.is_err() && !self.conn.is_autocommit() {
            self.conn.execute("ROLLBACK", []).ok();
        }
        result
    }

    // --- Notes ---

    /// Lists every note in insertion order.
    pub fn list_notes(&self) -> StoreResult<Vec<Note>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {NOTE_COLUMNS} FROM notes ORDER BY id"))?;
        let notes = stmt
            .query_map([], note_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notes)
    }

    /// Returns the notes whose id is in `ids`, in insertion order.
    ///
    /// Unknown ids are skipped.
    pub fn find_notes_by_ids(&self, ids: &[NoteId]) -> StoreResult<Vec<Note>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let query =
            format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id IN ({placeholders}) ORDER BY id");

        let mut stmt = self.conn.prepare(&query)?;
        let notes = stmt
            .query_map(params_from_iter(ids.iter().map(|id| id.get())), note_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notes)
    }

    /// Retrieves a note by its ID.
    ///
    /// Returns `None` if no note exists with the given ID. This is not
    /// considered an error condition.
    pub fn find_note(&self, id: NoteId) -> StoreResult<Option<Note>> {
        let note = self
            .conn
            .query_row(
                &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1"),
                [id.get()],
                note_from_row,
            )
            .optional()?;
        Ok(note)
    }

    /// Inserts a note, or replaces the stored row with the same id.
    ///
    /// A note without an id gets a fresh one. Saving the same id twice
    /// overwrites the row rather than duplicating it; `created_at` of an
    /// existing row is preserved.
    pub fn upsert_note(&self, note: &Note) -> StoreResult<NoteId> {
        upsert_note_with_conn(&self.conn, note)
    }

    /// Inserts or replaces several notes in one transaction.
    pub fn upsert_notes(&self, notes: &[Note]) -> StoreResult<Vec<NoteId>> {
        self.in_transaction(|conn| {
            notes
                .iter()
                .map(|note| upsert_note_with_conn(conn, note))
                .collect()
        })
    }

    /// Deletes a note by its ID.
    ///
    /// Returns `false` when no row matched. Deleting a missing note is not
    /// an error.
    pub fn delete_note(&self, id: NoteId) -> StoreResult<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM notes WHERE id = ?1", [id.get()])?;
        Ok(affected > 0)
    }

    // --- Tags ---

    /// Lists all tags ordered by title.
    pub fn list_tags(&self) -> StoreResult<Vec<Tag>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, title FROM tags ORDER BY title")?;
        let tags = stmt
            .query_map([], tag_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    /// Retrieves a tag by its ID, or `None` if it does not exist.
    pub fn find_tag(&self, id: TagId) -> StoreResult<Option<Tag>> {
        let tag = self
            .conn
            .query_row(
                "SELECT id, title FROM tags WHERE id = ?1",
                [id.get()],
                tag_from_row,
            )
            .optional()?;
        Ok(tag)
    }

    /// Returns the tags whose id is in `ids`.
    pub fn find_tags_by_ids(&self, ids: &[TagId]) -> StoreResult<Vec<Tag>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let query = format!("SELECT id, title FROM tags WHERE id IN ({placeholders}) ORDER BY id");

        let mut stmt = self.conn.prepare(&query)?;
        let tags = stmt
            .query_map(params_from_iter(ids.iter().map(|id| id.get())), tag_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    /// Looks up a tag id by exact title match.
    pub fn find_tag_id_by_title(&self, title: &str) -> StoreResult<Option<TagId>> {
        find_tag_id_with_conn(&self.conn, title)
    }

    /// Inserts a new tag and returns its id.
    ///
    /// Fails with a constraint violation if the title already exists.
    pub fn insert_tag(&self, title: &str) -> StoreResult<TagId> {
        self.conn
            .execute("INSERT INTO tags (title) VALUES (?1)", [title])?;
        Ok(TagId::new(self.conn.last_insert_rowid()))
    }

    /// Gets or creates a tag by title.
    ///
    /// The lookup and the insert run in one write transaction, and the
    /// `UNIQUE(title)` constraint makes a racing insert from another
    /// connection a no-op, so a title always maps to exactly one row.
    pub fn get_or_create_tag(&self, title: &str) -> StoreResult<TagId> {
        self.in_transaction(|conn| {
            if let Some(id) = find_tag_id_with_conn(conn, title)? {
                return Ok(id);
            }

            conn.execute(
                "INSERT INTO tags (title) VALUES (?1) ON CONFLICT(title) DO NOTHING",
                [title],
            )?;
            debug!(tag = title, "created tag");

            let id: i64 =
                conn.query_row("SELECT id FROM tags WHERE title = ?1", [title], |row| {
                    row.get(0)
                })?;
            Ok(TagId::new(id))
        })
    }

    // --- Colors ---

    /// Lists the color palette in id order.
    pub fn list_colors(&self) -> StoreResult<Vec<Color>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, hex FROM colors ORDER BY id")?;
        let colors = stmt
            .query_map([], color_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(colors)
    }

    /// Retrieves a palette entry by id, or `None` if it does not exist.
    pub fn find_color(&self, id: ColorId) -> StoreResult<Option<Color>> {
        let color = self
            .conn
            .query_row(
                "SELECT id, name, hex FROM colors WHERE id = ?1",
                [id.get()],
                color_from_row,
            )
            .optional()?;
        Ok(color)
    }
}

fn upsert_note_with_conn(conn: &Connection, note: &Note) -> StoreResult<NoteId> {
    let now = OffsetDateTime::now_utc().unix_timestamp();

    conn.execute(
        "INSERT INTO notes (id, title, content, tag_id, color_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
         ON CONFLICT(id) DO UPDATE SET
             title = excluded.title,
             content = excluded.content,
             tag_id = excluded.tag_id,
             color_id = excluded.color_id,
             updated_at = excluded.updated_at",
        params![
            note.id().map(NoteId::get),
            note.title(),
            note.content(),
            note.tag_id().map(TagId::get),
            note.color_id().map(ColorId::get),
            now,
        ],
    )?;

    Ok(note
        .id()
        .unwrap_or_else(|| NoteId::new(conn.last_insert_rowid())))
}

fn find_tag_id_with_conn(conn: &Connection, title: &str) -> StoreResult<Option<TagId>> {
    let id = conn
        .query_row("SELECT id FROM tags WHERE title = ?1", [title], |row| {
            row.get::<_, i64>(0)
        })
        .optional()?;
    Ok(id.map(TagId::new))
}

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    let tag_id: Option<i64> = row.get(3)?;
    let color_id: Option<i64> = row.get(4)?;

    Ok(NoteBuilder::new()
        .id(NoteId::new(row.get(0)?))
        .title(row.get::<_, String>(1)?)
        .content(row.get::<_, String>(2)?)
        .tag_id(tag_id.map(TagId::new))
        .color_id(color_id.map(ColorId::new))
        .created_at(timestamp(row, 5)?)
        .updated_at(timestamp(row, 6)?)
        .build())
}

fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag::new(TagId::new(row.get(0)?), row.get::<_, String>(1)?))
}

fn color_from_row(row: &Row<'_>) -> rusqlite::Result<Color> {
    Ok(Color::new(
        ColorId::new(row.get(0)?),
        row.get::<_, String>(1)?,
        row.get::<_, String>(2)?,
    ))
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<OffsetDateTime> {
    let secs: i64 = row.get(idx)?;
    OffsetDateTime::from_unix_timestamp(secs).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Integer, Box::new(e))
    })
}
