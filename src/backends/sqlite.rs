use super::{BackendError, Note, NoteBackend, NoteError, Result};
use log::trace;
use parking_lot::Mutex;
use rusqlite::{Connection, Error as SqliteError, ErrorCode, OptionalExtension, params};
use std::{fs, path::Path};

/// Name of the database file inside the cache directory
pub const DATABASE_FILE: &str = "notes.db";

#[derive(Debug)]
pub struct SqliteBackend {
    connection: Mutex<Connection>,
}

impl SqliteBackend {
    /// Opens (or creates) `notes.db` in `dir` and ensures that the `notes` table exists.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::DirectoryCreationError` if `dir` cannot be created, or a
    /// mapped `SQLite` error if the database cannot be opened or initialized
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(BackendError::DirectoryCreationError)?;
        let path = dir.join(DATABASE_FILE);
        let connection = Connection::open(&path).map_err(map_sqlite_error)?;

        // Create notes table if it doesn't exist
        connection
            .execute(
                "
                CREATE TABLE IF NOT EXISTS notes (
                    name TEXT PRIMARY KEY NOT NULL,
                    text TEXT NOT NULL
                )
                ",
                [],
            )
            .map_err(map_sqlite_error)?;
        trace!("Opened database at {}", path.display());

        Ok(Self {
            connection: Mutex::new(connection),
        })
    }
}

/// Maps a `rusqlite::Error` into a `NoteError`, wrapping known SQLite-specific codes into domain-specific variants.
///
/// This function is used internally by all database operations.
///
/// # Errors
///
/// Always returns a `NoteError::Backend` variant. Specific known `SQLite` error codes
/// are converted to more descriptive errors; all others are wrapped in `BackendError::Other`.
fn map_sqlite_error(e: SqliteError) -> NoteError {
    match e {
        SqliteError::SqliteFailure(code, _) => match code.code {
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                NoteError::Backend(BackendError::DatabaseBusy)
            }
            ErrorCode::PermissionDenied | ErrorCode::ReadOnly => {
                NoteError::Backend(BackendError::PermissionDenied)
            }
            ErrorCode::NotADatabase => NoteError::Backend(BackendError::NotADatabase),
            _ => NoteError::Backend(BackendError::Other(anyhow::anyhow!(
                "SQLite error: {:?}",
                code
            ))),
        },
        other => NoteError::Backend(BackendError::Other(anyhow::Error::new(other))),
    }
}

fn is_constraint_violation(e: &SqliteError) -> bool {
    matches!(e, SqliteError::SqliteFailure(code, _) if code.code == ErrorCode::ConstraintViolation)
}

impl NoteBackend for SqliteBackend {
    /// Returns all notes in insertion order
    ///
    /// # Errors
    ///
    /// Returns a mapped `SQLite` error if the query fails
    fn list(&self) -> Result<Vec<Note>> {
        let connection = self.connection.lock();
        let mut statement = connection
            .prepare("SELECT name, text FROM notes ORDER BY rowid")
            .map_err(map_sqlite_error)?;
        let notes = statement
            .query_map([], |row| {
                Ok(Note {
                    name: row.get(0)?,
                    text: row.get(1)?,
                })
            })
            .map_err(map_sqlite_error)?
            .collect::<std::result::Result<Vec<Note>, _>>()
            .map_err(map_sqlite_error)?;
        Ok(notes)
    }

    /// Reads a note by name.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `BackendError::NoteNotFound` if no note with the given name exists.
    /// - Other mapped `SQLite` errors for query failure.
    fn get(&self, name: &str) -> Result<Note> {
        self.connection
            .lock()
            .query_row("SELECT text FROM notes WHERE name = ?1", [name], |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .map_err(map_sqlite_error)?
            .map(|text| Note::new(name, text))
            .ok_or_else(|| NoteError::Backend(BackendError::NoteNotFound(name.to_string())))
    }

    /// Inserts a new note. The primary key rejects duplicates.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `BackendError::Duplicate` if the name is already taken.
    /// - Other mapped `SQLite` errors.
    fn create(&self, note: Note) -> Result<Note> {
        self.connection
            .lock()
            .execute(
                "INSERT INTO notes (name, text) VALUES (?1, ?2)",
                params![note.name, note.text],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    NoteError::Backend(BackendError::Duplicate(note.name.clone()))
                } else {
                    map_sqlite_error(e)
                }
            })?;
        Ok(note)
    }

    /// Replaces the text of an existing note.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `BackendError::NoteNotFound` if no rows were updated.
    /// - Other mapped `SQLite` errors.
    fn replace(&self, note: Note) -> Result<()> {
        let changed = self
            .connection
            .lock()
            .execute(
                "UPDATE notes SET text = ?2 WHERE name = ?1",
                params![note.name, note.text],
            )
            .map_err(map_sqlite_error)?;
        if changed == 0 {
            return Err(NoteError::Backend(BackendError::NoteNotFound(note.name)));
        }
        Ok(())
    }

    /// Deletes a note and returns its text in the same statement.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `BackendError::NoteNotFound` if no note with the given name exists.
    /// - Other mapped `SQLite` errors.
    fn delete(&self, name: &str) -> Result<Note> {
        self.connection
            .lock()
            .query_row(
                "DELETE FROM notes WHERE name = ?1 RETURNING text",
                [name],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(map_sqlite_error)?
            .map(|text| Note::new(name, text))
            .ok_or_else(|| NoteError::Backend(BackendError::NoteNotFound(name.to_string())))
    }
}
