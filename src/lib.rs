#![deny(clippy::cargo)]
#![deny(clippy::complexity)]
#![deny(clippy::correctness)]
#![deny(clippy::nursery)]
#![deny(clippy::perf)]
#![deny(clippy::style)]
#![deny(clippy::suspicious)]
#![deny(clippy::pedantic)]

use serde::{Deserialize, Serialize};
use std::{io, path::PathBuf};
use thiserror::Error;

pub mod api;
pub mod app;
pub mod backends;
pub mod setup;

// More convenient Result type
pub type Result<T> = std::result::Result<T, NoteError>;

/// Placeholder persisted whenever a note is written without text
pub const DEFAULT_TEXT: &str = "No text provided";

/// A named text value. Also the JSON shape used on the wire and in the journal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub name: String,
    pub text: String,
}

impl Note {
    #[must_use]
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// Trait to be implemented by all backends that manage storing and retrieving notes.
///
/// Backends receive keys that already passed [`validate_key`] and text that already
/// had the default placeholder applied. All calls block on storage I/O.
pub trait NoteBackend: Send + Sync {
    /// Returns every stored note. Order is backend specific
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be read
    fn list(&self) -> Result<Vec<Note>>;

    /// Fetches a note by name
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NoteNotFound` if no such note exists, or a storage error
    fn get(&self, name: &str) -> Result<Note>;

    /// Stores a new note. Never overwrites
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Duplicate` if the name is taken, or a storage error
    fn create(&self, note: Note) -> Result<Note>;

    /// Replaces the text of an existing note
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NoteNotFound` if no such note exists, or a storage error
    fn replace(&self, note: Note) -> Result<()>;

    /// Removes a note and returns what was stored
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NoteNotFound` if no such note exists, or a storage error
    fn delete(&self, name: &str) -> Result<Note>;
}

/// Checks that a note name is usable as a single path segment.
///
/// # Errors
///
/// Returns `NoteValidationError::NameEmpty` for empty names and
/// `NoteValidationError::InvalidName` for `.`, `..`, separators and control characters
pub fn validate_key(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(NoteValidationError::NameEmpty.into());
    }
    if name == "." || name == ".." {
        return Err(NoteValidationError::InvalidName(name.to_string()).into());
    }
    if name
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_control())
    {
        return Err(NoteValidationError::InvalidName(name.to_string()).into());
    }
    Ok(())
}

/// Coarse classification of every error, used by the HTTP layer for status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    StorageFailure,
}

// Enum for all possible validation or backend-related errors
#[derive(Debug, Error)]
pub enum NoteError {
    #[error(transparent)]
    Validation(#[from] NoteValidationError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl NoteError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::InvalidArgument,
            Self::Backend(BackendError::NoteNotFound(_)) => ErrorKind::NotFound,
            Self::Backend(BackendError::Duplicate(_)) => ErrorKind::AlreadyExists,
            Self::Backend(_) => ErrorKind::StorageFailure,
        }
    }
}

// Enum for all possible data and input validation errors
#[derive(Debug, Error)]
pub enum NoteValidationError {
    #[error("Note name is missing or empty")]
    NameEmpty,

    #[error("Note name '{0}' is not allowed")]
    InvalidName(String),

    #[error("Name is too large. Max: {max}, Got: {got}")]
    NameTooLarge { max: usize, got: usize },

    #[error("Text is too large. Max: {max}, Got: {got}")]
    TextTooLarge { max: usize, got: usize },
}

// Enum for all possible backend errors
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Storage directory does not exist: {0}")]
    MissingDirectory(PathBuf),

    #[error("Failed creating directory for notes")]
    DirectoryCreationError(#[source] io::Error),

    #[error("Failed reading directory contents")]
    DirectoryReadError(#[source] io::Error),

    #[error("Failed writing note data")]
    FileWriteError(#[source] io::Error),

    #[error("Failed reading note data")]
    FileReadError(#[source] io::Error),

    #[error("Failed deleting note file")]
    FileDeleteError(#[source] io::Error),

    #[error("Journal file is not a valid JSON list of notes")]
    JournalCorrupted(#[source] serde_json::Error),

    #[error("Failed encoding journal")]
    JournalEncodeError(#[source] serde_json::Error),

    #[error("Database is locked or busy")]
    DatabaseBusy,

    #[error("Database file is not a valid SQLite database")]
    NotADatabase,

    #[error("Insufficient permissions")]
    PermissionDenied,

    #[error("Note not found: {0}")]
    NoteNotFound(String),

    #[error("Note already exists: {0}")]
    Duplicate(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error), // Used as fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        for name in ["todo", "shopping list", "..hidden", "a.b", "ñøte"] {
            assert!(validate_key(name).is_ok(), "{name} should be accepted");
        }
    }

    #[test]
    fn rejects_traversal_and_separators() {
        for name in ["", "   ", ".", "..", "../escape", "a/b", "a\\b", "nul\0byte", "line\nbreak"] {
            let err = validate_key(name).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{name:?}");
        }
    }

    #[test]
    fn classifies_backend_errors() {
        let not_found: NoteError = BackendError::NoteNotFound("x".into()).into();
        let duplicate: NoteError = BackendError::Duplicate("x".into()).into();
        let busy: NoteError = BackendError::DatabaseBusy.into();
        assert_eq!(not_found.kind(), ErrorKind::NotFound);
        assert_eq!(duplicate.kind(), ErrorKind::AlreadyExists);
        assert_eq!(busy.kind(), ErrorKind::StorageFailure);
    }
}
