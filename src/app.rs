use crate::{DEFAULT_TEXT, Note, NoteBackend, NoteValidationError, Result, validate_key};
use log::{info, trace};

pub const DEFAULT_MAX_NAME_SIZE: usize = 255;
pub const DEFAULT_MAX_TEXT_SIZE: usize = 1024 * 1024;

/// The note store handed to every request handler
pub struct NoteService {
    pub repo: Box<dyn NoteBackend>,
    pub max_name_size: usize,
    pub max_text_size: usize,
}

impl NoteService {
    #[must_use]
    pub fn new(repo: Box<dyn NoteBackend>, max_name_size: usize, max_text_size: usize) -> Self {
        Self {
            repo,
            max_name_size,
            max_text_size,
        }
    }

    /// Service with the default size limits
    #[must_use]
    pub fn with_defaults(repo: Box<dyn NoteBackend>) -> Self {
        Self::new(repo, DEFAULT_MAX_NAME_SIZE, DEFAULT_MAX_TEXT_SIZE)
    }

    /// Retrieve all notes
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read
    pub fn list_notes(&self) -> Result<Vec<Note>> {
        self.repo.list()
    }

    /// Read a single note by name
    ///
    /// # Errors
    ///
    /// Returns a validation error for unusable names, `NoteNotFound` if absent
    pub fn read_note(&self, name: &str) -> Result<Note> {
        self.validate_name(name)?;
        self.repo.get(name).inspect_err(|e| trace!("Failed reading note {name}: {e}"))
    }

    /// Create a note. Fails if a note with the same name exists
    ///
    /// # Errors
    ///
    /// Returns `NameEmpty` if `name` is missing, `Duplicate` if it is taken,
    /// or a storage error
    pub fn create_note(&self, name: Option<&str>, text: Option<&str>) -> Result<Note> {
        let name = name.ok_or(NoteValidationError::NameEmpty)?;
        self.validate_name(name)?;
        let text = self.resolve_text(text)?;

        let note = self.repo.create(Note::new(name, text))?;
        info!("Note {name} created successfully");
        Ok(note)
    }

    /// Replace the whole text of an existing note
    ///
    /// # Errors
    ///
    /// Returns `NoteNotFound` if the note does not exist, or a storage error
    pub fn update_note(&self, name: &str, text: Option<&str>) -> Result<Note> {
        self.validate_name(name)?;
        let text = self.resolve_text(text)?;

        let note = Note::new(name, text);
        self.repo.replace(note.clone())?;
        info!("Note {name} updated successfully");
        Ok(note)
    }

    /// Delete a note and return what it contained
    ///
    /// # Errors
    ///
    /// Returns `NoteNotFound` if the note does not exist, or a storage error
    pub fn delete_note(&self, name: &str) -> Result<Note> {
        self.validate_name(name)?;
        let note = self.repo.delete(name)?;
        info!("Note {name} deleted successfully");
        Ok(note)
    }

    // --- small helpers ---

    // Validate note name: usable as a key and within the size limit
    fn validate_name(&self, name: &str) -> Result<()> {
        validate_key(name)?;
        if name.len() > self.max_name_size {
            return Err(NoteValidationError::NameTooLarge {
                max: self.max_name_size,
                got: name.len(),
            }
            .into());
        }
        Ok(())
    }

    // Missing and empty text both become the placeholder
    fn resolve_text(&self, text: Option<&str>) -> Result<String> {
        match text {
            None | Some("") => {
                trace!("No text supplied, using placeholder");
                Ok(DEFAULT_TEXT.to_string())
            }
            Some(t) if t.len() > self.max_text_size => Err(NoteValidationError::TextTooLarge {
                max: self.max_text_size,
                got: t.len(),
            }
            .into()),
            Some(t) => Ok(t.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::backends::{FilesystemBackend, JournalBackend, SqliteBackend};
    use std::collections::HashSet;
    use tempfile::{TempDir, tempdir};

    // One service per backend, each in its own directory
    fn services() -> Vec<(TempDir, NoteService)> {
        let files = tempdir().unwrap();
        let journal = tempdir().unwrap();
        let sqlite = tempdir().unwrap();
        let files_repo = FilesystemBackend::new(files.path()).unwrap();
        let journal_repo = JournalBackend::new(journal.path()).unwrap();
        let sqlite_repo = SqliteBackend::new(sqlite.path()).unwrap();
        vec![
            (files, NoteService::with_defaults(Box::new(files_repo))),
            (journal, NoteService::with_defaults(Box::new(journal_repo))),
            (sqlite, NoteService::with_defaults(Box::new(sqlite_repo))),
        ]
    }

    #[test]
    fn create_then_read_returns_text() {
        for (_dir, service) in services() {
            let created = service.create_note(Some("todo"), Some("buy milk")).unwrap();
            assert_eq!(created, Note::new("todo", "buy milk"));
            assert_eq!(service.read_note("todo").unwrap().text, "buy milk");
        }
    }

    #[test]
    fn missing_or_empty_text_persists_placeholder() {
        for (_dir, service) in services() {
            service.create_note(Some("a"), None).unwrap();
            service.create_note(Some("b"), Some("")).unwrap();
            assert_eq!(service.read_note("a").unwrap().text, DEFAULT_TEXT);
            assert_eq!(service.read_note("b").unwrap().text, DEFAULT_TEXT);

            service.update_note("a", Some("real text")).unwrap();
            service.update_note("a", None).unwrap();
            assert_eq!(service.read_note("a").unwrap().text, DEFAULT_TEXT);
        }
    }

    #[test]
    fn second_create_is_always_rejected() {
        for (_dir, service) in services() {
            service.create_note(Some("todo"), Some("first")).unwrap();
            for text in [Some("first"), Some("other"), None] {
                let err = service.create_note(Some("todo"), text).unwrap_err();
                assert_eq!(err.kind(), ErrorKind::AlreadyExists);
            }
            assert_eq!(service.read_note("todo").unwrap().text, "first");
        }
    }

    #[test]
    fn delete_then_read_is_not_found() {
        for (_dir, service) in services() {
            service.create_note(Some("todo"), Some("buy milk")).unwrap();
            let removed = service.delete_note("todo").unwrap();
            assert_eq!(removed.text, "buy milk");
            assert_eq!(service.read_note("todo").unwrap_err().kind(), ErrorKind::NotFound);
            assert_eq!(service.delete_note("todo").unwrap_err().kind(), ErrorKind::NotFound);
        }
    }

    #[test]
    fn last_replace_wins() {
        for (_dir, service) in services() {
            service.create_note(Some("todo"), Some("t0")).unwrap();
            service.update_note("todo", Some("t1")).unwrap();
            service.update_note("todo", Some("t2")).unwrap();
            assert_eq!(service.read_note("todo").unwrap().text, "t2");
        }
    }

    #[test]
    fn update_of_missing_note_is_not_found() {
        for (_dir, service) in services() {
            let err = service.update_note("ghost", Some("boo")).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);
            assert!(service.list_notes().unwrap().is_empty());
        }
    }

    #[test]
    fn list_contains_exactly_created_notes() {
        for (_dir, service) in services() {
            assert!(service.list_notes().unwrap().is_empty());
            for name in ["a", "b", "c"] {
                service.create_note(Some(name), Some("x")).unwrap();
            }
            let names: HashSet<String> =
                service.list_notes().unwrap().into_iter().map(|n| n.name).collect();
            let expected: HashSet<String> = ["a", "b", "c"].map(String::from).into();
            assert_eq!(names, expected);
        }
    }

    #[test]
    fn missing_name_is_invalid_and_persists_nothing() {
        for (_dir, service) in services() {
            for name in [None, Some(""), Some("../escape"), Some("a/b")] {
                let err = service.create_note(name, Some("text")).unwrap_err();
                assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{name:?}");
            }
            assert!(service.list_notes().unwrap().is_empty());
        }
    }

    #[test]
    fn enforces_size_limits() {
        let dir = tempdir().unwrap();
        let repo = FilesystemBackend::new(dir.path()).unwrap();
        let service = NoteService::new(Box::new(repo), 4, 8);

        let err = service.create_note(Some("toolong"), Some("ok")).unwrap_err();
        assert!(matches!(
            err,
            crate::NoteError::Validation(NoteValidationError::NameTooLarge { max: 4, got: 7 })
        ));
        let err = service.create_note(Some("ok"), Some("way too long")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(service.create_note(Some("ok"), Some("fits")).is_ok());
    }
}
