use super::{BackendError, Note, NoteBackend, NoteError, Result, write_atomic};
use crate::{NoteValidationError, validate_key};
use log::{trace, warn};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Every note is stored as `<name>.txt`
pub const NOTE_EXTENSION: &str = ".txt";

/// Longest file name (in bytes) common filesystems accept
pub const MAX_FILE_NAME: usize = 255;

/// Longest note name that still fits in a file name with its extension
pub const MAX_NOTE_NAME: usize = MAX_FILE_NAME - NOTE_EXTENSION.len();

#[derive(Debug)]
pub struct FilesystemBackend {
    base_path: PathBuf,
    locks: KeyLocks,
}

impl FilesystemBackend {
    /// Creates a new `FilesystemBackend` rooted at `path`, creating the directory if needed
    ///
    /// # Errors
    ///
    /// Returns `BackendError::DirectoryCreationError` if the base directory cannot be created
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        if !base_path.is_dir() {
            warn!(
                "Cache directory does not exist. Creating directory: {}",
                base_path.display()
            );
        }
        fs::create_dir_all(&base_path).map_err(BackendError::DirectoryCreationError)?;
        trace!("Using directory for notes: {}", base_path.display());
        Ok(Self {
            base_path,
            locks: KeyLocks::default(),
        })
    }

    /// Constructs the path of a note file. The name must be a single path segment
    /// short enough to carry the extension
    fn note_path(&self, name: &str) -> Result<PathBuf> {
        validate_key(name)?;
        if name.len() > MAX_NOTE_NAME {
            return Err(NoteValidationError::NameTooLarge {
                max: MAX_NOTE_NAME,
                got: name.len(),
            }
            .into());
        }
        Ok(self.base_path.join(format!("{name}{NOTE_EXTENSION}")))
    }

    /// Path of a note that is expected to exist. Names that can't be a file are simply absent
    fn existing_note_path(&self, name: &str) -> Result<PathBuf> {
        match self.note_path(name) {
            Err(NoteError::Validation(NoteValidationError::NameTooLarge { .. })) => {
                Err(BackendError::NoteNotFound(name.to_string()).into())
            }
            other => other,
        }
    }

    fn read_text(path: &Path, name: &str) -> Result<String> {
        fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound | ErrorKind::IsADirectory | ErrorKind::InvalidFilename => {
                NoteError::Backend(BackendError::NoteNotFound(name.to_string()))
            }
            _ => NoteError::Backend(BackendError::FileReadError(e)),
        })
    }

    /// Lists the names of all note files in the base directory
    ///
    /// # Errors
    ///
    /// Returns `BackendError::DirectoryReadError` if the directory cannot be read or an entry cannot be processed
    fn list_note_names(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.base_path).map_err(BackendError::DirectoryReadError)?;

        let mut names = Vec::new();
        for entry_result in entries {
            let entry = entry_result.map_err(BackendError::DirectoryReadError)?;
            let file_type = entry.file_type().map_err(BackendError::DirectoryReadError)?;
            if !file_type.is_file() {
                continue;
            }

            // Temp files and names we could never have written are skipped
            let file_name = entry.file_name();
            let Some(name) = file_name
                .to_str()
                .and_then(|f| f.strip_suffix(NOTE_EXTENSION))
            else {
                continue;
            };
            if validate_key(name).is_ok() {
                names.push(name.to_string());
            }
        }
        trace!("Found notes: {names:?}");
        Ok(names)
    }
}

impl NoteBackend for FilesystemBackend {
    /// Reads every `*.txt` file in the base directory
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or a note file cannot be read.
    /// Files deleted while listing are skipped
    fn list(&self) -> Result<Vec<Note>> {
        let mut notes = Vec::new();
        for name in self.list_note_names()? {
            match self.get(&name) {
                Ok(note) => notes.push(note),
                Err(NoteError::Backend(BackendError::NoteNotFound(_))) => {
                    trace!("Note {name} vanished while listing");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(notes)
    }

    /// Reads the note file for `name`
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `BackendError::NoteNotFound` if the note file does not exist
    /// - `BackendError::FileReadError` if the file cannot be read
    fn get(&self, name: &str) -> Result<Note> {
        let path = self.existing_note_path(name)?;
        let text = Self::read_text(&path, name)?;
        Ok(Note::new(name, text))
    }

    /// Creates a new note file. The existence check and the write are one atomic rename
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `NoteValidationError::NameTooLarge` if `<name>.txt` exceeds the file name limit
    /// - `BackendError::Duplicate` if a note with the same name already exists
    /// - `BackendError::FileWriteError` if writing the file fails
    fn create(&self, note: Note) -> Result<Note> {
        let path = self.note_path(&note.name)?;
        self.locks.with_lock(&note.name, || {
            write_atomic(&self.base_path, &path, note.text.as_bytes(), false).map_err(|e| {
                match e.kind() {
                    ErrorKind::AlreadyExists => {
                        NoteError::Backend(BackendError::Duplicate(note.name.clone()))
                    }
                    ErrorKind::InvalidFilename => {
                        NoteValidationError::InvalidName(note.name.clone()).into()
                    }
                    _ => NoteError::Backend(BackendError::FileWriteError(e)),
                }
            })?;
            trace!("Created file: {}", path.display());
            Ok(())
        })?;
        Ok(note)
    }

    /// Overwrites an existing note file
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `BackendError::NoteNotFound` if the note file does not exist
    /// - `BackendError::FileWriteError` if writing the file fails
    fn replace(&self, note: Note) -> Result<()> {
        let path = self.existing_note_path(&note.name)?;
        self.locks.with_lock(&note.name, || {
            if !path.is_file() {
                return Err(BackendError::NoteNotFound(note.name.clone()).into());
            }
            write_atomic(&self.base_path, &path, note.text.as_bytes(), true)
                .map_err(BackendError::FileWriteError)?;
            Ok(())
        })
    }

    /// Deletes a note file and returns its last contents
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `BackendError::PermissionDenied` if the file can't be deleted due to missing privileges
    /// - `BackendError::NoteNotFound` if the file does not exist
    /// - `BackendError::FileDeleteError` for other filesystem errors
    fn delete(&self, name: &str) -> Result<Note> {
        let path = self.existing_note_path(name)?;
        self.locks.with_lock(name, || {
            let text = Self::read_text(&path, name)?;
            fs::remove_file(&path).map_err(|e| match e.kind() {
                ErrorKind::PermissionDenied => BackendError::PermissionDenied,
                ErrorKind::NotFound => BackendError::NoteNotFound(name.to_string()),
                _ => BackendError::FileDeleteError(e),
            })?;
            Ok(Note::new(name, text))
        })
    }
}

/// One mutex per note name, created on demand
#[derive(Debug, Default)]
struct KeyLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    /// Runs `f` while holding the lock for `name`
    fn with_lock<T>(&self, name: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = Arc::clone(self.locks.lock().entry(name.to_string()).or_default());
        let result = {
            let _guard = lock.lock();
            f()
        };
        drop(lock);

        // Forget the lock once no other operation holds it
        let mut locks = self.locks.lock();
        if locks.get(name).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(name);
        }
        result
    }
}
