use super::{BackendError, Note, NoteBackend, Result, write_atomic};
use log::{debug, warn};
use parking_lot::RwLock;
use std::{
    collections::HashSet,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

/// Name of the journal file inside the cache directory
pub const JOURNAL_FILE: &str = "notes.json";

/// All notes in one JSON array, rewritten on every mutation.
///
/// The in-memory list is authoritative between writes. Mutations hold the write
/// lock, build the next list, flush it to disk and only then swap it in, so a
/// failed flush leaves both memory and disk at the previous state.
#[derive(Debug)]
pub struct JournalBackend {
    dir: PathBuf,
    path: PathBuf,
    notes: RwLock<Vec<Note>>,
}

impl JournalBackend {
    /// Opens the journal in `dir`. A missing journal file means an empty store
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `BackendError::MissingDirectory` if `dir` does not exist
    /// - `BackendError::FileReadError` if the journal cannot be read
    /// - `BackendError::JournalCorrupted` if the journal is not a JSON list of notes
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(BackendError::MissingDirectory(dir).into());
        }

        let path = dir.join(JOURNAL_FILE);
        let notes = Self::load(&path)?;
        debug!("Loaded {} notes from {}", notes.len(), path.display());

        Ok(Self {
            dir,
            path,
            notes: RwLock::new(notes),
        })
    }

    fn load(path: &Path) -> Result<Vec<Note>> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BackendError::FileReadError(e).into()),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        let stored: Vec<Note> = serde_json::from_str(&raw).map_err(BackendError::JournalCorrupted)?;

        // Keep the first record for a name if the file was edited by hand
        let mut seen = HashSet::new();
        let notes: Vec<Note> = stored
            .into_iter()
            .filter(|note| {
                let first = seen.insert(note.name.clone());
                if !first {
                    warn!("Ignoring duplicate journal entry for note {}", note.name);
                }
                first
            })
            .collect();
        Ok(notes)
    }

    fn flush(&self, notes: &[Note]) -> Result<()> {
        let data = serde_json::to_vec_pretty(notes).map_err(BackendError::JournalEncodeError)?;
        write_atomic(&self.dir, &self.path, &data, true).map_err(BackendError::FileWriteError)?;
        debug!("Flushed {} notes to {}", notes.len(), self.path.display());
        Ok(())
    }

    /// Applies `change` to a copy of the notes, persists it, then commits it in memory
    fn commit<T>(&self, change: impl FnOnce(&mut Vec<Note>) -> Result<T>) -> Result<T> {
        let mut notes = self.notes.write();
        let mut next = notes.clone();
        let out = change(&mut next)?;
        self.flush(&next)?;
        *notes = next;
        Ok(out)
    }
}

fn position(notes: &[Note], name: &str) -> Option<usize> {
    notes.iter().position(|n| n.name == name)
}

impl NoteBackend for JournalBackend {
    fn list(&self) -> Result<Vec<Note>> {
        Ok(self.notes.read().clone())
    }

    fn get(&self, name: &str) -> Result<Note> {
        let notes = self.notes.read();
        position(&notes, name)
            .map(|i| notes[i].clone())
            .ok_or_else(|| BackendError::NoteNotFound(name.to_string()).into())
    }

    fn create(&self, note: Note) -> Result<Note> {
        self.commit(|notes| {
            if position(notes, &note.name).is_some() {
                return Err(BackendError::Duplicate(note.name.clone()).into());
            }
            notes.push(note.clone());
            Ok(())
        })?;
        Ok(note)
    }

    fn replace(&self, note: Note) -> Result<()> {
        self.commit(|notes| {
            let i = position(notes, &note.name)
                .ok_or_else(|| BackendError::NoteNotFound(note.name.clone()))?;
            notes[i].text = note.text;
            Ok(())
        })
    }

    fn delete(&self, name: &str) -> Result<Note> {
        self.commit(|notes| {
            let i = position(notes, name)
                .ok_or_else(|| BackendError::NoteNotFound(name.to_string()))?;
            Ok(notes.remove(i))
        })
    }
}
