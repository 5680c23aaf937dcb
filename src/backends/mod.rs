pub mod filesystem;
pub mod journal;
pub mod sqlite;

pub use filesystem::FilesystemBackend;
pub use journal::JournalBackend;
pub use sqlite::SqliteBackend;

pub use crate::{BackendError, Note, NoteBackend, NoteError, Result};

use log::trace;
use std::{
    io::{self, Write},
    path::Path,
};
use tempfile::NamedTempFile;

/// Writes `data` to `target` through a synced temp file in `dir`, then renames it into place.
///
/// With `clobber == false` the rename fails with `io::ErrorKind::AlreadyExists` if `target`
/// exists, so "check and write" is a single filesystem step.
fn write_atomic(dir: &Path, target: &Path, data: &[u8], clobber: bool) -> io::Result<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;

    let persisted = if clobber {
        tmp.persist(target)
    } else {
        tmp.persist_noclobber(target)
    };
    persisted.map_err(|e| e.error)?;
    // The rename itself is durable only once the directory entry is synced
    #[cfg(unix)]
    std::fs::File::open(dir)?.sync_all()?;
    trace!("Wrote {} bytes to {}", data.len(), target.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn clobbering_write_replaces_content() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("data.json");
        write_atomic(dir.path(), &target, b"old", true).unwrap();
        write_atomic(dir.path(), &target, b"new", true).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"new");
    }

    #[test]
    fn noclobber_write_keeps_existing_target() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("note.txt");
        write_atomic(dir.path(), &target, b"first", false).unwrap();

        let err = write_atomic(dir.path(), &target, b"second", false).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&target).unwrap(), b"first");
    }

    #[test]
    fn leaves_no_temp_files_behind() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("note.txt");
        write_atomic(dir.path(), &target, b"a", false).unwrap();
        write_atomic(dir.path(), &target, b"b", false).unwrap_err();
        write_atomic(dir.path(), &target, b"c", true).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, ["note.txt"]);
    }

    #[test]
    fn missing_directory_fails_without_writing() {
        let dir = tempdir().unwrap();
        let gone = dir.path().join("gone");
        let err = write_atomic(&gone, &gone.join("note.txt"), b"x", true).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
