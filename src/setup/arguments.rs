use crate::app::{DEFAULT_MAX_NAME_SIZE, DEFAULT_MAX_TEXT_SIZE, NoteService};
use crate::backends::{FilesystemBackend, JournalBackend, SqliteBackend};
use crate::{NoteBackend, Result};

use clap::{ArgAction, Parser, Subcommand};
use log::info;
use std::path::PathBuf;

// `-h` is the host, so help is only available as `--help`
#[derive(Parser, Debug)]
#[command(version, about, long_about, disable_help_flag = true)]
pub struct Args {
    /// Server address
    #[arg(short = 'h', long)]
    pub host: String,
    /// Server port
    #[arg(short, long)]
    pub port: u16,
    /// Cache directory path
    #[arg(short, long)]
    pub cache: PathBuf,
    #[arg(long, default_value_t = DEFAULT_MAX_NAME_SIZE)]
    pub max_name_size: usize,
    #[arg(long, default_value_t = DEFAULT_MAX_TEXT_SIZE)]
    pub max_text_size: usize,
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
    #[command(subcommand)]
    pub backend: Option<Backend>,
}

/// Storage layout inside the cache directory
#[derive(Subcommand, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Backend {
    /// One `<name>.txt` file per note (created if the directory is missing)
    #[default]
    Files,
    /// All notes in a single `notes.json` (the directory must exist)
    Journal,
    /// All notes in a `notes.db` SQLite database
    Sqlite,
}

impl Args {
    /// Builds the `NoteService` described by these arguments.
    ///
    /// # Errors
    ///
    /// Tries creating a `NoteBackend` instance based on the specified backend type. Any errors are forwarded
    pub fn into_service(self) -> Result<NoteService> {
        let backend = self.backend.unwrap_or_default();
        info!("Using {backend:?} backend in {}", self.cache.display());

        // Allow any struct that implements NoteBackend, and store on heap because size is unknown at compile time
        let repo: Box<dyn NoteBackend> = match backend {
            Backend::Files => Box::new(FilesystemBackend::new(&self.cache)?),
            Backend::Journal => Box::new(JournalBackend::new(&self.cache)?),
            Backend::Sqlite => Box::new(SqliteBackend::new(&self.cache)?),
        };

        Ok(NoteService::new(repo, self.max_name_size, self.max_text_size))
    }
}

/// Parses command-line arguments and initializes a `NoteService` based on the provided arguments.
///
/// # Returns
///
/// The bind address and a `NoteService` instance initialized with the parsed arguments.
///
/// # Errors
///
/// Forwards any error from creating the backend
pub fn handle_args() -> Result<((String, u16), NoteService)> {
    let args = Args::parse();
    let address = (args.host.clone(), args.port);
    Ok((address, args.into_service()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use tempfile::tempdir;

    #[test]
    fn parses_short_flags_and_defaults_to_files() {
        let args =
            Args::try_parse_from(["noters-http", "-h", "127.0.0.1", "-p", "3000", "-c", "cache"])
                .unwrap();
        assert_eq!(args.host, "127.0.0.1");
        assert_eq!(args.port, 3000);
        assert_eq!(args.cache, PathBuf::from("cache"));
        assert_eq!(args.max_name_size, DEFAULT_MAX_NAME_SIZE);
        assert_eq!(args.backend.unwrap_or_default(), Backend::Files);
    }

    #[test]
    fn selects_backend_subcommand() {
        let args = Args::try_parse_from([
            "noters-http",
            "--host",
            "0.0.0.0",
            "--port",
            "8080",
            "--cache",
            "cache",
            "journal",
        ])
        .unwrap();
        assert_eq!(args.backend, Some(Backend::Journal));
    }

    #[test]
    fn requires_host_port_and_cache() {
        assert!(Args::try_parse_from(["noters-http", "-p", "3000", "-c", "cache"]).is_err());
        assert!(Args::try_parse_from(["noters-http", "-h", "localhost", "-c", "cache"]).is_err());
        assert!(Args::try_parse_from(["noters-http", "-h", "localhost", "-p", "1"]).is_err());
    }

    #[test]
    fn journal_needs_existing_directory() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing");
        let args = Args::try_parse_from([
            "noters-http",
            "-h",
            "localhost",
            "-p",
            "3000",
            "-c",
            missing.to_str().unwrap(),
            "journal",
        ])
        .unwrap();

        let Err(err) = args.into_service() else {
            panic!("journal backend started without its directory");
        };
        assert_eq!(err.kind(), ErrorKind::StorageFailure);
        assert!(!missing.exists());
    }

    #[test]
    fn files_backend_creates_directory() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing");
        let args = Args {
            host: "localhost".into(),
            port: 3000,
            cache: missing.clone(),
            max_name_size: DEFAULT_MAX_NAME_SIZE,
            max_text_size: DEFAULT_MAX_TEXT_SIZE,
            help: None,
            backend: None,
        };

        args.into_service().unwrap();
        assert!(missing.is_dir());
    }
}
