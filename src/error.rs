//! Error types shared across the library, store and playback modules.
//!
//! Only `ScanError`, `PlaybackError` and `CommandError` ever reach a caller
//! as the outcome of an operation. `ExtractionError` and `StoreError` are recovered where
//! they happen (filename-derived metadata, silent no-op respectively).

use std::path::PathBuf;

use thiserror::Error;

/// Terminal outcome of a scan that could not start.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("scan cancelled")]
    Cancelled,

    #[error("no such directory: {}", .0.display())]
    NotFound(PathBuf),

    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    /// Map an io error raised while opening `path` onto the pick taxonomy.
    pub fn from_io(path: PathBuf, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            std::io::ErrorKind::NotFound => Self::NotFound(path),
            _ => Self::Io { path, source: err },
        }
    }
}

/// Errors surfaced by transport operations.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("failed to load {}: {reason}", path.display())]
    ResourceLoad { path: PathBuf, reason: String },

    #[error("no audio output device: {0}")]
    NoOutputDevice(String),
}

/// Metadata parse failure. Never leaves `library::metadata`.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to read tags: {0}")]
    Tags(#[from] lofty::error::LoftyError),
}

/// Persistence failure. Logged by the store and never returned to callers.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("persistence unavailable: {0}")]
    Unavailable(String),

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// A stdin command line that could not be understood.
#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("{command} needs {what}")]
    MissingArgument {
        command: &'static str,
        what: &'static str,
    },

    #[error("not a valid number of seconds: {0}")]
    InvalidSeconds(String),
}
