//! Error taxonomy for sorting and undoing.
//!
//! Per-file problems (`MoveFailure`, `PruneFailure`, `ClassificationFailure`) are values that
//! end up in reports; only `SortError` aborts an operation.

use std::path::PathBuf;
use thiserror::Error;

/// Invalid input supplied before any file is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("directory does not exist: {}", .0.display())]
    RootNotFound(PathBuf),

    #[error("not a directory: {}", .0.display())]
    RootNotDirectory(PathBuf),

    #[error("could not resolve {}: {source}", path.display())]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("could not read configuration {}: {source}", path.display())]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("category '{0}' is defined more than once")]
    DuplicateCategory(String),

    #[error("unknown category '{0}'")]
    UnknownCategory(String),

    #[error("invalid glob pattern '{0}'")]
    InvalidGlobPattern(String),

    #[error("invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },
}

/// The fallback classifier could not produce a label.
#[derive(Debug, Error)]
pub enum ClassificationFailure {
    #[error("could not read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no known signature in {}", .0.display())]
    Undetected(PathBuf),

    #[error("no fallback classifier configured")]
    Unavailable,
}

/// A single file could not be moved, during sort or undo.
#[derive(Debug, Error)]
#[error("failed to move {} to {}: {source}", from.display(), to.display())]
pub struct MoveFailure {
    pub from: PathBuf,
    pub to: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// A directory left empty by an undo could not be removed.
#[derive(Debug, Error)]
#[error("failed to remove directory {}: {source}", path.display())]
pub struct PruneFailure {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// The session log cannot be used.
#[derive(Debug, Error)]
pub enum LogStoreFailure {
    #[error("session log {} is unavailable: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("session log {} is corrupt at line {line}: {reason}", path.display())]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("could not encode log record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors that abort a whole sort, preview or undo run.
#[derive(Debug, Error)]
pub enum SortError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    LogStore(#[from] LogStoreFailure),
}

pub type SortResult<T> = Result<T, SortError>;
