// src/error.rs

//! Crate-wide error taxonomy
//!
//! Every terminal failure carries a human-readable message plus a
//! machine-distinguishable kind. Nested causes are preserved through
//! `#[source]` so callers can walk the chain instead of parsing strings.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// All errors surfaced by the engine
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid repository/cache configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// All mirrors were exhausted while fetching repository content
    #[error("Download failed for repository '{repo_id}': {message}")]
    RepoDownload {
        repo_id: String,
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// OpenPGP signature verification failed during a repository load
    #[error("Signature verification failed for repository '{repo_id}': {message}")]
    RepoPgp {
        repo_id: String,
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// Repository metadata could not be parsed
    #[error("Failed to parse metadata: {0}")]
    Parse(String),

    /// On-disk cache is missing or corrupt
    #[error("Cache error at {path}: {message}")]
    Cache { path: PathBuf, message: String },

    /// A repository with this id is already registered
    #[error("Repository id '{0}' already exists")]
    IdAlreadyExists(String),

    /// Insert of a NEVRA already present from the same repository
    #[error("Package '{nevra}' already present in repository '{repo_id}'")]
    DuplicatePackage { nevra: String, repo_id: String },

    /// Malformed filter input (unsupported comparator for an attribute)
    #[error("Query error: {0}")]
    Query(String),

    /// Lookup of an unknown or invalidated id
    #[error("Not found: {0}")]
    NotFound(String),

    /// A handle outlived the state it was derived from
    #[error("Stale handle: {0}")]
    StaleHandle(String),

    /// A single transfer failed after exhausting its mirrors
    #[error("Download failed: {0}")]
    Download(String),

    /// Downloaded content did not match the expected checksum
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Malformed version or NEVRA string
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    /// I/O failure with operation context
    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Wrap an I/O error with a short description of the failed operation
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether this error is a repository download failure
    pub fn is_repo_download(&self) -> bool {
        matches!(self, Error::RepoDownload { .. })
    }
}
