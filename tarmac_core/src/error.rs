//! Error types for tarmac_core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using tarmac_core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building an archive.
///
/// Every variant is fatal to the run that produced it.
#[derive(Error, Debug)]
pub enum Error {
    /// A directory or file could not be opened, listed, or stat'ed.
    #[error("Filesystem error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error while streaming a source file or writing the archive.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// A file's length differs between hashing and storing.
    #[error("Content of {path} changed while archiving: hashed {expected} bytes, found {actual}")]
    ContentChanged {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    /// Unsupported hash algorithm.
    #[error("Unsupported algorithm: {algorithm}")]
    UnsupportedAlgorithm { algorithm: String },
}

impl Error {
    /// Create a Filesystem error.
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Create a ContentChanged error.
    pub fn content_changed(path: impl Into<PathBuf>, expected: u64, actual: u64) -> Self {
        Error::ContentChanged {
            path: path.into(),
            expected,
            actual,
        }
    }

    /// Create an UnsupportedAlgorithm error.
    pub fn unsupported_algorithm(algorithm: impl Into<String>) -> Self {
        Error::UnsupportedAlgorithm {
            algorithm: algorithm.into(),
        }
    }

    /// Convert a directory listing error into a Filesystem error for `path`.
    pub(crate) fn listing(path: impl Into<PathBuf>, err: ignore::Error) -> Self {
        // ignore::Error can wrap an io::Error or be a path/loop error
        let source = match err.io_error() {
            Some(io_err) => std::io::Error::new(io_err.kind(), io_err.to_string()),
            None => std::io::Error::other(err.to_string()),
        };
        Error::filesystem(path, source)
    }
}
