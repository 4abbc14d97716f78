//! Central error type for the streaming core.
//!
//! Missing source tiles are *not* errors — the reader substitutes zero
//! elevation and the empty texture colour. This enum covers genuine
//! failures: I/O faults other than not-found, malformed filenames, and
//! unparsable config or points files.

use std::path::PathBuf;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid tile filename: {0}")]
    InvalidFilename(String),

    #[error("Invalid dataset layout: {0}")]
    InvalidLayout(String),

    #[error("Malformed points file {path}: line {line}: {reason}")]
    MalformedPointsFile {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}
