//! Crate-wide error type.
//!
//! Most conditions found while auditing a folder are *violations* (plain
//! strings collected per folder), not errors. `Error` is reserved for
//! conditions that must stop processing: I/O failures and, critically, a
//! refused tag write, which would leave in-memory and on-disk state out of
//! sync for every check that follows.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not read tags from {path}: {reason}")]
    TagRead { path: PathBuf, reason: String },

    /// The container refused to persist a tag edit. This aborts the whole
    /// run: continuing would validate folders against unsaved state.
    #[error("could not write tags to {path}: {reason}")]
    TagWrite { path: PathBuf, reason: String },
}

impl Error {
    /// Whether this error must abort a multi-folder batch instead of being
    /// reported as a per-folder violation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::TagWrite { .. })
    }
}
