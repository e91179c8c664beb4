//! Error types for the durable queue.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors that can occur while persisting, listing, or deleting
/// queue entries.
///
/// Queue errors are fatal to the operation that raised them and are
/// never retried by the queue itself; callers decide what to do.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Local filesystem failure writing, reading, or deleting an entry.
    #[error("queue I/O error: {0}")]
    Io(#[from] io::Error),

    /// Another process holds the queue root's advisory lock.
    #[error("queue locked: another process has exclusive access")]
    Locked,

    /// The queue root path exists but is not a directory.
    #[error("queue root is not a directory: {path:?}")]
    NotADirectory {
        /// The offending path.
        path: PathBuf,
    },

    /// A metadata sidecar could not be decoded.
    #[error("corrupt sidecar {path:?}: {message}")]
    CorruptSidecar {
        /// Path of the sidecar file.
        path: PathBuf,
        /// Description of what was wrong.
        message: String,
    },

    /// An add entry is missing its stored reference.
    #[error("entry {path:?} has no stored reference")]
    MissingReference {
        /// Path of the entry's content file.
        path: PathBuf,
    },
}

impl QueueError {
    /// Creates a corrupt-sidecar error.
    pub fn corrupt_sidecar(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::CorruptSidecar {
            path: path.into(),
            message: message.into(),
        }
    }
}
