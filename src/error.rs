//! Error types shared by the task store and the reminder pipeline.

use std::path::PathBuf;

use crate::models::TaskId;

/// Errors returned by a [`crate::fs::TaskStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The target task does not exist (deleted or never created).
    #[error("task {0} not found")]
    NotFound(TaskId),

    /// The backing storage could not be read or written.
    #[error("task store unavailable: {0}")]
    Unavailable(String),

    /// A task file exists but could not be parsed.
    #[error("corrupt task file {}: {reason}", path.display())]
    Corrupt {
        /// Offending file.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// Rejected input, e.g. an empty title.
    #[error("invalid task: {0}")]
    Validation(String),
}

impl StoreError {
    pub fn unavailable<E: std::fmt::Display>(err: E) -> Self {
        StoreError::Unavailable(err.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// A notification sink could not deliver its cue.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Output device or terminal write failed.
    #[error("notification output failed: {0}")]
    Output(#[from] std::io::Error),

    /// Nobody is listening for alerts any more (UI shut down).
    #[error("notification receiver disconnected")]
    Disconnected,
}
