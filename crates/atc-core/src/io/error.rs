//! Error types for team state storage

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while reading or mutating team state
#[derive(Error, Debug)]
pub enum StoreError {
    /// The team lock could not be acquired within the bounded wait
    #[error("Timed out after {waited:?} waiting for lock on {path}")]
    LockTimeout { path: PathBuf, waited: Duration },

    /// File I/O error
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse or serialize JSON
    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Team or agent name that cannot be used as a path segment
    #[error("Invalid name '{name}': must be non-empty and contain only letters, digits, '-', '_' or '.'")]
    InvalidName { name: String },

    #[error("Team '{team}' not found")]
    TeamNotFound { team: String },

    #[error("Team '{team}' already exists")]
    TeamExists { team: String },

    #[error("Team '{team}' still has {members} member(s); remove them before deleting")]
    TeamNotEmpty { team: String, members: usize },

    #[error("Member '{name}' not found in team '{team}'")]
    MemberNotFound { team: String, name: String },

    #[error("Member '{name}' already exists in team '{team}'")]
    DuplicateMember { team: String, name: String },

    #[error("Task '{task_id}' not found in team '{team}'")]
    TaskNotFound { team: String, task_id: String },

    /// Store work offloaded to the blocking pool panicked or was cancelled
    #[error("Background store task failed: {reason}")]
    Background { reason: String },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        StoreError::Json {
            path: path.into(),
            source,
        }
    }
}
