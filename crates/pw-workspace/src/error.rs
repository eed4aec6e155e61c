// error.rs — Error types for the workspace subsystem.

use std::path::PathBuf;
use thiserror::Error;

use pw_changeset::ChangeSetError;

/// Errors that can occur during workspace operations.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configured workspace root does not exist or is not a directory.
    #[error("invalid workspace root {path}: {reason}")]
    InvalidRoot { path: PathBuf, reason: String },

    /// A path resolved outside the workspace root (security violation).
    #[error("path traversal detected: '{path}' resolves outside the workspace root")]
    PathTraversal { path: String },

    /// The path is inside the workspace but may not be modified (the root
    /// itself, or the git directory).
    #[error("refusing to modify protected path '{path}'")]
    ProtectedPath { path: String },

    /// The requested file or directory does not exist.
    #[error("not found in workspace: '{path}'")]
    FileNotFound { path: String },

    /// No change with this id.
    #[error("change not found: {0}")]
    ChangeNotFound(String),

    /// No task with this id.
    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// A model-level rule was violated (invalid transition, bad data).
    #[error(transparent)]
    Model(#[from] ChangeSetError),

    /// Failed to serialize/deserialize a record.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A store lock was poisoned by a panicking writer.
    #[error("store lock poisoned: {0}")]
    LockPoisoned(String),
}

impl WorkspaceError {
    /// Stable kind string used in structured error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkspaceError::IoError { .. } => "io_error",
            WorkspaceError::InvalidRoot { .. } => "invalid_root",
            WorkspaceError::PathTraversal { .. } => "path_traversal",
            WorkspaceError::ProtectedPath { .. } => "protected_path",
            WorkspaceError::FileNotFound { .. }
            | WorkspaceError::ChangeNotFound(_)
            | WorkspaceError::TaskNotFound(_) => "not_found",
            WorkspaceError::Model(e) => e.kind(),
            WorkspaceError::SerializationError(_) => "serialization_error",
            WorkspaceError::LockPoisoned(_) => "internal_error",
        }
    }
}
