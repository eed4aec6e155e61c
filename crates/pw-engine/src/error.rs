// error.rs — Error types for patch validation and change application.

use std::path::PathBuf;

use serde_json::{json, Value};
use thiserror::Error;

use pw_changeset::ChangeSetError;
use pw_git::GitError;
use pw_workspace::WorkspaceError;

/// Request-level validation failures. Nothing has been touched when one of
/// these is returned.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("invalid field '{field}': expected {expected}, received {received}")]
    Validation {
        field: &'static str,
        expected: &'static str,
        received: String,
    },

    #[error("unsupported content type: {}", .received.as_deref().unwrap_or("none"))]
    MediaType { received: Option<String> },

    #[error("malformed patch: {0}")]
    PatchFormat(String),
}

impl GateError {
    pub fn kind(&self) -> &'static str {
        match self {
            GateError::Validation { .. } => "validation_error",
            GateError::MediaType { .. } => "media_type",
            GateError::PatchFormat(_) => "patch_format",
        }
    }

    /// Structured detail for error responses.
    pub fn detail(&self) -> Value {
        match self {
            GateError::Validation {
                field,
                expected,
                received,
            } => json!({ "field": field, "expected": expected, "received": received }),
            GateError::MediaType { received } => {
                json!({ "expected": "application/json", "received": received })
            }
            GateError::PatchFormat(reason) => json!({ "reason": reason }),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Gate(#[from] GateError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Model(#[from] ChangeSetError),

    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl EngineError {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Gate(e) => e.kind(),
            EngineError::Workspace(e) => e.kind(),
            EngineError::Git(e) => e.kind(),
            EngineError::Model(e) => e.kind(),
            EngineError::IoError { .. } => "io_error",
        }
    }

    /// Structured detail for error responses: captured git output or
    /// field-type information where available.
    pub fn detail(&self) -> Value {
        match self {
            EngineError::Gate(e) => e.detail(),
            EngineError::Git(GitError::PatchRejected { stderr }) => json!({ "stderr": stderr }),
            EngineError::Git(GitError::ApplyFailed { stdout, stderr })
            | EngineError::Git(GitError::CommandFailed { stdout, stderr, .. }) => {
                json!({ "stdout": stdout, "stderr": stderr })
            }
            EngineError::Git(GitError::UntrackedFile { path, detail }) => {
                json!({ "path": path, "output": detail })
            }
            EngineError::Workspace(WorkspaceError::PathTraversal { path })
            | EngineError::Workspace(WorkspaceError::ProtectedPath { path })
            | EngineError::Workspace(WorkspaceError::FileNotFound { path }) => json!({ "path": path }),
            _ => Value::Null,
        }
    }
}
