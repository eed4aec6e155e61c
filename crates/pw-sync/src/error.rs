// error.rs — Client-side sync failures.

use std::path::PathBuf;
use thiserror::Error;

use pw_engine::EngineError;
use pw_workspace::WorkspaceError;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The client configuration could not be read or is unusable.
    #[error("config error: {0}")]
    Config(String),

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a structured error.
    #[error("server returned HTTP {status} ({kind}): {message}")]
    Api {
        status: u16,
        kind: String,
        message: String,
    },

    /// The server answered with something that is not the expected shape.
    #[error("could not decode server response: {0}")]
    Decode(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

impl SyncError {
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Config(_) => "validation_error",
            SyncError::Transport(_) | SyncError::Decode(_) => "transport_error",
            SyncError::Api { .. } => "api_error",
            SyncError::Io { .. } => "io_error",
            SyncError::Engine(e) => e.kind(),
            SyncError::Workspace(e) => e.kind(),
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SyncError::Transport(format!("request timed out: {e}"))
        } else if e.is_decode() {
            SyncError::Decode(e.to_string())
        } else {
            SyncError::Transport(e.to_string())
        }
    }
}
