// error.rs — Error types for git plumbing.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitError {
    /// The working directory is not inside a git work tree.
    #[error("not a git repository: {path}")]
    NotAGitRepo { path: PathBuf },

    /// An untracked target could not be staged and policy requires it.
    #[error("could not stage untracked file '{path}': {detail}")]
    UntrackedFile { path: String, detail: String },

    /// `git apply --check` failed. Nothing was modified.
    #[error("patch rejected by dry run: {stderr}")]
    PatchRejected { stderr: String },

    /// The dry run passed but the real apply failed.
    #[error("patch apply failed after a clean dry run: {stderr}")]
    ApplyFailed { stdout: String, stderr: String },

    /// The subcommand is not in the allow-list.
    #[error("unsupported git command: '{0}'")]
    UnsupportedCommand(String),

    /// An allow-listed command ran and genuinely failed.
    #[error("git {command} failed: {stderr}")]
    CommandFailed {
        command: String,
        stdout: String,
        stderr: String,
    },

    /// The subprocess exceeded its time budget and was killed.
    #[error("git {command} timed out after {timeout_ms}ms")]
    Timeout { command: String, timeout_ms: u64 },

    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl GitError {
    /// Stable kind string used in structured error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            GitError::NotAGitRepo { .. } => "not_a_git_repo",
            GitError::UntrackedFile { .. } => "untracked_file",
            GitError::PatchRejected { .. } => "patch_rejected",
            GitError::ApplyFailed { .. } => "apply_failed",
            GitError::UnsupportedCommand(_) => "unsupported_command",
            GitError::CommandFailed { .. } => "command_failed",
            GitError::Timeout { .. } => "timeout",
            GitError::IoError { .. } => "io_error",
        }
    }
}
