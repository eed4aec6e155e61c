// change.rs — Change: a proposed mutation to one workspace entry.
//
// A Change is created `pending` and only ever moves forward:
//   pending → applied → verified
//   pending → applied → failed
//   pending → failed            (apply attempt rejected before any mutation)
// There is no transition out of `verified` or `failed`. A retry is a new
// Change with a new id.
//
// What a Change *does* to the workspace is decided in exactly one place,
// `Change::payload()`, which maps `kind × operation × (content, diff)` to a
// ChangePayload. Every apply path goes through that matrix.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ChangeSetError;
use crate::verification::VerificationResult;

/// What kind of workspace entry the change targets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    File,
    Directory,
    Config,
}

/// The requested operation on the target entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOperation {
    Create,
    Update,
    Delete,
    Rename,
}

/// Lifecycle state of a Change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    /// Recorded, nothing touched yet.
    Pending,
    /// Written to the workspace.
    Applied,
    /// All three verification checks passed.
    Verified,
    /// Apply or verification failed. Terminal.
    Failed,
}

impl ChangeStatus {
    /// Check whether moving from this state to `next` is allowed.
    pub fn can_transition_to(self, next: ChangeStatus) -> bool {
        matches!(
            (self, next),
            (ChangeStatus::Pending, ChangeStatus::Applied)
                | (ChangeStatus::Pending, ChangeStatus::Failed)
                | (ChangeStatus::Applied, ChangeStatus::Verified)
                | (ChangeStatus::Applied, ChangeStatus::Failed)
        )
    }

    /// `verified` and `failed` have no outgoing transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, ChangeStatus::Verified | ChangeStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeStatus::Pending => "pending",
            ChangeStatus::Applied => "applied",
            ChangeStatus::Verified => "verified",
            ChangeStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ChangeStatus {
    type Err = ChangeSetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ChangeStatus::Pending),
            "applied" => Ok(ChangeStatus::Applied),
            "verified" => Ok(ChangeStatus::Verified),
            "failed" => Ok(ChangeStatus::Failed),
            other => Err(ChangeSetError::UnknownVariant {
                field: "change status",
                value: other.to_string(),
            }),
        }
    }
}

/// Authorship and provenance of a change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeMetadata {
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_link: Option<String>,
}

/// A proposed mutation to one workspace entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Change {
    pub id: String,

    /// The task this change was produced for.
    pub task_id: String,

    pub kind: ChangeKind,

    /// Workspace-relative target path.
    pub path: String,

    pub operation: ChangeOperation,

    /// Full replacement content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Unified diff text. Opaque to patchwire; handed to `git apply`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,

    /// Destination path for `rename`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename_to: Option<String>,

    pub metadata: ChangeMetadata,

    pub status: ChangeStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_results: Option<VerificationResult>,

    /// Why the change ended up `failed` (captured process output, checker error).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// Caller-supplied fields for recording a new change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChange {
    #[serde(default)]
    pub task_id: String,
    #[serde(default = "default_kind")]
    pub kind: ChangeKind,
    pub path: String,
    pub operation: ChangeOperation,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub diff: Option<String>,
    #[serde(default)]
    pub rename_to: Option<String>,
    #[serde(default = "default_author")]
    pub author: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub rollback_link: Option<String>,
}

fn default_kind() -> ChangeKind {
    ChangeKind::File
}

fn default_author() -> String {
    "ai-agent".to_string()
}

fn default_version() -> String {
    "1.0".to_string()
}

impl NewChange {
    /// A file update carrying a unified diff.
    pub fn diff_update(path: impl Into<String>, diff: impl Into<String>) -> Self {
        Self {
            task_id: String::new(),
            kind: ChangeKind::File,
            path: path.into(),
            operation: ChangeOperation::Update,
            content: None,
            diff: Some(diff.into()),
            rename_to: None,
            author: default_author(),
            version: default_version(),
            rollback_link: None,
        }
    }

    /// A file create/update carrying full content.
    pub fn content(
        path: impl Into<String>,
        operation: ChangeOperation,
        content: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            content: Some(content.into()),
            diff: None,
            ..Self::diff_update(path, "")
        }
    }

    pub fn for_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = task_id.into();
        self
    }
}

/// What applying a change actually does to the workspace.
///
/// Produced by [`Change::payload`]; consumers match on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangePayload<'a> {
    /// Write the full content, creating parent directories.
    WriteContent(&'a str),
    /// Apply a unified diff through the patch-apply primitive.
    ApplyDiff(&'a str),
    /// Create the directory tree.
    CreateDirectory,
    /// Remove the file (or directory tree) if present.
    Remove,
    /// Move the entry to a new path.
    Rename { to: &'a str },
}

impl Change {
    /// Create a new pending change with a fresh id and timestamp.
    pub fn new(new: NewChange) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            task_id: new.task_id,
            kind: new.kind,
            path: new.path,
            operation: new.operation,
            content: new.content,
            diff: new.diff,
            rename_to: new.rename_to,
            metadata: ChangeMetadata {
                author: new.author,
                timestamp: Utc::now(),
                version: new.version,
                rollback_link: new.rollback_link,
            },
            status: ChangeStatus::Pending,
            verification_results: None,
            failure: None,
        }
    }

    /// Transition to a new status. Returns the previous status.
    pub fn transition(&mut self, next: ChangeStatus) -> Result<ChangeStatus, ChangeSetError> {
        if !self.status.can_transition_to(next) {
            return Err(ChangeSetError::InvalidTransition {
                id: self.id.clone(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        let previous = self.status;
        self.status = next;
        Ok(previous)
    }

    /// Resolve the `kind × operation × payload` matrix.
    ///
    /// For `update`, full `content` takes precedence over `diff` when both
    /// are present.
    pub fn payload(&self) -> Result<ChangePayload<'_>, ChangeSetError> {
        match (self.kind, self.operation) {
            (ChangeKind::Directory, ChangeOperation::Create) => Ok(ChangePayload::CreateDirectory),
            (ChangeKind::Directory, ChangeOperation::Update) => Err(ChangeSetError::InvalidData(
                format!("directory '{}' cannot be updated", self.path),
            )),
            (_, ChangeOperation::Delete) => Ok(ChangePayload::Remove),
            (_, ChangeOperation::Rename) => match self.rename_to.as_deref() {
                Some(to) if !to.trim().is_empty() => Ok(ChangePayload::Rename { to }),
                _ => Err(ChangeSetError::InvalidData(format!(
                    "rename of '{}' has no destination",
                    self.path
                ))),
            },
            (_, ChangeOperation::Create) => Ok(ChangePayload::WriteContent(
                self.content.as_deref().unwrap_or_default(),
            )),
            (_, ChangeOperation::Update) => match (&self.content, &self.diff) {
                (Some(content), _) => Ok(ChangePayload::WriteContent(content)),
                (None, Some(diff)) => Ok(ChangePayload::ApplyDiff(diff)),
                (None, None) => Err(ChangeSetError::InvalidData(format!(
                    "update of '{}' carries neither content nor diff",
                    self.path
                ))),
            },
        }
    }

    /// Whether this change has left `pending` and belongs in the change log.
    pub fn is_settled(&self) -> bool {
        self.status != ChangeStatus::Pending
    }
}
