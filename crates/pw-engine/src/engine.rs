// engine.rs — ChangeEngine: applies a Change to a workspace.
//
// One matrix, shared by the daemon and the client agent:
//
//   payload            effect
//   ----------------   ------------------------------------------------
//   WriteContent       write full content (parents created)
//   ApplyDiff          staged git patch application (dry run, then apply)
//   Remove             delete file, or directory tree for kind=directory
//   Rename { to }      move entry; source and destination both guarded
//   CreateDirectory    create directory tree
//
// Every path goes through WorkspaceGuard before the filesystem or git sees
// it. The engine never transitions Change status; that is the store's job.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use pw_changeset::{Change, ChangePayload, NewChange};
use pw_git::{ApplyReport, GitBridge};
use pw_workspace::WorkspaceGuard;

use crate::error::EngineError;
use crate::gate::ValidatedPatch;

/// What applying a change did.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AppliedAction {
    Wrote { bytes: usize },
    Patched { report: ApplyReport },
    Removed { existed: bool },
    Renamed { to: String },
    CreatedDirectory,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyOutcome {
    pub change_id: String,
    /// Workspace-relative path that was acted on.
    pub path: String,
    #[serde(flatten)]
    pub action: AppliedAction,
}

pub struct ChangeEngine {
    guard: WorkspaceGuard,
    git: Arc<GitBridge>,
}

impl ChangeEngine {
    pub fn new(guard: WorkspaceGuard, git: Arc<GitBridge>) -> Self {
        Self { guard, git }
    }

    pub fn guard(&self) -> &WorkspaceGuard {
        &self.guard
    }

    pub fn git(&self) -> &Arc<GitBridge> {
        &self.git
    }

    /// Turn a validated patch request into a pending change description.
    ///
    /// Both the request path and the header path must stay inside the
    /// workspace. The header path is what git will patch, so it is the path
    /// recorded on the change.
    pub fn change_for_patch(&self, patch: &ValidatedPatch) -> Result<NewChange, EngineError> {
        self.guard.resolve(&patch.target_path)?;
        let header = self.guard.resolve_mutable(&patch.header_path)?;
        let header_rel = self.guard.relative(&header)?;

        if !patch.paths_agree() {
            tracing::warn!(
                requested = %patch.target_path,
                header = %patch.header_path,
                "patch header names a different file than the request"
            );
        }
        Ok(NewChange::diff_update(header_rel, patch.patch.clone()))
    }

    /// Apply one change to the workspace.
    pub fn apply_change(&self, change: &Change) -> Result<ApplyOutcome, EngineError> {
        let target = self.guard.resolve_mutable(&change.path)?;
        let rel = self.guard.relative(&target)?;

        let action = match change.payload()? {
            ChangePayload::WriteContent(content) => {
                create_parents(&target)?;
                fs::write(&target, content).map_err(|source| EngineError::IoError {
                    path: target.clone(),
                    source,
                })?;
                AppliedAction::Wrote {
                    bytes: content.len(),
                }
            }
            ChangePayload::ApplyDiff(diff) => AppliedAction::Patched {
                report: self.git.apply_patch(&rel, diff)?,
            },
            ChangePayload::Remove => AppliedAction::Removed {
                existed: remove_entry(&target)?,
            },
            ChangePayload::Rename { to } => {
                let dest = self.guard.resolve_mutable(to)?;
                if !target.exists() {
                    return Err(pw_workspace::WorkspaceError::FileNotFound {
                        path: change.path.clone(),
                    }
                    .into());
                }
                create_parents(&dest)?;
                fs::rename(&target, &dest).map_err(|source| EngineError::IoError {
                    path: target.clone(),
                    source,
                })?;
                AppliedAction::Renamed {
                    to: self.guard.relative(&dest)?,
                }
            }
            ChangePayload::CreateDirectory => {
                fs::create_dir_all(&target).map_err(|source| EngineError::IoError {
                    path: target.clone(),
                    source,
                })?;
                AppliedAction::CreatedDirectory
            }
        };

        tracing::info!(change_id = %change.id, path = %rel, action = action_name(&action), "change applied");
        Ok(ApplyOutcome {
            change_id: change.id.clone(),
            path: rel,
            action,
        })
    }
}

fn action_name(action: &AppliedAction) -> &'static str {
    match action {
        AppliedAction::Wrote { .. } => "wrote",
        AppliedAction::Patched { .. } => "patched",
        AppliedAction::Removed { .. } => "removed",
        AppliedAction::Renamed { .. } => "renamed",
        AppliedAction::CreatedDirectory => "created_directory",
    }
}

fn create_parents(path: &Path) -> Result<(), EngineError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| EngineError::IoError {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

/// Delete a file or directory tree. Returns whether anything was there.
fn remove_entry(path: &Path) -> Result<bool, EngineError> {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => Err(e),
    };
    result.map(|_| true).map_err(|source| EngineError::IoError {
        path: path.to_path_buf(),
        source,
    })
}
