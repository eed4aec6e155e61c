// state.rs — AppState: the daemon's owned stores and the operations the
// HTTP layer calls.
//
// Constructed once at startup and shared as `Arc<AppState>`. The
// ChangeStore is the single writer of change status; every lifecycle
// transition here goes through it and is followed by the matching push
// event. Blocking work (filesystem, git subprocesses) runs on the blocking
// pool so request workers stay free.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use pw_changeset::{
    AgentState, Change, ChangeStatus, CheckKind, CheckReport, Connectivity, NewChange, NewTask,
    Task, TaskStatus,
};
use pw_engine::{ChangeEngine, PatchGate};
use pw_events::{PushMessage, Subscription, SyncChannel};
use pw_git::{Classification, GitBridge};
use pw_verify::builtin::BuiltinChecker;
use pw_verify::{CheckPayload, Checker, HttpChecker, VerificationCoordinator};
use pw_workspace::{ChangeStore, FsOperation, FsOutcome, TaskStore, WorkspaceGuard};

use crate::config::DaemonConfig;
use crate::error::ApiError;

/// Response of `POST /api/apply`.
#[derive(Debug, Clone, Serialize)]
pub struct PatchReceipt {
    pub target_path: String,
    pub change: Change,
}

/// Response of `POST /api/git`.
#[derive(Debug, Clone, Serialize)]
pub struct GitCommandResult {
    pub success: bool,
    pub command: String,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<&'static str>,
}

/// Response of `GET /api/status`.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonStatus {
    #[serde(flatten)]
    pub agent: AgentState,
    pub subscribers: usize,
}

pub struct AppState {
    config: DaemonConfig,
    tasks: TaskStore,
    changes: ChangeStore,
    engine: Arc<ChangeEngine>,
    coordinator: VerificationCoordinator,
    channel: SyncChannel,
    last_sync: Mutex<Option<DateTime<Utc>>>,
}

impl AppState {
    pub fn new(config: DaemonConfig) -> Result<Self, ApiError> {
        config
            .validate()
            .map_err(|e| ApiError::new("validation_error", e.to_string()))?;

        let guard = WorkspaceGuard::new(&config.workspace_root)?;
        let git = Arc::new(GitBridge::new(guard.root(), &config.git));
        let engine = Arc::new(ChangeEngine::new(guard, git));
        let changes = ChangeStore::with_log(config.change_log_path())?;
        let coordinator = coordinator_for(&config);
        let channel = SyncChannel::new(config.channel_config());

        tracing::info!(
            workspace = %engine.guard().root().display(),
            change_log = %config.change_log_path().display(),
            "daemon state initialised"
        );
        Ok(Self {
            config,
            tasks: TaskStore::new(),
            changes,
            engine,
            coordinator,
            channel,
            last_sync: Mutex::new(None),
        })
    }

    /// Replace the verification coordinator (custom checkers).
    pub fn with_coordinator(mut self, coordinator: VerificationCoordinator) -> Self {
        self.coordinator = coordinator;
        self
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    pub fn channel(&self) -> &SyncChannel {
        &self.channel
    }

    pub fn engine(&self) -> &Arc<ChangeEngine> {
        &self.engine
    }

    // ── Tasks ─────────────────────────────────────────────────────

    pub fn list_tasks(&self) -> Result<Vec<Task>, ApiError> {
        Ok(self.tasks.list()?)
    }

    pub fn create_task(&self, new: NewTask) -> Result<Task, ApiError> {
        let task = self.tasks.create(new)?;
        tracing::info!(task_id = %task.id, kind = task.kind.as_str(), "task created");
        self.channel.publish(PushMessage::TaskUpdate(task.clone()));
        Ok(task)
    }

    pub fn update_task(&self, id: &str, status: TaskStatus) -> Result<Task, ApiError> {
        let task = self.tasks.update_status(id, status)?;
        tracing::info!(task_id = %id, %status, "task updated");
        self.channel.publish(PushMessage::TaskUpdate(task.clone()));
        Ok(task)
    }

    // ── Changes ───────────────────────────────────────────────────

    pub fn list_changes(&self, status: Option<ChangeStatus>) -> Result<Vec<Change>, ApiError> {
        Ok(match status {
            Some(status) => self.changes.list_by_status(status)?,
            None => self.changes.list()?,
        })
    }

    pub fn get_change(&self, id: &str) -> Result<Change, ApiError> {
        Ok(self.changes.get(id)?)
    }

    /// Validate, record and apply a patch request.
    ///
    /// Gate failures create nothing. Once the change is recorded, an apply
    /// failure leaves it `failed` and the error names it.
    pub async fn submit_patch(
        &self,
        content_type: Option<&str>,
        body: &Value,
    ) -> Result<PatchReceipt, ApiError> {
        let validated = PatchGate::validate(content_type, body)?;
        let new = self.engine.change_for_patch(&validated)?;
        let change = self.changes.create(new)?;
        tracing::info!(
            change_id = %change.id,
            path = %change.path,
            requested = %validated.target_path,
            "patch submitted"
        );
        let change = self.apply_recorded(change).await?;
        Ok(PatchReceipt {
            target_path: validated.target_path,
            change,
        })
    }

    /// Record a change; with `apply` it is applied immediately.
    pub async fn record_change(&self, new: NewChange, apply: bool) -> Result<Change, ApiError> {
        let guard = self.engine.guard();
        guard.resolve_mutable(&new.path)?;
        if let Some(to) = &new.rename_to {
            guard.resolve_mutable(to)?;
        }
        let change = self.changes.create(new)?;
        tracing::info!(change_id = %change.id, path = %change.path, apply, "change recorded");
        if apply {
            self.apply_recorded(change).await
        } else {
            Ok(change)
        }
    }

    async fn apply_recorded(&self, change: Change) -> Result<Change, ApiError> {
        let id = change.id.clone();
        let engine = Arc::clone(&self.engine);
        let outcome = tokio::task::spawn_blocking(move || engine.apply_change(&change)).await?;

        match outcome {
            Ok(_) => {
                let applied = self.changes.transition(&id, ChangeStatus::Applied, None)?;
                self.touch_last_sync();
                self.channel.publish(PushMessage::ChangeReady(applied.clone()));
                Ok(applied)
            }
            Err(e) => {
                let error = ApiError::from(e).with_change(&id);
                tracing::warn!(change_id = %id, kind = error.kind, error = %error.message, "apply failed");
                self.changes.fail(&id, error.message.clone(), None)?;
                Err(error)
            }
        }
    }

    /// Run the three checks against an applied change and settle it.
    pub async fn verify_change(&self, id: &str) -> Result<Change, ApiError> {
        let change = self.changes.get(id)?;
        if change.status != ChangeStatus::Applied {
            return Err(ApiError::new(
                "invalid_transition",
                format!(
                    "change {id} is {}; only applied changes can be verified",
                    change.status
                ),
            ));
        }

        let results = self.coordinator.verify(&change).await;
        let updated = if results.passed() {
            self.changes
                .transition(id, ChangeStatus::Verified, Some(results.clone()))?
        } else {
            self.changes
                .fail(id, "verification failed", Some(results.clone()))?
        };

        self.channel.publish(PushMessage::VerificationComplete {
            change_id: id.to_string(),
            status: updated.status,
            results,
        });
        Ok(updated)
    }

    // ── Checkers, filesystem, git ─────────────────────────────────

    /// Serve one dimension from the built-in checkers.
    pub async fn run_check(
        &self,
        kind: CheckKind,
        payload: &CheckPayload,
    ) -> Result<CheckReport, ApiError> {
        BuiltinChecker::new(kind)
            .check(payload)
            .await
            .map_err(|e| ApiError::new(e.kind(), e.to_string()))
    }

    /// Run a filesystem operation. Written files are staged in git on a
    /// best-effort basis.
    pub async fn filesystem(&self, op: FsOperation) -> Result<FsOutcome, ApiError> {
        let engine = Arc::clone(&self.engine);
        let outcome = tokio::task::spawn_blocking(move || -> Result<FsOutcome, ApiError> {
            let outcome = op.execute(engine.guard())?;
            if let FsOutcome::Written { path, .. } = &outcome {
                stage_best_effort(engine.git(), path);
            }
            Ok(outcome)
        })
        .await??;
        Ok(outcome)
    }

    /// Run an allow-listed git command from a remote caller.
    pub async fn git(&self, command: String, args: Vec<String>) -> Result<GitCommandResult, ApiError> {
        let git = Arc::clone(self.engine.git());
        let output =
            tokio::task::spawn_blocking(move || git.run_remote(&command, &args)).await??;
        Ok(GitCommandResult {
            success: true,
            command: output.subcommand.to_string(),
            output: output.combined(),
            note: (output.classification == Classification::NoOp).then_some("no changes"),
        })
    }

    // ── Push channel and status ───────────────────────────────────

    pub fn subscribe(&self) -> Subscription {
        self.channel.subscribe()
    }

    pub fn status(&self) -> Result<DaemonStatus, ApiError> {
        let tasks = self.tasks.list()?;
        let last_sync = *self
            .last_sync
            .lock()
            .map_err(|e| ApiError::internal(e.to_string()))?;
        Ok(DaemonStatus {
            agent: AgentState::from_tasks(Connectivity::Online, last_sync, &tasks),
            subscribers: self.channel.subscriber_count(),
        })
    }

    fn touch_last_sync(&self) {
        match self.last_sync.lock() {
            Ok(mut last) => *last = Some(Utc::now()),
            Err(e) => tracing::warn!(error = %e, "last_sync not updated"),
        }
    }
}

fn stage_best_effort(git: &GitBridge, path: &str) {
    match git.stage(path) {
        Ok(outcome) => tracing::debug!(path, ?outcome, "written file staged"),
        Err(e) => tracing::warn!(path, error = %e, "written file not staged"),
    }
}

fn coordinator_for(config: &DaemonConfig) -> VerificationCoordinator {
    let checker = |kind: CheckKind, url: &Option<String>| -> Arc<dyn Checker> {
        match url {
            Some(url) => Arc::new(HttpChecker::new(kind, url.clone(), None)),
            None => Arc::new(BuiltinChecker::new(kind)),
        }
    };
    let checkers = &config.checkers;
    VerificationCoordinator::new(
        checker(CheckKind::Syntax, &checkers.syntax_url),
        checker(CheckKind::EdgeCase, &checkers.edge_case_url),
        checker(CheckKind::Regression, &checkers.regression_url),
        config.checker_timeout(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pw_changeset::{ChangeKind, ChangeOperation, TaskKind};
    use pw_workspace::ChangeLog;
    use serde_json::json;

    fn state(dir: &std::path::Path) -> AppState {
        let config = DaemonConfig {
            workspace_root: dir.to_path_buf(),
            ..Default::default()
        };
        AppState::new(config).unwrap()
    }

    #[tokio::test]
    async fn task_creation_publishes_update() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let mut sub = state.subscribe();
        sub.recv().await.unwrap();

        let task = state
            .create_task(NewTask::new(TaskKind::Feature, "dark mode"))
            .unwrap();
        let PushMessage::TaskUpdate(pushed) = sub.recv().await.unwrap() else {
            panic!("expected task_update");
        };
        assert_eq!(pushed.id, task.id);

        state.update_task(&task.id, TaskStatus::InProgress).unwrap();
        assert_eq!(state.status().unwrap().agent.active_tasks, 1);
    }

    #[tokio::test]
    async fn recorded_content_change_applies_and_is_logged() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());

        let change = state
            .record_change(
                NewChange::content("notes/todo.md", ChangeOperation::Create, "- ship\n"),
                true,
            )
            .await
            .unwrap();
        assert_eq!(change.status, ChangeStatus::Applied);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("notes/todo.md")).unwrap(),
            "- ship\n"
        );
        assert!(state.status().unwrap().agent.last_sync.is_some());

        let logged = ChangeLog::read_all(state.config().change_log_path()).unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].id, change.id);

        let verified = state.verify_change(&change.id).await.unwrap();
        assert_eq!(verified.status, ChangeStatus::Verified);
        assert!(verified.verification_results.unwrap().passed());
    }

    #[tokio::test]
    async fn pending_change_cannot_be_verified() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let change = state
            .record_change(NewChange::content("a.txt", ChangeOperation::Create, "a"), false)
            .await
            .unwrap();
        let err = state.verify_change(&change.id).await.unwrap_err();
        assert_eq!(err.kind, "invalid_transition");
    }

    #[tokio::test]
    async fn traversal_is_rejected_before_recording() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let err = state
            .record_change(NewChange::content("../x", ChangeOperation::Create, "x"), true)
            .await
            .unwrap_err();
        assert_eq!(err.kind, "path_traversal");
        assert!(state.list_changes(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_the_workspace_root_is_refused_before_recording() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("keep.txt"), "keep").unwrap();
        let state = state(dir.path());

        let mut wipe = NewChange::content(".", ChangeOperation::Delete, "");
        wipe.kind = ChangeKind::Directory;
        let err = state.record_change(wipe, true).await.unwrap_err();
        assert_eq!(err.kind, "protected_path");
        assert_eq!(err.status(), axum::http::StatusCode::FORBIDDEN);
        assert!(dir.path().join("keep.txt").exists());
        assert!(state.list_changes(None).unwrap().is_empty());

        let err = state
            .filesystem(FsOperation::WriteFile {
                path: ".git/hooks/pre-commit".into(),
                content: "#!/bin/sh\n".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind, "protected_path");
    }

    #[tokio::test]
    async fn patch_outside_a_git_repo_fails_the_change() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let body = json!({
            "targetPath": "a.txt",
            "patch": "--- a/a.txt\n+++ b/a.txt\n@@ -1 +1 @@\n-a\n+b\n"
        });
        let err = state
            .submit_patch(Some("application/json"), &body)
            .await
            .unwrap_err();
        assert_eq!(err.kind, "not_a_git_repo");
        let change_id = err.detail["change_id"].as_str().unwrap();
        assert_eq!(state.get_change(change_id).unwrap().status, ChangeStatus::Failed);
    }

    #[tokio::test]
    async fn missing_header_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let body = json!({ "targetPath": "a.txt", "patch": "@@ -1 +1 @@\n-a\n+b\n" });
        let err = state
            .submit_patch(Some("application/json"), &body)
            .await
            .unwrap_err();
        assert_eq!(err.kind, "patch_format");
        assert!(state.list_changes(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsupported_git_command_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let err = state
            .git("push".to_string(), vec!["origin".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.kind, "unsupported_command");
    }
}
