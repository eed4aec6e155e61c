// agent.rs — ClientSyncAgent: keeps a local mirror in step with a daemon.
//
// Two background workers, both owned by the agent that spawned them:
//   - sync timer: pulls tasks and changes every `sync_interval`, parses the
//     local task document, and applies pending changes when auto-apply is on
//   - push loop: holds the `/api/events` connection open, feeds each message
//     to `handle_push`, and on disconnect waits `reconnect_backoff` before
//     reconnecting and re-pulling full state
// `shutdown()` (or dropping the agent) aborts both; nothing fires afterward.
//
// Local application goes through the same ChangeEngine the daemon uses.
// The daemon publishes and lists changes it has already applied in its own
// workspace; the mirror tracks whether each one has been applied here, so
// "pending" below always means pending in this checkout. Outcomes update
// the local mirror only; nothing is reported back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use pw_changeset::{AgentState, Change, ChangeStatus, Connectivity, Task};
use pw_engine::ChangeEngine;
use pw_events::PushMessage;
use pw_git::{GitBridge, GitConfig};
use pw_verify::VerificationCoordinator;
use pw_workspace::WorkspaceGuard;

use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::error::SyncError;
use crate::mirror::LocalMirror;
use crate::task_doc::read_task_document;

const CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of one sync cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncResult {
    pub success: bool,
    /// Remote tasks that were new or newer than the local copy.
    pub tasks_synced: usize,
    pub changes_applied: usize,
    pub errors: Vec<String>,
}

struct AgentInner {
    config: ClientConfig,
    api: ApiClient,
    engine: Arc<ChangeEngine>,
    coordinator: VerificationCoordinator,
    mirror: Mutex<LocalMirror>,
    online: AtomicBool,
    last_sync: Mutex<Option<DateTime<Utc>>>,
}

pub struct ClientSyncAgent {
    inner: Arc<AgentInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ClientSyncAgent {
    /// Build an agent for `config.workspace_root`, verifying remotely
    /// through the daemon's checker endpoints.
    pub fn new(config: ClientConfig) -> Result<Self, SyncError> {
        let guard = WorkspaceGuard::new(&config.workspace_root)?;
        let git = Arc::new(GitBridge::new(guard.root(), &GitConfig::default()));
        let engine = Arc::new(ChangeEngine::new(guard, git));
        let api = ApiClient::from_config(&config);
        let coordinator = VerificationCoordinator::remote(
            &config.api_url,
            config.api_token.clone(),
            CHECK_TIMEOUT,
        );
        Ok(Self::with_parts(config, api, engine, coordinator))
    }

    pub fn with_parts(
        config: ClientConfig,
        api: ApiClient,
        engine: Arc<ChangeEngine>,
        coordinator: VerificationCoordinator,
    ) -> Self {
        Self {
            inner: Arc::new(AgentInner {
                config,
                api,
                engine,
                coordinator,
                mirror: Mutex::new(LocalMirror::new()),
                online: AtomicBool::new(false),
                last_sync: Mutex::new(None),
            }),
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Spawn the sync timer and the push loop. Calling it again while
    /// running is a no-op.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut workers = lock(&self.workers);
        if !workers.is_empty() {
            return;
        }
        workers.push(tokio::spawn(sync_timer(Arc::clone(&self.inner))));
        workers.push(tokio::spawn(push_loop(Arc::clone(&self.inner))));
        tracing::info!(
            api_url = %self.inner.config.api_url,
            interval_ms = self.inner.config.sync_interval_ms,
            auto_apply = self.inner.config.auto_apply,
            "client sync agent started"
        );
    }

    /// Abort both workers. No timer callback runs after this returns.
    pub fn shutdown(&self) {
        let workers: Vec<JoinHandle<()>> = lock(&self.workers).drain(..).collect();
        if workers.is_empty() {
            return;
        }
        for worker in &workers {
            worker.abort();
        }
        self.inner.set_online(false);
        tracing::info!("client sync agent stopped");
    }

    pub fn is_running(&self) -> bool {
        !lock(&self.workers).is_empty()
    }

    pub async fn sync_once(&self) -> SyncResult {
        self.inner.sync_once().await
    }

    /// Apply every pending mirrored change locally. Returns how many applied.
    pub async fn apply_pending_changes(&self) -> usize {
        self.inner.apply_pending_changes().await
    }

    /// Run the three checks on every locally applied change. Returns how
    /// many were verified.
    pub async fn verify_applied_changes(&self) -> usize {
        self.inner.verify_applied_changes().await
    }

    pub async fn handle_push(&self, message: PushMessage) {
        self.inner.handle_push(message).await
    }

    pub fn tasks(&self) -> Vec<Task> {
        lock(&self.inner.mirror).tasks()
    }

    pub fn changes(&self) -> Vec<Change> {
        lock(&self.inner.mirror).changes()
    }

    pub fn change_log(&self) -> Vec<Change> {
        lock(&self.inner.mirror).change_log().to_vec()
    }

    pub fn state(&self) -> AgentState {
        let tasks = self.tasks();
        let connectivity = if self.inner.online.load(Ordering::Relaxed) {
            Connectivity::Online
        } else {
            Connectivity::Offline
        };
        AgentState::from_tasks(connectivity, *lock(&self.inner.last_sync), &tasks)
    }
}

impl Drop for ClientSyncAgent {
    fn drop(&mut self) {
        let workers = self
            .workers
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for worker in workers.drain(..) {
            worker.abort();
        }
    }
}

// The mirror and the worker list stay consistent across every critical
// section, so a poisoned lock is still usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AgentInner {
    fn set_online(&self, online: bool) {
        let was = self.online.swap(online, Ordering::Relaxed);
        if was != online {
            tracing::info!(online, "connectivity changed");
        }
    }

    /// Pull tasks and changes from the daemon into the mirror.
    async fn pull_remote(&self) -> Result<usize, SyncError> {
        let tasks = self.api.list_tasks().await?;
        let changes = self.api.list_changes().await?;

        let mut mirror = lock(&self.mirror);
        let tasks_synced = tasks
            .into_iter()
            .filter(|t| mirror.merge_task(t.clone()))
            .count();
        let changes_merged = changes
            .into_iter()
            .filter(|c| mirror.merge_change(c.clone()))
            .count();
        tracing::debug!(tasks_synced, changes_merged, "pulled remote state");
        Ok(tasks_synced)
    }

    async fn sync_once(&self) -> SyncResult {
        let mut result = SyncResult::default();

        match self.pull_remote().await {
            Ok(synced) => {
                self.set_online(true);
                result.tasks_synced = synced;
            }
            Err(e) => {
                self.set_online(false);
                result.errors.push(e.to_string());
            }
        }

        match read_task_document(&self.config.tasks_path()) {
            Ok(local) => {
                let mut mirror = lock(&self.mirror);
                for task in local {
                    mirror.merge_task(task);
                }
            }
            Err(e) => result.errors.push(e.to_string()),
        }

        if self.config.auto_apply {
            result.changes_applied = self.apply_pending_changes().await;
        }

        result.success = result.errors.is_empty();
        if result.success {
            *lock(&self.last_sync) = Some(Utc::now());
        }
        tracing::info!(
            success = result.success,
            tasks_synced = result.tasks_synced,
            changes_applied = result.changes_applied,
            errors = result.errors.len(),
            "sync cycle finished"
        );
        result
    }

    async fn apply_pending_changes(&self) -> usize {
        let pending = lock(&self.mirror).changes_with_status(ChangeStatus::Pending);
        let mut applied = 0;

        for change in pending {
            let engine = Arc::clone(&self.engine);
            let id = change.id.clone();
            let outcome = tokio::task::spawn_blocking(move || engine.apply_change(&change))
                .await
                .map_err(|e| format!("apply task aborted: {e}"))
                .and_then(|r| r.map_err(|e| e.to_string()));

            let (next, failure) = match outcome {
                Ok(_) => (ChangeStatus::Applied, None),
                Err(reason) => {
                    tracing::warn!(change_id = %id, error = %reason, "local apply failed");
                    (ChangeStatus::Failed, Some(reason))
                }
            };
            match lock(&self.mirror).settle(&id, next, None, failure) {
                Ok(_) if next == ChangeStatus::Applied => applied += 1,
                Ok(_) => {}
                // Moved on concurrently (e.g. a push settled it first).
                Err(e) => tracing::debug!(change_id = %id, error = %e, "local transition skipped"),
            }
        }
        applied
    }

    async fn verify_applied_changes(&self) -> usize {
        let applied = lock(&self.mirror).changes_with_status(ChangeStatus::Applied);
        let mut verified = 0;

        for change in applied {
            let results = self.coordinator.verify(&change).await;
            let next = if results.passed() {
                ChangeStatus::Verified
            } else {
                ChangeStatus::Failed
            };
            match lock(&self.mirror).settle(&change.id, next, Some(results), None) {
                Ok(_) if next == ChangeStatus::Verified => verified += 1,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(change_id = %change.id, error = %e, "local transition skipped")
                }
            }
        }
        verified
    }

    async fn handle_push(&self, message: PushMessage) {
        tracing::debug!(event = message.event_type(), "push received");
        match message {
            PushMessage::ConnectionEstablished { subscriber_id, .. } => {
                self.set_online(true);
                tracing::info!(subscriber_id, "subscribed to push channel");
            }
            PushMessage::Heartbeat { .. } => {}
            PushMessage::TaskUpdate(task) => {
                lock(&self.mirror).merge_task(task);
            }
            PushMessage::ChangeReady(change) => {
                lock(&self.mirror).merge_change(change);
                if self.config.auto_apply {
                    self.apply_pending_changes().await;
                }
            }
            PushMessage::VerificationComplete {
                change_id,
                status,
                results,
            } => {
                let mut mirror = lock(&self.mirror);
                mirror.advance_remote_status(&change_id, status);
                match mirror.change(&change_id).map(|c| c.status) {
                    Some(current) if current.can_transition_to(status) => {
                        if let Err(e) = mirror.settle(&change_id, status, Some(results), None) {
                            tracing::warn!(change_id = %change_id, error = %e, "verification result not recorded");
                        }
                    }
                    Some(current) => tracing::debug!(
                        change_id = %change_id,
                        %current,
                        incoming = %status,
                        "verification result ignored"
                    ),
                    None => tracing::debug!(change_id = %change_id, "verification for unknown change"),
                }
            }
        }
    }
}

async fn sync_timer(inner: Arc<AgentInner>) {
    let mut interval = tokio::time::interval(inner.config.sync_interval());
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        inner.sync_once().await;
    }
}

async fn push_loop(inner: Arc<AgentInner>) {
    let backoff = inner.config.reconnect_backoff();
    loop {
        match inner.api.events().await {
            Ok(mut stream) => {
                inner.set_online(true);
                // Missed events are not replayed; catch up by pulling.
                if let Err(e) = inner.pull_remote().await {
                    tracing::warn!(error = %e, "re-pull after connect failed");
                }
                loop {
                    match stream.next().await {
                        Ok(Some(message)) => inner.handle_push(message).await,
                        Ok(None) => {
                            tracing::info!("push channel closed by server");
                            break;
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "push channel broke");
                            break;
                        }
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "push channel connect failed"),
        }
        inner.set_online(false);
        tracing::info!(backoff_ms = backoff.as_millis() as u64, "reconnecting push channel");
        tokio::time::sleep(backoff).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, routing::get, routing::post, Json, Router};
    use pw_changeset::{ChangeOperation, NewChange, NewTask, TaskKind, VerificationResult};
    use pw_verify::builtin::canned_report;
    use pw_changeset::CheckKind;
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicUsize;

    #[derive(Clone, Default)]
    struct Remote {
        tasks: Arc<Mutex<Vec<Task>>>,
        changes: Arc<Mutex<Vec<Change>>>,
        task_pulls: Arc<AtomicUsize>,
        lint_passes: Arc<AtomicBool>,
    }

    fn envelope(data: impl Serialize) -> Json<Value> {
        Json(json!({ "success": true, "data": data, "timestamp": Utc::now() }))
    }

    async fn serve(remote: Remote) -> String {
        let router = Router::new()
            .route(
                "/api/tasks",
                get(|State(r): State<Remote>| async move {
                    r.task_pulls.fetch_add(1, Ordering::SeqCst);
                    envelope(r.tasks.lock().unwrap().clone())
                }),
            )
            .route(
                "/api/changes",
                get(|State(r): State<Remote>| async move {
                    envelope(r.changes.lock().unwrap().clone())
                }),
            )
            .route(
                "/api/lint",
                post(|State(r): State<Remote>| async move {
                    let mut report = canned_report(CheckKind::Syntax);
                    report.passed = r.lint_passes.load(Ordering::SeqCst);
                    envelope(report)
                }),
            )
            .route(
                "/api/test-cases",
                post(|| async { envelope(canned_report(CheckKind::EdgeCase)) }),
            )
            .route(
                "/api/regression-check",
                post(|| async { envelope(canned_report(CheckKind::Regression)) }),
            )
            .with_state(remote);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn agent(base: &str, root: &std::path::Path, auto_apply: bool) -> ClientSyncAgent {
        let config = ClientConfig {
            api_url: base.to_string(),
            workspace_root: root.to_path_buf(),
            auto_apply,
            sync_interval_ms: 20,
            reconnect_backoff_ms: 10,
            ..Default::default()
        };
        ClientSyncAgent::new(config).unwrap()
    }

    fn content_change(path: &str, body: &str) -> Change {
        Change::new(NewChange::content(path, ChangeOperation::Create, body))
    }

    /// A change as the daemon publishes and lists it: already applied in the
    /// daemon's own workspace.
    fn applied_remotely(path: &str, body: &str) -> Change {
        let mut change = content_change(path, body);
        change.transition(ChangeStatus::Applied).unwrap();
        change
    }

    #[tokio::test]
    async fn sync_merges_remote_tasks_and_local_document() {
        let remote = Remote::default();
        remote
            .tasks
            .lock()
            .unwrap()
            .push(Task::new(NewTask::new(TaskKind::Feature, "remote task")));
        let base = serve(remote.clone()).await;
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tasks.md"), "# Tasks\n[bug] [high] local task\n").unwrap();

        let agent = agent(&base, dir.path(), false);
        let first = agent.sync_once().await;
        assert!(first.success, "{:?}", first.errors);
        assert_eq!(first.tasks_synced, 1);
        assert_eq!(agent.tasks().len(), 2);
        assert_eq!(agent.state().status, Connectivity::Online);
        assert!(agent.state().last_sync.is_some());

        // Remote task unchanged; the local document is parsed again with fresh ids.
        let second = agent.sync_once().await;
        assert_eq!(second.tasks_synced, 0);
        assert_eq!(agent.tasks().len(), 3);
    }

    #[tokio::test]
    async fn unreachable_daemon_reports_failure_and_goes_offline() {
        let dir = tempfile::tempdir().unwrap();
        let agent = agent("http://127.0.0.1:1", dir.path(), false);
        let result = agent.sync_once().await;
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(agent.state().status, Connectivity::Offline);
        assert!(agent.state().last_sync.is_none());
    }

    #[tokio::test]
    async fn auto_apply_on_change_ready_writes_locally() {
        let base = serve(Remote::default()).await;
        let dir = tempfile::tempdir().unwrap();
        let agent = agent(&base, dir.path(), true);

        let change = content_change("src/new.txt", "hello\n");
        agent.handle_push(PushMessage::ChangeReady(change.clone())).await;

        assert_eq!(
            std::fs::read_to_string(dir.path().join("src/new.txt")).unwrap(),
            "hello\n"
        );
        let log = agent.change_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].id, change.id);
        assert_eq!(log[0].status, ChangeStatus::Applied);
    }

    #[tokio::test]
    async fn change_ready_for_a_server_applied_change_is_applied_locally() {
        let base = serve(Remote::default()).await;
        let dir = tempfile::tempdir().unwrap();
        let agent = agent(&base, dir.path(), true);

        let change = applied_remotely("lib/ready.txt", "ready\n");
        agent.handle_push(PushMessage::ChangeReady(change.clone())).await;

        assert_eq!(
            std::fs::read_to_string(dir.path().join("lib/ready.txt")).unwrap(),
            "ready\n"
        );
        assert_eq!(agent.changes()[0].status, ChangeStatus::Applied);
        let log = agent.change_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].id, change.id);

        // A repeated push does not apply it twice.
        agent.handle_push(PushMessage::ChangeReady(change)).await;
        assert_eq!(agent.change_log().len(), 1);
    }

    #[tokio::test]
    async fn pulled_server_applied_changes_are_applied_once() {
        let remote = Remote::default();
        remote
            .changes
            .lock()
            .unwrap()
            .push(applied_remotely("pulled.txt", "pulled\n"));
        let mut rejected = content_change("rejected.txt", "no\n");
        rejected.transition(ChangeStatus::Failed).unwrap();
        remote.changes.lock().unwrap().push(rejected);
        let base = serve(remote).await;
        let dir = tempfile::tempdir().unwrap();
        let agent = agent(&base, dir.path(), true);

        let first = agent.sync_once().await;
        assert!(first.success, "{:?}", first.errors);
        assert_eq!(first.changes_applied, 1);
        assert!(dir.path().join("pulled.txt").exists());
        assert!(!dir.path().join("rejected.txt").exists());

        let second = agent.sync_once().await;
        assert_eq!(second.changes_applied, 0);
        assert_eq!(agent.change_log().len(), 1);
    }

    #[tokio::test]
    async fn without_auto_apply_change_ready_only_mirrors() {
        let base = serve(Remote::default()).await;
        let dir = tempfile::tempdir().unwrap();
        let agent = agent(&base, dir.path(), false);

        agent
            .handle_push(PushMessage::ChangeReady(content_change("x.txt", "x")))
            .await;
        assert!(!dir.path().join("x.txt").exists());
        assert_eq!(agent.changes()[0].status, ChangeStatus::Pending);
        assert!(agent.change_log().is_empty());
    }

    #[tokio::test]
    async fn failed_local_apply_marks_change_failed() {
        let base = serve(Remote::default()).await;
        let dir = tempfile::tempdir().unwrap();
        let agent = agent(&base, dir.path(), false);

        let escaping = content_change("../outside.txt", "nope");
        agent.handle_push(PushMessage::ChangeReady(escaping)).await;
        assert_eq!(agent.apply_pending_changes().await, 0);

        let log = agent.change_log();
        assert_eq!(log[0].status, ChangeStatus::Failed);
        assert!(log[0].failure.as_deref().unwrap().contains("traversal"));
    }

    #[tokio::test]
    async fn verify_uses_remote_checkers() {
        let remote = Remote::default();
        remote.lint_passes.store(true, Ordering::SeqCst);
        let base = serve(remote.clone()).await;
        let dir = tempfile::tempdir().unwrap();
        let agent = agent(&base, dir.path(), false);

        agent
            .handle_push(PushMessage::ChangeReady(content_change("a.txt", "a")))
            .await;
        agent.apply_pending_changes().await;
        assert_eq!(agent.verify_applied_changes().await, 1);
        assert_eq!(agent.changes()[0].status, ChangeStatus::Verified);

        remote.lint_passes.store(false, Ordering::SeqCst);
        agent
            .handle_push(PushMessage::ChangeReady(content_change("b.txt", "b")))
            .await;
        agent.apply_pending_changes().await;
        assert_eq!(agent.verify_applied_changes().await, 0);
        let b = agent.changes().into_iter().find(|c| c.path == "b.txt").unwrap();
        assert_eq!(b.status, ChangeStatus::Failed);
        assert!(!b.verification_results.unwrap().syntax_check.passed);
    }

    #[tokio::test]
    async fn verification_complete_push_settles_applied_change() {
        let base = serve(Remote::default()).await;
        let dir = tempfile::tempdir().unwrap();
        let agent = agent(&base, dir.path(), true);

        let change = content_change("v.txt", "v");
        agent.handle_push(PushMessage::ChangeReady(change.clone())).await;

        let results = VerificationResult::new(
            canned_report(CheckKind::Syntax),
            canned_report(CheckKind::EdgeCase),
            canned_report(CheckKind::Regression),
        );
        agent
            .handle_push(PushMessage::VerificationComplete {
                change_id: change.id.clone(),
                status: ChangeStatus::Verified,
                results,
            })
            .await;

        let mirrored = agent.changes().pop().unwrap();
        assert_eq!(mirrored.status, ChangeStatus::Verified);
        assert!(mirrored.verification_results.is_some());
        assert_eq!(agent.change_log().len(), 2);
    }

    #[tokio::test]
    async fn shutdown_stops_the_sync_timer() {
        let remote = Remote::default();
        let base = serve(remote.clone()).await;
        let dir = tempfile::tempdir().unwrap();
        let agent = agent(&base, dir.path(), false);

        agent.start();
        assert!(agent.is_running());
        tokio::time::sleep(Duration::from_millis(100)).await;
        agent.shutdown();
        assert!(!agent.is_running());
        tokio::time::sleep(Duration::from_millis(30)).await;

        let pulls = remote.task_pulls.load(Ordering::SeqCst);
        assert!(pulls >= 2, "expected periodic pulls, saw {pulls}");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(remote.task_pulls.load(Ordering::SeqCst), pulls);
    }
}
