// store.rs — ChangeStore: the single owner of Change records.
//
// Only the store mutates a Change's status. Each record sits behind its own
// mutex, so a transition is atomic per id (two concurrent attempts on the
// same change serialize; exactly one can win a given edge) while transitions
// on different ids never contend. The outer RwLock is held only long enough
// to look up or insert the per-id handle.
//
// When a transition moves a change out of `pending`, the new snapshot is
// appended to the ChangeLog before it becomes visible. A failed append
// leaves the in-memory record untouched.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use pw_changeset::{Change, ChangeStatus, NewChange, VerificationResult};

use crate::change_log::ChangeLog;
use crate::error::WorkspaceError;

#[derive(Default)]
struct Index {
    by_id: HashMap<String, Arc<Mutex<Change>>>,
    order: Vec<String>,
}

#[derive(Default)]
pub struct ChangeStore {
    index: RwLock<Index>,
    log: Option<ChangeLog>,
}

impl ChangeStore {
    /// In-memory store with no change log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that appends settled changes to a JSONL log at `log_path`.
    pub fn with_log(log_path: impl AsRef<Path>) -> Result<Self, WorkspaceError> {
        Ok(Self {
            index: RwLock::new(Index::default()),
            log: Some(ChangeLog::open(log_path)?),
        })
    }

    pub fn log(&self) -> Option<&ChangeLog> {
        self.log.as_ref()
    }

    /// Record a new pending change.
    pub fn create(&self, new: NewChange) -> Result<Change, WorkspaceError> {
        let change = Change::new(new);
        let mut index = self
            .index
            .write()
            .map_err(|e| WorkspaceError::LockPoisoned(e.to_string()))?;
        index.order.push(change.id.clone());
        index
            .by_id
            .insert(change.id.clone(), Arc::new(Mutex::new(change.clone())));
        tracing::info!(change_id = %change.id, path = %change.path, operation = ?change.operation, "change recorded");
        Ok(change)
    }

    pub fn get(&self, id: &str) -> Result<Change, WorkspaceError> {
        let handle = self.handle(id)?;
        let change = handle
            .lock()
            .map_err(|e| WorkspaceError::LockPoisoned(e.to_string()))?;
        Ok(change.clone())
    }

    /// All changes in creation order.
    pub fn list(&self) -> Result<Vec<Change>, WorkspaceError> {
        let handles: Vec<Arc<Mutex<Change>>> = {
            let index = self
                .index
                .read()
                .map_err(|e| WorkspaceError::LockPoisoned(e.to_string()))?;
            index
                .order
                .iter()
                .filter_map(|id| index.by_id.get(id).cloned())
                .collect()
        };
        handles
            .iter()
            .map(|h| {
                h.lock()
                    .map(|c| c.clone())
                    .map_err(|e| WorkspaceError::LockPoisoned(e.to_string()))
            })
            .collect()
    }

    pub fn list_by_status(&self, status: ChangeStatus) -> Result<Vec<Change>, WorkspaceError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|c| c.status == status)
            .collect())
    }

    /// Move a change to `next`, optionally attaching verification results.
    pub fn transition(
        &self,
        id: &str,
        next: ChangeStatus,
        results: Option<VerificationResult>,
    ) -> Result<Change, WorkspaceError> {
        self.update(id, next, results, None)
    }

    /// Move a change to `failed`, recording why.
    pub fn fail(
        &self,
        id: &str,
        reason: impl Into<String>,
        results: Option<VerificationResult>,
    ) -> Result<Change, WorkspaceError> {
        self.update(id, ChangeStatus::Failed, results, Some(reason.into()))
    }

    fn update(
        &self,
        id: &str,
        next: ChangeStatus,
        results: Option<VerificationResult>,
        failure: Option<String>,
    ) -> Result<Change, WorkspaceError> {
        let handle = self.handle(id)?;
        let mut current = handle
            .lock()
            .map_err(|e| WorkspaceError::LockPoisoned(e.to_string()))?;

        let mut updated = current.clone();
        let previous = updated.transition(next)?;
        if results.is_some() {
            updated.verification_results = results;
        }
        if failure.is_some() {
            updated.failure = failure;
        }

        if let Some(log) = &self.log {
            if updated.is_settled() {
                log.append(&updated)?;
            }
        }
        *current = updated.clone();

        tracing::info!(change_id = %id, from = %previous, to = %next, "change transitioned");
        Ok(updated)
    }

    fn handle(&self, id: &str) -> Result<Arc<Mutex<Change>>, WorkspaceError> {
        let index = self
            .index
            .read()
            .map_err(|e| WorkspaceError::LockPoisoned(e.to_string()))?;
        index
            .by_id
            .get(id)
            .cloned()
            .ok_or_else(|| WorkspaceError::ChangeNotFound(id.to_string()))
    }
}
