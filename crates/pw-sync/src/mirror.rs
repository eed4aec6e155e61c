// mirror.rs — LocalMirror: the client's copy of tasks and changes.
//
// Tasks merge last-writer-wins on `updated_at`: an incoming task replaces
// the local one only when it is strictly newer.
//
// Changes carry two statuses. The server's status says where the change is
// in the daemon's workspace; the local status says where it is in this
// checkout. A change the daemon already applied arrives here `pending`
// locally until the client applies it too. A change the server reports as
// failed is never applied locally. Server status only moves forward, so a
// stale pull never rewinds it, and the local status is only moved by
// `settle`.

use std::collections::HashMap;

use pw_changeset::{Change, ChangeSetError, ChangeStatus, Task, VerificationResult};

fn status_rank(status: ChangeStatus) -> u8 {
    match status {
        ChangeStatus::Pending => 0,
        ChangeStatus::Applied => 1,
        ChangeStatus::Verified | ChangeStatus::Failed => 2,
    }
}

#[derive(Debug)]
struct MirroredChange {
    /// Local view: `status`, `verification_results` and `failure` describe
    /// this checkout.
    local: Change,
    remote_status: ChangeStatus,
}

impl MirroredChange {
    fn from_remote(remote: Change) -> Self {
        let remote_status = remote.status;
        let mut local = remote;
        if remote_status != ChangeStatus::Failed {
            local.status = ChangeStatus::Pending;
            local.verification_results = None;
            local.failure = None;
        }
        Self {
            local,
            remote_status,
        }
    }
}

#[derive(Debug, Default)]
pub struct LocalMirror {
    tasks: HashMap<String, Task>,
    task_order: Vec<String>,
    changes: HashMap<String, MirroredChange>,
    change_order: Vec<String>,
    change_log: Vec<Change>,
}

impl LocalMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one task. Returns true if the local copy changed.
    pub fn merge_task(&mut self, incoming: Task) -> bool {
        match self.tasks.get(&incoming.id) {
            Some(local) if incoming.updated_at <= local.updated_at => false,
            Some(_) => {
                self.tasks.insert(incoming.id.clone(), incoming);
                true
            }
            None => {
                self.task_order.push(incoming.id.clone());
                self.tasks.insert(incoming.id.clone(), incoming);
                true
            }
        }
    }

    /// Merge one change from the server. Returns true if it was new or its
    /// server status moved forward.
    ///
    /// A change that is still pending locally when the server reports it
    /// failed is settled `failed` here as well.
    pub fn merge_change(&mut self, incoming: Change) -> bool {
        let Some(entry) = self.changes.get_mut(&incoming.id) else {
            self.change_order.push(incoming.id.clone());
            self.changes
                .insert(incoming.id.clone(), MirroredChange::from_remote(incoming));
            return true;
        };
        if status_rank(incoming.status) <= status_rank(entry.remote_status) {
            return false;
        }
        entry.remote_status = incoming.status;
        if incoming.status == ChangeStatus::Failed
            && entry.local.status == ChangeStatus::Pending
        {
            let reason = incoming
                .failure
                .unwrap_or_else(|| "failed on the server".to_string());
            if let Err(e) = self.settle(&incoming.id, ChangeStatus::Failed, None, Some(reason)) {
                tracing::debug!(change_id = %incoming.id, error = %e, "server failure not mirrored");
            }
        }
        true
    }

    /// Record a server status learned from a push event. Returns false if
    /// the change is unknown or the status would move backwards.
    pub fn advance_remote_status(&mut self, id: &str, status: ChangeStatus) -> bool {
        match self.changes.get_mut(id) {
            Some(entry) if status_rank(status) > status_rank(entry.remote_status) => {
                entry.remote_status = status;
                true
            }
            _ => false,
        }
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// The local view of a change.
    pub fn change(&self, id: &str) -> Option<&Change> {
        self.changes.get(id).map(|m| &m.local)
    }

    /// The last status the server reported for a change.
    pub fn remote_status(&self, id: &str) -> Option<ChangeStatus> {
        self.changes.get(id).map(|m| m.remote_status)
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.task_order
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .cloned()
            .collect()
    }

    pub fn changes(&self) -> Vec<Change> {
        self.change_order
            .iter()
            .filter_map(|id| self.changes.get(id))
            .map(|m| m.local.clone())
            .collect()
    }

    /// Changes whose local status is `status`.
    pub fn changes_with_status(&self, status: ChangeStatus) -> Vec<Change> {
        self.change_order
            .iter()
            .filter_map(|id| self.changes.get(id))
            .filter(|m| m.local.status == status)
            .map(|m| m.local.clone())
            .collect()
    }

    /// Changes that left `pending` locally, in the order they did.
    pub fn change_log(&self) -> &[Change] {
        &self.change_log
    }

    /// Move a change's local status forward and record it in the change log.
    ///
    /// `results` and `failure` are attached before the new state is logged.
    pub fn settle(
        &mut self,
        id: &str,
        next: ChangeStatus,
        results: Option<VerificationResult>,
        failure: Option<String>,
    ) -> Result<Change, ChangeSetError> {
        let change = self
            .changes
            .get_mut(id)
            .map(|m| &mut m.local)
            .ok_or_else(|| ChangeSetError::InvalidData(format!("change {id} is not mirrored")))?;
        let from = change.transition(next)?;
        if results.is_some() {
            change.verification_results = results;
        }
        if failure.is_some() {
            change.failure = failure;
        }
        tracing::info!(change_id = %id, %from, to = %next, "local change transitioned");
        let snapshot = change.clone();
        self.change_log.push(snapshot.clone());
        Ok(snapshot)
    }
}
