// agent_state.rs — Process-wide status snapshot.
//
// Not persisted. Rebuilt on demand from the task list plus whatever the
// owner knows about connectivity and the last successful sync/apply.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::Task;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    Online,
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentState {
    pub status: Connectivity,
    pub last_sync: Option<DateTime<Utc>>,
    pub total_tasks: usize,
    pub active_tasks: usize,
}

impl AgentState {
    pub fn from_tasks<'a>(
        status: Connectivity,
        last_sync: Option<DateTime<Utc>>,
        tasks: impl IntoIterator<Item = &'a Task>,
    ) -> Self {
        let (total_tasks, active_tasks) = tasks.into_iter().fold((0, 0), |(total, active), t| {
            (total + 1, active + usize::from(t.is_active()))
        });
        Self {
            status,
            last_sync,
            total_tasks,
            active_tasks,
        }
    }
}
