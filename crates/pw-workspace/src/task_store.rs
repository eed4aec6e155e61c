// task_store.rs — TaskStore: owned, in-memory task list.
//
// Tasks are never deleted. Status changes go through `Task::transition`, so
// the same forward-only rules apply here as on the model.

use std::sync::RwLock;

use pw_changeset::{NewTask, Task, TaskStatus};

use crate::error::WorkspaceError;

#[derive(Default)]
pub struct TaskStore {
    tasks: RwLock<Vec<Task>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and record a new task.
    pub fn create(&self, new: NewTask) -> Result<Task, WorkspaceError> {
        new.validate()?;
        let task = Task::new(new);
        self.tasks
            .write()
            .map_err(|e| WorkspaceError::LockPoisoned(e.to_string()))?
            .push(task.clone());
        tracing::info!(task_id = %task.id, kind = task.kind.as_str(), "task created");
        Ok(task)
    }

    /// All tasks in creation order.
    pub fn list(&self) -> Result<Vec<Task>, WorkspaceError> {
        Ok(self
            .tasks
            .read()
            .map_err(|e| WorkspaceError::LockPoisoned(e.to_string()))?
            .clone())
    }

    pub fn get(&self, id: &str) -> Result<Task, WorkspaceError> {
        self.tasks
            .read()
            .map_err(|e| WorkspaceError::LockPoisoned(e.to_string()))?
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| WorkspaceError::TaskNotFound(id.to_string()))
    }

    pub fn update_status(&self, id: &str, status: TaskStatus) -> Result<Task, WorkspaceError> {
        let mut tasks = self
            .tasks
            .write()
            .map_err(|e| WorkspaceError::LockPoisoned(e.to_string()))?;
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| WorkspaceError::TaskNotFound(id.to_string()))?;
        let from = task.status;
        task.transition(status)?;
        tracing::info!(task_id = %id, %from, to = %status, "task transitioned");
        Ok(task.clone())
    }

    pub fn len(&self) -> usize {
        self.tasks.read().map(|t| t.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
