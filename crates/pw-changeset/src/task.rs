// task.rs — Task: a unit of requested work.
//
// Tasks are created by an external producer (via the API) or synthesized
// from a local task-list document. They are never deleted, only transitioned:
//   pending → in_progress → completed | failed
//   pending → failed

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ChangeSetError;

/// What the task asks for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Bug,
    Feature,
    Status,
    Diff,
    Logs,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Bug => "bug",
            TaskKind::Feature => "feature",
            TaskKind::Status => "status",
            TaskKind::Diff => "diff",
            TaskKind::Logs => "logs",
        }
    }
}

impl FromStr for TaskKind {
    type Err = ChangeSetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bug" => Ok(TaskKind::Bug),
            "feature" => Ok(TaskKind::Feature),
            "status" => Ok(TaskKind::Status),
            "diff" => Ok(TaskKind::Diff),
            "logs" => Ok(TaskKind::Logs),
            _ => Err(ChangeSetError::UnknownVariant {
                field: "task kind",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Check whether moving from this state to `next` is allowed.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::InProgress)
                | (TaskStatus::Pending, TaskStatus::Failed)
                | (TaskStatus::InProgress, TaskStatus::Completed)
                | (TaskStatus::InProgress, TaskStatus::Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        f.pad(s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Critical => "critical",
        }
    }
}

impl FromStr for TaskPriority {
    type Err = ChangeSetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            "critical" => Ok(TaskPriority::Critical),
            _ => Err(ChangeSetError::UnknownVariant {
                field: "task priority",
                value: s.to_string(),
            }),
        }
    }
}

/// A unit of requested work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Server-assigned (or parse-assigned, for local tasks) opaque id.
    pub id: String,
    pub kind: TaskKind,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    /// Ordered set: insertion order kept, duplicates dropped.
    #[serde(default)]
    pub labels: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
}

/// Caller-supplied fields for creating a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub kind: TaskKind,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub assignee: Option<String>,
}

impl NewTask {
    pub fn new(kind: TaskKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            description: String::new(),
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
            labels: Vec::new(),
            assignee: None,
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    /// Reject tasks without a usable title.
    pub fn validate(&self) -> Result<(), ChangeSetError> {
        if self.title.trim().is_empty() {
            return Err(ChangeSetError::InvalidData(
                "task title cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Task {
    /// Build a task with a fresh id and timestamps.
    pub fn new(new: NewTask) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            kind: new.kind,
            title: new.title.trim().to_string(),
            description: new.description,
            status: new.status,
            priority: new.priority,
            labels: dedup_labels(new.labels),
            created_at: now,
            updated_at: now,
            assignee: new.assignee,
        }
    }

    /// Transition to a new status, bumping `updated_at`.
    pub fn transition(&mut self, next: TaskStatus) -> Result<(), ChangeSetError> {
        if !self.status.can_transition_to(next) {
            return Err(ChangeSetError::InvalidTransition {
                id: self.id.clone(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Counted as active in the agent status.
    pub fn is_active(&self) -> bool {
        self.status == TaskStatus::InProgress
    }
}

fn dedup_labels(labels: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(labels.len());
    for label in labels {
        if !seen.contains(&label) {
            seen.push(label);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_gets_id_and_matching_timestamps() {
        let task = Task::new(NewTask::new(TaskKind::Bug, "  Fix login  "));
        assert!(!task.id.is_empty());
        assert_eq!(task.title, "Fix login");
        assert_eq!(task.created_at, task.updated_at);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, TaskPriority::Medium);
    }

    #[test]
    fn labels_keep_order_and_drop_duplicates() {
        let task = Task::new(
            NewTask::new(TaskKind::Feature, "x")
                .with_label("ui")
                .with_label("auth")
                .with_label("ui"),
        );
        assert_eq!(task.labels, vec!["ui", "auth"]);
    }

    #[test]
    fn blank_title_fails_validation() {
        assert!(NewTask::new(TaskKind::Bug, "   ").validate().is_err());
        assert!(NewTask::new(TaskKind::Bug, "ok").validate().is_ok());
    }

    #[test]
    fn task_transitions_forward_only() {
        let mut task = Task::new(NewTask::new(TaskKind::Bug, "x"));
        task.transition(TaskStatus::InProgress).unwrap();
        assert!(task.is_active());
        task.transition(TaskStatus::Completed).unwrap();
        assert!(task.transition(TaskStatus::Pending).is_err());
    }

    #[test]
    fn kind_and_priority_parse_case_insensitively() {
        assert_eq!("BUG".parse::<TaskKind>().unwrap(), TaskKind::Bug);
        assert_eq!("High".parse::<TaskPriority>().unwrap(), TaskPriority::High);
        assert!("urgent".parse::<TaskPriority>().is_err());
    }

    #[test]
    fn new_task_deserializes_with_defaults() {
        let new: NewTask = serde_json::from_str(r#"{"kind":"feature","title":"Add"}"#).unwrap();
        assert_eq!(new.status, TaskStatus::Pending);
        assert_eq!(new.priority, TaskPriority::Medium);
        assert!(new.labels.is_empty());
    }
}
