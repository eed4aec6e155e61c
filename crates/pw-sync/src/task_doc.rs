// task_doc.rs — Local task document parser.
//
// Each non-blank, non-heading line of the form
//
//     [kind] [priority] title
//
// becomes a pending Task. Every parse synthesizes fresh ids, so parsing the
// same document twice yields two distinct sets of tasks. Lines whose kind or
// priority is not recognized are skipped.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use pw_changeset::{NewTask, Task, TaskKind, TaskPriority};

use crate::error::SyncError;

static TASK_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(\w+)\]\s*\[(\w+)\]\s*(.+)$").expect("task line regex is valid")
});

/// Parse one line. Headings, blank lines and unrecognized lines yield `None`.
pub fn parse_task_line(line: &str) -> Option<Task> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let caps = TASK_LINE.captures(line)?;
    let (kind_raw, priority_raw, title) = (&caps[1], &caps[2], caps[3].trim());

    let (Ok(kind), Ok(priority)) = (
        kind_raw.parse::<TaskKind>(),
        priority_raw.parse::<TaskPriority>(),
    ) else {
        tracing::debug!(line, "task line has unknown kind or priority, skipped");
        return None;
    };

    let new = NewTask::new(kind, title)
        .with_priority(priority)
        .with_label(kind.as_str())
        .with_label(priority.as_str());
    new.validate().ok()?;
    Some(Task::new(new))
}

/// Parse a whole document.
pub fn parse_task_document(text: &str) -> Vec<Task> {
    let tasks: Vec<Task> = text.lines().filter_map(parse_task_line).collect();
    tracing::debug!(added = tasks.len(), "parsed local task document");
    tasks
}

/// Read and parse the document at `path`. A missing file is an empty list.
pub fn read_task_document(path: &Path) -> Result<Vec<Task>, SyncError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(parse_task_document(&text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(source) => Err(SyncError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
