// change_log.rs — Append-only JSONL record of settled changes.
//
// Every time a Change leaves `pending` (applied, verified, failed) its full
// snapshot is appended as one JSON line. The log is never rewritten; the
// latest line for an id is its current state as of the last restart.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use pw_changeset::Change;

use crate::error::WorkspaceError;

pub struct ChangeLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl ChangeLog {
    /// Open (or create) the log at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WorkspaceError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| WorkspaceError::IoError {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| WorkspaceError::IoError {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one snapshot. Each call writes a complete line.
    pub fn append(&self, change: &Change) -> Result<(), WorkspaceError> {
        let mut line = serde_json::to_string(change)?;
        line.push('\n');
        let mut file = self
            .file
            .lock()
            .map_err(|e| WorkspaceError::LockPoisoned(e.to_string()))?;
        file.write_all(line.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|source| WorkspaceError::IoError {
                path: self.path.clone(),
                source,
            })
    }

    /// Read every snapshot in append order. Blank and malformed lines are skipped.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<Change>, WorkspaceError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(path).map_err(|source| WorkspaceError::IoError {
            path: path.to_path_buf(),
            source,
        })?;

        let mut changes = Vec::new();
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| WorkspaceError::IoError {
                path: path.to_path_buf(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Change>(&line) {
                Ok(change) => changes.push(change),
                Err(e) => {
                    tracing::warn!(path = %path.display(), line = lineno + 1, error = %e, "skipping malformed change log entry");
                }
            }
        }
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pw_changeset::{ChangeStatus, NewChange};
    use tempfile::tempdir;

    #[test]
    fn appends_survive_reopen_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("changes.jsonl");

        let mut change = Change::new(NewChange::diff_update("a.txt", "--- a/a.txt\n+++ b/a.txt\n"));
        change.transition(ChangeStatus::Applied).unwrap();
        {
            let log = ChangeLog::open(&path).unwrap();
            log.append(&change).unwrap();
        }
        change.transition(ChangeStatus::Verified).unwrap();
        ChangeLog::open(&path).unwrap().append(&change).unwrap();

        let read = ChangeLog::read_all(&path).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].status, ChangeStatus::Applied);
        assert_eq!(read[1].status, ChangeStatus::Verified);
        assert_eq!(read[0].id, read[1].id);
    }

    #[test]
    fn missing_log_reads_empty() {
        let dir = tempdir().unwrap();
        assert!(ChangeLog::read_all(dir.path().join("none.jsonl")).unwrap().is_empty());
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("changes.jsonl");
        let mut change = Change::new(NewChange::diff_update("a.txt", "d"));
        change.transition(ChangeStatus::Failed).unwrap();
        let log = ChangeLog::open(&path).unwrap();
        log.append(&change).unwrap();
        fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"{not json\n\n")
            .unwrap();

        assert_eq!(ChangeLog::read_all(&path).unwrap().len(), 1);
    }
}
