// fs_ops.rs — The closed set of filesystem operations exposed to remote callers.
//
// Every path goes through WorkspaceGuard first. Writes use the mutable
// resolution, which also refuses the root and `.git`, and create missing
// parent directories. Git staging of written files is the caller's concern.

use std::fs;
use std::io::ErrorKind;

use serde::{Deserialize, Serialize};

use crate::error::WorkspaceError;
use crate::guard::WorkspaceGuard;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum FsOperation {
    ReadFile {
        path: String,
    },
    WriteFile {
        path: String,
        #[serde(default)]
        content: String,
    },
    ListFiles {
        #[serde(default)]
        path: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FsEntry {
    pub name: String,
    pub kind: EntryKind,
    /// Workspace-relative path.
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum FsOutcome {
    Content { path: String, content: String },
    Written { path: String, bytes: usize },
    Listing { path: String, entries: Vec<FsEntry> },
}

impl FsOperation {
    pub fn path(&self) -> &str {
        match self {
            FsOperation::ReadFile { path } | FsOperation::WriteFile { path, .. } => path,
            FsOperation::ListFiles { path } => path.as_deref().unwrap_or("."),
        }
    }

    pub fn execute(&self, guard: &WorkspaceGuard) -> Result<FsOutcome, WorkspaceError> {
        let requested = self.path();
        let target = match self {
            FsOperation::WriteFile { .. } => guard.resolve_mutable(requested)?,
            _ => guard.resolve(requested)?,
        };
        let rel = guard.relative(&target)?;

        match self {
            FsOperation::ReadFile { .. } => {
                let content = fs::read_to_string(&target).map_err(|source| {
                    not_found_or_io(source, requested, &target)
                })?;
                Ok(FsOutcome::Content { path: rel, content })
            }
            FsOperation::WriteFile { content, .. } => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).map_err(|source| WorkspaceError::IoError {
                        path: parent.to_path_buf(),
                        source,
                    })?;
                }
                fs::write(&target, content).map_err(|source| WorkspaceError::IoError {
                    path: target.clone(),
                    source,
                })?;
                tracing::debug!(path = %rel, bytes = content.len(), "file written");
                Ok(FsOutcome::Written {
                    path: rel,
                    bytes: content.len(),
                })
            }
            FsOperation::ListFiles { .. } => {
                let read = fs::read_dir(&target)
                    .map_err(|source| not_found_or_io(source, requested, &target))?;
                let mut entries = Vec::new();
                for entry in read {
                    let entry = entry.map_err(|source| WorkspaceError::IoError {
                        path: target.clone(),
                        source,
                    })?;
                    let file_type = entry.file_type().map_err(|source| WorkspaceError::IoError {
                        path: entry.path(),
                        source,
                    })?;
                    let name = entry.file_name().to_string_lossy().to_string();
                    let path = if rel.is_empty() {
                        name.clone()
                    } else {
                        format!("{rel}/{name}")
                    };
                    entries.push(FsEntry {
                        name,
                        kind: if file_type.is_dir() {
                            EntryKind::Directory
                        } else {
                            EntryKind::File
                        },
                        path,
                    });
                }
                entries.sort_by(|a, b| a.name.cmp(&b.name));
                Ok(FsOutcome::Listing { path: rel, entries })
            }
        }
    }
}

fn not_found_or_io(source: std::io::Error, requested: &str, target: &std::path::Path) -> WorkspaceError {
    if source.kind() == ErrorKind::NotFound {
        WorkspaceError::FileNotFound {
            path: requested.to_string(),
        }
    } else {
        WorkspaceError::IoError {
            path: target.to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_then_read_creates_parents() {
        let dir = tempdir().unwrap();
        let guard = WorkspaceGuard::new(dir.path()).unwrap();

        let written = FsOperation::WriteFile {
            path: "docs/notes/a.md".into(),
            content: "hello".into(),
        }
        .execute(&guard)
        .unwrap();
        assert_eq!(
            written,
            FsOutcome::Written {
                path: "docs/notes/a.md".into(),
                bytes: 5
            }
        );

        let read = FsOperation::ReadFile {
            path: "docs/notes/a.md".into(),
        }
        .execute(&guard)
        .unwrap();
        assert!(matches!(read, FsOutcome::Content { content, .. } if content == "hello"));
    }

    #[test]
    fn listing_reports_kinds_and_relative_paths() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/main.rs"), "").unwrap();
        fs::write(dir.path().join("README.md"), "").unwrap();
        let guard = WorkspaceGuard::new(dir.path()).unwrap();

        let FsOutcome::Listing { entries, .. } =
            FsOperation::ListFiles { path: None }.execute(&guard).unwrap()
        else {
            panic!("expected listing");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "README.md");
        assert_eq!(entries[0].kind, EntryKind::File);
        assert_eq!(entries[1].kind, EntryKind::Directory);

        let FsOutcome::Listing { entries, .. } = FsOperation::ListFiles {
            path: Some("src".into()),
        }
        .execute(&guard)
        .unwrap() else {
            panic!("expected listing");
        };
        assert_eq!(entries[0].path, "src/main.rs");
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let guard = WorkspaceGuard::new(dir.path()).unwrap();
        let err = FsOperation::ReadFile {
            path: "nope.txt".into(),
        }
        .execute(&guard)
        .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn traversal_is_rejected_before_touching_disk() {
        let dir = tempdir().unwrap();
        let guard = WorkspaceGuard::new(dir.path()).unwrap();
        let err = FsOperation::WriteFile {
            path: "../escape.txt".into(),
            content: "x".into(),
        }
        .execute(&guard)
        .unwrap_err();
        assert_eq!(err.kind(), "path_traversal");
        assert!(!dir.path().parent().unwrap().join("escape.txt").exists());
    }

    #[test]
    fn writes_into_git_dir_are_refused_but_reads_are_not() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".git/hooks")).unwrap();
        fs::write(dir.path().join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();
        let guard = WorkspaceGuard::new(dir.path()).unwrap();

        let err = FsOperation::WriteFile {
            path: ".git/hooks/pre-commit".into(),
            content: "#!/bin/sh\nexit 0\n".into(),
        }
        .execute(&guard)
        .unwrap_err();
        assert_eq!(err.kind(), "protected_path");
        assert!(!dir.path().join(".git/hooks/pre-commit").exists());

        let read = FsOperation::ReadFile {
            path: ".git/HEAD".into(),
        }
        .execute(&guard)
        .unwrap();
        assert!(matches!(read, FsOutcome::Content { .. }));
    }

    #[test]
    fn operations_deserialize_from_tagged_json() {
        let op: FsOperation =
            serde_json::from_str(r#"{"operation":"list_files"}"#).unwrap();
        assert_eq!(op, FsOperation::ListFiles { path: None });
        assert!(serde_json::from_str::<FsOperation>(r#"{"operation":"delete_all"}"#).is_err());
    }
}
