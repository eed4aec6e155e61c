// guard.rs — WorkspaceGuard: confines every path argument to the workspace root.
//
// All filesystem effects (writes, deletes, renames, patch targets, listings)
// go through `resolve`. Resolution is:
//   1. reject empty input and NUL bytes
//   2. join relative input onto the root (absolute input is taken as-is)
//   3. lexically normalize `.` and `..`
//   4. canonicalize the longest existing ancestor so symlinks are followed
//   5. require the result to sit under the canonical root
//
// A dangling symlink anywhere on the path is rejected outright, since
// writing through it would land wherever it points.
//
// `resolve_mutable` is the entry point for writes, deletes and renames. It
// additionally refuses the root itself and anything under `.git`.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::error::WorkspaceError;

const GIT_DIR: &str = ".git";

#[derive(Debug, Clone)]
pub struct WorkspaceGuard {
    root: PathBuf,
}

impl WorkspaceGuard {
    /// Create a guard for an existing directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, WorkspaceError> {
        let raw = root.as_ref();
        let root = fs::canonicalize(raw).map_err(|source| WorkspaceError::IoError {
            path: raw.to_path_buf(),
            source,
        })?;
        if !root.is_dir() {
            return Err(WorkspaceError::InvalidRoot {
                path: root,
                reason: "not a directory".to_string(),
            });
        }
        Ok(Self { root })
    }

    /// The canonical workspace root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a caller-supplied path to an absolute path inside the root.
    pub fn resolve(&self, requested: impl AsRef<Path>) -> Result<PathBuf, WorkspaceError> {
        let requested = requested.as_ref();
        let shown = requested.to_string_lossy().to_string();
        if shown.trim().is_empty() || shown.contains('\0') {
            return Err(WorkspaceError::PathTraversal { path: shown });
        }

        let joined = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            self.root.join(requested)
        };
        let normalized = normalize(&joined).ok_or_else(|| WorkspaceError::PathTraversal {
            path: shown.clone(),
        })?;
        let resolved = canonicalize_existing_prefix(&normalized, &shown)?;

        if !resolved.starts_with(&self.root) {
            tracing::warn!(path = %shown, resolved = %resolved.display(), "rejected path outside workspace");
            return Err(WorkspaceError::PathTraversal { path: shown });
        }
        Ok(resolved)
    }

    /// Resolve a path that is about to be written, deleted or renamed.
    ///
    /// The root itself and the git directory are never valid targets. The
    /// check runs on the resolved path, so a symlink to `.git` is caught too.
    pub fn resolve_mutable(&self, requested: impl AsRef<Path>) -> Result<PathBuf, WorkspaceError> {
        let requested = requested.as_ref();
        let resolved = self.resolve(requested)?;
        let protected = resolved
            .strip_prefix(&self.root)
            .map(|rel| {
                rel.as_os_str().is_empty()
                    || rel.components().any(|c| c.as_os_str() == GIT_DIR)
            })
            .unwrap_or(true);
        if protected {
            let shown = requested.to_string_lossy().to_string();
            tracing::warn!(path = %shown, "rejected mutation of a protected path");
            return Err(WorkspaceError::ProtectedPath { path: shown });
        }
        Ok(resolved)
    }

    /// Workspace-relative form of an absolute path, with `/` separators.
    pub fn relative(&self, absolute: &Path) -> Result<String, WorkspaceError> {
        let rel = absolute
            .strip_prefix(&self.root)
            .map_err(|_| WorkspaceError::PathTraversal {
                path: absolute.display().to_string(),
            })?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        Ok(parts.join("/"))
    }
}

/// Lexical normalization. Returns `None` if `..` climbs above the filesystem root.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() || out.as_os_str().is_empty() {
                    return None;
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    Some(out)
}

/// Canonicalize the deepest ancestor that exists and re-attach the rest.
fn canonicalize_existing_prefix(path: &Path, shown: &str) -> Result<PathBuf, WorkspaceError> {
    let mut existing = path.to_path_buf();
    let mut tail: Vec<std::ffi::OsString> = Vec::new();

    loop {
        match fs::canonicalize(&existing) {
            Ok(mut canonical) => {
                for part in tail.iter().rev() {
                    canonical.push(part);
                }
                return Ok(canonical);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if fs::symlink_metadata(&existing).is_ok() {
                    // Entry exists but cannot be followed: dangling symlink.
                    return Err(WorkspaceError::PathTraversal {
                        path: shown.to_string(),
                    });
                }
                let name = existing.file_name().map(|n| n.to_os_string());
                match (name, existing.parent()) {
                    (Some(name), Some(parent)) => {
                        tail.push(name);
                        existing = parent.to_path_buf();
                    }
                    _ => {
                        return Err(WorkspaceError::IoError {
                            path: path.to_path_buf(),
                            source: e,
                        })
                    }
                }
            }
            Err(source) => {
                return Err(WorkspaceError::IoError {
                    path: existing,
                    source,
                })
            }
        }
    }
}
