// bridge.rs — GitBridge: bounded, allow-listed git subprocesses.
//
// Every invocation is `git <subcommand> <args...>` built as an argument
// vector, run in the workspace directory with a deadline. stdout/stderr are
// drained on helper threads so a chatty child cannot fill its pipe and stall
// while we poll for exit. On timeout the child is killed and a distinct
// `Timeout` error is returned.
//
// Mutating sequences (patch application, staging, remote add/commit) hold
// `index_lock` for their whole duration: git's index is not safe under
// concurrent writers in one work tree.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::classify::{classify, Classification};
use crate::command::{sanitize_arg, GitSubcommand};
use crate::config::{AutoStagePolicy, GitConfig};
use crate::error::GitError;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured result of one git invocation.
#[derive(Debug, Clone, Serialize)]
pub struct GitOutput {
    pub subcommand: GitSubcommand,
    pub args: Vec<String>,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub classification: Classification,
    pub duration_ms: u64,
}

impl GitOutput {
    pub fn is_ok(&self) -> bool {
        self.classification.is_ok()
    }

    /// stdout and stderr joined, trimmed.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.trim().to_string();
        let err = self.stderr.trim();
        if !err.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(err);
        }
        out
    }
}

/// What auto-staging did for a patch target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum StageOutcome {
    AlreadyTracked,
    Staged,
    Skipped(String),
}

/// Result of a successful staged patch application.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub target: String,
    pub staging: StageOutcome,
    pub check: GitOutput,
    pub apply: GitOutput,
}

pub struct GitBridge {
    work_dir: PathBuf,
    timeout: Duration,
    auto_stage: AutoStagePolicy,
    index_lock: Mutex<()>,
}

impl GitBridge {
    pub fn new(work_dir: impl Into<PathBuf>, config: &GitConfig) -> Self {
        Self {
            work_dir: work_dir.into(),
            timeout: Duration::from_millis(config.timeout_ms),
            auto_stage: config.auto_stage,
            index_lock: Mutex::new(()),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn auto_stage(&self) -> AutoStagePolicy {
        self.auto_stage
    }

    /// Run an allow-listed subcommand with sanitized arguments.
    ///
    /// Returns the captured output whatever its classification; only spawn
    /// failures and timeouts are errors.
    pub fn run(&self, subcommand: GitSubcommand, args: &[String]) -> Result<GitOutput, GitError> {
        let args = args.iter().map(|a| sanitize_arg(a)).collect();
        self.exec(subcommand, args)
    }

    /// Run a command named by a remote caller (`add`, `commit`, `status`).
    ///
    /// A genuine failure becomes `CommandFailed`; no-op outcomes are returned
    /// as successful output.
    pub fn run_remote(&self, command: &str, args: &[String]) -> Result<GitOutput, GitError> {
        let subcommand = GitSubcommand::parse_remote(command)?;
        let _index = subcommand.is_mutating().then(|| self.lock_index());
        let output = self.run(subcommand, args)?;
        if output.classification == Classification::Failed {
            return Err(GitError::CommandFailed {
                command: subcommand.to_string(),
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }

    /// Whether the bridge directory is inside a git work tree.
    pub fn is_work_tree(&self) -> Result<bool, GitError> {
        let output = self.exec(
            GitSubcommand::RevParse,
            vec!["--is-inside-work-tree".to_string()],
        )?;
        Ok(output.exit_code == Some(0) && output.stdout.trim() == "true")
    }

    /// Whether `rel_path` is known to the index.
    pub fn is_tracked(&self, rel_path: &str) -> Result<bool, GitError> {
        let output = self.exec(
            GitSubcommand::LsFiles,
            vec![
                "--error-unmatch".to_string(),
                "--".to_string(),
                rel_path.to_string(),
            ],
        )?;
        Ok(output.exit_code == Some(0))
    }

    /// Stage a workspace file, creating it (and its parents) if absent.
    pub fn stage(&self, rel_path: &str) -> Result<StageOutcome, GitError> {
        let _index = self.lock_index();
        self.ensure_tracked(rel_path)
    }

    /// Staged patch application.
    ///
    /// `rel_target` must already be confined to the workspace by the caller.
    pub fn apply_patch(&self, rel_target: &str, patch: &str) -> Result<ApplyReport, GitError> {
        let _index = self.lock_index();

        if !self.is_work_tree()? {
            return Err(GitError::NotAGitRepo {
                path: self.work_dir.clone(),
            });
        }

        let staging = self.auto_stage_target(rel_target, patch)?;

        let scratch = write_scratch(patch)?;
        let scratch_path = scratch.path().to_string_lossy().to_string();

        let check = self.exec(
            GitSubcommand::Apply,
            vec!["--check".to_string(), scratch_path.clone()],
        )?;
        if !check.is_ok() {
            tracing::info!(path = %rel_target, "patch rejected by dry run");
            return Err(GitError::PatchRejected {
                stderr: check.combined(),
            });
        }

        let apply = self.exec(GitSubcommand::Apply, vec![scratch_path])?;
        if !apply.is_ok() {
            tracing::error!(path = %rel_target, stderr = %apply.stderr.trim(), "apply failed after clean dry run");
            return Err(GitError::ApplyFailed {
                stdout: apply.stdout,
                stderr: apply.stderr,
            });
        }

        Ok(ApplyReport {
            target: rel_target.to_string(),
            staging,
            check,
            apply,
        })
    }

    fn auto_stage_target(&self, rel_target: &str, patch: &str) -> Result<StageOutcome, GitError> {
        if self.auto_stage == AutoStagePolicy::Off {
            return Ok(StageOutcome::Skipped("auto-stage disabled".to_string()));
        }
        // A creation patch needs the target to be absent.
        if creates_file(patch) && !self.work_dir.join(rel_target).exists() {
            return Ok(StageOutcome::Skipped("patch creates the file".to_string()));
        }
        match self.ensure_tracked(rel_target) {
            Ok(outcome) => Ok(outcome),
            Err(e) if self.auto_stage == AutoStagePolicy::Proceed => {
                tracing::warn!(path = %rel_target, error = %e, "auto-stage failed, proceeding");
                Ok(StageOutcome::Skipped(e.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    fn ensure_tracked(&self, rel_path: &str) -> Result<StageOutcome, GitError> {
        if self.is_tracked(rel_path)? {
            return Ok(StageOutcome::AlreadyTracked);
        }

        let abs = self.work_dir.join(rel_path);
        if let Some(parent) = abs.parent() {
            fs::create_dir_all(parent).map_err(|source| GitError::IoError {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        if !abs.exists() {
            File::create(&abs).map_err(|source| GitError::IoError {
                path: abs.clone(),
                source,
            })?;
        }

        let output = self.exec(
            GitSubcommand::Add,
            vec!["--".to_string(), rel_path.to_string()],
        )?;
        if output.classification == Classification::Success {
            tracing::info!(path = %rel_path, "auto-staged untracked file");
            Ok(StageOutcome::Staged)
        } else {
            Err(GitError::UntrackedFile {
                path: rel_path.to_string(),
                detail: output.combined(),
            })
        }
    }

    fn lock_index(&self) -> MutexGuard<'_, ()> {
        // The mutex guards no data, so a poisoned lock is still usable.
        self.index_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn exec(&self, subcommand: GitSubcommand, args: Vec<String>) -> Result<GitOutput, GitError> {
        let started = Instant::now();
        let mut child = Command::new("git")
            .arg(subcommand.as_str())
            .args(&args)
            .current_dir(&self.work_dir)
            .env("LC_ALL", "C")
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| GitError::IoError {
                path: self.work_dir.clone(),
                source,
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if started.elapsed() >= self.timeout => {
                    let _ = child.kill();
                    let _ = child.wait();
                    let timeout_ms = self.timeout.as_millis() as u64;
                    tracing::warn!(command = %subcommand, timeout_ms, "git invocation timed out");
                    return Err(GitError::Timeout {
                        command: subcommand.to_string(),
                        timeout_ms,
                    });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(source) => {
                    return Err(GitError::IoError {
                        path: self.work_dir.clone(),
                        source,
                    })
                }
            }
        };

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();
        let classification = classify(subcommand, status.success(), &stdout, &stderr);
        let duration_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            command = %subcommand,
            classification = ?classification,
            exit_code = status.code(),
            duration_ms,
            "git invocation"
        );

        Ok(GitOutput {
            subcommand,
            args,
            exit_code: status.code(),
            stdout,
            stderr,
            classification,
            duration_ms,
        })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn creates_file(patch: &str) -> bool {
    patch.lines().any(|l| l.starts_with("--- /dev/null"))
}

fn write_scratch(patch: &str) -> Result<NamedTempFile, GitError> {
    let mut scratch = tempfile::Builder::new()
        .prefix("pw-patch-")
        .suffix(".diff")
        .tempfile()
        .map_err(|source| GitError::IoError {
            path: std::env::temp_dir(),
            source,
        })?;
    let path = scratch.path().to_path_buf();
    let io_err = |source| GitError::IoError {
        path: path.clone(),
        source,
    };
    scratch.write_all(patch.as_bytes()).map_err(io_err)?;
    // git apply treats a final line without a newline as a corrupt patch.
    if !patch.ends_with('\n') {
        scratch.write_all(b"\n").map_err(io_err)?;
    }
    scratch.flush().map_err(io_err)?;
    Ok(scratch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn git(dir: &Path, args: &[&str]) {
        Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap();
    }

    fn init_git_repo(dir: &Path) {
        git(dir, &["init"]);
        git(dir, &["config", "user.name", "Test User"]);
        git(dir, &["config", "user.email", "test@example.com"]);
        fs::create_dir_all(dir.join("src")).unwrap();
        fs::write(dir.join("src/x.js"), "line1\nline2\n").unwrap();
        git(dir, &["add", "."]);
        git(dir, &["commit", "-m", "Initial commit"]);
    }

    fn bridge(dir: &Path) -> GitBridge {
        GitBridge::new(dir, &GitConfig::default())
    }

    const ADD_LINE: &str = "--- a/src/x.js\n+++ b/src/x.js\n@@ -1,2 +1,3 @@\n line1\n line2\n+line3\n";

    #[test]
    fn clean_patch_applies_to_tracked_file() {
        let dir = tempdir().unwrap();
        init_git_repo(dir.path());
        let bridge = bridge(dir.path());

        let report = bridge.apply_patch("src/x.js", ADD_LINE).unwrap();
        assert_eq!(report.staging, StageOutcome::AlreadyTracked);
        assert!(report.check.is_ok());
        assert_eq!(
            fs::read_to_string(dir.path().join("src/x.js")).unwrap(),
            "line1\nline2\nline3\n"
        );
    }

    #[test]
    fn rejected_dry_run_leaves_file_untouched() {
        let dir = tempdir().unwrap();
        init_git_repo(dir.path());
        let bridge = bridge(dir.path());

        let bad = "--- a/src/x.js\n+++ b/src/x.js\n@@ -1,2 +1,3 @@\n nope\n line2\n+line3\n";
        let err = bridge.apply_patch("src/x.js", bad).unwrap_err();
        assert_eq!(err.kind(), "patch_rejected");
        assert_eq!(
            fs::read_to_string(dir.path().join("src/x.js")).unwrap(),
            "line1\nline2\n"
        );
    }

    #[test]
    fn non_repo_is_reported() {
        let dir = tempdir().unwrap();
        let bridge = bridge(dir.path());
        assert!(!bridge.is_work_tree().unwrap());
        let err = bridge.apply_patch("src/x.js", ADD_LINE).unwrap_err();
        assert_eq!(err.kind(), "not_a_git_repo");
    }

    #[test]
    fn untracked_target_is_auto_staged_before_apply() {
        let dir = tempdir().unwrap();
        init_git_repo(dir.path());
        fs::write(dir.path().join("notes.txt"), "a\n").unwrap();
        let bridge = bridge(dir.path());
        assert!(!bridge.is_tracked("notes.txt").unwrap());

        let patch = "--- a/notes.txt\n+++ b/notes.txt\n@@ -1 +1,2 @@\n a\n+b\n";
        let report = bridge.apply_patch("notes.txt", patch).unwrap();
        assert_eq!(report.staging, StageOutcome::Staged);
        assert!(bridge.is_tracked("notes.txt").unwrap());
        assert_eq!(fs::read_to_string(dir.path().join("notes.txt")).unwrap(), "a\nb\n");
    }

    #[test]
    fn creation_patch_skips_placeholder() {
        let dir = tempdir().unwrap();
        init_git_repo(dir.path());
        let bridge = bridge(dir.path());

        let patch = "--- /dev/null\n+++ b/docs/new.txt\n@@ -0,0 +1 @@\n+hello\n";
        let report = bridge.apply_patch("docs/new.txt", patch).unwrap();
        assert!(matches!(report.staging, StageOutcome::Skipped(_)));
        assert_eq!(
            fs::read_to_string(dir.path().join("docs/new.txt")).unwrap(),
            "hello\n"
        );
    }

    #[test]
    fn stage_creates_missing_file() {
        let dir = tempdir().unwrap();
        init_git_repo(dir.path());
        let bridge = bridge(dir.path());

        assert_eq!(bridge.stage("a/b/c.txt").unwrap(), StageOutcome::Staged);
        assert!(dir.path().join("a/b/c.txt").exists());
        assert_eq!(bridge.stage("a/b/c.txt").unwrap(), StageOutcome::AlreadyTracked);
    }

    #[test]
    fn remote_commands_classify_no_ops() {
        let dir = tempdir().unwrap();
        init_git_repo(dir.path());
        let bridge = bridge(dir.path());

        let status = bridge.run_remote("status", &[]).unwrap();
        assert_eq!(status.classification, Classification::NoOp);

        let commit = bridge
            .run_remote("commit", &["-m".to_string(), "empty".to_string()])
            .unwrap();
        assert_eq!(commit.classification, Classification::NoOp);

        let add = bridge.run_remote("add", &["ghost.txt".to_string()]).unwrap();
        assert_eq!(add.classification, Classification::NoOp);

        assert_eq!(
            bridge.run_remote("push", &[]).unwrap_err().kind(),
            "unsupported_command"
        );
    }

    #[test]
    fn dirty_status_on_tracking_branch_is_not_a_no_op() {
        let dir = tempdir().unwrap();
        let remote = tempdir().unwrap();
        init_git_repo(dir.path());
        git(remote.path(), &["init", "--bare"]);
        git(dir.path(), &["remote", "add", "origin", &remote.path().to_string_lossy()]);
        git(dir.path(), &["push", "-u", "origin", "HEAD"]);
        let bridge = bridge(dir.path());

        let clean = bridge.run_remote("status", &[]).unwrap();
        assert!(clean.stdout.contains("up to date"), "{}", clean.stdout);
        assert_eq!(clean.classification, Classification::NoOp);

        fs::write(dir.path().join("src/x.js"), "line1\nchanged\n").unwrap();
        let dirty = bridge.run_remote("status", &[]).unwrap();
        assert!(dirty.stdout.contains("src/x.js"), "{}", dirty.stdout);
        assert_eq!(dirty.classification, Classification::Success);
    }

    #[test]
    fn remote_args_are_sanitized() {
        let dir = tempdir().unwrap();
        init_git_repo(dir.path());
        fs::write(dir.path().join("ab.txt"), "x").unwrap();
        let bridge = bridge(dir.path());

        let out = bridge.run_remote("add", &["a$(b).txt".to_string()]).unwrap();
        assert_eq!(out.args, vec!["ab.txt"]);
        assert!(bridge.is_tracked("ab.txt").unwrap());
    }
}
