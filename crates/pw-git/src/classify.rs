// classify.rs — Success / success-no-op / failure classification of git output.
//
// Git reports several idempotent outcomes ("nothing to commit", an `add`
// whose pathspec matched nothing) through a non-zero exit or an ambiguous
// message. Those are classified by substring match on the captured output so
// retries of an already-applied step are not reported as errors. Markers are
// per subcommand: `status` on a tracking branch says "up to date" whether or
// not the tree is dirty, so only the clean-tree phrases count there.

use serde::{Deserialize, Serialize};

use crate::command::GitSubcommand;

const CLEAN_TREE_MARKERS: &[&str] = &["nothing to commit", "working tree clean"];
const EMPTY_PATHSPEC_MARKERS: &[&str] = &["fatal: pathspec", "did not match any files"];

fn no_op_markers(subcommand: GitSubcommand) -> &'static [&'static str] {
    match subcommand {
        GitSubcommand::Status | GitSubcommand::Commit => CLEAN_TREE_MARKERS,
        GitSubcommand::Add => EMPTY_PATHSPEC_MARKERS,
        GitSubcommand::Apply | GitSubcommand::LsFiles | GitSubcommand::RevParse => &[],
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Success,
    NoOp,
    Failed,
}

impl Classification {
    /// Success or no-op.
    pub fn is_ok(&self) -> bool {
        !matches!(self, Classification::Failed)
    }
}

pub fn classify(
    subcommand: GitSubcommand,
    exit_ok: bool,
    stdout: &str,
    stderr: &str,
) -> Classification {
    let combined = format!("{stdout}\n{stderr}").to_lowercase();

    if no_op_markers(subcommand).iter().any(|m| combined.contains(m)) {
        return Classification::NoOp;
    }
    if exit_ok {
        Classification::Success
    } else {
        Classification::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_to_commit_is_noop_even_with_nonzero_exit() {
        let c = classify(
            GitSubcommand::Commit,
            false,
            "On branch main\nnothing to commit, working tree clean\n",
            "",
        );
        assert_eq!(c, Classification::NoOp);
        assert!(c.is_ok());
    }

    #[test]
    fn add_with_unmatched_pathspec_is_noop() {
        let c = classify(
            GitSubcommand::Add,
            false,
            "",
            "fatal: pathspec 'ghost.txt' did not match any files",
        );
        assert_eq!(c, Classification::NoOp);
    }

    #[test]
    fn unmatched_pathspec_is_a_failure_for_other_commands() {
        let c = classify(
            GitSubcommand::LsFiles,
            false,
            "",
            "error: pathspec 'ghost.txt' did not match any file(s) known to git",
        );
        assert_eq!(c, Classification::Failed);
    }

    #[test]
    fn dirty_status_on_tracking_branch_is_success() {
        let dirty = "On branch main\nYour branch is up to date with 'origin/main'.\n\n\
                     Changes not staged for commit:\n\tmodified:   src/x.js\n";
        assert_eq!(classify(GitSubcommand::Status, true, dirty, ""), Classification::Success);

        let clean = "On branch main\nYour branch is up to date with 'origin/main'.\n\n\
                     nothing to commit, working tree clean\n";
        assert_eq!(classify(GitSubcommand::Status, true, clean, ""), Classification::NoOp);
    }

    #[test]
    fn clean_tree_phrases_do_not_leak_into_other_commands() {
        assert_eq!(
            classify(GitSubcommand::LsFiles, true, "docs/nothing to commit.md\n", ""),
            Classification::Success
        );
        assert_eq!(
            classify(GitSubcommand::Apply, false, "", "error: patch failed: up to date"),
            Classification::Failed
        );
    }

    #[test]
    fn exit_status_decides_otherwise() {
        assert_eq!(classify(GitSubcommand::Apply, true, "", ""), Classification::Success);
        assert_eq!(
            classify(GitSubcommand::Apply, false, "", "error: patch failed"),
            Classification::Failed
        );
    }
}
