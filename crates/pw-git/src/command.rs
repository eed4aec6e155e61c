// command.rs — The closed set of git subcommands patchwire will run.
//
// Remote callers may only name `add`, `commit` or `status`. The remaining
// variants are used internally by the bridge (patch application and
// tracking checks) and cannot be reached from a request string.

use std::fmt;
use std::str::FromStr;

use crate::error::GitError;

/// Characters stripped from every argument before it reaches the subprocess.
const SHELL_METACHARACTERS: &[char] = &[';', '&', '|', '`', '$', '(', ')', '{', '}', '[', ']'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GitSubcommand {
    Apply,
    Add,
    Commit,
    Status,
    LsFiles,
    RevParse,
}

impl GitSubcommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            GitSubcommand::Apply => "apply",
            GitSubcommand::Add => "add",
            GitSubcommand::Commit => "commit",
            GitSubcommand::Status => "status",
            GitSubcommand::LsFiles => "ls-files",
            GitSubcommand::RevParse => "rev-parse",
        }
    }

    /// Whether the subcommand mutates the index or work tree.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            GitSubcommand::Apply | GitSubcommand::Add | GitSubcommand::Commit
        )
    }

    /// Parse a subcommand named by a remote caller.
    pub fn parse_remote(name: &str) -> Result<Self, GitError> {
        match name.parse::<GitSubcommand>()? {
            cmd @ (GitSubcommand::Add | GitSubcommand::Commit | GitSubcommand::Status) => Ok(cmd),
            _ => Err(GitError::UnsupportedCommand(name.to_string())),
        }
    }
}

impl FromStr for GitSubcommand {
    type Err = GitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "apply" => Ok(GitSubcommand::Apply),
            "add" => Ok(GitSubcommand::Add),
            "commit" => Ok(GitSubcommand::Commit),
            "status" => Ok(GitSubcommand::Status),
            "ls-files" => Ok(GitSubcommand::LsFiles),
            "rev-parse" => Ok(GitSubcommand::RevParse),
            other => Err(GitError::UnsupportedCommand(other.to_string())),
        }
    }
}

impl fmt::Display for GitSubcommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for GitSubcommand {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Strip shell metacharacters from one argument.
///
/// Arguments are always passed as a discrete vector, so this is a second
/// layer rather than the primary protection.
pub fn sanitize_arg(arg: &str) -> String {
    arg.chars()
        .filter(|c| !SHELL_METACHARACTERS.contains(c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_allow_list_is_add_commit_status() {
        assert_eq!(GitSubcommand::parse_remote("add").unwrap(), GitSubcommand::Add);
        assert_eq!(GitSubcommand::parse_remote("commit").unwrap(), GitSubcommand::Commit);
        assert_eq!(GitSubcommand::parse_remote("status").unwrap(), GitSubcommand::Status);

        for name in ["apply", "ls-files", "push", "reset", "rm"] {
            let err = GitSubcommand::parse_remote(name).unwrap_err();
            assert_eq!(err.kind(), "unsupported_command", "{name}");
        }
    }

    #[test]
    fn sanitize_strips_metacharacters() {
        assert_eq!(sanitize_arg("file.txt; rm -rf /"), "file.txt rm -rf /");
        assert_eq!(sanitize_arg("$(whoami)`id`"), "whoamiid");
        assert_eq!(sanitize_arg("a|b&c{d}[e]"), "abcde");
        assert_eq!(sanitize_arg("src/x.js"), "src/x.js");
    }

    #[test]
    fn only_apply_add_commit_mutate() {
        assert!(GitSubcommand::Apply.is_mutating());
        assert!(!GitSubcommand::Status.is_mutating());
        assert!(!GitSubcommand::LsFiles.is_mutating());
    }
}
