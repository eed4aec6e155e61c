//! # pw-git
//!
//! Git plumbing for patchwire. Every git invocation goes through
//! [`GitBridge`], which only runs subcommands from the closed
//! [`GitSubcommand`] set, passes arguments as a discrete vector (never a
//! shell string), bounds each call with a timeout, and classifies captured
//! output as success, success-no-op, or failure.
//!
//! [`GitBridge::apply_patch`] implements staged patch application:
//! work-tree check, optional auto-staging of untracked targets, scratch
//! file, `git apply --check`, then `git apply`.

pub mod bridge;
pub mod classify;
pub mod command;
pub mod config;
pub mod error;

pub use bridge::{ApplyReport, GitBridge, GitOutput, StageOutcome};
pub use classify::{classify, Classification};
pub use command::{sanitize_arg, GitSubcommand};
pub use config::{AutoStagePolicy, GitConfig};
pub use error::GitError;
