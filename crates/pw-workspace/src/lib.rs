//! # pw-workspace
//!
//! Workspace-side state for patchwire.
//!
//! ## Key components
//!
//! - [`WorkspaceGuard`] — resolves every path argument against the workspace
//!   root and rejects anything that escapes it (`..`, absolute overrides,
//!   symlinks pointing outside).
//! - [`ChangeStore`] — the authoritative owner of [`Change`](pw_changeset::Change)
//!   records and the single writer of their status. Transitions are atomic per
//!   change id; different ids proceed concurrently.
//! - [`ChangeLog`] — append-only JSONL record of every change that has left
//!   `pending`.
//! - [`TaskStore`] — owned task list; tasks are never deleted.
//! - [`FsOperation`] — the closed set of filesystem operations exposed to
//!   remote callers (read, write, list), all routed through the guard.

pub mod change_log;
pub mod error;
pub mod fs_ops;
pub mod guard;
pub mod store;
pub mod task_store;

pub use change_log::ChangeLog;
pub use error::WorkspaceError;
pub use fs_ops::{EntryKind, FsEntry, FsOperation, FsOutcome};
pub use guard::WorkspaceGuard;
pub use store::ChangeStore;
pub use task_store::TaskStore;
