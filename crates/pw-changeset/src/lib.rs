//! # pw-changeset
//!
//! The data model shared by every patchwire component.
//!
//! A [`Task`] is a unit of requested work. A [`Change`] is a proposed mutation
//! to one workspace entry, produced for a task by an external agent. Changes
//! move through a forward-only lifecycle ([`ChangeStatus`]):
//!
//! ```text
//! pending → applied → verified
//!        ↘         ↘
//!          failed    failed
//! ```
//!
//! Verification attaches a [`VerificationResult`] holding three sub-reports
//! (syntax, edge-case, regression); the overall verdict is their logical AND.
//!
//! This crate performs no I/O. Stores, git plumbing and the network surface
//! live in the crates that depend on it.

pub mod agent_state;
pub mod change;
pub mod error;
pub mod task;
pub mod verification;

pub use agent_state::{AgentState, Connectivity};
pub use change::{
    Change, ChangeKind, ChangeMetadata, ChangeOperation, ChangePayload, ChangeStatus, NewChange,
};
pub use error::ChangeSetError;
pub use task::{NewTask, Task, TaskKind, TaskPriority, TaskStatus};
pub use verification::{
    CheckDetail, CheckKind, CheckReport, RegressionTest, TestCase, VerificationResult,
};
