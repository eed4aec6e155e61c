//! # pw-engine
//!
//! The Change Application Engine.
//!
//! - [`PatchGate`] validates an incoming patch request (content type, field
//!   types, unified-diff header) before anything touches disk or git.
//! - [`ChangeEngine`] applies a [`Change`](pw_changeset::Change) to a
//!   workspace through one `operation × payload` matrix: full-content writes,
//!   staged git patch application, deletes, renames and directory creation.
//!   The daemon and the client agent both apply changes through it.

pub mod engine;
pub mod error;
pub mod gate;

pub use engine::{AppliedAction, ApplyOutcome, ChangeEngine};
pub use error::{EngineError, GateError};
pub use gate::{PatchGate, ValidatedPatch};
