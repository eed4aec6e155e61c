//! # pw-sync
//!
//! The consuming side of patchwire: a client that keeps a local mirror of a
//! daemon's tasks and changes and can apply changes to its own checkout.
//!
//! - [`ClientSyncAgent`] — periodic pull (last-writer-wins on task
//!   `updated_at`), push-channel consumer with reconnect backoff, local
//!   application through the shared [`ChangeEngine`](pw_engine::ChangeEngine),
//!   and remote verification.
//! - [`ApiClient`] — typed HTTP access to every daemon endpoint.
//! - [`SseFrameParser`] — incremental Server-Sent Events decoding.
//! - [`task_doc`] — the `[kind] [priority] title` task document format.
//! - [`ClientConfig`] — `client.toml` plus environment overrides.

pub mod agent;
pub mod api;
pub mod config;
pub mod error;
pub mod mirror;
pub mod sse;
pub mod task_doc;

pub use agent::{ClientSyncAgent, SyncResult};
pub use api::{ApiClient, DaemonStatus, EventStream, PatchReceipt};
pub use config::ClientConfig;
pub use error::SyncError;
pub use mirror::LocalMirror;
pub use sse::{SseFrame, SseFrameParser};
