//! # pw-events
//!
//! The server side of the real-time push channel.
//!
//! - [`PushMessage`] — the typed `{type, data}` messages pushed to clients.
//! - [`SyncChannel`] — an explicit subscriber registry. Each subscriber owns
//!   a bounded queue and a heartbeat task; publishing never blocks, and a
//!   subscriber whose queue is full is closed rather than stalling the
//!   others. Dropping a [`Subscription`] unregisters it and cancels its
//!   heartbeat.

pub mod channel;
pub mod message;

pub use channel::{ChannelStats, SyncChannel, SyncChannelConfig, Subscription};
pub use message::PushMessage;
