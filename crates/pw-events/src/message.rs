// message.rs — Server→client push messages.
//
// Wire shape is `{"type": "...", "data": ...}` for every variant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pw_changeset::{Change, ChangeStatus, Task, VerificationResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PushMessage {
    ConnectionEstablished {
        message: String,
        subscriber_id: u64,
    },
    Heartbeat {
        timestamp: DateTime<Utc>,
    },
    TaskUpdate(Task),
    ChangeReady(Change),
    VerificationComplete {
        change_id: String,
        status: ChangeStatus,
        results: VerificationResult,
    },
}

impl PushMessage {
    pub fn heartbeat() -> Self {
        PushMessage::Heartbeat {
            timestamp: Utc::now(),
        }
    }

    /// The `type` tag, also used as the SSE event name.
    pub fn event_type(&self) -> &'static str {
        match self {
            PushMessage::ConnectionEstablished { .. } => "connection_established",
            PushMessage::Heartbeat { .. } => "heartbeat",
            PushMessage::TaskUpdate(_) => "task_update",
            PushMessage::ChangeReady(_) => "change_ready",
            PushMessage::VerificationComplete { .. } => "verification_complete",
        }
    }
}
