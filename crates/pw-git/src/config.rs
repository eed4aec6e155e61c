//! Git bridge configuration (`[git]` table of the daemon config).

use serde::{Deserialize, Serialize};

/// What to do when an untracked patch target cannot be staged.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AutoStagePolicy {
    /// Auto-stage; a staging failure aborts the apply.
    #[default]
    Require,
    /// Auto-stage; a staging failure is logged and the apply continues.
    Proceed,
    /// Never auto-stage.
    Off,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GitConfig {
    /// Per-invocation subprocess timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub auto_stage: AutoStagePolicy,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            auto_stage: AutoStagePolicy::default(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}
