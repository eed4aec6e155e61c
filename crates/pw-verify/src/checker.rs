//! The `Checker` capability and its request payload.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use pw_changeset::{Change, CheckKind, CheckReport};

use crate::error::CheckerError;

/// What a checker is asked to evaluate.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CheckPayload {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

impl From<&Change> for CheckPayload {
    fn from(change: &Change) -> Self {
        Self {
            path: change.path.clone(),
            content: change.content.clone(),
            diff: change.diff.clone(),
        }
    }
}

/// Evaluates one verification dimension.
///
/// Implementations must be cheap to share across tasks; the coordinator
/// holds them behind `Arc<dyn Checker>`.
#[async_trait]
pub trait Checker: Send + Sync {
    fn kind(&self) -> CheckKind;

    async fn check(&self, payload: &CheckPayload) -> Result<CheckReport, CheckerError>;
}
