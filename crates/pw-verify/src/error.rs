// error.rs — Checker failures.
//
// None of these abort a verification run; the coordinator downgrades each
// one to a failed sub-report carrying the message.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckerError {
    /// The request never produced a response (connect, DNS, reset).
    #[error("checker transport error: {0}")]
    Transport(String),

    /// The checker answered with a non-success status.
    #[error("checker returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not a check report.
    #[error("checker response could not be decoded: {0}")]
    Decode(String),

    /// No answer within the configured budget.
    #[error("{check} check timed out after {timeout_ms}ms")]
    Timeout { check: &'static str, timeout_ms: u64 },
}

impl CheckerError {
    pub fn kind(&self) -> &'static str {
        match self {
            CheckerError::Timeout { .. } => "timeout",
            CheckerError::Transport(_) | CheckerError::Status { .. } | CheckerError::Decode(_) => {
                "transport_error"
            }
        }
    }
}

impl From<reqwest::Error> for CheckerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            CheckerError::Decode(e.to_string())
        } else {
            CheckerError::Transport(e.to_string())
        }
    }
}
