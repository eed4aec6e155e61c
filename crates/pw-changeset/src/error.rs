// error.rs — Error types for the data model.

use thiserror::Error;

/// Errors that can occur while building or transitioning model records.
#[derive(Debug, Error)]
pub enum ChangeSetError {
    /// A lifecycle transition outside the allowed set was requested.
    #[error("invalid transition from {from} to {to} for {id}")]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
    },

    /// A string did not name a known variant (e.g. an unknown status filter).
    #[error("unknown {field} '{value}'")]
    UnknownVariant { field: &'static str, value: String },

    /// Invalid or malformed data.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl ChangeSetError {
    /// Stable kind string used in structured error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeSetError::InvalidTransition { .. } => "invalid_transition",
            ChangeSetError::UnknownVariant { .. } | ChangeSetError::InvalidData(_) => {
                "validation_error"
            }
            ChangeSetError::SerializationError(_) => "serialization_error",
        }
    }
}
