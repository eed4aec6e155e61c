// error.rs — ApiError: every failure the HTTP surface can report.
//
// Rendered as
//   { "success": false, "error": { "kind", "message", "detail" }, "timestamp" }
// with the status code chosen from `kind`. `detail` carries captured git
// output, field-type information or the offending path.

use std::path::PathBuf;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use thiserror::Error;

use pw_changeset::ChangeSetError;
use pw_engine::{EngineError, GateError};
use pw_git::GitError;
use pw_workspace::WorkspaceError;

#[derive(Debug, Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: &'static str,
    pub message: String,
    pub detail: Value,
}

/// HTTP status for an error kind.
pub fn status_for(kind: &str) -> StatusCode {
    match kind {
        "validation_error" | "patch_format" | "patch_rejected" | "unsupported_command"
        | "untracked_file" | "serialization_error" => StatusCode::BAD_REQUEST,
        "unauthorized" => StatusCode::UNAUTHORIZED,
        "path_traversal" | "protected_path" => StatusCode::FORBIDDEN,
        "not_found" => StatusCode::NOT_FOUND,
        "invalid_transition" => StatusCode::CONFLICT,
        "media_type" => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        "timeout" => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn new(kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: Value::Null,
        }
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = detail;
        self
    }

    /// Name the change a failed request left behind.
    pub fn with_change(mut self, change_id: &str) -> Self {
        match &mut self.detail {
            Value::Object(map) => {
                map.insert("change_id".to_string(), json!(change_id));
            }
            other => *other = json!({ "change_id": change_id }),
        }
        self
    }

    pub fn status(&self) -> StatusCode {
        status_for(self.kind)
    }

    pub fn unauthorized() -> Self {
        Self::new("unauthorized", "missing or invalid bearer token")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.kind, error = %self.message, "request failed");
        } else {
            tracing::debug!(kind = self.kind, error = %self.message, "request rejected");
        }
        let body = json!({
            "success": false,
            "error": {
                "kind": self.kind,
                "message": self.message,
                "detail": self.detail,
            },
            "timestamp": Utc::now(),
        });
        (status, Json(body)).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        Self::new(e.kind(), e.to_string()).with_detail(e.detail())
    }
}

impl From<GateError> for ApiError {
    fn from(e: GateError) -> Self {
        Self::new(e.kind(), e.to_string()).with_detail(e.detail())
    }
}

impl From<WorkspaceError> for ApiError {
    fn from(e: WorkspaceError) -> Self {
        EngineError::from(e).into()
    }
}

impl From<GitError> for ApiError {
    fn from(e: GitError) -> Self {
        EngineError::from(e).into()
    }
}

impl From<ChangeSetError> for ApiError {
    fn from(e: ChangeSetError) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let kind = match rejection {
            JsonRejection::MissingJsonContentType(_) => "media_type",
            _ => "validation_error",
        };
        Self::new(kind, rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::internal(format!("worker task failed: {e}"))
    }
}

/// Failures loading `daemon.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_documented_statuses() {
        assert_eq!(status_for("validation_error"), StatusCode::BAD_REQUEST);
        assert_eq!(status_for("patch_rejected"), StatusCode::BAD_REQUEST);
        assert_eq!(status_for("path_traversal"), StatusCode::FORBIDDEN);
        assert_eq!(status_for("protected_path"), StatusCode::FORBIDDEN);
        assert_eq!(status_for("not_found"), StatusCode::NOT_FOUND);
        assert_eq!(status_for("invalid_transition"), StatusCode::CONFLICT);
        assert_eq!(status_for("media_type"), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(status_for("apply_failed"), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status_for("not_a_git_repo"), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status_for("timeout"), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn gate_error_keeps_field_detail() {
        let err: ApiError = GateError::Validation {
            field: "patch",
            expected: "string",
            received: "number".to_string(),
        }
        .into();
        assert_eq!(err.kind, "validation_error");
        assert_eq!(err.detail["field"], "patch");
        assert_eq!(err.detail["received"], "number");
    }

    #[test]
    fn with_change_merges_into_detail() {
        let err = ApiError::new("patch_rejected", "no")
            .with_detail(json!({ "stderr": "error: patch failed" }))
            .with_change("c-1");
        assert_eq!(err.detail["stderr"], "error: patch failed");
        assert_eq!(err.detail["change_id"], "c-1");

        let bare = ApiError::new("apply_failed", "no").with_change("c-2");
        assert_eq!(bare.detail, json!({ "change_id": "c-2" }));
    }

    #[test]
    fn traversal_maps_to_forbidden() {
        let err: ApiError = WorkspaceError::PathTraversal {
            path: "../etc/passwd".into(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.detail["path"], "../etc/passwd");
    }
}
