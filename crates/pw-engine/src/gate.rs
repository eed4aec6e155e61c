// gate.rs — PatchGate: validates a patch request before any mutation.
//
// Checks, in order:
//   1. declared content type is JSON
//   2. `targetPath` and `patch` are present, strings, and non-blank
//   3. the patch carries a `+++ <path>` header
// The header path (with an optional `a/` or `b/` prefix removed) is
// returned alongside the request path; the caller decides which to trust.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::GateError;

static NEW_FILE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\+\+\+[ \t]+(?:[ab]/)?([^\t\r\n]+?)[ \t]*(?:\t.*)?\r?$")
        .expect("new-file header pattern is valid")
});

static OLD_FILE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^---[ \t]+(?:[ab]/)?([^\t\r\n]+?)[ \t]*(?:\t.*)?\r?$")
        .expect("old-file header pattern is valid")
});

const DEV_NULL: &str = "/dev/null";

/// Field names accepted for the target path, first match wins.
const TARGET_FIELDS: &[&str] = &["targetPath", "target_path", "file"];
/// Field names accepted for the patch text, first match wins.
const PATCH_FIELDS: &[&str] = &["patch", "changes"];

/// A patch request that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPatch {
    /// Path named by the caller.
    pub target_path: String,
    /// Path named by the patch's own header.
    pub header_path: String,
    pub patch: String,
}

impl ValidatedPatch {
    pub fn paths_agree(&self) -> bool {
        self.target_path.trim_start_matches("./") == self.header_path
    }
}

pub struct PatchGate;

impl PatchGate {
    /// Validate a raw request. Never touches disk or git.
    pub fn validate(content_type: Option<&str>, body: &Value) -> Result<ValidatedPatch, GateError> {
        if !is_json(content_type) {
            return Err(GateError::MediaType {
                received: content_type.map(str::to_string),
            });
        }

        let target_path = string_field(body, "targetPath", TARGET_FIELDS)?;
        let patch = string_field(body, "patch", PATCH_FIELDS)?;
        let header_path = Self::header_path(&patch)?;

        Ok(ValidatedPatch {
            target_path: target_path.trim().to_string(),
            header_path,
            patch,
        })
    }

    /// Extract the target path from a unified diff's file headers.
    ///
    /// Deletion patches (`+++ /dev/null`) fall back to the `---` header.
    pub fn header_path(patch: &str) -> Result<String, GateError> {
        let new_path = NEW_FILE_HEADER
            .captures(patch)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| GateError::PatchFormat("missing '+++' file header".to_string()))?;

        if new_path != DEV_NULL {
            return Ok(new_path);
        }
        OLD_FILE_HEADER
            .captures(patch)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .filter(|p| p != DEV_NULL)
            .ok_or_else(|| GateError::PatchFormat("both file headers are /dev/null".to_string()))
    }
}

fn is_json(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

fn string_field(body: &Value, field: &'static str, names: &[&str]) -> Result<String, GateError> {
    let value = names.iter().find_map(|name| body.get(*name));
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(GateError::Validation {
            field,
            expected: "non-empty string",
            received: "empty string".to_string(),
        }),
        other => Err(GateError::Validation {
            field,
            expected: "string",
            received: type_name(other).to_string(),
        }),
    }
}

fn type_name(value: Option<&Value>) -> &'static str {
    match value {
        None => "missing",
        Some(Value::Null) => "null",
        Some(Value::Bool(_)) => "boolean",
        Some(Value::Number(_)) => "number",
        Some(Value::String(_)) => "string",
        Some(Value::Array(_)) => "array",
        Some(Value::Object(_)) => "object",
    }
}
