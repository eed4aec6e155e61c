// builtin.rs — Canned checkers used when no external tool is configured.
//
// They always pass and return fixed detail: one documentation warning, two
// timed edge-case tests, and one response-time regression comparison. The
// daemon serves the same reports from its checker endpoints.

use async_trait::async_trait;
use serde_json::json;

use pw_changeset::{CheckDetail, CheckKind, CheckReport, RegressionTest, TestCase};

use crate::checker::{CheckPayload, Checker};
use crate::error::CheckerError;

/// The fixed report for one dimension.
pub fn canned_report(kind: CheckKind) -> CheckReport {
    let detail = match kind {
        CheckKind::Syntax => CheckDetail::Syntax {
            errors: Vec::new(),
            warnings: vec!["Consider adding JSDoc comments".to_string()],
        },
        CheckKind::EdgeCase => CheckDetail::EdgeCase {
            test_cases: vec![
                TestCase {
                    name: "Empty token test".to_string(),
                    passed: true,
                    error: None,
                    execution_time_ms: 15,
                },
                TestCase {
                    name: "Invalid token test".to_string(),
                    passed: true,
                    error: None,
                    execution_time_ms: 12,
                },
            ],
        },
        CheckKind::Regression => CheckDetail::Regression {
            regression_tests: vec![RegressionTest {
                name: "Authentication flow".to_string(),
                passed: true,
                before_metrics: json!({ "response_time": 150 }),
                after_metrics: json!({ "response_time": 145 }),
                difference: -5.0,
            }],
        },
    };
    CheckReport {
        passed: true,
        detail,
    }
}

/// A checker that returns [`canned_report`] for its dimension.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinChecker {
    kind: CheckKind,
}

impl BuiltinChecker {
    pub fn new(kind: CheckKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl Checker for BuiltinChecker {
    fn kind(&self) -> CheckKind {
        self.kind
    }

    async fn check(&self, payload: &CheckPayload) -> Result<CheckReport, CheckerError> {
        tracing::debug!(check = self.kind.as_str(), path = %payload.path, "builtin check");
        Ok(canned_report(self.kind))
    }
}
