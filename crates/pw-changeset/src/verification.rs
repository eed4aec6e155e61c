// verification.rs — Verification results attached to a Change.
//
// Verification runs three independent checks. Each produces a CheckReport
// with a pass flag and check-specific detail. A check that never produced a
// report (transport error, timeout) is recorded as failed with
// `CheckDetail::Unavailable` so all three sub-reports are always present.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The three verification dimensions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Syntax,
    EdgeCase,
    Regression,
}

impl CheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::Syntax => "syntax",
            CheckKind::EdgeCase => "edge_case",
            CheckKind::Regression => "regression",
        }
    }
}

/// One timed edge-case test.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestCase {
    pub name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time_ms: u64,
}

/// One before/after regression comparison.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegressionTest {
    pub name: String,
    pub passed: bool,
    #[serde(default)]
    pub before_metrics: serde_json::Value,
    #[serde(default)]
    pub after_metrics: serde_json::Value,
    pub difference: f64,
}

/// Check-specific detail carried by a report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckDetail {
    Syntax {
        #[serde(default)]
        errors: Vec<String>,
        #[serde(default)]
        warnings: Vec<String>,
    },
    EdgeCase {
        #[serde(default)]
        test_cases: Vec<TestCase>,
    },
    Regression {
        #[serde(default)]
        regression_tests: Vec<RegressionTest>,
    },
    /// The checker never answered.
    Unavailable { error: String },
}

/// The outcome of one check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckReport {
    pub passed: bool,
    pub detail: CheckDetail,
}

impl CheckReport {
    /// A failed report for a checker that did not respond.
    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            passed: false,
            detail: CheckDetail::Unavailable {
                error: error.into(),
            },
        }
    }
}

/// Aggregated verification outcome for one Change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationResult {
    pub syntax_check: CheckReport,
    pub edge_case_test: CheckReport,
    pub integration_validation: CheckReport,
    pub verified_at: DateTime<Utc>,
}

impl VerificationResult {
    pub fn new(syntax: CheckReport, edge_case: CheckReport, regression: CheckReport) -> Self {
        Self {
            syntax_check: syntax,
            edge_case_test: edge_case,
            integration_validation: regression,
            verified_at: Utc::now(),
        }
    }

    /// Overall verdict: logical AND of the three pass flags.
    pub fn passed(&self) -> bool {
        self.syntax_check.passed && self.edge_case_test.passed && self.integration_validation.passed
    }

    pub fn report(&self, kind: CheckKind) -> &CheckReport {
        match kind {
            CheckKind::Syntax => &self.syntax_check,
            CheckKind::EdgeCase => &self.edge_case_test,
            CheckKind::Regression => &self.integration_validation,
        }
    }
}
