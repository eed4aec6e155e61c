// coordinator.rs — VerificationCoordinator: runs all three checks, always.
//
// The three checks are independent, so they run concurrently with
// `tokio::join!`. Each is wrapped in its own timeout. No short-circuit on
// the first failure: every sub-report is recorded. A checker error or
// timeout becomes a failed sub-report whose detail carries the message.

use std::sync::Arc;
use std::time::Duration;

use pw_changeset::{Change, CheckKind, CheckReport, VerificationResult};

use crate::builtin::BuiltinChecker;
use crate::checker::{CheckPayload, Checker};
use crate::error::CheckerError;
use crate::http::HttpChecker;

#[derive(Clone)]
pub struct VerificationCoordinator {
    syntax: Arc<dyn Checker>,
    edge_case: Arc<dyn Checker>,
    regression: Arc<dyn Checker>,
    timeout: Duration,
}

impl VerificationCoordinator {
    pub fn new(
        syntax: Arc<dyn Checker>,
        edge_case: Arc<dyn Checker>,
        regression: Arc<dyn Checker>,
        timeout: Duration,
    ) -> Self {
        Self {
            syntax,
            edge_case,
            regression,
            timeout,
        }
    }

    /// Coordinator backed by the canned built-in checkers.
    pub fn builtin(timeout: Duration) -> Self {
        Self::new(
            Arc::new(BuiltinChecker::new(CheckKind::Syntax)),
            Arc::new(BuiltinChecker::new(CheckKind::EdgeCase)),
            Arc::new(BuiltinChecker::new(CheckKind::Regression)),
            timeout,
        )
    }

    /// Coordinator that calls a patchwire daemon's checker endpoints.
    pub fn remote(base_url: &str, token: Option<String>, timeout: Duration) -> Self {
        let base = base_url.trim_end_matches('/');
        let client = reqwest::Client::new();
        let checker = |kind: CheckKind, route: &str| -> Arc<dyn Checker> {
            Arc::new(HttpChecker::with_client(
                kind,
                format!("{base}{route}"),
                token.clone(),
                client.clone(),
            ))
        };
        Self::new(
            checker(CheckKind::Syntax, "/api/lint"),
            checker(CheckKind::EdgeCase, "/api/test-cases"),
            checker(CheckKind::Regression, "/api/regression-check"),
            timeout,
        )
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run all three checks against a change.
    pub async fn verify(&self, change: &Change) -> VerificationResult {
        let payload = CheckPayload::from(change);
        let (syntax, edge_case, regression) = tokio::join!(
            self.run_one(self.syntax.as_ref(), &payload),
            self.run_one(self.edge_case.as_ref(), &payload),
            self.run_one(self.regression.as_ref(), &payload),
        );
        let result = VerificationResult::new(syntax, edge_case, regression);
        tracing::info!(
            change_id = %change.id,
            passed = result.passed(),
            syntax = result.syntax_check.passed,
            edge_case = result.edge_case_test.passed,
            regression = result.integration_validation.passed,
            "verification finished"
        );
        result
    }

    async fn run_one(&self, checker: &dyn Checker, payload: &CheckPayload) -> CheckReport {
        let check = checker.kind().as_str();
        let outcome = match tokio::time::timeout(self.timeout, checker.check(payload)).await {
            Ok(result) => result,
            Err(_) => Err(CheckerError::Timeout {
                check,
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        };
        match outcome {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(check, error = %e, "checker produced no report");
                CheckReport::unavailable(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pw_changeset::{CheckDetail, NewChange};

    enum Behavior {
        Pass,
        Fail,
        Error,
        Hang,
    }

    struct FakeChecker {
        kind: CheckKind,
        behavior: Behavior,
    }

    #[async_trait]
    impl Checker for FakeChecker {
        fn kind(&self) -> CheckKind {
            self.kind
        }

        async fn check(&self, _payload: &CheckPayload) -> Result<CheckReport, CheckerError> {
            let detail = CheckDetail::Syntax {
                errors: vec![],
                warnings: vec![],
            };
            match self.behavior {
                Behavior::Pass => Ok(CheckReport {
                    passed: true,
                    detail,
                }),
                Behavior::Fail => Ok(CheckReport {
                    passed: false,
                    detail,
                }),
                Behavior::Error => Err(CheckerError::Transport("connection refused".into())),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    unreachable!("hanging checker should be timed out")
                }
            }
        }
    }

    fn coordinator(s: Behavior, e: Behavior, r: Behavior) -> VerificationCoordinator {
        let fake = |kind, behavior| -> Arc<dyn Checker> { Arc::new(FakeChecker { kind, behavior }) };
        VerificationCoordinator::new(
            fake(CheckKind::Syntax, s),
            fake(CheckKind::EdgeCase, e),
            fake(CheckKind::Regression, r),
            Duration::from_millis(50),
        )
    }

    fn change() -> Change {
        Change::new(NewChange::diff_update("src/x.js", "--- a/src/x.js\n+++ b/src/x.js\n"))
    }

    #[tokio::test]
    async fn all_passing_checks_pass() {
        let result = coordinator(Behavior::Pass, Behavior::Pass, Behavior::Pass)
            .verify(&change())
            .await;
        assert!(result.passed());
    }

    #[tokio::test]
    async fn one_failing_check_fails_the_verdict_but_keeps_all_reports() {
        let result = coordinator(Behavior::Pass, Behavior::Fail, Behavior::Pass)
            .verify(&change())
            .await;
        assert!(!result.passed());
        assert!(result.syntax_check.passed);
        assert!(!result.edge_case_test.passed);
        assert!(result.integration_validation.passed);
    }

    #[tokio::test]
    async fn transport_error_becomes_unavailable_report() {
        let result = coordinator(Behavior::Error, Behavior::Pass, Behavior::Pass)
            .verify(&change())
            .await;
        assert!(!result.passed());
        let CheckDetail::Unavailable { error } = &result.syntax_check.detail else {
            panic!("expected unavailable detail");
        };
        assert!(error.contains("connection refused"));
        assert!(result.edge_case_test.passed);
    }

    #[tokio::test]
    async fn hanging_checker_times_out_without_blocking_others() {
        let started = std::time::Instant::now();
        let result = coordinator(Behavior::Pass, Behavior::Pass, Behavior::Hang)
            .verify(&change())
            .await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!result.passed());
        let CheckDetail::Unavailable { error } = &result.integration_validation.detail else {
            panic!("expected unavailable detail");
        };
        assert!(error.contains("timed out"));
        assert!(result.syntax_check.passed && result.edge_case_test.passed);
    }

    #[tokio::test]
    async fn builtin_checkers_pass() {
        let result = VerificationCoordinator::builtin(Duration::from_secs(1))
            .verify(&change())
            .await;
        assert!(result.passed());
    }
}
