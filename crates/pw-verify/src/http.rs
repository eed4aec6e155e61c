// http.rs — HttpChecker: delegates one dimension to a remote endpoint.
//
// POSTs the CheckPayload as JSON. The response may be the daemon's envelope
// (`{ success, data: CheckReport }`), a bare CheckReport, or the flat legacy
// shape (`{ passed, errors, warnings }`, `{ passed, testCases }`,
// `{ passed, regressionTests }`), each optionally wrapped in `data`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use pw_changeset::{CheckDetail, CheckKind, CheckReport, RegressionTest, TestCase};

use crate::checker::{CheckPayload, Checker};
use crate::error::CheckerError;

#[derive(Debug, Clone)]
pub struct HttpChecker {
    kind: CheckKind,
    url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpChecker {
    pub fn new(kind: CheckKind, url: impl Into<String>, token: Option<String>) -> Self {
        Self::with_client(kind, url, token, reqwest::Client::new())
    }

    pub fn with_client(
        kind: CheckKind,
        url: impl Into<String>,
        token: Option<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            kind,
            url: url.into(),
            token,
            client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Checker for HttpChecker {
    fn kind(&self) -> CheckKind {
        self.kind
    }

    async fn check(&self, payload: &CheckPayload) -> Result<CheckReport, CheckerError> {
        let mut request = self.client.post(&self.url).json(payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CheckerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await?;
        decode_report(self.kind, body)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyTestCase {
    name: String,
    passed: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    execution_time: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyRegressionTest {
    name: String,
    passed: bool,
    #[serde(default)]
    before_metrics: Value,
    #[serde(default)]
    after_metrics: Value,
    #[serde(default)]
    difference: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyReport {
    passed: bool,
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    warnings: Vec<String>,
    #[serde(default)]
    test_cases: Vec<LegacyTestCase>,
    #[serde(default)]
    regression_tests: Vec<LegacyRegressionTest>,
}

/// Decode any accepted response shape into a report for `kind`.
pub fn decode_report(kind: CheckKind, body: Value) -> Result<CheckReport, CheckerError> {
    let body = match body {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    };

    if body.get("detail").is_some() {
        return serde_json::from_value(body).map_err(|e| CheckerError::Decode(e.to_string()));
    }

    let legacy: LegacyReport =
        serde_json::from_value(body).map_err(|e| CheckerError::Decode(e.to_string()))?;
    let detail = match kind {
        CheckKind::Syntax => CheckDetail::Syntax {
            errors: legacy.errors,
            warnings: legacy.warnings,
        },
        CheckKind::EdgeCase => CheckDetail::EdgeCase {
            test_cases: legacy
                .test_cases
                .into_iter()
                .map(|t| TestCase {
                    name: t.name,
                    passed: t.passed,
                    error: t.error,
                    execution_time_ms: t.execution_time,
                })
                .collect(),
        },
        CheckKind::Regression => CheckDetail::Regression {
            regression_tests: legacy
                .regression_tests
                .into_iter()
                .map(|t| RegressionTest {
                    name: t.name,
                    passed: t.passed,
                    before_metrics: t.before_metrics,
                    after_metrics: t.after_metrics,
                    difference: t.difference,
                })
                .collect(),
        },
    };
    Ok(CheckReport {
        passed: legacy.passed,
        detail,
    })
}
