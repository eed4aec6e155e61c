// api.rs — ApiClient: typed access to a patchwire daemon.
//
// Every response body is an envelope: `{ success, data, timestamp }` on
// success, `{ success: false, error: { kind, message, detail } }` on
// failure. The push channel is a long-lived SSE response on `/api/events`
// decoded frame by frame into PushMessages.

use std::collections::VecDeque;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use pw_changeset::{AgentState, Change, NewChange, NewTask, Task, TaskStatus};
use pw_events::PushMessage;

use crate::config::ClientConfig;
use crate::error::SyncError;
use crate::sse::SseFrameParser;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    kind: String,
    message: String,
}

/// Result of `POST /api/apply`.
#[derive(Debug, Clone, Deserialize)]
pub struct PatchReceipt {
    pub target_path: String,
    pub change: Change,
}

/// Result of `GET /api/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonStatus {
    #[serde(flatten)]
    pub agent: AgentState,
    #[serde(default)]
    pub subscribers: usize,
}

/// Body of `POST /api/changes`.
#[derive(Debug, Serialize)]
struct RecordChange<'a> {
    #[serde(flatten)]
    change: &'a NewChange,
    apply: bool,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.api_url.clone(), config.api_token.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn request(&self, method: Method, route: &str) -> RequestBuilder {
        let mut req = self
            .http
            .request(method, format!("{}{route}", self.base_url));
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, SyncError> {
        let response = req.timeout(REQUEST_TIMEOUT).send().await?;
        let response = check_status(response).await?;
        let envelope: Envelope<T> = response.json().await?;
        Ok(envelope.data)
    }

    pub async fn list_tasks(&self) -> Result<Vec<Task>, SyncError> {
        self.send(self.request(Method::GET, "/api/tasks")).await
    }

    pub async fn create_task(&self, task: &NewTask) -> Result<Task, SyncError> {
        self.send(self.request(Method::POST, "/api/tasks").json(task))
            .await
    }

    pub async fn update_task_status(&self, id: &str, status: TaskStatus) -> Result<Task, SyncError> {
        let route = format!("/api/tasks/{id}");
        self.send(
            self.request(Method::PATCH, &route)
                .json(&json!({ "status": status })),
        )
        .await
    }

    pub async fn list_changes(&self) -> Result<Vec<Change>, SyncError> {
        self.send(self.request(Method::GET, "/api/changes")).await
    }

    pub async fn get_change(&self, id: &str) -> Result<Change, SyncError> {
        self.send(self.request(Method::GET, &format!("/api/changes/{id}")))
            .await
    }

    /// Record a change; with `apply` the daemon applies it immediately.
    pub async fn record_change(&self, change: &NewChange, apply: bool) -> Result<Change, SyncError> {
        let body = RecordChange { change, apply };
        self.send(self.request(Method::POST, "/api/changes").json(&body))
            .await
    }

    pub async fn apply_patch(&self, target_path: &str, patch: &str) -> Result<PatchReceipt, SyncError> {
        self.send(
            self.request(Method::POST, "/api/apply")
                .json(&json!({ "targetPath": target_path, "patch": patch })),
        )
        .await
    }

    pub async fn verify_change(&self, id: &str) -> Result<Change, SyncError> {
        self.send(self.request(Method::POST, &format!("/api/changes/{id}/verify")))
            .await
    }

    pub async fn status(&self) -> Result<DaemonStatus, SyncError> {
        self.send(self.request(Method::GET, "/api/status")).await
    }

    /// Open the push channel.
    pub async fn events(&self) -> Result<EventStream, SyncError> {
        let response = self
            .request(Method::GET, "/api/events")
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let response = check_status(response).await?;
        tracing::info!(url = %self.base_url, "push channel connected");
        Ok(EventStream {
            response,
            parser: SseFrameParser::new(),
            queued: VecDeque::new(),
        })
    }
}

async fn check_status(response: Response) -> Result<Response, SyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let (kind, message) = match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(env) => (env.error.kind, env.error.message),
        Err(_) => ("http_error".to_string(), body),
    };
    Err(SyncError::Api {
        status: status.as_u16(),
        kind,
        message,
    })
}

/// Decoded push messages from a live `/api/events` response.
pub struct EventStream {
    response: Response,
    parser: SseFrameParser,
    queued: VecDeque<PushMessage>,
}

impl EventStream {
    /// Next push message. `Ok(None)` means the server closed the stream.
    pub async fn next(&mut self) -> Result<Option<PushMessage>, SyncError> {
        loop {
            if let Some(message) = self.queued.pop_front() {
                return Ok(Some(message));
            }
            let Some(chunk) = self.response.chunk().await? else {
                return Ok(None);
            };
            for frame in self.parser.feed(&chunk) {
                match decode_push(&frame.data) {
                    Ok(message) => self.queued.push_back(message),
                    Err(e) => {
                        tracing::warn!(event = frame.event_name(), error = %e, "undecodable push frame skipped")
                    }
                }
            }
        }
    }
}

/// Decode one SSE `data` payload into a PushMessage.
pub fn decode_push(data: &str) -> Result<PushMessage, SyncError> {
    serde_json::from_str(data).map_err(|e| SyncError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Path,
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use chrono::Utc;
    use pw_changeset::{ChangeStatus, TaskKind};
    use serde_json::Value;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn ok<T: Serialize>(data: T) -> Json<Value> {
        Json(json!({ "success": true, "data": data, "timestamp": Utc::now() }))
    }

    #[tokio::test]
    async fn lists_tasks_through_envelope() {
        let task = Task::new(NewTask::new(TaskKind::Bug, "fix"));
        let served = task.clone();
        let router = Router::new().route(
            "/api/tasks",
            get(move || {
                let task = served.clone();
                async move { ok(vec![task]) }
            }),
        );
        let client = ApiClient::new(serve(router).await, None);
        let tasks = client.list_tasks().await.unwrap();
        assert_eq!(tasks, vec![task]);
    }

    #[tokio::test]
    async fn structured_error_becomes_api_error() {
        let router = Router::new().route(
            "/api/changes/{id}",
            get(|Path(id): Path<String>| async move {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({
                        "success": false,
                        "error": { "kind": "not_found", "message": format!("change not found: {id}"), "detail": null }
                    })),
                )
            }),
        );
        let client = ApiClient::new(serve(router).await, None);
        let err = client.get_change("nope").await.unwrap_err();
        match err {
            SyncError::Api { status, kind, message } => {
                assert_eq!(status, 404);
                assert_eq!(kind, "not_found");
                assert!(message.contains("nope"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn record_change_sends_apply_flag_and_token() {
        let router = Router::new().route(
            "/api/changes",
            post(|headers: axum::http::HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(
                    headers.get("authorization").and_then(|v| v.to_str().ok()),
                    Some("Bearer s3cret")
                );
                assert_eq!(body["apply"], true);
                let new: NewChange = serde_json::from_value(body).unwrap();
                ok(Change::new(new))
            }),
        );
        let client = ApiClient::new(serve(router).await, Some("s3cret".into()));
        let change = client
            .record_change(&NewChange::diff_update("a.txt", "diff"), true)
            .await
            .unwrap();
        assert_eq!(change.path, "a.txt");
        assert_eq!(change.status, ChangeStatus::Pending);
    }

    #[test]
    fn decodes_push_payload() {
        let msg = PushMessage::heartbeat();
        let data = serde_json::to_string(&msg).unwrap();
        assert_eq!(decode_push(&data).unwrap().event_type(), "heartbeat");
        assert!(decode_push("{\"type\":\"mystery\"}").is_err());
    }

}
