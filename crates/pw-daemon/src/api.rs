// api.rs — HTTP routes.
//
// Every success body is `{ success: true, data, timestamp }`. Handlers are
// thin: decode, call AppState, wrap. `/api/events` is the push channel as
// Server-Sent Events; each PushMessage goes out with its `type` as the SSE
// event name and the full `{type, data}` object as the payload.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::{self, Next};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_stream::Stream;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use pw_changeset::{ChangeStatus, CheckKind, NewChange, NewTask, TaskStatus};
use pw_verify::CheckPayload;
use pw_workspace::FsOperation;

use crate::error::ApiError;
use crate::state::AppState;

type SharedState = Arc<AppState>;

#[derive(Serialize)]
struct Envelope<T> {
    success: bool,
    data: T,
    timestamp: DateTime<Utc>,
}

fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
        timestamp: Utc::now(),
    })
}

/// Build the full router.
pub fn router(state: SharedState) -> Router {
    let api = Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/{id}", patch(update_task))
        .route("/changes", get(list_changes).post(record_change))
        .route("/changes/{id}", get(get_change))
        .route("/changes/{id}/verify", post(verify_change))
        .route("/apply", post(apply_patch))
        .route("/lint", post(lint))
        .route("/test-cases", post(test_cases))
        .route("/regression-check", post(regression_check))
        .route("/filesystem", post(filesystem))
        .route("/git", post(git))
        .route("/status", get(status))
        .route("/events", get(events))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_token,
        ));

    Router::new()
        .nest("/api", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn require_token(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected) = &state.config().auth_token {
        let presented = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if presented != Some(expected.as_str()) {
            return Err(ApiError::unauthorized());
        }
    }
    Ok(next.run(request).await)
}

// ── Tasks ─────────────────────────────────────────────────────────

async fn list_tasks(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    Ok(ok(state.list_tasks()?))
}

async fn create_task(
    State(state): State<SharedState>,
    body: Result<Json<NewTask>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(new) = body?;
    Ok(ok(state.create_task(new)?))
}

#[derive(Deserialize)]
struct TaskStatusUpdate {
    status: TaskStatus,
}

async fn update_task(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    body: Result<Json<TaskStatusUpdate>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(update) = body?;
    Ok(ok(state.update_task(&id, update.status)?))
}

// ── Changes ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ChangeFilter {
    status: Option<String>,
}

async fn list_changes(
    State(state): State<SharedState>,
    Query(filter): Query<ChangeFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let status = filter
        .status
        .as_deref()
        .map(str::parse::<ChangeStatus>)
        .transpose()?;
    Ok(ok(state.list_changes(status)?))
}

#[derive(Deserialize)]
struct RecordChangeRequest {
    #[serde(flatten)]
    change: NewChange,
    #[serde(default)]
    apply: bool,
}

async fn record_change(
    State(state): State<SharedState>,
    body: Result<Json<RecordChangeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body?;
    Ok(ok(state.record_change(request.change, request.apply).await?))
}

async fn get_change(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(ok(state.get_change(&id)?))
}

async fn verify_change(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(ok(state.verify_change(&id).await?))
}

/// The body is taken raw so the gate sees the declared content type and
/// reports field problems itself.
async fn apply_patch(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    Ok(ok(state.submit_patch(content_type, &body).await?))
}

// ── Checkers ──────────────────────────────────────────────────────

async fn run_check(
    state: &AppState,
    kind: CheckKind,
    body: Result<Json<CheckPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = body?;
    Ok(ok(state.run_check(kind, &payload).await?))
}

async fn lint(
    State(state): State<SharedState>,
    body: Result<Json<CheckPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    run_check(&state, CheckKind::Syntax, body).await
}

async fn test_cases(
    State(state): State<SharedState>,
    body: Result<Json<CheckPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    run_check(&state, CheckKind::EdgeCase, body).await
}

async fn regression_check(
    State(state): State<SharedState>,
    body: Result<Json<CheckPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    run_check(&state, CheckKind::Regression, body).await
}

// ── Filesystem and git ────────────────────────────────────────────

async fn filesystem(
    State(state): State<SharedState>,
    body: Result<Json<FsOperation>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(op) = body?;
    Ok(ok(state.filesystem(op).await?))
}

#[derive(Deserialize)]
struct GitRequest {
    command: String,
    #[serde(default)]
    args: Vec<String>,
}

async fn git(
    State(state): State<SharedState>,
    body: Result<Json<GitRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body?;
    Ok(ok(state.git(request.command, request.args).await?))
}

// ── Status and push channel ───────────────────────────────────────

async fn status(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    Ok(ok(state.status()?))
}

async fn events(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut subscription = state.subscribe();
    let stream = async_stream::stream! {
        while let Some(message) = subscription.recv().await {
            match Event::default().event(message.event_type()).json_data(&message) {
                Ok(event) => yield Ok(event),
                Err(e) => tracing::warn!(event = message.event_type(), error = %e, "push message not encodable"),
            }
        }
    };
    Sse::new(stream)
}
