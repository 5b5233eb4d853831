use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use recap_api::v1::{
    HealthResponse, MessageResponse, NewTodo, SendSummary, SummaryResponse, Todo, TodoPatch,
};
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    notify,
    store::TodoFilter,
    summary, AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/todos", get(get_todos).post(add_todo))
        .route(
            "/todos/:id",
            get(get_todo).patch(update_todo).delete(delete_todo),
        )
        .route("/summary", get(get_summary))
        .route("/slack/send-summary", post(send_summary))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: String::from("ok"),
    })
}

/// Ids that do not parse cannot name a stored todo, so they are reported as unknown.
fn parse_id(id: &str) -> AppResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| AppError::NotFound(String::from("Todo not found")))
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::validation(rejection.body_text()))
}

async fn get_todos(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<Todo>>> {
    let todos = state.store.list(TodoFilter::all(), None).await?;
    Ok(Json(todos))
}

async fn get_todo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<Todo>> {
    let todo = state.store.get(parse_id(&id)?).await?;
    Ok(Json(todo))
}

async fn add_todo(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewTodo>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Todo>)> {
    let new = json_body(payload)?;
    if new.title.trim().is_empty() {
        return Err(AppError::validation("Title is required"));
    }

    let todo = state.store.insert(new).await?;

    info!(
        id = %todo.id,
        title = %todo.title,
        priority = %todo.priority,
        "created todo"
    );

    Ok((StatusCode::CREATED, Json(todo)))
}

async fn update_todo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<TodoPatch>, JsonRejection>,
) -> AppResult<Json<Todo>> {
    let id = parse_id(&id)?;
    let patch = json_body(payload)?;
    if patch.title.as_deref().is_some_and(|title| title.trim().is_empty()) {
        return Err(AppError::validation("Title cannot be empty"));
    }

    let todo = state.store.update(id, patch).await?;

    info!(
        id = %todo.id,
        completed = todo.completed,
        "updated todo"
    );

    Ok(Json(todo))
}

async fn delete_todo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id = parse_id(&id)?;
    state.store.delete(id).await?;

    info!(id = %id, "deleted todo");

    Ok(StatusCode::NO_CONTENT)
}

async fn get_summary(State(state): State<Arc<AppState>>) -> AppResult<Json<SummaryResponse>> {
    let summary = summary::summarize(state.store.as_ref(), state.generator.as_ref()).await?;
    Ok(Json(SummaryResponse { summary }))
}

async fn send_summary(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SendSummary>, JsonRejection>,
) -> AppResult<Json<MessageResponse>> {
    let body = json_body(payload)?;

    notify::send_summary(
        state.store.as_ref(),
        state.webhook.as_ref(),
        body.summary.as_deref(),
    )
    .await?;

    Ok(Json(MessageResponse {
        message: String::from("Summary sent to Slack successfully"),
    }))
}
