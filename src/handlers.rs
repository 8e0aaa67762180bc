use crate::analytics::{AnalyticsSnapshot, analytics_snapshot, daily_completions, date_key_of};
use crate::chat::UNAVAILABLE_REPLY;
use crate::errors::AppError;
use crate::models::{
    ChatReply, ChatRequest, CreateTaskRequest, DayCompletion, HealthResponse, JournalEntry,
    JournalRequest, Settings, SettingsRequest, Task, UpdateTaskRequest,
};
use crate::state::AppState;
use crate::storage::{is_reachable, persist_data};
use crate::ui::render_index;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::Html,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub goal: Option<String>,
}

pub async fn index(State(state): State<AppState>) -> Html<String> {
    let now = Utc::now();
    let data = state.data.lock().await;
    let tasks = data.list_tasks();
    let snapshot = analytics_snapshot(&tasks, data.settings.daily_goal, now);
    let entry = data.journal_entry(&date_key_of(now));
    Html(render_index(now, &snapshot, &tasks, entry))
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    if is_reachable(&state.data_path).await {
        (
            StatusCode::OK,
            Json(HealthResponse {
                ok: true,
                db: Some(true),
                error: None,
            }),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(HealthResponse {
                ok: false,
                db: None,
                error: Some("db not reachable".to_string()),
            }),
        )
    }
}

pub async fn list_tasks(State(state): State<AppState>) -> Json<Vec<Task>> {
    let data = state.data.lock().await;
    Json(data.list_tasks())
}

pub async fn create_task(
    State(state): State<AppState>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    let Json(payload) = payload?;
    let mut data = state.data.lock().await;
    let task = data.create_task(payload, Utc::now())?;
    persist_data(&state.data_path, &data).await?;

    info!(id = task.id, source = %task.source, "task created");
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> Result<Json<Task>, AppError> {
    let Json(payload) = payload?;
    let mut data = state.data.lock().await;
    let task = data.update_task(id, payload)?;
    persist_data(&state.data_path, &data).await?;
    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, AppError> {
    let mut data = state.data.lock().await;
    if data.delete_task(id) {
        persist_data(&state.data_path, &data).await?;
        info!(id, "task deleted");
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn weekly_tasks(State(state): State<AppState>) -> Json<Vec<DayCompletion>> {
    let data = state.data.lock().await;
    Json(daily_completions(&data.tasks, Utc::now()))
}

pub async fn save_journal(
    State(state): State<AppState>,
    payload: Result<Json<JournalRequest>, JsonRejection>,
) -> Result<Json<JournalEntry>, AppError> {
    let Json(payload) = payload?;
    let mut data = state.data.lock().await;
    let entry = data.upsert_journal(payload, Utc::now())?;
    persist_data(&state.data_path, &data).await?;
    Ok(Json(entry))
}

pub async fn get_journal(
    State(state): State<AppState>,
    Path(date_key): Path<String>,
) -> Result<Json<JournalEntry>, AppError> {
    let data = state.data.lock().await;
    data.journal_entry(&date_key)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("no journal entry for {date_key}")))
}

pub async fn list_journal(State(state): State<AppState>) -> Json<Vec<JournalEntry>> {
    let data = state.data.lock().await;
    Json(data.journal.values().cloned().collect())
}

pub async fn get_settings(State(state): State<AppState>) -> Json<Settings> {
    let data = state.data.lock().await;
    Json(data.settings.clone())
}

pub async fn put_settings(
    State(state): State<AppState>,
    payload: Result<Json<SettingsRequest>, JsonRejection>,
) -> Result<Json<Settings>, AppError> {
    let Json(payload) = payload?;
    let mut data = state.data.lock().await;
    data.set_daily_goal(payload.daily_goal);
    persist_data(&state.data_path, &data).await?;
    Ok(Json(data.settings.clone()))
}

pub async fn get_analytics(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Json<AnalyticsSnapshot> {
    let data = state.data.lock().await;
    let goal = query
        .goal
        .as_deref()
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .unwrap_or(data.settings.daily_goal);
    Json(analytics_snapshot(&data.tasks, goal, Utc::now()))
}

pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, AppError> {
    let Json(payload) = payload?;
    match state.chat.reply(&payload.messages).await {
        Ok(reply) => Ok(Json(ChatReply { reply })),
        Err(err) => {
            error!("chat proxy failed: {err}");
            Err(AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "chat server error".to_string(),
                reply: None,
            }
            .with_reply(UNAVAILABLE_REPLY))
        }
    }
}
