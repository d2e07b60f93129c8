//! Board message handlers.
//!
//! Reads are served from the live cache; writes go straight to the store as
//! the caller and show up in the cache with the next snapshot.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Serialize;

use corkboard_types::event::SyncState;
use corkboard_types::message::{Message, MessageInput};

use crate::http::error::AppError;
use crate::http::extractors::auth::CurrentUser;
use crate::http::extractors::query::MessageListQuery;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct MessageList {
    pub messages: Vec<Message>,
    pub sync_state: SyncState,
    /// Snapshots applied to the cache so far.
    pub applied: u64,
}

/// GET /api/v1/messages - Current ordered message list (newest first).
pub async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<MessageListQuery>,
) -> Result<Json<ApiResponse<MessageList>>, AppError> {
    let timer = RequestTimer::start();
    let view = state.board.watch_messages().borrow().clone();

    let messages: Vec<Message> = view
        .messages
        .iter()
        .filter(|m| query.author.as_deref().is_none_or(|a| m.author_id.as_str() == a))
        .take(query.limit.unwrap_or(usize::MAX))
        .cloned()
        .collect();

    let resp = timer
        .success(MessageList {
            messages,
            sync_state: state.board.state(),
            applied: view.applied,
        })
        .with_link("self", "/api/v1/messages")
        .with_link("live", "/api/v1/ws/messages");
    Ok(Json(resp))
}

/// POST /api/v1/messages - Post a message as the caller.
pub async fn create_message(
    State(state): State<AppState>,
    caller: CurrentUser,
    Json(body): Json<MessageInput>,
) -> Result<(StatusCode, Json<ApiResponse<serde_json::Value>>), AppError> {
    let timer = RequestTimer::start();
    let principal = &caller.user.id;
    let author_name = caller.display_name(&state).await?;

    let id = state
        .writer_for(principal)
        .create(&body, principal, &author_name)
        .await?;

    let resp = timer
        .success(serde_json::json!({ "id": id }))
        .with_link("self", &format!("/api/v1/messages/{id}"));
    Ok((StatusCode::CREATED, Json(resp)))
}

/// PUT /api/v1/messages/{id} - Replace title and content. Author only.
pub async fn update_message(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<MessageInput>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let timer = RequestTimer::start();
    state.writer_for(&caller.user.id).update(&id, &body).await?;
    Ok(Json(timer.success(serde_json::json!({ "id": id, "updated": true }))))
}

/// DELETE /api/v1/messages/{id} - Delete a message. Author only.
pub async fn delete_message(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let timer = RequestTimer::start();
    state.writer_for(&caller.user.id).delete(&id).await?;
    Ok(Json(timer.success(serde_json::json!({ "id": id, "deleted": true }))))
}
