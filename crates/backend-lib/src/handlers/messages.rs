// ============================
// crates/backend-lib/src/handlers/messages.rs
// ============================
//! Conversation history and out-of-band message posting.
use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chatter_common::{Message, SendMessage};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub user1: Option<String>,
    pub user2: Option<String>,
}

fn required(value: Option<String>, name: &str) -> Result<String, AppError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::InvalidInput(format!("Missing query parameter: {name}"))),
    }
}

/// `GET /messages?user1=&user2=`: both directions, oldest first
pub async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<Message>>, AppError> {
    let user1 = required(query.user1, "user1")?;
    let user2 = required(query.user2, "user2")?;
    let history = state.hub.history(&user1, &user2).await?;
    Ok(Json(history))
}

/// `POST /messages`: persist only. Connected clients are not notified.
pub async fn post_message(
    State(state): State<AppState>,
    Json(payload): Json<SendMessage>,
) -> Result<(StatusCode, Json<Message>), AppError> {
    let stored = state.hub.post_message(payload).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}
