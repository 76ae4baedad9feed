// ============================
// crates/backend-lib/src/handlers/users.rs
// ============================
use crate::error::AppError;
use crate::AppState;
use axum::{extract::State, Json};
use chatter_common::UserSummary;

/// `GET /users`: contact list with avatars
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserSummary>>, AppError> {
    let users = state.users.list_users().await?;
    tracing::debug!("Listing {} users", users.len());
    Ok(Json(users))
}
