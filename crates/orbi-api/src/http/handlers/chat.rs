//! Chat session control.
//!
//! Endpoints:
//! - POST /api/chat/new - Deactivate the caller's sessions

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde_json::{Value, json};

use orbi_core::chat::repository::MessageStore;

use crate::http::error::AppError;
use crate::http::extractors::auth::TelegramUser;
use crate::state::AppState;

/// POST /api/chat/new
///
/// Leaves the caller with no active session; the next question opens one.
pub async fn new_chat(
    State(state): State<AppState>,
    user: TelegramUser,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let deactivated = state.store.deactivate_sessions(user.user_id).await?;
    tracing::info!(user_id = user.user_id, deactivated, "chat reset from web app");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "New chat created successfully" })),
    ))
}
