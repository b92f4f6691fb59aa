//! Message body HTTP handlers.
//!
//! Endpoints:
//! - GET /api/messages/{hash} - One body by its short hash (public)
//! - GET /api/messages        - One body per session of the caller

use axum::Json;
use axum::extract::{Path, State};

use orbi_core::chat::repository::MessageStore;
use orbi_types::message::{MessageBody, is_valid_hash};

use crate::http::error::AppError;
use crate::http::extractors::auth::TelegramUser;
use crate::state::AppState;

fn not_found() -> AppError {
    AppError::NotFound {
        error: "Message not found".to_string(),
        details: "The requested message does not exist or has been removed".to_string(),
    }
}

/// GET /api/messages/{hash}
pub async fn get_message(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<Json<MessageBody>, AppError> {
    if !is_valid_hash(&hash) {
        return Err(not_found());
    }

    match state.store.get_body(&hash).await? {
        Some(body) => Ok(Json(body)),
        None => Err(not_found()),
    }
}

/// GET /api/messages
pub async fn list_messages(
    State(state): State<AppState>,
    user: TelegramUser,
) -> Result<Json<Vec<MessageBody>>, AppError> {
    let bodies = state
        .store
        .list_first_user_message_per_session(user.user_id)
        .await?;
    Ok(Json(bodies))
}
