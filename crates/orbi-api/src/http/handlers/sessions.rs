//! GET /api/sessions - The caller's sessions, most recently updated first.

use axum::Json;
use axum::extract::State;

use orbi_core::chat::repository::MessageStore;
use orbi_types::chat::ChatSession;

use crate::http::error::AppError;
use crate::http::extractors::auth::TelegramUser;
use crate::state::AppState;

pub async fn list_sessions(
    State(state): State<AppState>,
    user: TelegramUser,
) -> Result<Json<Vec<ChatSession>>, AppError> {
    Ok(Json(state.store.list_sessions_for_user(user.user_id).await?))
}
