//! Telegram mini-app identity extractor.
//!
//! Reads the raw init data from the `X-Telegram-Init-Data` header and
//! verifies its signature against the bot token.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::http::error::AppError;
use crate::state::AppState;

pub const INIT_DATA_HEADER: &str = "x-telegram-init-data";

/// The verified Telegram user behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelegramUser {
    pub user_id: i64,
}

impl FromRequestParts<AppState> for TelegramUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let init_data = parts
            .headers
            .get(INIT_DATA_HEADER)
            .ok_or_else(|| AppError::Unauthorized("Missing init data".to_string()))?
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid init data header encoding".to_string()))?;

        if init_data.is_empty() {
            return Err(AppError::Unauthorized("Missing init data".to_string()));
        }

        let verifier = state
            .verifier
            .as_ref()
            .ok_or_else(|| AppError::Unauthorized("Init data verification is not configured".to_string()))?;

        let user = verifier.verify(init_data).map_err(|e| {
            tracing::debug!(error = %e, "rejected init data");
            AppError::from(e)
        })?;

        Ok(TelegramUser { user_id: user.id })
    }
}
