//! Chat session and session message types for Orbi.
//!
//! A user has any number of sessions but at most one active one. Messages in
//! a session are ordered by `created_at` and form the history handed to the
//! generation backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Re-export MessageRole from llm module (it's used in both chat and llm contexts).
pub use crate::llm::MessageRole;

use crate::llm::Turn;

/// Maximum characters kept in `ChatSession::preview_text` before the ellipsis.
pub const PREVIEW_TEXT_LEN: usize = 50;

/// A per-user conversation.
///
/// Sessions are deactivated, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: i64,
    pub user_id: i64,
    pub is_active: bool,
    pub preview_text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single message within a chat session.
///
/// Assistant messages carry the hash of the `MessageBody` holding the same
/// content; user messages have no hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMessage {
    pub id: i64,
    pub session_id: i64,
    pub role: MessageRole,
    pub content: String,
    pub hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SessionMessage {
    pub fn to_turn(&self) -> Turn {
        Turn {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// Truncate an inbound message for display in the session list.
pub fn preview_text(content: &str) -> String {
    if content.chars().count() <= PREVIEW_TEXT_LEN {
        return content.to_string();
    }
    let cut: String = content.chars().take(PREVIEW_TEXT_LEN).collect();
    format!("{cut}...")
}
