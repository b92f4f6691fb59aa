//! Content-addressed message bodies.
//!
//! A `MessageBody` is an immutable answer (or confirmation) stored under a
//! short hash so the web surface can fetch it independently of its session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of hex characters in a message hash.
pub const HASH_LEN: usize = 8;

/// An immutable, independently addressable message body.
///
/// Serialized in camelCase for the web front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBody {
    pub hash: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Returns true if `s` has the shape of a message hash (8 lowercase hex chars).
pub fn is_valid_hash(s: &str) -> bool {
    s.len() == HASH_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
