//! MessageStore trait definition.
//!
//! Provides storage for content-addressed message bodies, per-user chat
//! sessions and the ordered messages inside them. Uses RPITIT like every
//! other port in this crate.

use std::time::Duration;

use orbi_types::chat::{ChatSession, MessageRole, SessionMessage};
use orbi_types::error::RepositoryError;
use orbi_types::message::MessageBody;

/// Repository trait for message bodies and chat sessions.
///
/// Implementations live in orbi-infra (e.g., `SqliteMessageStore`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
///
/// Every multi-statement mutation is a single transaction: it either
/// commits fully or leaves no trace.
pub trait MessageStore: Send + Sync {
    /// Insert an immutable body and return its 8-character hash.
    ///
    /// Hash collisions are retried internally with a fresh instant.
    fn create_body(
        &self,
        content: &str,
    ) -> impl std::future::Future<Output = Result<String, RepositoryError>> + Send;

    /// Look up a body by hash. A swept or unknown hash yields `None`.
    fn get_body(
        &self,
        hash: &str,
    ) -> impl std::future::Future<Output = Result<Option<MessageBody>, RepositoryError>> + Send;

    /// The user's active session, if any.
    fn get_active_session(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<ChatSession>, RepositoryError>> + Send;

    /// Deactivate all of the user's sessions and create a new active one.
    fn create_session(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<ChatSession, RepositoryError>> + Send;

    /// Deactivate all of the user's sessions without replacement.
    ///
    /// Returns the number of sessions that were active.
    fn deactivate_sessions(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Append one message to a session.
    ///
    /// A `user` message also refreshes the session's preview text. Returns
    /// `RepositoryError::NotFound` if the session does not exist.
    fn append_message(
        &self,
        session_id: i64,
        role: MessageRole,
        content: &str,
        hash: Option<&str>,
    ) -> impl std::future::Future<Output = Result<SessionMessage, RepositoryError>> + Send;

    /// Persist a completed question/answer pair atomically.
    ///
    /// Inserts the answer body, the `user` message and the `assistant`
    /// message referencing the body. Returns the body hash.
    fn record_exchange(
        &self,
        session_id: i64,
        question: &str,
        answer: &str,
    ) -> impl std::future::Future<Output = Result<String, RepositoryError>> + Send;

    /// Messages of a session in conversation order (created_at ASC).
    fn list_messages(
        &self,
        session_id: i64,
    ) -> impl std::future::Future<Output = Result<Vec<SessionMessage>, RepositoryError>> + Send;

    /// All sessions of a user, most recently updated first.
    fn list_sessions_for_user(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<Vec<ChatSession>, RepositoryError>> + Send;

    /// One representative body per session of the user, newest first.
    ///
    /// The representative is the answer to the session's first question.
    /// Sessions whose representative body was swept are omitted.
    fn list_first_user_message_per_session(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<Vec<MessageBody>, RepositoryError>> + Send;

    /// Delete bodies created more than `age` ago. Returns the count removed.
    ///
    /// Session messages referencing a deleted body keep their (now dangling) hash.
    fn purge_bodies_older_than(
        &self,
        age: Duration,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
