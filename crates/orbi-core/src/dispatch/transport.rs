//! ChatTransport trait definition.
//!
//! The update source and reply sink of the relay. The Telegram Bot API
//! client in orbi-infra implements it; dispatcher tests use a recording mock.

use orbi_types::error::TransportError;
use orbi_types::transport::{ChatAction, OutgoingMessage, Update, User};

/// Long-poll update source plus reply sink.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait ChatTransport: Send + Sync {
    /// The bot's own account, used for mention filtering and deep links.
    fn get_me(&self) -> impl std::future::Future<Output = Result<User, TransportError>> + Send;

    /// Fetch updates with `update_id >= offset`, waiting up to `timeout_secs`.
    fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> impl std::future::Future<Output = Result<Vec<Update>, TransportError>> + Send;

    fn send_message(
        &self,
        message: &OutgoingMessage,
    ) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;

    fn send_chat_action(
        &self,
        chat_id: i64,
        action: ChatAction,
    ) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;
}
