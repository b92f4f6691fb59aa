//! UpdateDispatcher -- long-poll loop with one task per update.
//!
//! The loop owns the polling cursor: each batch advances it to
//! `last update_id + 1` whatever happens to the individual updates. Every
//! update is handled on its own tokio task, bounded by a semaphore. Errors
//! and panics inside a task are turned into a generic reply to the user and
//! never reach the loop.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use orbi_types::error::{RepositoryError, TransportError};
use orbi_types::transport::{ChatAction, IncomingMessage, Update};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::keepalive::TypingKeepalive;
use super::reply::{Command, NEW_CHAT_CONFIRMATION, ReplyFormatter};
use super::transport::ChatTransport;
use crate::chat::repository::MessageStore;
use crate::gateway::{AskError, Assistant};

/// Tunables for the dispatch loop.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Long-poll wait handed to the transport.
    pub poll_timeout_secs: u64,
    /// Pause after a failed poll.
    pub poll_backoff: Duration,
    pub keepalive_interval: Duration,
    pub max_concurrent_updates: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            poll_timeout_secs: 60,
            poll_backoff: Duration::from_secs(5),
            keepalive_interval: Duration::from_secs(4),
            max_concurrent_updates: 64,
        }
    }
}

/// Errors from handling a single update.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Ask(#[from] AskError),

    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),

    #[error("message '{0}' not found")]
    BodyNotFound(String),
}

/// Result of one poll: the next cursor and the tasks spawned for the batch.
pub struct Poll {
    pub next_offset: i64,
    pub tasks: Vec<JoinHandle<()>>,
}

/// Pulls updates from a `ChatTransport` and handles each one concurrently.
pub struct UpdateDispatcher<T, A, S> {
    handler: Arc<UpdateHandler<T, A, S>>,
    settings: DispatchSettings,
    permits: Arc<Semaphore>,
}

impl<T, A, S> UpdateDispatcher<T, A, S>
where
    T: ChatTransport + 'static,
    A: Assistant + 'static,
    S: MessageStore + 'static,
{
    pub fn new(
        transport: Arc<T>,
        assistant: Arc<A>,
        store: Arc<S>,
        replies: ReplyFormatter,
        settings: DispatchSettings,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_concurrent_updates.max(1)));
        Self {
            handler: Arc::new(UpdateHandler {
                transport,
                assistant,
                store,
                replies,
                keepalive_interval: settings.keepalive_interval,
            }),
            settings,
            permits,
        }
    }

    /// Fetch one batch starting at `offset` and spawn a task per update.
    pub async fn poll_once(&self, offset: i64) -> Result<Poll, TransportError> {
        let updates = self
            .handler
            .transport
            .get_updates(offset, self.settings.poll_timeout_secs)
            .await?;

        let next_offset = updates
            .iter()
            .map(|u| u.update_id + 1)
            .fold(offset, i64::max);

        let mut tasks = Vec::with_capacity(updates.len());
        for update in updates {
            let Ok(permit) = self.permits.clone().acquire_owned().await else {
                tracing::error!(update_id = update.update_id, "update semaphore closed");
                break;
            };
            let handler = self.handler.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                handler.dispatch(update).await;
            }));
        }

        Ok(Poll { next_offset, tasks })
    }

    /// Poll until `cancel` fires. In-flight update tasks are not awaited.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            bot = %self.handler.replies.bot_username(),
            max_concurrent = self.settings.max_concurrent_updates,
            "update dispatcher started"
        );

        let mut offset = 0;
        loop {
            let polled = tokio::select! {
                _ = cancel.cancelled() => break,
                polled = self.poll_once(offset) => polled,
            };

            match polled {
                Ok(poll) => offset = poll.next_offset,
                Err(e) => {
                    tracing::warn!(error = %e, offset, "failed to fetch updates");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.settings.poll_backoff) => {}
                    }
                }
            }
        }

        tracing::info!(offset, "update dispatcher stopped");
    }
}

/// Per-update logic shared by all spawned tasks.
struct UpdateHandler<T, A, S> {
    transport: Arc<T>,
    assistant: Arc<A>,
    store: Arc<S>,
    replies: ReplyFormatter,
    keepalive_interval: Duration,
}

impl<T, A, S> UpdateHandler<T, A, S>
where
    T: ChatTransport + 'static,
    A: Assistant + 'static,
    S: MessageStore + 'static,
{
    /// Task boundary: nothing escapes from here.
    async fn dispatch(&self, update: Update) {
        let update_id = update.update_id;
        let Some(message) = update.message else {
            return;
        };

        let outcome = AssertUnwindSafe(self.handle(&message)).catch_unwind().await;
        let failed = match outcome {
            Ok(Ok(())) => false,
            Ok(Err(e)) => {
                tracing::error!(update_id, chat_id = message.chat.id, error = %e, "failed to handle update");
                true
            }
            Err(_) => {
                tracing::error!(update_id, chat_id = message.chat.id, "update handler panicked");
                true
            }
        };

        if failed {
            let reply = self.replies.failure(message.chat.id, Some(message.message_id));
            if let Err(e) = self.transport.send_message(&reply).await {
                tracing::warn!(update_id, error = %e, "failed to send failure reply");
            }
        }
    }

    async fn handle(&self, message: &IncomingMessage) -> Result<(), DispatchError> {
        let (Some(text), Some(from)) = (message.text.as_deref(), message.from.as_ref()) else {
            return Ok(());
        };

        match Command::parse(text, self.replies.bot_username()) {
            Command::OpenMessage(hash) => self.open_message(message, hash).await,
            Command::Start => {
                if let Err(e) = self.transport.send_message(&self.replies.welcome(message)).await {
                    tracing::warn!(chat_id = message.chat.id, error = %e, "failed to send welcome");
                }
                Ok(())
            }
            _ if !self.replies.is_addressed(message, text) => Ok(()),
            Command::NewChat => self.new_chat(message, from.id).await,
            Command::Text(_) => {
                let question = self.replies.extract_question(message, text);
                if question.is_empty() {
                    return Ok(());
                }
                self.answer(message, from.id, &question).await
            }
        }
    }

    async fn open_message(&self, message: &IncomingMessage, hash: &str) -> Result<(), DispatchError> {
        let body = self
            .store
            .get_body(hash)
            .await?
            .ok_or_else(|| DispatchError::BodyNotFound(hash.to_string()))?;
        self.transport
            .send_message(&self.replies.found_body(message.chat.id, &body))
            .await?;
        Ok(())
    }

    async fn new_chat(&self, message: &IncomingMessage, user_id: i64) -> Result<(), DispatchError> {
        self.assistant.new_session(user_id).await?;
        let hash = self.store.create_body(NEW_CHAT_CONFIRMATION).await?;
        self.transport
            .send_message(&self.replies.answer(message, NEW_CHAT_CONFIRMATION, &hash))
            .await?;
        Ok(())
    }

    async fn answer(&self, message: &IncomingMessage, user_id: i64, question: &str) -> Result<(), DispatchError> {
        let chat_id = message.chat.id;
        let keepalive = TypingKeepalive::start(self.transport.clone(), chat_id, self.keepalive_interval);
        if let Err(e) = self.transport.send_chat_action(chat_id, ChatAction::Typing).await {
            tracing::debug!(chat_id, error = %e, "failed to send typing indicator");
        }

        let result = self.assistant.ask_with_retry(user_id, question).await;
        keepalive.stop().await;
        let exchange = result?;

        self.transport
            .send_message(&self.replies.answer(message, &exchange.answer, &exchange.hash))
            .await?;
        tracing::info!(user_id, chat_id, hash = %exchange.hash, "answered question");
        Ok(())
    }
}
