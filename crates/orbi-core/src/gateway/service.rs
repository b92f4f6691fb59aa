//! ConversationGateway -- session-aware, retry-wrapped access to a generation backend.

use std::sync::Arc;
use std::time::Duration;

use orbi_types::chat::{ChatSession, SessionMessage};
use orbi_types::llm::{LlmError, Turn};
use tracing::Instrument;

use super::assistant::{AskError, Assistant, Exchange};
use super::retry::RetryPolicy;
use crate::chat::repository::MessageStore;
use crate::llm::GenerationBackend;

/// Answers questions in the context of each user's active session.
///
/// A single attempt reads history, calls the backend under `call_timeout`,
/// and only then persists the question and answer together through
/// `MessageStore::record_exchange`. A failed attempt therefore leaves no
/// writes behind and a retry never duplicates the question.
pub struct ConversationGateway<S, B> {
    store: Arc<S>,
    backend: Arc<B>,
    policy: RetryPolicy,
    call_timeout: Duration,
}

impl<S: MessageStore, B: GenerationBackend> ConversationGateway<S, B> {
    pub fn new(store: Arc<S>, backend: Arc<B>, policy: RetryPolicy, call_timeout: Duration) -> Self {
        Self {
            store,
            backend,
            policy,
            call_timeout,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// The user's active session, created lazily on first contact.
    pub async fn active_session(&self, user_id: i64) -> Result<ChatSession, AskError> {
        if let Some(session) = self.store.get_active_session(user_id).await? {
            return Ok(session);
        }
        let session = self.store.create_session(user_id).await?;
        tracing::info!(user_id, session_id = session.id, "created chat session");
        Ok(session)
    }

    /// One attempt: resolve session, read history, generate, persist.
    pub async fn ask(&self, user_id: i64, question: &str) -> Result<Exchange, AskError> {
        let session = self.active_session(user_id).await?;
        let history: Vec<Turn> = self
            .store
            .list_messages(session.id)
            .await?
            .iter()
            .map(SessionMessage::to_turn)
            .collect();

        let span = tracing::info_span!(
            "gen_ai.chat",
            gen_ai.operation.name = "chat",
            gen_ai.provider.name = self.backend.name(),
            gen_ai.request.model = self.backend.model(),
            user_id,
            session_id = session.id,
            history_len = history.len(),
        );

        let answer = tokio::time::timeout(self.call_timeout, self.backend.generate(&history, question))
            .instrument(span)
            .await
            .map_err(|_| LlmError::Timeout(self.call_timeout.as_secs()))??;

        let hash = self
            .store
            .record_exchange(session.id, question, &answer)
            .await?;

        tracing::debug!(user_id, session_id = session.id, %hash, "stored exchange");

        Ok(Exchange {
            session_id: session.id,
            answer,
            hash,
        })
    }
}

impl<S: MessageStore, B: GenerationBackend> Assistant for ConversationGateway<S, B> {
    async fn ask_with_retry(&self, user_id: i64, question: &str) -> Result<Exchange, AskError> {
        let mut attempt = 1;
        loop {
            match self.ask(user_id, question).await {
                Ok(exchange) => return Ok(exchange),
                Err(e) if self.policy.should_retry(attempt, &e) => {
                    tracing::warn!(
                        user_id,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        error = %e,
                        "generation attempt failed, retrying"
                    );
                    tokio::time::sleep(self.policy.delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(user_id, attempt, error = %e, "generation failed");
                    return Err(AskError::Exhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
            }
        }
    }

    async fn new_session(&self, user_id: i64) -> Result<ChatSession, AskError> {
        let session = self.store.create_session(user_id).await?;
        tracing::info!(user_id, session_id = session.id, "started new chat session");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryStore, ScriptedBackend};
    use orbi_types::chat::MessageRole;
    use tokio::time::Instant;

    fn gateway(
        backend: ScriptedBackend,
        max_attempts: u32,
    ) -> (
        ConversationGateway<InMemoryStore, ScriptedBackend>,
        Arc<InMemoryStore>,
        Arc<ScriptedBackend>,
    ) {
        let store = Arc::new(InMemoryStore::new());
        let backend = Arc::new(backend);
        let gw = ConversationGateway::new(
            store.clone(),
            backend.clone(),
            RetryPolicy::new(max_attempts, Duration::from_secs(2)),
            Duration::from_secs(30),
        );
        (gw, store, backend)
    }

    #[tokio::test]
    async fn test_new_user_hello_creates_session_and_records_exchange() {
        let (gw, store, backend) = gateway(ScriptedBackend::answering("Hi there"), 3);
        assert!(store.get_active_session(7).await.unwrap().is_none());

        let exchange = gw.ask_with_retry(7, "hello").await.unwrap();
        assert_eq!(exchange.answer, "Hi there");

        let active = store.active_sessions(7);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, exchange.session_id);

        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0.is_empty(), "first question sees empty history");
        assert_eq!(calls[0].1, "hello");

        let messages = store.list_messages(exchange.session_id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[0].content, "hello");
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(messages[1].hash.as_deref(), Some(exchange.hash.as_str()));

        let body = store.get_body(&exchange.hash).await.unwrap().unwrap();
        assert_eq!(body.content, "Hi there");
    }

    #[tokio::test]
    async fn test_second_question_sees_history_in_order() {
        let (gw, _store, backend) = gateway(ScriptedBackend::answering("ok"), 3);
        gw.ask_with_retry(7, "first").await.unwrap();
        gw.ask_with_retry(7, "second").await.unwrap();

        let calls = backend.calls();
        assert_eq!(calls[1].0, vec![Turn::user("first"), Turn::assistant("ok")]);
        assert_eq!(calls[1].1, "second");
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_backend_makes_exactly_n_attempts() {
        let (gw, store, backend) = gateway(ScriptedBackend::failing(), 3);
        let start = Instant::now();

        let err = gw.ask_with_retry(7, "hello").await.unwrap_err();

        assert_eq!(backend.call_count(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(4));
        match &err {
            AskError::Exhausted { attempts, last } => {
                assert_eq!(*attempts, 3);
                assert!(matches!(**last, AskError::Backend(LlmError::Provider { .. })));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
        assert!(store.all_messages().is_empty(), "failed attempts leave no writes");
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failure_without_duplicate_question() {
        let backend = ScriptedBackend::answering("fine")
            .then(Err(LlmError::RateLimited { retry_after_ms: None }));
        let (gw, store, backend) = gateway(backend, 3);

        let exchange = gw.ask_with_retry(7, "hello").await.unwrap();

        assert_eq!(backend.call_count(), 2);
        let messages = store.list_messages(exchange.session_id).await.unwrap();
        let questions = messages.iter().filter(|m| m.role == MessageRole::User).count();
        assert_eq!(questions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_storage_failure_is_retried() {
        let (gw, store, backend) = gateway(ScriptedBackend::answering("fine"), 3);
        store.fail_next_records(1);

        gw.ask_with_retry(7, "hello").await.unwrap();

        assert_eq!(backend.call_count(), 2);
        assert_eq!(store.all_messages().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_authentication_failure_is_not_retried() {
        let backend = ScriptedBackend::with_fallback(|| Err(LlmError::AuthenticationFailed));
        let (gw, _store, backend) = gateway(backend, 3);

        let err = gw.ask_with_retry(7, "hello").await.unwrap_err();

        assert_eq!(backend.call_count(), 1);
        assert!(matches!(err, AskError::Exhausted { attempts: 1, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_backend_times_out() {
        let backend = ScriptedBackend::answering("late").with_delay(Duration::from_secs(60));
        let store = Arc::new(InMemoryStore::new());
        let gw = ConversationGateway::new(
            store,
            Arc::new(backend),
            RetryPolicy::new(1, Duration::ZERO),
            Duration::from_secs(30),
        );

        let err = gw.ask(7, "hello").await.unwrap_err();
        assert!(matches!(err, AskError::Backend(LlmError::Timeout(30))));
    }

    #[tokio::test]
    async fn test_new_session_twice_leaves_one_active() {
        let (gw, store, _backend) = gateway(ScriptedBackend::answering("ok"), 3);
        let _first = gw.new_session(7).await.unwrap();
        let second = gw.new_session(7).await.unwrap();

        let active = store.active_sessions(7);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, second.id);
    }
}
