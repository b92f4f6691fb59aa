//! In-memory doubles for the ports, shared by this crate's unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use orbi_types::chat::{ChatSession, MessageRole, SessionMessage, preview_text};
use orbi_types::error::{RepositoryError, TransportError};
use orbi_types::llm::{LlmError, Turn};
use orbi_types::message::MessageBody;
use orbi_types::transport::{ChatAction, OutgoingMessage, Update, User};

use crate::chat::repository::MessageStore;
use crate::dispatch::transport::ChatTransport;
use crate::llm::GenerationBackend;

// --- Store ---

#[derive(Default)]
struct StoreState {
    bodies: Vec<MessageBody>,
    sessions: Vec<ChatSession>,
    messages: Vec<SessionMessage>,
    next_id: i64,
}

impl StoreState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn insert_body(&mut self, content: &str) -> String {
        let hash = format!("{:08x}", self.bodies.len() + 1);
        self.bodies.push(MessageBody {
            hash: hash.clone(),
            content: content.to_string(),
            created_at: Utc::now(),
        });
        hash
    }

    fn push_message(
        &mut self,
        session_id: i64,
        role: MessageRole,
        content: &str,
        hash: Option<&str>,
    ) -> Result<SessionMessage, RepositoryError> {
        if !self.sessions.iter().any(|s| s.id == session_id) {
            return Err(RepositoryError::NotFound);
        }
        let id = self.next_id();
        let now = Utc::now();
        let msg = SessionMessage {
            id,
            session_id,
            role,
            content: content.to_string(),
            hash: hash.map(str::to_string),
            created_at: now,
        };
        self.messages.push(msg.clone());
        if let Some(session) = self.sessions.iter_mut().find(|s| s.id == session_id) {
            if role == MessageRole::User {
                session.preview_text = Some(preview_text(content));
            }
            session.updated_at = now;
        }
        Ok(msg)
    }
}

/// Vec-backed `MessageStore` with optional failure injection.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
    fail_records: AtomicU32,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` calls to `record_exchange` fail.
    pub fn fail_next_records(&self, n: u32) {
        self.fail_records.store(n, Ordering::SeqCst);
    }

    pub fn insert_body_at(&self, hash: &str, content: &str, created_at: DateTime<Utc>) {
        self.state.lock().unwrap().bodies.push(MessageBody {
            hash: hash.to_string(),
            content: content.to_string(),
            created_at,
        });
    }

    pub fn active_sessions(&self, user_id: i64) -> Vec<ChatSession> {
        self.state
            .lock()
            .unwrap()
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id && s.is_active)
            .cloned()
            .collect()
    }

    pub fn all_messages(&self) -> Vec<SessionMessage> {
        self.state.lock().unwrap().messages.clone()
    }
}

impl MessageStore for InMemoryStore {
    async fn create_body(&self, content: &str) -> Result<String, RepositoryError> {
        Ok(self.state.lock().unwrap().insert_body(content))
    }

    async fn get_body(&self, hash: &str) -> Result<Option<MessageBody>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state.bodies.iter().find(|b| b.hash == hash).cloned())
    }

    async fn get_active_session(&self, user_id: i64) -> Result<Option<ChatSession>, RepositoryError> {
        Ok(self.active_sessions(user_id).into_iter().last())
    }

    async fn create_session(&self, user_id: i64) -> Result<ChatSession, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        for s in state.sessions.iter_mut().filter(|s| s.user_id == user_id) {
            s.is_active = false;
        }
        let now = Utc::now();
        let session = ChatSession {
            id: state.next_id(),
            user_id,
            is_active: true,
            preview_text: None,
            created_at: now,
            updated_at: now,
        };
        state.sessions.push(session.clone());
        Ok(session)
    }

    async fn deactivate_sessions(&self, user_id: i64) -> Result<u64, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let mut count = 0;
        for s in state
            .sessions
            .iter_mut()
            .filter(|s| s.user_id == user_id && s.is_active)
        {
            s.is_active = false;
            count += 1;
        }
        Ok(count)
    }

    async fn append_message(
        &self,
        session_id: i64,
        role: MessageRole,
        content: &str,
        hash: Option<&str>,
    ) -> Result<SessionMessage, RepositoryError> {
        self.state
            .lock()
            .unwrap()
            .push_message(session_id, role, content, hash)
    }

    async fn record_exchange(
        &self,
        session_id: i64,
        question: &str,
        answer: &str,
    ) -> Result<String, RepositoryError> {
        let remaining = self.fail_records.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_records.store(remaining - 1, Ordering::SeqCst);
            return Err(RepositoryError::Query("injected failure".to_string()));
        }
        let mut state = self.state.lock().unwrap();
        state.push_message(session_id, MessageRole::User, question, None)?;
        let hash = state.insert_body(answer);
        state.push_message(session_id, MessageRole::Assistant, answer, Some(&hash))?;
        Ok(hash)
    }

    async fn list_messages(&self, session_id: i64) -> Result<Vec<SessionMessage>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn list_sessions_for_user(&self, user_id: i64) -> Result<Vec<ChatSession>, RepositoryError> {
        let state = self.state.lock().unwrap();
        let mut sessions: Vec<_> = state
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    async fn list_first_user_message_per_session(
        &self,
        user_id: i64,
    ) -> Result<Vec<MessageBody>, RepositoryError> {
        let state = self.state.lock().unwrap();
        let mut out = Vec::new();
        for session in state.sessions.iter().filter(|s| s.user_id == user_id).rev() {
            let first_answer = state
                .messages
                .iter()
                .filter(|m| m.session_id == session.id && m.role == MessageRole::Assistant)
                .find_map(|m| m.hash.as_deref());
            if let Some(body) = first_answer.and_then(|h| state.bodies.iter().find(|b| b.hash == h)) {
                out.push(body.clone());
            }
        }
        Ok(out)
    }

    async fn purge_bodies_older_than(&self, age: Duration) -> Result<u64, RepositoryError> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(age).map_err(|e| RepositoryError::Query(e.to_string()))?;
        let mut state = self.state.lock().unwrap();
        let before = state.bodies.len();
        state.bodies.retain(|b| b.created_at >= cutoff);
        Ok((before - state.bodies.len()) as u64)
    }
}

// --- Backend ---

/// Backend that replays scripted results and records what it was given.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    fallback: Box<dyn Fn() -> Result<String, LlmError> + Send + Sync>,
    calls: Mutex<Vec<(Vec<Turn>, String)>>,
    delay: Duration,
}

impl ScriptedBackend {
    /// Always answers `answer`.
    pub fn answering(answer: &'static str) -> Self {
        Self::with_fallback(move || Ok(answer.to_string()))
    }

    /// Always fails with a transient provider error.
    pub fn failing() -> Self {
        Self::with_fallback(|| {
            Err(LlmError::Provider {
                message: "503 Service Unavailable".to_string(),
            })
        })
    }

    pub fn with_fallback(
        fallback: impl Fn() -> Result<String, LlmError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Box::new(fallback),
            calls: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    /// Queue results returned before the fallback kicks in.
    pub fn then(self, result: Result<String, LlmError>) -> Self {
        self.script.lock().unwrap().push_back(result);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<(Vec<Turn>, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }

    async fn generate(&self, history: &[Turn], prompt: &str) -> Result<String, LlmError> {
        self.calls
            .lock()
            .unwrap()
            .push((history.to_vec(), prompt.to_string()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| (self.fallback)())
    }
}

// --- Transport ---

/// Transport that serves queued update batches and records outbound calls.
#[derive(Default)]
pub struct RecordingTransport {
    batches: Mutex<VecDeque<Result<Vec<Update>, TransportError>>>,
    pub sent: Mutex<Vec<OutgoingMessage>>,
    pub actions: Mutex<Vec<(i64, ChatAction)>>,
    pub offsets: Mutex<Vec<i64>>,
    fail_sends: AtomicU32,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_batch(&self, batch: Result<Vec<Update>, TransportError>) {
        self.batches.lock().unwrap().push_back(batch);
    }

    /// Make the next `n` calls to `send_message` fail.
    pub fn fail_next_sends(&self, n: u32) {
        self.fail_sends.store(n, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn action_count(&self) -> usize {
        self.actions.lock().unwrap().len()
    }
}

impl ChatTransport for RecordingTransport {
    async fn get_me(&self) -> Result<User, TransportError> {
        Ok(User {
            id: 999,
            is_bot: true,
            first_name: "Orbi".to_string(),
            last_name: None,
            username: Some("orbi_bot".to_string()),
        })
    }

    async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, TransportError> {
        self.offsets.lock().unwrap().push(offset);
        let next = self.batches.lock().unwrap().pop_front();
        match next {
            Some(batch) => batch,
            None => {
                // Behave like a long poll that times out with nothing new.
                tokio::time::sleep(Duration::from_secs(timeout_secs.max(1))).await;
                Ok(Vec::new())
            }
        }
    }

    async fn send_message(&self, message: &OutgoingMessage) -> Result<(), TransportError> {
        let remaining = self.fail_sends.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_sends.store(remaining - 1, Ordering::SeqCst);
            return Err(TransportError::Rejected {
                description: "Bad Request: can't parse entities".to_string(),
                error_code: Some(400),
            });
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn send_chat_action(&self, chat_id: i64, action: ChatAction) -> Result<(), TransportError> {
        self.actions.lock().unwrap().push((chat_id, action));
        Ok(())
    }
}
