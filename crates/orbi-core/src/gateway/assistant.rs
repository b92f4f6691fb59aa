//! The `Assistant` port the dispatcher talks to, and its error type.

use orbi_types::chat::ChatSession;
use orbi_types::error::RepositoryError;
use orbi_types::llm::LlmError;
use thiserror::Error;

/// A completed question/answer round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub session_id: i64,
    pub answer: String,
    /// Address of the stored answer body.
    pub hash: String,
}

/// Errors from asking a question.
#[derive(Debug, Error)]
pub enum AskError {
    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),

    #[error("backend error: {0}")]
    Backend(#[from] LlmError),

    #[error("gave up after {attempts} attempt(s): {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<AskError>,
    },
}

impl AskError {
    /// Whether repeating the whole attempt may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            AskError::Storage(_) => true,
            AskError::Backend(e) => e.is_transient(),
            AskError::Exhausted { .. } => false,
        }
    }

    /// The error of the final attempt, unwrapping `Exhausted`.
    pub fn last_cause(&self) -> &AskError {
        match self {
            AskError::Exhausted { last, .. } => last.last_cause(),
            other => other,
        }
    }
}

/// Question answering as seen by the update dispatcher.
///
/// Implemented by `ConversationGateway`; tests substitute their own.
pub trait Assistant: Send + Sync {
    /// Answer `question` in the user's active session, retrying transient failures.
    fn ask_with_retry(
        &self,
        user_id: i64,
        question: &str,
    ) -> impl std::future::Future<Output = Result<Exchange, AskError>> + Send;

    /// Start a fresh active session for the user.
    fn new_session(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<ChatSession, AskError>> + Send;
}
