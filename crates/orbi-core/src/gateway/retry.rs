//! Bounded fixed-delay retry policy for generation attempts.

use std::time::Duration;

use super::assistant::AskError;

/// How many attempts a question gets and how long to wait between them.
///
/// `attempt` is 1-based (first execution is attempt 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// At least one attempt is always made.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Whether a failed `attempt` should be followed by another one.
    pub fn should_retry(&self, attempt: u32, error: &AskError) -> bool {
        attempt < self.max_attempts && error.is_transient()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}
